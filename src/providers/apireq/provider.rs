//! Conversions between Reqwest API errors and provider error types

use crate::providers::apireq::{error::ErrorKind as ReqwestErrorKind, ReqwestError};
use crate::providers::{Error, ErrorKind};

impl From<ReqwestError> for Error {
    fn from(value: ReqwestError) -> Self {
        let kind: ErrorKind = match &value.kind() {
            ReqwestErrorKind::ConnectFailed | ReqwestErrorKind::TimedOut => ErrorKind::Unreachable,
            ReqwestErrorKind::DecodingFailed => ErrorKind::MalformedResponse,
            ReqwestErrorKind::RedirectPolicyViolated | ReqwestErrorKind::UnknownReqwestError => {
                ErrorKind::RequestFailed
            }
        };

        Error::from_source(kind, Box::new(value))
    }
}
