//! A utility module with helpers for making and classifying API requests.

mod error;
mod provider;

use reqwest::Client;
use std::time::Duration;

pub(crate) use error::Error as ReqwestError;
pub(crate) use reqwest::Url;

/// Builds the client shared by every request of an adapter. The timeout covers the whole
/// request, from connecting until the body has been read.
pub(crate) fn build_client(timeout: Duration) -> Result<Client, ReqwestError> {
    Ok(Client::builder().timeout(timeout).build()?)
}

/// Parses an API base, adding a trailing slash so that relative endpoints are joined onto
/// the full path rather than replacing its last segment.
pub(crate) fn parse_api_base(api_base: &str) -> Result<Url, url::ParseError> {
    if api_base.ends_with('/') {
        Url::parse(api_base)
    } else {
        Url::parse(&format!("{}/", api_base))
    }
}
