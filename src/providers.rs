//! Chat completion providers and the dispatcher that routes requests to them.
//!
//! Every vendor API is wrapped by an adapter implementing [`ChatProvider`]. An adapter turns a
//! single user message into one request against the vendor endpoint and returns the reply text.
//! The [`dispatch::Dispatcher`] owns one adapter per [`ProviderIdentifier`] and selects among them
//! by the provider string stored in the model registry.
//!
//! ## Error Handling
//!
//! Vendor APIs report failures in their own ways. Each adapter keeps a bespoke error type close to
//! its API and converts it into [`Error`], whose [`ErrorKind`] is the category callers act on. The
//! kind decides how the outcome of a call is recorded against the model entry that was used.

mod apireq;
mod huggingface;
mod local;
mod openai;

pub(crate) mod dispatch;
pub(crate) mod providers;

use async_trait::async_trait;
use std::error::Error as StdError;
use std::fmt;

use self::providers::ProviderIdentifier;

/// General categories of errors returned by a [`ChatProvider`] or the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    /// No adapter is registered for the provider.
    UnsupportedProvider,
    /// The provider requires a credential and none was configured.
    MissingCredential,
    /// The vendor rejected the credential (HTTP 401).
    InvalidCredential,
    /// The vendor answered with any other non-success status. The detail carries the
    /// vendor's response body.
    Upstream,
    /// A successful response did not have the expected shape.
    MalformedResponse,
    /// The provider is known but calls to it are not implemented.
    NotImplemented,
    /// The vendor could not be reached: connection failure or timeout.
    Unreachable,
    /// The request could not be built or sent for another reason.
    RequestFailed,
}

#[derive(Debug)]
pub(crate) struct Error {
    kind: ErrorKind,
    detail: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub(crate) fn from_kind(kind: ErrorKind) -> Error {
        Error {
            kind,
            detail: None,
            source: None,
        }
    }

    pub(crate) fn from_source(kind: ErrorKind, source: Box<dyn StdError + Send + Sync>) -> Error {
        Error {
            kind,
            detail: None,
            source: Some(source),
        }
    }

    pub(crate) fn with_detail<S: Into<String>>(mut self, detail: S) -> Error {
        self.detail = Some(detail.into());
        self
    }

    pub(crate) fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub(crate) fn detail(&self) -> Option<&str> {
        self.detail.as_deref()
    }

    fn message(&self) -> &'static str {
        match self.kind {
            ErrorKind::UnsupportedProvider => "unsupported provider",
            ErrorKind::MissingCredential => "no API key is configured",
            ErrorKind::InvalidCredential => "invalid API key",
            ErrorKind::Upstream => "the provider returned an error",
            ErrorKind::MalformedResponse => "the provider response was malformed",
            ErrorKind::NotImplemented => "the provider is not implemented",
            ErrorKind::Unreachable => "the provider could not be reached",
            ErrorKind::RequestFailed => "the request failed",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.message(), detail),
            None => write!(f, "{}", self.message()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source.as_ref().map(|e| &**e as _)
    }
}

/// Fails with [`ErrorKind::MissingCredential`] unless a non-blank credential is given.
pub(crate) fn require_credential(credential: Option<&str>) -> Result<&str, Error> {
    credential
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .ok_or_else(|| Error::from_kind(ErrorKind::MissingCredential))
}

/// A trait implemented by all chat providers.
#[async_trait]
pub(crate) trait ChatProvider: Send + Sync {
    /// Returns the provider identifier.
    fn id(&self) -> ProviderIdentifier;

    /// Sends `message` as the sole user turn to `model` and returns the reply text.
    ///
    /// Exactly one request is made. Adapters which need a credential fail with
    /// [`ErrorKind::MissingCredential`] before any network I/O if it is absent.
    async fn complete(
        &self,
        model: &str,
        credential: Option<&str>,
        message: &str,
    ) -> Result<String, Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_credential() {
        assert_eq!(require_credential(Some(" sk-1 ")).unwrap(), "sk-1");

        for missing in [None, Some(""), Some("   ")] {
            assert_eq!(
                require_credential(missing).unwrap_err().kind(),
                ErrorKind::MissingCredential
            );
        }
    }

    #[test]
    fn test_display_includes_detail() {
        let err = Error::from_kind(ErrorKind::Upstream).with_detail("{\"error\":\"overloaded\"}");

        assert_eq!(
            err.to_string(),
            "the provider returned an error: {\"error\":\"overloaded\"}"
        );
        assert_eq!(Error::from_kind(ErrorKind::InvalidCredential).to_string(), "invalid API key");
    }
}
