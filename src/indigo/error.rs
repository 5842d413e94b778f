//! Errors from the WebARENA Indigo API client.

use std::fmt;

use thiserror::Error;

use crate::error::ProviderError;

/// Errors returned by [`IndigoClient`](super::IndigoClient).
#[derive(Debug, Error)]
pub enum IndigoError {
    /// The configured endpoint is not a usable base URL.
    #[error("invalid endpoint {endpoint:?}: {reason}")]
    InvalidEndpoint {
        /// The endpoint as configured.
        endpoint: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The API answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Status {
        /// The HTTP status code.
        status: u16,
        /// The response body, as text.
        body: String,
    },

    /// The request did not complete.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not have the expected shape.
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl IndigoError {
    /// The HTTP status, when the API answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Convert into a [`ProviderError`] whose message starts with `context`,
    /// e.g. `Unable to read sshkey, got error: HTTP 404: ...`.
    pub fn with_context(self, context: impl fmt::Display) -> ProviderError {
        let msg = format!("{}, got error: {}", context, self);
        self.classify(msg)
    }

    fn classify(&self, msg: String) -> ProviderError {
        match self {
            Self::InvalidEndpoint { .. } => ProviderError::Configuration(msg),
            Self::Http(e) if e.is_timeout() => ProviderError::DeadlineExceeded(msg),
            Self::Http(e) if e.is_connect() => ProviderError::Unavailable(msg),
            Self::Decode(_) => ProviderError::Sdk(msg),
            _ => match self.status() {
                Some(404) => ProviderError::NotFound(msg),
                Some(401) | Some(403) => ProviderError::PermissionDenied(msg),
                Some(429) => ProviderError::ResourceExhausted(msg),
                Some(500..=599) => ProviderError::Unavailable(msg),
                _ => ProviderError::Sdk(msg),
            },
        }
    }
}

impl From<IndigoError> for ProviderError {
    fn from(err: IndigoError) -> Self {
        let msg = err.to_string();
        err.classify(msg)
    }
}
