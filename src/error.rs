//! Error types for provider operations.

use thiserror::Error;

/// Errors returned by provider operations.
///
/// The server turns these into error diagnostics for the host; the variant
/// decides the gRPC status code when a caller needs one.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The remote object does not exist.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Input failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An unexpected failure inside the provider or its API client.
    #[error("Client error: {0}")]
    Sdk(String),

    /// The provider configuration is invalid.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource or data source type is not served.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// State or configuration could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The API rejected the credentials.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The API rate limit was hit.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// The API is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The API did not answer in time.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// The operation cannot run in the provider's current state.
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// The state handed to the provider is malformed, such as a non-numeric id.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// The message carried by the error, without the variant prefix.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg)
            | Self::Validation(msg)
            | Self::Sdk(msg)
            | Self::Configuration(msg)
            | Self::UnknownResource(msg)
            | Self::PermissionDenied(msg)
            | Self::ResourceExhausted(msg)
            | Self::Unavailable(msg)
            | Self::DeadlineExceeded(msg)
            | Self::FailedPrecondition(msg)
            | Self::InvalidRequest(msg) => msg,
            Self::Serialization(_) => "serialization error (see Debug output)",
        }
    }

    /// The text shown under the diagnostic summary.
    pub fn detail(&self) -> String {
        match self {
            Self::Serialization(err) => err.to_string(),
            other => other.message().to_string(),
        }
    }

    /// A short title for the diagnostic shown to the user.
    pub fn summary(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "Resource Not Found",
            Self::Validation(_) => "Invalid Configuration",
            Self::Sdk(_)
            | Self::PermissionDenied(_)
            | Self::ResourceExhausted(_)
            | Self::Unavailable(_)
            | Self::DeadlineExceeded(_) => "Client Error",
            Self::Configuration(_) => "Provider Configuration Error",
            Self::UnknownResource(_) => "Unknown Resource Type",
            Self::Serialization(_) => "Serialization Error",
            Self::FailedPrecondition(_) => "Provider Not Ready",
            Self::InvalidRequest(_) => "ID Error",
        }
    }
}

impl From<ProviderError> for tonic::Status {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::NotFound(msg) => tonic::Status::not_found(msg),
            ProviderError::Validation(msg) => tonic::Status::invalid_argument(msg),
            ProviderError::Configuration(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::UnknownResource(msg) => tonic::Status::not_found(msg),
            ProviderError::Sdk(msg) => tonic::Status::internal(msg),
            ProviderError::Serialization(err) => {
                tonic::Status::invalid_argument(format!("Serialization error: {}", err))
            },
            ProviderError::PermissionDenied(msg) => tonic::Status::permission_denied(msg),
            ProviderError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProviderError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProviderError::DeadlineExceeded(msg) => tonic::Status::deadline_exceeded(msg),
            ProviderError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProviderError::InvalidRequest(msg) => tonic::Status::invalid_argument(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("sshkey 42".to_string());
        assert_eq!(format!("{}", err), "Resource not found: sshkey 42");

        let err = ProviderError::UnknownResource("webarena_indigo_v1_vm".to_string());
        assert_eq!(
            format!("{}", err),
            "Unknown resource type: webarena_indigo_v1_vm"
        );

        let err = ProviderError::Sdk("Unable to read sshkey".to_string());
        assert_eq!(format!("{}", err), "Client error: Unable to read sshkey");
    }

    #[test]
    fn test_error_to_status() {
        let cases = vec![
            (ProviderError::NotFound("x".into()), tonic::Code::NotFound),
            (ProviderError::Validation("x".into()), tonic::Code::InvalidArgument),
            (
                ProviderError::Configuration("x".into()),
                tonic::Code::FailedPrecondition,
            ),
            (ProviderError::Sdk("x".into()), tonic::Code::Internal),
            (
                ProviderError::PermissionDenied("x".into()),
                tonic::Code::PermissionDenied,
            ),
            (
                ProviderError::ResourceExhausted("x".into()),
                tonic::Code::ResourceExhausted,
            ),
            (ProviderError::Unavailable("x".into()), tonic::Code::Unavailable),
            (
                ProviderError::DeadlineExceeded("x".into()),
                tonic::Code::DeadlineExceeded,
            ),
            (
                ProviderError::InvalidRequest("x".into()),
                tonic::Code::InvalidArgument,
            ),
        ];

        for (err, code) in cases {
            let status: tonic::Status = err.into();
            assert_eq!(status.code(), code);
        }
    }

    #[test]
    fn test_message_and_summary() {
        let err = ProviderError::InvalidRequest("Unable to parse ID=abc".to_string());
        assert_eq!(err.message(), "Unable to parse ID=abc");
        assert_eq!(err.summary(), "ID Error");

        let err = ProviderError::Unavailable("HTTP 503".to_string());
        assert_eq!(err.summary(), "Client Error");
    }

    #[test]
    fn test_serialization_error_from() {
        let err: ProviderError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ProviderError::Serialization(_)));
        assert_eq!(err.summary(), "Serialization Error");
        assert!(err.detail().contains("EOF"));
    }
}
