//! Error types for the PubSub source operator

use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors that can occur during operator operations
#[derive(Debug, Error)]
pub enum OperatorError {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    KubeApi(String),
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A dependent Topic or PullSubscription could not be provisioned
    #[error("Provisioning error: {0}")]
    Provisioning(String),
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<kube::Error> for OperatorError {
    fn from(err: kube::Error) -> Self {
        OperatorError::KubeApi(err.to_string())
    }
}

impl From<serde_json::Error> for OperatorError {
    fn from(err: serde_json::Error) -> Self {
        OperatorError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OperatorError::KubeApi("test error".to_string());
        assert!(err.to_string().contains("Kubernetes API error"));
    }

    #[test]
    fn test_kube_error_converts() {
        let err: OperatorError = kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "storages \"photos\" not found".to_string(),
            reason: "NotFound".to_string(),
            code: 404,
        })
        .into();
        assert!(matches!(err, OperatorError::KubeApi(ref m) if m.contains("not found")));
    }

    #[test]
    fn test_error_variants() {
        let errors = vec![
            OperatorError::KubeApi("api".to_string()),
            OperatorError::Configuration("config".to_string()),
            OperatorError::Provisioning("topic".to_string()),
            OperatorError::Serialization("serde".to_string()),
        ];

        for err in errors {
            assert!(!format!("{}", err).is_empty());
        }
    }
}
