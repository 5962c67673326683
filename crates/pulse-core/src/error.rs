//! Error types for the pulse-core crate.

use std::time::Duration;

use thiserror::Error;

/// Errors raised by the aggregation engine and its collaborators.
///
/// Collectors never let these escape: they are turned into sentinel records,
/// dropped, or recorded as [`CollectionFailure`](crate::types::CollectionFailure)
/// entries. Only [`PulseError::Config`] reaches the request boundary.
#[derive(Debug, Error)]
pub enum PulseError {
    /// The configuration document is missing required values or is malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A request to an external collaborator could not be sent or completed.
    #[error("{operation} failed: {reason}")]
    Request {
        /// The operation that was attempted.
        operation: String,
        /// The reason the request failed.
        reason: String,
    },

    /// An external API answered with a non-success status.
    #[error("{operation} returned HTTP {status}: {message}")]
    Api {
        /// The operation that was attempted.
        operation: String,
        /// HTTP status code.
        status: u16,
        /// Response body or error message from the API.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("failed to decode {operation} response: {reason}")]
    Decode {
        /// The operation whose response was malformed.
        operation: String,
        /// The reason decoding failed.
        reason: String,
    },

    /// Cluster or API credentials could not be obtained.
    #[error("credentials unavailable for {target}: {reason}")]
    Credentials {
        /// The cluster or service the credentials were for.
        target: String,
        /// The reason acquisition failed.
        reason: String,
    },

    /// An external call did not finish within its bound.
    #[error("{operation} timed out after {}s", .after.as_secs_f64())]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The bound that was exceeded.
        after: Duration,
    },

    /// I/O error (configuration file access).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PulseError {
    /// Shorthand for a [`PulseError::Request`].
    pub fn request(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Request {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }

    /// Shorthand for a [`PulseError::Decode`].
    pub fn decode(operation: impl Into<String>, reason: impl ToString) -> Self {
        Self::Decode {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for PulseError {
    fn from(err: serde_json::Error) -> Self {
        Self::Config(format!("invalid JSON: {err}"))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, PulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_config() {
        let err = PulseError::Config("project_id cannot be empty".to_string());
        assert_eq!(
            err.to_string(),
            "configuration error: project_id cannot be empty"
        );
    }

    #[test]
    fn error_display_request() {
        let err = PulseError::request("list url maps", "connection refused");
        assert_eq!(err.to_string(), "list url maps failed: connection refused");
    }

    #[test]
    fn error_display_api() {
        let err = PulseError::Api {
            operation: "list subscriptions".to_string(),
            status: 403,
            message: "permission denied".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "list subscriptions returned HTTP 403: permission denied"
        );
    }

    #[test]
    fn error_display_timeout() {
        let err = PulseError::Timeout {
            operation: "query time series".to_string(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "query time series timed out after 1.5s");
    }

    #[test]
    fn error_display_credentials() {
        let err = PulseError::Credentials {
            target: "prod-west".to_string(),
            reason: "missing CA certificate".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "credentials unavailable for prod-west: missing CA certificate"
        );
    }

    #[test]
    fn from_serde_error_is_config() {
        let serde_err = serde_json::from_str::<i32>("nope").unwrap_err();
        let err = PulseError::from(serde_err);
        assert!(matches!(err, PulseError::Config(_)));
    }
}
