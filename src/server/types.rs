//! Request/response types for the reference analysis service.
//!
//! Analyze and poll bodies reuse the client's wire types
//! (`AnalyzeReply`, `PollReply`) so both sides agree by construction.

use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Always "ok" when healthy
    pub status: String,
    pub version: String,
    /// Sessions the service has seen
    pub sessions: usize,
}

impl HealthResponse {
    pub fn healthy(sessions: usize) -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            sessions,
        }
    }
}

/// `?session=` query parameter
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    pub session: Option<String>,
}

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    /// Error code for programmatic handling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl ErrorResponse {
    pub fn with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: Some(code.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_includes_version_and_sessions() {
        let health = HealthResponse::healthy(3);
        assert_eq!(health.status, "ok");
        assert!(!health.version.is_empty());
        assert_eq!(health.sessions, 3);
    }

    #[test]
    fn error_response_serializes_code() {
        let json = serde_json::to_value(ErrorResponse::with_code("no frame", "MISSING_FILE")).unwrap();
        assert_eq!(json["error"], "no frame");
        assert_eq!(json["code"], "MISSING_FILE");
    }
}
