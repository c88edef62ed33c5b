//! Error types for the Jira facade
//!
//! One enum covers every failure mode, from upstream status codes to local I/O.
//! Uses thiserror for ergonomic error handling.

use thiserror::Error;

/// Result type alias for facade operations
pub type Result<T> = std::result::Result<T, FacadeError>;

/// Comprehensive error type for facade operations
#[derive(Error, Debug)]
pub enum FacadeError {
    /// Upstream answered 401
    #[error("Authentication failed: invalid credentials. Check JIRA_EMAIL and JIRA_API_TOKEN.")]
    Authentication,

    /// Upstream answered 403
    #[error("Permission denied: insufficient permissions. Check Jira permissions.")]
    Permission,

    /// Upstream answered 404, or a lookup came back empty
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Any other non-2xx status from upstream
    #[error("Jira API error: HTTP {status}: {body}")]
    Remote { status: u16, body: String },

    /// DNS, timeout, connection refused and friends
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Upstream returned 2xx with a body we could not understand
    #[error("Invalid response from Jira: {0}")]
    InvalidResponse(String),

    /// Malformed request body or missing required field
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FacadeError {
    /// Map an upstream status code to the matching domain error.
    ///
    /// Returns `None` for 2xx statuses.
    pub fn from_status(status: u16, path: &str, body: &str) -> Option<Self> {
        match status {
            200..=299 => None,
            401 => Some(FacadeError::Authentication),
            403 => Some(FacadeError::Permission),
            404 => Some(FacadeError::NotFound(path.to_string())),
            _ => Some(FacadeError::Remote {
                status,
                body: body.to_string(),
            }),
        }
    }

    /// HTTP status code this error is rendered with at the API boundary
    pub fn status_code(&self) -> u16 {
        match self {
            FacadeError::Authentication => 401,
            FacadeError::Permission => 403,
            FacadeError::NotFound(_) => 404,
            FacadeError::Validation(_) => 400,
            FacadeError::Remote { .. }
            | FacadeError::Transport(_)
            | FacadeError::InvalidResponse(_) => 502,
            FacadeError::Config(_) | FacadeError::Io(_) | FacadeError::Json(_) => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert!(FacadeError::from_status(200, "/x", "").is_none());
        assert!(FacadeError::from_status(204, "/x", "").is_none());

        assert!(matches!(
            FacadeError::from_status(401, "/x", ""),
            Some(FacadeError::Authentication)
        ));
        assert!(matches!(
            FacadeError::from_status(403, "/x", ""),
            Some(FacadeError::Permission)
        ));
        match FacadeError::from_status(404, "/rest/api/3/issue/KAN-9", "") {
            Some(FacadeError::NotFound(path)) => assert_eq!(path, "/rest/api/3/issue/KAN-9"),
            other => panic!("unexpected: {:?}", other),
        }
        match FacadeError::from_status(500, "/x", "boom") {
            Some(FacadeError::Remote { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_boundary_status_codes() {
        assert_eq!(FacadeError::Authentication.status_code(), 401);
        assert_eq!(FacadeError::Permission.status_code(), 403);
        assert_eq!(FacadeError::NotFound("x".into()).status_code(), 404);
        assert_eq!(FacadeError::Validation("x".into()).status_code(), 400);
        assert_eq!(
            FacadeError::Remote {
                status: 500,
                body: String::new()
            }
            .status_code(),
            502
        );
        assert_eq!(FacadeError::InvalidResponse("x".into()).status_code(), 502);
        assert_eq!(FacadeError::Config("x".into()).status_code(), 500);
    }

    #[test]
    fn test_messages_name_the_cause() {
        let msg = FacadeError::Authentication.to_string();
        assert!(msg.contains("invalid credentials"));

        let msg = FacadeError::Permission.to_string();
        assert!(msg.contains("insufficient permissions"));

        let msg = FacadeError::Remote {
            status: 418,
            body: "teapot".into(),
        }
        .to_string();
        assert!(msg.contains("418"));
        assert!(msg.contains("teapot"));
    }
}
