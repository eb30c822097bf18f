//! Shared error envelope for campus platform services.
//!
//! Every failed request is answered with the same JSON shape so clients can
//! handle errors uniformly:
//!
//! ```json
//! { "success": false, "message": "...", "errors": ["..."], "code": "...", "timestamp": "..." }
//! ```

use serde::{Deserialize, Serialize};

/// Uniform API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `false`; mirrors the success envelope's flag
    pub success: bool,

    /// Human readable explanation
    pub message: String,

    /// Field-level problems (validation failures only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,

    /// HTTP status code
    pub status: u16,

    /// Error category used by clients for routing:
    /// - "validation_error"
    /// - "authentication_error"
    /// - "authorization_error"
    /// - "not_found_error"
    /// - "conflict_error"
    /// - "server_error"
    pub error_type: String,

    /// Stable machine readable code, e.g. "CONVERSATION_NOT_FOUND"
    pub code: String,

    /// ISO 8601 timestamp
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(message: &str, status: u16, error_type: &str, code: &str) -> Self {
        Self {
            success: false,
            message: message.to_string(),
            errors: None,
            status,
            error_type: error_type.to_string(),
            code: code.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<String>) -> Self {
        if !errors.is_empty() {
            self.errors = Some(errors);
        }
        self
    }
}

/// Standard error codes
pub mod error_codes {
    // Authentication
    pub const TOKEN_MISSING: &str = "TOKEN_MISSING";
    pub const TOKEN_INVALID: &str = "TOKEN_INVALID";
    pub const FORBIDDEN: &str = "FORBIDDEN";

    // Input
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

    // Messaging
    pub const CONVERSATION_NOT_FOUND: &str = "CONVERSATION_NOT_FOUND";
    pub const MESSAGE_NOT_FOUND: &str = "MESSAGE_NOT_FOUND";
    pub const NOTIFICATION_NOT_FOUND: &str = "NOTIFICATION_NOT_FOUND";
    pub const COMPLAINT_NOT_FOUND: &str = "COMPLAINT_NOT_FOUND";
    pub const RESOURCE_NOT_FOUND: &str = "RESOURCE_NOT_FOUND";
    pub const DUPLICATE_RESOURCE: &str = "DUPLICATE_RESOURCE";

    // Database/System
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_SERVER_ERROR: &str = "INTERNAL_SERVER_ERROR";
}

/// Standard error categories
pub mod error_types {
    pub const VALIDATION_ERROR: &str = "validation_error";
    pub const AUTHENTICATION_ERROR: &str = "authentication_error";
    pub const AUTHORIZATION_ERROR: &str = "authorization_error";
    pub const NOT_FOUND_ERROR: &str = "not_found_error";
    pub const CONFLICT_ERROR: &str = "conflict_error";
    pub const SERVER_ERROR: &str = "server_error";
}
