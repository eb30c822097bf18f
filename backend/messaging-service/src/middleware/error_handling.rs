use crate::error::AppError;
use actix_web::{http::StatusCode, HttpResponse};
use error_types::{error_codes, error_types as kinds, ErrorResponse};

/// Map domain errors to the uniform error envelope
pub fn map_error(err: &AppError) -> (StatusCode, ErrorResponse) {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let (error_type, code) = match err {
        AppError::Validation { .. } => (kinds::VALIDATION_ERROR, error_codes::VALIDATION_FAILED),
        AppError::BadRequest(_) => (kinds::VALIDATION_ERROR, error_codes::INVALID_REQUEST),
        AppError::TokenMissing => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_MISSING),
        AppError::Unauthorized => (kinds::AUTHENTICATION_ERROR, error_codes::TOKEN_INVALID),
        AppError::Forbidden(_) => (kinds::AUTHORIZATION_ERROR, error_codes::FORBIDDEN),
        AppError::NotFoundOrForbidden(resource) => (kinds::NOT_FOUND_ERROR, not_found_code(resource)),
        AppError::Conflict(_) => (kinds::CONFLICT_ERROR, error_codes::DUPLICATE_RESOURCE),
        AppError::Database(_) => (kinds::SERVER_ERROR, error_codes::DATABASE_ERROR),
        AppError::Config(_) | AppError::StartServer(_) | AppError::Internal => {
            (kinds::SERVER_ERROR, error_codes::INTERNAL_SERVER_ERROR)
        }
    };

    // Server-side details stay in the logs.
    let message = if status.is_server_error() {
        tracing::error!(error = %err, "request failed");
        "Internal server error".to_string()
    } else {
        err.to_string()
    };

    let mut response = ErrorResponse::new(&message, status.as_u16(), error_type, code);
    if let AppError::Validation { errors, .. } = err {
        response = response.with_errors(errors.clone());
    }

    (status, response)
}

fn not_found_code(resource: &str) -> &'static str {
    match resource {
        "Conversation" => error_codes::CONVERSATION_NOT_FOUND,
        "Message" => error_codes::MESSAGE_NOT_FOUND,
        "Notification" => error_codes::NOTIFICATION_NOT_FOUND,
        "Complaint" => error_codes::COMPLAINT_NOT_FOUND,
        _ => error_codes::RESOURCE_NOT_FOUND,
    }
}

pub fn into_response(err: &AppError) -> HttpResponse {
    let (status, response) = map_error(err);
    HttpResponse::build(status).json(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_keeps_resource_code() {
        let (status, body) = map_error(&AppError::NotFoundOrForbidden("Conversation"));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.code, error_codes::CONVERSATION_NOT_FOUND);
        assert_eq!(body.message, "Conversation not found or access denied");
        assert!(!body.success);
    }

    #[test]
    fn test_validation_carries_field_errors() {
        let err = AppError::Validation {
            message: "Validation failed".to_string(),
            errors: vec!["content: must not be empty".to_string()],
        };
        let (status, body) = map_error(&err);
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error_type, kinds::VALIDATION_ERROR);
        assert_eq!(body.errors.as_deref(), Some(&["content: must not be empty".to_string()][..]));
    }

    #[test]
    fn test_database_details_are_hidden() {
        let (status, body) = map_error(&AppError::Database("relation \"messages\" does not exist".into()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.message, "Internal server error");
        assert_eq!(body.code, error_codes::DATABASE_ERROR);
    }

    #[test]
    fn test_auth_errors() {
        let (status, body) = map_error(&AppError::TokenMissing);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, error_codes::TOKEN_MISSING);
        let (status, body) = map_error(&AppError::Unauthorized);
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, error_codes::TOKEN_INVALID);
        let (status, body) = map_error(&AppError::forbidden("Admin role required"));
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.message, "Admin role required");
    }
}
