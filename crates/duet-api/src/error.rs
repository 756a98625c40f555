use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Handler-level failure taxonomy. Every variant renders as a JSON body
/// `{"error": <message>}`; internal errors log their cause and return a
/// generic message so nothing leaks.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("Authentication required")]
    MissingToken,

    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            // Duplicate unique fields report as 400, matching the register contract.
            ApiError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::MissingToken | ApiError::InvalidToken | ApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, self.to_string())
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong!".to_string(),
                )
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn validation_and_conflict_are_400() {
        assert_eq!(status_of(ApiError::Validation("bad".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status_of(ApiError::Conflict("dup".into())), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn auth_failures_are_401() {
        assert_eq!(status_of(ApiError::MissingToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::InvalidToken), StatusCode::UNAUTHORIZED);
        assert_eq!(status_of(ApiError::InvalidCredentials), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn forbidden_and_not_found() {
        assert_eq!(status_of(ApiError::Forbidden("no".into())), StatusCode::FORBIDDEN);
        assert_eq!(status_of(ApiError::NotFound("gone".into())), StatusCode::NOT_FOUND);
    }

    #[test]
    fn internal_hides_details() {
        let response = ApiError::Internal(anyhow::anyhow!("secret db path")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
