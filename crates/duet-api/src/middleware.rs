use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use duet_types::api::Claims;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Extract and validate the bearer token; on success the verified claims are
/// inserted as a request extension for handlers downstream.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> ApiResult<Response> {
    let auth_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::MissingToken)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::MissingToken)?;

    let claims = verify_token(token, &state.jwt_secret)?;
    req.extensions_mut().insert(claims);
    Ok(next.run(req).await)
}

pub fn verify_token(token: &str, secret: &str) -> ApiResult<Claims> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| ApiError::InvalidToken)?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::issue_token;
    use duet_types::api::Role;

    #[test]
    fn token_roundtrip() {
        let token = issue_token("test-secret", 7, "irfan", "irfan@example.com", Role::User).unwrap();
        let claims = verify_token(&token, "test-secret").unwrap();
        assert_eq!(claims.sub, 7);
        assert_eq!(claims.username, "irfan");
        assert_eq!(claims.role, Role::User);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = issue_token("test-secret", 7, "irfan", "irfan@example.com", Role::User).unwrap();
        assert!(matches!(
            verify_token(&token, "other-secret"),
            Err(ApiError::InvalidToken)
        ));
    }

    #[test]
    fn garbage_token_is_rejected() {
        assert!(matches!(
            verify_token("not.a.jwt", "test-secret"),
            Err(ApiError::InvalidToken)
        ));
    }
}
