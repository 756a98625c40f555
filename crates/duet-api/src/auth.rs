use anyhow::anyhow;
use argon2::{
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
    password_hash::{SaltString, rand_core::OsRng},
};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use jsonwebtoken::{EncodingKey, Header, encode};

use duet_types::api::{
    AuthResponse, AuthUser, Claims, LoginRequest, RegisterRequest, Role, UserProfile,
};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, with_db};

/// Session lifetime: 7 days.
const TOKEN_TTL_DAYS: i64 = 7;

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    let username = req.username.trim().to_string();
    let email = req.email.trim().to_string();
    if username.is_empty() || email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Missing required fields".into()));
    }

    // Argon2id with a fresh salt; the plaintext never reaches the store.
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(anyhow!("password hashing failed: {e}")))?
        .to_string();

    let insert_username = username.clone();
    let insert_email = email.clone();
    let insert_phone = req.phone.clone();
    let user_id = with_db(&state, move |db| {
        db.create_user(
            &insert_username,
            &insert_email,
            insert_phone.as_deref(),
            &password_hash,
            Role::User.as_str(),
        )
    })
    .await?
    .ok_or_else(|| ApiError::Conflict("Username or email already exists".into()))?;

    let token = issue_token(&state.jwt_secret, user_id, &username, &email, Role::User)?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            token,
            user: AuthUser {
                id: user_id,
                username,
                email,
                phone: req.phone,
            },
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.email.is_empty() || req.password.is_empty() {
        return Err(ApiError::Validation("Email and password required".into()));
    }

    // Unknown email and wrong password take the same failure path so the
    // response never reveals whether an account exists.
    let email = req.email.clone();
    let user = with_db(&state, move |db| db.get_user_by_email(&email))
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    let parsed_hash = PasswordHash::new(&user.password_hash)
        .map_err(|e| ApiError::Internal(anyhow!("stored hash unreadable: {e}")))?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed_hash)
        .map_err(|_| ApiError::InvalidCredentials)?;

    let role = Role::from_db(&user.role);
    let token = issue_token(&state.jwt_secret, user.id, &user.username, &user.email, role)?;

    Ok(Json(AuthResponse {
        token,
        user: AuthUser {
            id: user.id,
            username: user.username,
            email: user.email,
            phone: user.phone,
        },
    }))
}

pub async fn profile(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let user = with_db(&state, move |db| db.get_user_by_id(claims.sub))
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(UserProfile {
        id: user.id,
        username: user.username,
        email: user.email,
        phone: user.phone,
        role: Role::from_db(&user.role),
        created_at: user.created_at,
    }))
}

pub fn issue_token(
    secret: &str,
    user_id: i64,
    username: &str,
    email: &str,
    role: Role,
) -> ApiResult<String> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        email: email.to_string(),
        role,
        exp: (chrono::Utc::now() + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| ApiError::Internal(anyhow!("token signing failed: {e}")))?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Salt generation draws from the OS randomness source; hash and verify
    // must round-trip through the same PHC string format the store keeps.
    #[test]
    fn password_hash_roundtrip() {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(b"hunter2!", &salt)
            .unwrap()
            .to_string();

        let parsed = PasswordHash::new(&hash).unwrap();
        assert!(Argon2::default().verify_password(b"hunter2!", &parsed).is_ok());
        assert!(Argon2::default().verify_password(b"wrong", &parsed).is_err());
    }

    #[test]
    fn fresh_salts_give_distinct_hashes() {
        let hash_of = |pw: &[u8]| {
            let salt = SaltString::generate(&mut OsRng);
            Argon2::default().hash_password(pw, &salt).unwrap().to_string()
        };
        assert_ne!(hash_of(b"hunter2!"), hash_of(b"hunter2!"));
    }
}
