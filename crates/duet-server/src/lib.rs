pub mod rate_limit;

use std::path::PathBuf;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State, WebSocketUpgrade},
    middleware,
    response::IntoResponse,
    routing::{delete, get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use duet_api::media::MAX_UPLOAD_BYTES;
use duet_api::middleware::require_auth;
use duet_api::state::AppState;
use duet_api::{auth, chat, gallery, notifications, requests};
use duet_gateway::{Relay, connection};

use crate::rate_limit::{RateLimiter, WINDOW};

/// Multipart framing overhead on top of the media cap.
const UPLOAD_BODY_LIMIT: usize = MAX_UPLOAD_BYTES + 1024 * 1024;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: String,
    pub public_dir: PathBuf,
    pub jwt_secret: String,
    pub mail_webhook: Option<String>,
    pub sms_webhook: Option<String>,
    pub auth_rate_limit: u32,
    pub api_rate_limit: u32,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // The secret has no fallback: refusing to start beats signing
        // sessions with a guessable default.
        let jwt_secret = std::env::var("DUET_JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("DUET_JWT_SECRET is not set"))?;

        Ok(Self {
            host: std::env::var("DUET_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: std::env::var("DUET_PORT")
                .unwrap_or_else(|_| "3000".into())
                .parse()?,
            db_path: std::env::var("DUET_DB_PATH").unwrap_or_else(|_| "duet.db".into()),
            public_dir: std::env::var("DUET_PUBLIC_DIR")
                .unwrap_or_else(|_| "public".into())
                .into(),
            jwt_secret,
            mail_webhook: std::env::var("DUET_MAIL_WEBHOOK").ok(),
            sms_webhook: std::env::var("DUET_SMS_WEBHOOK").ok(),
            auth_rate_limit: 5,
            api_rate_limit: 100,
        })
    }
}

pub fn build_router(state: AppState, relay: Relay, auth_limit: u32, api_limit: u32) -> Router {
    let auth_limiter = RateLimiter::new(
        WINDOW,
        auth_limit,
        "Too many authentication attempts, please try again later.",
    );
    let api_limiter = RateLimiter::new(
        WINDOW,
        api_limit,
        "Too many requests from this IP, please try again later.",
    );

    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .layer(middleware::from_fn_with_state(
            auth_limiter,
            rate_limit::enforce,
        ));

    let protected_routes = Router::new()
        .route("/auth/profile", get(auth::profile))
        .route("/gallery", get(gallery::list))
        .route(
            "/gallery/upload",
            post(gallery::upload).layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/gallery/{id}", delete(gallery::delete))
        .route("/requests", get(requests::list).post(requests::create))
        .route("/requests/{id}/status", patch(requests::update_status))
        .route("/requests/{id}", delete(requests::delete))
        .route("/chat/history/{partner_id}", get(chat::history))
        .route("/chat/send", post(chat::send))
        .route("/chat/read/{partner_id}", patch(chat::mark_read))
        .route("/chat/unread-count", get(chat::unread_count))
        .route("/notifications", get(notifications::list))
        .route("/notifications/{id}/read", patch(notifications::mark_read))
        .route("/notifications/read-all", patch(notifications::mark_all_read))
        .route(
            "/notifications/unread-count",
            get(notifications::unread_count),
        )
        .layer(middleware::from_fn_with_state(state.clone(), require_auth));

    let api = Router::new()
        .route("/health", get(health))
        .merge(public_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn_with_state(
            api_limiter,
            rate_limit::enforce,
        ))
        .with_state(state.clone());

    let ws_route = Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(relay);

    Router::new()
        .nest("/api", api)
        .merge(ws_route)
        .nest_service("/uploads", ServeDir::new(state.media.uploads_dir()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "OK", "message": "Server is running" }))
}

async fn ws_upgrade(State(relay): State<Relay>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| connection::serve(socket, relay))
}
