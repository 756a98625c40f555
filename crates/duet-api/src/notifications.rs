use axum::{
    Extension, Json,
    extract::{Path, State},
    response::IntoResponse,
};

use duet_types::api::{Claims, Notification, UnreadCountResponse, UpdatedResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, with_db};

pub async fn list(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = with_db(&state, move |db| db.list_notifications(claims.sub)).await?;
    let notifications: Vec<Notification> = rows
        .into_iter()
        .map(|row| Notification {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            message: row.message,
            read_status: row.read_status,
            sent_email: row.sent_email,
            sent_sms: row.sent_sms,
            created_at: row.created_at,
        })
        .collect();
    Ok(Json(notifications))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let marked = with_db(&state, move |db| db.mark_notification_read(id, claims.sub)).await?;
    if !marked {
        return Err(ApiError::NotFound("Notification not found".into()));
    }
    Ok(Json(serde_json::json!({ "message": "Notification marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let updated = with_db(&state, move |db| db.mark_all_notifications_read(claims.sub)).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let unread_count = with_db(&state, move |db| db.unread_notification_count(claims.sub)).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}
