use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use duet_db::models::ChatMessageRow;
use duet_types::api::{ChatMessage, Claims, SendMessageBody, UnreadCountResponse, UpdatedResponse};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, with_db};

pub async fn history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let rows = with_db(&state, move |db| db.chat_history(claims.sub, partner_id)).await?;
    let messages: Vec<ChatMessage> = rows.into_iter().map(message_from_row).collect();
    Ok(Json(messages))
}

pub async fn send(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<SendMessageBody>,
) -> ApiResult<impl IntoResponse> {
    if body.receiver_id == 0 || body.message.is_empty() {
        return Err(ApiError::Validation(
            "Receiver and message are required".into(),
        ));
    }

    let sender_id = claims.sub;
    let sender_username = claims.username.clone();
    let receiver_id = body.receiver_id;
    let text = body.message.clone();

    // Message insert and the receiver's notification are two independent
    // writes with no transaction around them — best-effort by policy.
    let message_id = with_db(&state, move |db| {
        if db.get_user_by_id(receiver_id)?.is_none() {
            return Ok(None);
        }
        let id = db.insert_chat_message(sender_id, receiver_id, &text)?;
        db.insert_notification(
            receiver_id,
            "chat_message",
            &format!("New message from {}", sender_username),
        )?;
        Ok(Some(id))
    })
    .await?
    .ok_or_else(|| ApiError::Validation("Receiver not found".into()))?;

    let row = with_db(&state, move |db| db.get_chat_message(message_id))
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("sent message vanished")))?;

    // No relay push here: the realtime path is a client-initiated relay
    // event carrying the same payload.
    Ok((StatusCode::CREATED, Json(message_from_row(row))))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(partner_id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let updated = with_db(&state, move |db| db.mark_messages_read(claims.sub, partner_id)).await?;
    Ok(Json(UpdatedResponse { updated }))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let unread_count = with_db(&state, move |db| db.unread_message_count(claims.sub)).await?;
    Ok(Json(UnreadCountResponse { unread_count }))
}

fn message_from_row(row: ChatMessageRow) -> ChatMessage {
    ChatMessage {
        id: row.id,
        sender_id: row.sender_id,
        receiver_id: row.receiver_id,
        sender_username: row.sender_username,
        receiver_username: row.receiver_username,
        message: row.message,
        read_status: row.read_status,
        created_at: row.created_at,
    }
}
