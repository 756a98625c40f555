use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::warn;

use duet_db::models::DateRequestRow;
use duet_types::api::{Claims, CreateRequestBody, DateRequest, UpdateStatusBody};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, with_db};

const REQUEST_TYPES: &[&str] = &["food", "place"];
const STATUSES: &[&str] = &["pending", "approved", "rejected"];

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = with_db(&state, |db| db.list_date_requests()).await?;
    let requests: Vec<DateRequest> = rows.into_iter().map(request_from_row).collect();
    Ok(Json(requests))
}

pub async fn create(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(body): Json<CreateRequestBody>,
) -> ApiResult<impl IntoResponse> {
    if body.request_type.is_empty() || body.title.is_empty() {
        return Err(ApiError::Validation(
            "Request type and title are required".into(),
        ));
    }
    if !REQUEST_TYPES.contains(&body.request_type.as_str()) {
        return Err(ApiError::Validation(
            "Request type must be \"place\" or \"food\"".into(),
        ));
    }

    let insert = body.clone();
    let user_id = claims.sub;
    let request_id = with_db(&state, move |db| {
        db.insert_date_request(
            user_id,
            &insert.request_type,
            &insert.title,
            insert.description.as_deref(),
            insert.location.as_deref(),
        )
    })
    .await?;

    let row = with_db(&state, move |db| db.get_date_request(request_id))
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("created request vanished")))?;

    // Partner notification fan-out runs detached; its failure never fails
    // the request itself.
    tokio::spawn(notify_partners(
        state.clone(),
        claims,
        body.request_type,
        body.title,
        body.description,
    ));

    Ok((StatusCode::CREATED, Json(request_from_row(row))))
}

pub async fn update_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> ApiResult<impl IntoResponse> {
    if !STATUSES.contains(&body.status.as_str()) {
        return Err(ApiError::Validation("Invalid status".into()));
    }

    let request = with_db(&state, move |db| db.get_date_request(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Request not found".into()))?;

    // The requester does not get to approve (or reject) their own request;
    // status review belongs to the partner.
    if request.user_id == claims.sub {
        return Err(ApiError::Forbidden(
            "You cannot update the status of your own request".into(),
        ));
    }

    let status = body.status.clone();
    let changed = with_db(&state, move |db| db.update_request_status(id, &status)).await?;
    if changed == 0 {
        return Err(ApiError::NotFound("Request not found".into()));
    }

    Ok(Json(serde_json::json!({ "message": "Status updated successfully" })))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let request = with_db(&state, move |db| db.get_date_request(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Request not found".into()))?;

    // Owner only. Unlike gallery deletion there is deliberately no
    // privileged-role override here: the admin curates shared media, not
    // the partner's requests.
    if request.user_id != claims.sub {
        return Err(ApiError::Forbidden("Unauthorized".into()));
    }

    with_db(&state, move |db| db.delete_date_request(id)).await?;

    Ok(Json(serde_json::json!({ "message": "Request deleted successfully" })))
}

/// Insert a notification row for every other user and attempt best-effort
/// email/SMS delivery, recording which channels actually went out.
async fn notify_partners(
    state: AppState,
    claims: Claims,
    request_type: String,
    title: String,
    description: Option<String>,
) {
    let author_id = claims.sub;
    let others = match with_db(&state, move |db| db.users_other_than(author_id)).await {
        Ok(others) => others,
        Err(e) => {
            warn!("Failed to load notification recipients: {:?}", e);
            return;
        }
    };

    let kind_label = if request_type == "place" { "place" } else { "food" };
    let message = format!("{} created a {} request: {}", claims.username, kind_label, title);
    let email_body = format!(
        "{}\nDescription: {}",
        message,
        description.as_deref().unwrap_or("none")
    );

    for user in others {
        let insert_message = message.clone();
        let recipient = user.id;
        let notification_id = match with_db(&state, move |db| {
            db.insert_notification(recipient, "date_request", &insert_message)
        })
        .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!("Failed to insert notification for user {}: {:?}", recipient, e);
                continue;
            }
        };

        let sent_email = state
            .outbound
            .send_email(&user.email, "New date request", &email_body)
            .await;
        let sent_sms = match &user.phone {
            Some(phone) => state.outbound.send_sms(phone, &message).await,
            None => false,
        };

        if sent_email || sent_sms {
            if let Err(e) = with_db(&state, move |db| {
                db.mark_notification_delivered(notification_id, sent_email, sent_sms)
            })
            .await
            {
                warn!("Failed to record delivery flags: {:?}", e);
            }
        }
    }
}

fn request_from_row(row: DateRequestRow) -> DateRequest {
    DateRequest {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        email: row.email,
        request_type: row.request_type,
        title: row.title,
        description: row.description,
        location: row.location,
        status: row.status,
        created_at: row.created_at,
    }
}
