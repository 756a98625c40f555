use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use duet_db::models::GalleryRow;
use duet_types::api::{Claims, GalleryItem};

use crate::error::{ApiError, ApiResult};
use crate::media::{self, MAX_UPLOAD_BYTES};
use crate::state::{AppState, with_db};

pub async fn list(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> ApiResult<impl IntoResponse> {
    let rows = with_db(&state, |db| db.list_gallery()).await?;
    let items: Vec<GalleryItem> = rows.into_iter().map(item_from_row).collect();
    Ok(Json(items))
}

pub async fn upload(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    mut multipart: Multipart,
) -> ApiResult<impl IntoResponse> {
    let mut file: Option<(String, axum::body::Bytes)> = None;
    let mut caption: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::Validation("Malformed upload".into()))?
    {
        match field.name() {
            Some("file") => {
                let mime = field
                    .content_type()
                    .map(str::to_string)
                    .ok_or_else(|| ApiError::Validation("File content type required".into()))?;
                let data = field
                    .bytes()
                    .await
                    .map_err(|_| ApiError::Validation("File exceeds the 50MB limit".into()))?;
                file = Some((mime, data));
            }
            Some("caption") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| ApiError::Validation("Malformed upload".into()))?;
                if !text.is_empty() {
                    caption = Some(text);
                }
            }
            _ => {}
        }
    }

    let (mime, data) = file.ok_or_else(|| ApiError::Validation("No file uploaded".into()))?;

    let (kind, ext) = media::classify(&mime).ok_or_else(|| {
        ApiError::Validation("Invalid file type. Only images and videos are allowed.".into())
    })?;
    if data.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::Validation("File exceeds the 50MB limit".into()));
    }

    // File lands on disk first so the stored row always points at a real file.
    let file_path = state
        .media
        .save(kind, ext, &data)
        .await
        .map_err(ApiError::Internal)?;

    let insert_path = file_path.clone();
    let insert_caption = caption.clone();
    let item_id = with_db(&state, move |db| {
        db.insert_gallery_item(
            claims.sub,
            kind.as_str(),
            &insert_path,
            insert_caption.as_deref(),
        )
    })
    .await?;

    let row = with_db(&state, move |db| db.get_gallery_item(item_id))
        .await?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("uploaded item vanished")))?;

    Ok((StatusCode::CREATED, Json(item_from_row(row))))
}

pub async fn delete(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let item = with_db(&state, move |db| db.get_gallery_item(id))
        .await?
        .ok_or_else(|| ApiError::NotFound("Item not found".into()))?;

    // Owner, or the privileged role curating the shared gallery.
    if item.user_id != claims.sub && !claims.role.is_admin() {
        return Err(ApiError::Forbidden("Unauthorized".into()));
    }

    with_db(&state, move |db| db.delete_gallery_item(id)).await?;

    // Row is gone; the backing file removal is best-effort.
    state.media.remove(&item.file_path).await;

    Ok(Json(serde_json::json!({ "message": "Item deleted successfully" })))
}

fn item_from_row(row: GalleryRow) -> GalleryItem {
    GalleryItem {
        id: row.id,
        user_id: row.user_id,
        username: row.username,
        file_type: row.file_type,
        file_path: row.file_path,
        caption: row.caption,
        created_at: row.created_at,
    }
}
