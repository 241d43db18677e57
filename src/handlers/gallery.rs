use axum::{
    Json,
    extract::{Multipart, Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::{error, info, warn};
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::require_admin,
    error::ApiError,
    models::{GalleryEntry, GalleryImage},
    storage::ObjectStorage,
};

use super::{BearerAuth, bearer};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EditImageRequest {
    #[serde(default)]
    pub alt_text: String,
}

/// Multipart body of an upload, for the API docs only.
#[derive(Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[allow(dead_code)]
pub struct UploadImageForm {
    #[schema(value_type = String, format = Binary)]
    image: Vec<u8>,
    alt_text: String,
}

struct Upload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

fn entry(state: &AppState, image: GalleryImage) -> Result<GalleryEntry, ApiError> {
    let url = state.storage.public_url(&image.storage_path)?.to_string();
    Ok(GalleryEntry { image, url })
}

#[utoipa::path(
    get,
    path = "/gallery",
    responses((status = 200, description = "Gallery images with public URLs", body = [GalleryEntry])),
    tag = "gallery"
)]
pub async fn list_gallery(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let entries = state
        .store
        .list_images()
        .await?
        .into_iter()
        .map(|image| entry(&state, image))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Json(entries))
}

#[utoipa::path(
    post,
    path = "/admin/gallery",
    request_body(content = UploadImageForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Image uploaded", body = GalleryEntry),
        (status = 400, description = "Missing image or alt text"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "gallery"
)]
pub async fn upload_image(
    State(state): State<AppState>,
    auth: BearerAuth,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;

    let bad_form = |err: axum::extract::multipart::MultipartError| {
        ApiError::BadRequest(format!("Invalid upload: {}", err.body_text()))
    };

    let mut upload = None;
    let mut alt_text = String::new();
    while let Some(field) = multipart.next_field().await.map_err(bad_form)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let file_name = field.file_name().unwrap_or("image").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let bytes = field.bytes().await.map_err(bad_form)?.to_vec();
                upload = Some(Upload { file_name, content_type, bytes });
            }
            Some("altText") => alt_text = field.text().await.map_err(bad_form)?,
            _ => {}
        }
    }

    let upload = match upload {
        Some(upload) if !upload.bytes.is_empty() => upload,
        _ => return Err(ApiError::BadRequest("Please select an image".into())),
    };
    if alt_text.trim().is_empty() {
        return Err(ApiError::BadRequest("Please add alt text".into()));
    }

    let path = ObjectStorage::gallery_path(&upload.file_name, Utc::now());
    state
        .storage
        .upload(&path, upload.bytes, &upload.content_type)
        .await?;

    let image = match state.store.insert_image(&path, alt_text.trim()).await {
        Ok(Some(image)) => image,
        outcome => {
            if let Err(err) = &outcome {
                error!("error saving image row: {err}");
            }
            if let Err(err) = state.storage.remove(&path).await {
                warn!(%path, "failed to remove orphaned upload: {err}");
            }
            return Err(ApiError::Internal("Failed to save image".into()));
        }
    };
    info!(image_id = image.id, %path, "gallery image uploaded");

    Ok((StatusCode::CREATED, Json(entry(&state, image)?)))
}

#[utoipa::path(
    patch,
    path = "/admin/gallery/{id}",
    params(("id" = i64, Path, description = "Image id")),
    request_body = EditImageRequest,
    responses(
        (status = 200, description = "Alt text updated"),
        (status = 400, description = "Alt text is empty"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Image not found")
    ),
    security(("bearer_auth" = [])),
    tag = "gallery"
)]
pub async fn edit_image(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
    Json(request): Json<EditImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;
    let alt_text = request.alt_text.trim();
    if alt_text.is_empty() {
        return Err(ApiError::BadRequest("Please add alt text".into()));
    }

    if !state.store.update_image_alt(id, alt_text).await? {
        return Err(ApiError::NotFound("Image not found".into()));
    }
    Ok(Json(serde_json::json!({ "success": true })))
}

#[utoipa::path(
    delete,
    path = "/admin/gallery/{id}",
    params(("id" = i64, Path, description = "Image id")),
    responses(
        (status = 200, description = "Image deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Image not found")
    ),
    security(("bearer_auth" = [])),
    tag = "gallery"
)]
pub async fn delete_image(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;

    let image = state
        .store
        .delete_image(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Image not found".into()))?;
    if let Err(err) = state.storage.remove(&image.storage_path).await {
        warn!(image_id = id, path = %image.storage_path, "image row deleted but object removal failed: {err}");
    }

    Ok(Json(serde_json::json!({ "success": true })))
}
