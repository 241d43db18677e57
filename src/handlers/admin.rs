use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{Duration, Utc};
use serde::Deserialize;
use tracing::info;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::require_admin,
    error::ApiError,
    models::{Booking, ClassPatch, NewClass, RegisterRow, User, YogaClass},
    notify,
    validation::{validate_class_patch, validate_new_class, validate_repeat},
};

use super::{BearerAuth, bearer};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CreateClassRequest {
    #[serde(flatten)]
    pub class: NewClass,
    /// Total number of weekly occurrences, starting on `date`.
    #[serde(default)]
    pub repeat_weekly: Option<u8>,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub class_id: Option<i64>,
}

/// `count` copies of `class`, each a week after the previous one.
fn weekly_copies(class: &NewClass, count: u8) -> Vec<NewClass> {
    (0..i64::from(count))
        .map(|week| NewClass {
            date: class.date + Duration::weeks(week),
            ..class.clone()
        })
        .collect()
}

fn register_rows(bookings: Vec<Booking>, users: Vec<User>) -> Vec<RegisterRow> {
    let users: HashMap<i64, User> = users.into_iter().map(|u| (u.id, u)).collect();
    bookings
        .into_iter()
        .map(|booking| {
            let user = users.get(&booking.userid);
            let field = |value: Option<&str>, fallback: &str| {
                value
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or(fallback)
                    .to_string()
            };
            RegisterRow {
                booking_id: booking.id,
                userid: booking.userid,
                name: field(user.map(|u| u.name.as_str()), "Unknown"),
                email: field(user.map(|u| u.email.as_str()), "No email"),
                phone: field(user.and_then(|u| u.phone.as_deref()), "No phone"),
            }
        })
        .collect()
}

async fn load_class(state: &AppState, id: i64) -> Result<YogaClass, ApiError> {
    state
        .store
        .get_class(id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class not found".into()))
}

#[utoipa::path(
    post,
    path = "/admin/classes",
    request_body = CreateClassRequest,
    responses(
        (status = 201, description = "Classes created", body = [YogaClass]),
        (status = 400, description = "Invalid class"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Not an admin")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn create_class(
    State(state): State<AppState>,
    auth: BearerAuth,
    Json(request): Json<CreateClassRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let admin = require_admin(&state.settings, &state.store, bearer(auth)).await?;

    let today = Utc::now().with_timezone(&state.settings.studio_timezone).date_naive();
    validate_new_class(&request.class, today)?;
    let count = match request.repeat_weekly {
        Some(count) => validate_repeat(count)?,
        None => 1,
    };

    let created = state
        .store
        .insert_classes(&weekly_copies(&request.class, count))
        .await?;
    info!(admin = admin.sub, created = created.len(), title = %request.class.title, "classes created");
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    patch,
    path = "/admin/classes/{id}",
    params(("id" = i64, Path, description = "Class id")),
    request_body = ClassPatch,
    responses(
        (status = 200, description = "Class updated", body = YogaClass),
        (status = 400, description = "Invalid values"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn update_class(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
    Json(patch): Json<ClassPatch>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;
    validate_class_patch(&patch)?;

    let class = state
        .store
        .update_class(id, &patch)
        .await?
        .ok_or_else(|| ApiError::NotFound("Class not found".into()))?;
    Ok(Json(class))
}

#[utoipa::path(
    delete,
    path = "/admin/classes/{id}",
    params(("id" = i64, Path, description = "Class id")),
    responses(
        (status = 200, description = "Booked users notified and class deleted"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn delete_class(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;

    let class = load_class(&state, id).await?;
    let sent = notify::notify_class_cancelled(&state.store, &state.mailer, &class).await?;
    if !state.store.delete_class(id).await? {
        return Err(ApiError::NotFound("Class not found".into()));
    }
    info!(class_id = id, sent, "class deleted");

    Ok(Json(serde_json::json!({ "success": true, "sent": sent })))
}

#[utoipa::path(
    get,
    path = "/admin/classes/{id}/register",
    params(("id" = i64, Path, description = "Class id")),
    responses(
        (status = 200, description = "Attendees of the class", body = [RegisterRow]),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn class_register(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;
    load_class(&state, id).await?;

    let bookings = state.store.bookings_for_class(id).await?;
    let mut user_ids: Vec<i64> = bookings.iter().map(|b| b.userid).collect();
    user_ids.sort_unstable();
    user_ids.dedup();
    let users = state.store.users_by_ids(&user_ids).await?;

    Ok(Json(register_rows(bookings, users)))
}

#[utoipa::path(
    post,
    path = "/notify-cancellation",
    request_body = NotifyRequest,
    responses(
        (status = 200, description = "Cancellation notices sent"),
        (status = 400, description = "Missing classId"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "Class not found")
    ),
    security(("bearer_auth" = [])),
    tag = "admin"
)]
pub async fn notify_cancellation(
    State(state): State<AppState>,
    auth: BearerAuth,
    Json(request): Json<NotifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    require_admin(&state.settings, &state.store, bearer(auth)).await?;
    let class_id = request
        .class_id
        .ok_or_else(|| ApiError::BadRequest("Missing classId".into()))?;

    let class = load_class(&state, class_id).await?;
    let sent = notify::notify_class_cancelled(&state.store, &state.mailer, &class).await?;
    Ok(Json(serde_json::json!({ "success": true, "sent": sent })))
}
