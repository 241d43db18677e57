use axum::{
    Json,
    extract::{Path, State},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    AppState,
    auth::verify_session,
    booking::{self, MyBookings},
    error::ApiError,
};

use super::{BearerAuth, bearer};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookClassRequest {
    pub user_id: Option<i64>,
    pub class_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/book-class",
    request_body = BookClassRequest,
    responses(
        (status = 200, description = "Booking successful"),
        (status = 400, description = "Missing data"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Session belongs to another user"),
        (status = 404, description = "Class not found"),
        (status = 409, description = "Class is full or already booked")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn book_class(
    State(state): State<AppState>,
    auth: BearerAuth,
    Json(request): Json<BookClassRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(user_id), Some(class_id)) = (request.user_id, request.class_id) else {
        return Err(ApiError::BadRequest("Missing data".into()));
    };

    let claims = verify_session(&state.settings, bearer(auth))?;
    if claims.sub != user_id {
        return Err(ApiError::Forbidden(
            "Cannot book on behalf of another user".into(),
        ));
    }

    let class = booking::book_class(&state.store, user_id, class_id).await?;
    Ok(Json(serde_json::json!({
        "message": "Booking successful",
        "classId": class.id,
    })))
}

#[utoipa::path(
    get,
    path = "/my-bookings",
    responses(
        (status = 200, description = "Bookings split into upcoming and past", body = MyBookings),
        (status = 401, description = "Missing or invalid session")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn my_bookings(
    State(state): State<AppState>,
    auth: BearerAuth,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_session(&state.settings, bearer(auth))?;
    let bookings = state.store.bookings_for_user(claims.sub).await?;
    Ok(Json(booking::split_bookings(
        bookings,
        Utc::now(),
        state.settings.studio_timezone,
    )))
}

#[utoipa::path(
    delete,
    path = "/my-bookings/{id}",
    params(("id" = i64, Path, description = "Booking id")),
    responses(
        (status = 200, description = "Booking cancelled"),
        (status = 400, description = "Too close to the class start"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Booking belongs to another user"),
        (status = 404, description = "Booking not found")
    ),
    security(("bearer_auth" = [])),
    tag = "bookings"
)]
pub async fn cancel_my_booking(
    State(state): State<AppState>,
    auth: BearerAuth,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let claims = verify_session(&state.settings, bearer(auth))?;
    let cancelled = booking::cancel_booking(
        &state.store,
        claims.sub,
        id,
        Utc::now(),
        state.settings.studio_timezone,
        state.settings.cancellation_cutoff_hours,
    )
    .await?;

    Ok(Json(serde_json::json!({
        "message": "Booking cancelled successfully.",
        "bookingId": cancelled.id,
    })))
}
