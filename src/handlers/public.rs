use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use lettre::Address;
use lettre::message::Mailbox;
use serde::Deserialize;
use tracing::error;
use utoipa::ToSchema;

use crate::{AppState, error::ApiError, models::ClassListing};

#[derive(Debug, Deserialize, ToSchema)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

#[utoipa::path(get, path = "/", tag = "studio")]
pub async fn root() -> impl IntoResponse {
    Json(serde_json::json!({
        "message": "Yoga Studio API",
        "endpoints": {
            "/classes": "Class timetable with spaces left",
            "/classes.ical": "Download timetable as iCal file",
            "/book-class": "Book a class",
            "/create-checkout-session": "Pay for a cart of classes"
        }
    }))
}

#[utoipa::path(get, path = "/healthz/live", tag = "studio")]
pub async fn healthz_live() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(get, path = "/healthz/ready", tag = "studio")]
pub async fn healthz_ready() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

#[utoipa::path(
    get,
    path = "/classes",
    responses(
        (status = 200, description = "Timetable ordered by date", body = [ClassListing]),
        (status = 500, description = "Data store unavailable")
    ),
    tag = "studio"
)]
pub async fn list_classes(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let classes: Vec<ClassListing> = state
        .store
        .list_classes_with_bookings()
        .await?
        .into_iter()
        .map(ClassListing::from)
        .collect();
    Ok(Json(classes))
}

#[utoipa::path(
    get,
    path = "/classes.ical",
    responses(
        (status = 200, description = "iCal file", content_type = "text/calendar"),
        (status = 404, description = "No classes scheduled")
    ),
    tag = "studio"
)]
pub async fn get_ical(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let classes: Vec<_> = state
        .store
        .list_classes_with_bookings()
        .await?
        .into_iter()
        .map(|row| row.class)
        .collect();

    if classes.is_empty() {
        return Err(ApiError::NotFound("No classes found".into()));
    }

    let body = state.exporter.generate(&classes);
    Ok((
        StatusCode::OK,
        [
            ("content-type", "text/calendar"),
            ("content-disposition", "attachment; filename=yoga_timetable.ics"),
        ],
        body,
    ))
}

#[utoipa::path(
    post,
    path = "/contact",
    request_body = ContactRequest,
    responses(
        (status = 200, description = "Message forwarded"),
        (status = 400, description = "Missing name, email or message, or invalid email"),
        (status = 500, description = "Email failed to send")
    ),
    tag = "studio"
)]
pub async fn contact(
    State(state): State<AppState>,
    Json(request): Json<ContactRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.name.trim().is_empty()
        || request.email.trim().is_empty()
        || request.message.trim().is_empty()
    {
        return Err(ApiError::BadRequest(
            "Name, email and message are required".into(),
        ));
    }

    let email = request
        .email
        .trim()
        .parse::<Address>()
        .map_err(|_| ApiError::BadRequest("Please provide a valid email address".into()))?;
    let sender = Mailbox::new(Some(request.name.trim().to_string()), email);

    let mail = state
        .mailer
        .contact_message(&state.settings.contact_email, sender, &request.message);
    state.mailer.send(mail).await.map_err(|err| {
        error!("error sending contact email: {err}");
        ApiError::Internal("Email failed to send".into())
    })?;

    Ok(Json(serde_json::json!({ "success": true })))
}
