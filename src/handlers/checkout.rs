use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::warn;
use utoipa::ToSchema;

use crate::{
    AppState,
    checkout::create_checkout,
    error::ApiError,
    models::CartItem,
    payments::WebhookError,
    webhook::{self, Reconciliation},
};

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub user_id: Option<i64>,
}

#[utoipa::path(
    post,
    path = "/create-checkout-session",
    request_body = CheckoutRequest,
    responses(
        (status = 200, description = "Redirect URL of the hosted payment page"),
        (status = 400, description = "Empty cart or an item with an invalid price"),
        (status = 500, description = "Payment gateway error, with details")
    ),
    tag = "checkout"
)]
pub async fn create_checkout_session(
    State(state): State<AppState>,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = create_checkout(
        &state.payments,
        &request.items,
        request.user_id,
        &state.settings.site_url,
    )
    .await?;
    Ok(Json(serde_json::json!({ "url": url })))
}

#[utoipa::path(
    post,
    path = "/stripe-webhook",
    request_body(content = String, description = "Raw signed event payload"),
    params(("Stripe-Signature" = String, Header, description = "Gateway signature header")),
    responses(
        (status = 200, description = "Event received"),
        (status = 400, description = "Signature verification failed"),
        (status = 500, description = "Bookings could not be recorded; the gateway retries")
    ),
    tag = "checkout"
)]
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|value| value.to_str().ok())
        .ok_or(WebhookError::MalformedHeader)?;

    let event = state
        .payments
        .verify_webhook(&body, signature, Utc::now())
        .inspect_err(|err| warn!("webhook rejected: {err}"))?;

    let outcome = webhook::reconcile(&state.store, &state.mailer, &event)
        .await
        .map_err(|_| ApiError::Internal("Failed to create bookings.".into()))?;

    let bookings = match outcome {
        Reconciliation::Booked { inserted, .. } => inserted.len(),
        Reconciliation::Ignored | Reconciliation::Unusable(_) => 0,
    };
    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "received": true, "bookings": bookings })),
    ))
}
