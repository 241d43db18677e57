use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::booking::BookingError;
use crate::payments::{PaymentError, WebhookError};
use crate::storage::StorageError;
use crate::store::StoreError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    Forbidden(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
    Upstream { message: String, details: String },
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) | ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => serde_json::json!({ "error": msg }),
            ApiError::Upstream { message, details } => {
                serde_json::json!({ "error": message, "details": details })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(value: StoreError) -> Self {
        error!("data store error: {value}");
        ApiError::Internal("Data store request failed".into())
    }
}

impl From<StorageError> for ApiError {
    fn from(value: StorageError) -> Self {
        error!("object storage error: {value}");
        ApiError::Internal("File storage request failed".into())
    }
}

impl From<PaymentError> for ApiError {
    fn from(value: PaymentError) -> Self {
        error!("payment gateway error: {value}");
        ApiError::Upstream {
            message: "Failed to create checkout session.".into(),
            details: value.to_string(),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(value: WebhookError) -> Self {
        ApiError::BadRequest(format!("Webhook Error: {value}"))
    }
}

impl From<BookingError> for ApiError {
    fn from(value: BookingError) -> Self {
        match value {
            BookingError::ClassNotFound | BookingError::BookingNotFound => {
                ApiError::NotFound(value.to_string())
            }
            BookingError::CapacityExceeded | BookingError::DuplicateBooking => {
                ApiError::Conflict(value.to_string())
            }
            BookingError::NotOwner => ApiError::Forbidden(value.to_string()),
            BookingError::CancellationWindowClosed { .. } => ApiError::BadRequest(value.to_string()),
            BookingError::Store(err) => err.into(),
        }
    }
}
