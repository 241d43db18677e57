//! Hosted checkout sessions and signed webhook events from the payment gateway.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::Sha256;
use thiserror::Error;
use url::Url;
use url::form_urlencoded;

const API_VERSION: &str = "2025-08-27.basil";

/// Maximum age of a signed webhook before it is treated as a replay.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{message}")]
    Gateway { status: StatusCode, message: String },
    #[error("invalid gateway URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("checkout session has no redirect URL")]
    MissingUrl,
}

#[derive(Debug, Error, PartialEq)]
pub enum WebhookError {
    #[error("No signatures found matching the expected signature for payload")]
    SignatureMismatch,
    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,
    #[error("Timestamp outside the tolerance zone")]
    Expired,
    #[error("Invalid event payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    pub name: String,
    /// Minor currency units.
    pub unit_amount: i64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutSessionRequest {
    pub line_items: Vec<LineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorBody {
    error: GatewayErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GatewayErrorDetail {
    message: String,
}

#[derive(Clone)]
pub struct PaymentGateway {
    client: reqwest::Client,
    api_url: Url,
    secret_key: String,
    webhook_secret: String,
    currency: String,
}

impl PaymentGateway {
    pub fn new(
        api_url: Url,
        secret_key: impl Into<String>,
        webhook_secret: impl Into<String>,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            secret_key: secret_key.into(),
            webhook_secret: webhook_secret.into(),
            currency: currency.into(),
        }
    }

    /// Form body in the bracketed layout the gateway expects for nested lists.
    pub fn encode_session_form(&self, request: &CheckoutSessionRequest) -> String {
        let mut form = form_urlencoded::Serializer::new(String::new());
        form.append_pair("mode", "payment")
            .append_pair("payment_method_types[]", "card")
            .append_pair("success_url", &request.success_url)
            .append_pair("cancel_url", &request.cancel_url);

        for (i, item) in request.line_items.iter().enumerate() {
            form.append_pair(
                &format!("line_items[{i}][price_data][currency]"),
                &self.currency,
            )
            .append_pair(
                &format!("line_items[{i}][price_data][product_data][name]"),
                &item.name,
            )
            .append_pair(
                &format!("line_items[{i}][price_data][unit_amount]"),
                &item.unit_amount.to_string(),
            )
            .append_pair(
                &format!("line_items[{i}][quantity]"),
                &item.quantity.to_string(),
            );
        }

        for (key, value) in &request.metadata {
            form.append_pair(&format!("metadata[{key}]"), value);
        }
        form.finish()
    }

    pub async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let url = self.api_url.join("v1/checkout/sessions")?;
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.secret_key)
            .header("Stripe-Version", API_VERSION)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(self.encode_session_form(request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayErrorBody>(&body)
                .map(|parsed| parsed.error.message)
                .unwrap_or(body);
            return Err(PaymentError::Gateway { status, message });
        }

        let session: CheckoutSession = response.json().await?;
        if session.url.is_none() {
            return Err(PaymentError::MissingUrl);
        }
        Ok(session)
    }

    /// Checks a `Stripe-Signature` header (`t=...,v1=...`) against the raw payload.
    pub fn verify_webhook(
        &self,
        payload: &str,
        signature_header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signatures: Vec<&str> = Vec::new();
        for part in signature_header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(WebhookError::MalformedHeader)?;
        if signatures.is_empty() {
            return Err(WebhookError::MalformedHeader);
        }

        let signed_payload = format!("{timestamp}.{payload}");
        let matched = signatures.iter().any(|candidate| {
            let Some(expected) = hex::decode(candidate) else {
                return false;
            };
            let Ok(mut mac) = HmacSha256::new_from_slice(self.webhook_secret.as_bytes()) else {
                return false;
            };
            mac.update(signed_payload.as_bytes());
            mac.verify_slice(&expected).is_ok()
        });
        if !matched {
            return Err(WebhookError::SignatureMismatch);
        }

        if (now.timestamp() - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
            return Err(WebhookError::Expired);
        }

        serde_json::from_str(payload).map_err(|err| WebhookError::Payload(err.to_string()))
    }
}

/// Produces a header value in the gateway's format; used for outbound test fixtures.
pub fn sign_webhook_payload(secret: &str, payload: &str, timestamp: i64) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.{payload}").as_bytes());
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{b:02x}")).collect()
    }

    pub fn decode(text: &str) -> Option<Vec<u8>> {
        if text.len() % 2 != 0 {
            return None;
        }
        (0..text.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(text.get(i..i + 2)?, 16).ok())
            .collect()
    }
}
