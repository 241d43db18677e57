use serde::{Deserialize, Serialize};
use tracing::{error, info};
use url::Url;

use crate::error::ApiError;
use crate::models::CartItem;
use crate::payments::{CheckoutSession, CheckoutSessionRequest, LineItem, PaymentGateway};
use crate::validation::{to_minor_units, validate_cart};

pub const GUEST: &str = "guest";

/// Class ids as carried in session metadata: `[{"id":3},{"id":5}]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MetadataItem {
    pub id: i64,
}

pub fn build_session_request(
    items: &[CartItem],
    user_id: Option<i64>,
    site_url: &Url,
) -> Result<CheckoutSessionRequest, ApiError> {
    let prices = validate_cart(items).inspect_err(|_| {
        error!(?user_id, "invalid item in cart");
    })?;

    let line_items = items
        .iter()
        .zip(prices)
        .map(|(item, price)| LineItem {
            name: item
                .title
                .clone()
                .unwrap_or_else(|| format!("Class {}", item.id)),
            unit_amount: to_minor_units(price),
            quantity: 1,
        })
        .collect();

    let ids: Vec<MetadataItem> = items.iter().map(|item| MetadataItem { id: item.id }).collect();
    let ids = serde_json::to_string(&ids)
        .map_err(|err| ApiError::Internal(format!("Failed to encode cart: {err}")))?;

    let redirect = |query: &str| -> Result<String, ApiError> {
        site_url
            .join(&format!("checkout?{query}"))
            .map(|url| url.to_string())
            .map_err(|err| ApiError::Internal(format!("Invalid site URL: {err}")))
    };

    Ok(CheckoutSessionRequest {
        line_items,
        success_url: redirect("success=true")?,
        cancel_url: redirect("canceled=true")?,
        metadata: vec![
            (
                "userId".to_string(),
                user_id.map_or_else(|| GUEST.to_string(), |id| id.to_string()),
            ),
            ("items".to_string(), ids),
        ],
    })
}

/// Validates the cart and opens a hosted payment session; nothing is written
/// to the data store until the gateway reports the payment as completed.
pub async fn create_checkout(
    gateway: &PaymentGateway,
    items: &[CartItem],
    user_id: Option<i64>,
    site_url: &Url,
) -> Result<String, ApiError> {
    let request = build_session_request(items, user_id, site_url)?;
    let CheckoutSession { id, url } = gateway.create_checkout_session(&request).await?;
    info!(session_id = %id, ?user_id, items = items.len(), "checkout session created");
    url.ok_or_else(|| ApiError::Internal("Checkout session has no URL".into()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn cart() -> Vec<CartItem> {
        vec![
            CartItem {
                id: 3,
                title: Some("Hatha".into()),
                price: json!(12.5),
            },
            CartItem {
                id: 5,
                title: Some("Yin".into()),
                price: json!(10),
            },
        ]
    }

    #[test]
    fn test_build_session_request() {
        let site = Url::parse("https://zenjensyoga.co.uk").unwrap();
        let request = build_session_request(&cart(), Some(7), &site).unwrap();
        assert_eq!(request.line_items.len(), 2);
        assert_eq!(request.line_items[0].unit_amount, 1250);
        assert_eq!(request.line_items[1].unit_amount, 1000);
        assert_eq!(request.success_url, "https://zenjensyoga.co.uk/checkout?success=true");
        assert_eq!(request.cancel_url, "https://zenjensyoga.co.uk/checkout?canceled=true");
        assert_eq!(
            request.metadata,
            vec![
                ("userId".to_string(), "7".to_string()),
                ("items".to_string(), r#"[{"id":3},{"id":5}]"#.to_string()),
            ]
        );
    }

    #[test]
    fn test_guest_metadata() {
        let site = Url::parse("https://zenjensyoga.co.uk").unwrap();
        let request = build_session_request(&cart(), None, &site).unwrap();
        assert_eq!(request.metadata[0].1, GUEST);
    }
}
