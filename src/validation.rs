use chrono::NaiveDate;

use crate::error::ApiError;
use crate::models::{CartItem, ClassPatch, NewClass};

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_WEEKLY_REPEATS: u8 = 52;

/// Returns the price of every item, or names the first one that is not a
/// non-negative finite number.
pub fn validate_cart(items: &[CartItem]) -> Result<Vec<f64>, ApiError> {
    if items.is_empty() {
        return Err(ApiError::BadRequest("No items provided".into()));
    }
    items
        .iter()
        .map(|item| match item.price.as_f64() {
            Some(price) if price.is_finite() && price >= 0.0 => Ok(price),
            _ => Err(ApiError::BadRequest(format!(
                "Invalid item detected: {} has an invalid price.",
                item.title.as_deref().unwrap_or("Unknown Item")
            ))),
        })
        .collect()
}

/// Price in minor currency units.
pub fn to_minor_units(price: f64) -> i64 {
    (price * 100.0).round() as i64
}

pub fn validate_signup(name: &str, email: &str, password: &str) -> Result<(), ApiError> {
    if name.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
        return Err(ApiError::BadRequest(
            "Missing required fields (Full Name, Email, Password)".into(),
        ));
    }
    validate_password(password)
}

pub fn validate_password(password: &str) -> Result<(), ApiError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn validate_new_class(class: &NewClass, today: NaiveDate) -> Result<(), ApiError> {
    if class.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Please fill title, date and time.".into()));
    }
    if class.date < today {
        return Err(ApiError::BadRequest(
            "You cannot create a class in the past.".into(),
        ));
    }
    validate_amounts(Some(class.capacity), Some(class.price), Some(class.duration))
}

pub fn validate_class_patch(patch: &ClassPatch) -> Result<(), ApiError> {
    if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ApiError::BadRequest("Title cannot be empty.".into()));
    }
    validate_amounts(patch.capacity, patch.price, patch.duration)
}

fn validate_amounts(
    capacity: Option<i32>,
    price: Option<f64>,
    duration: Option<i32>,
) -> Result<(), ApiError> {
    let negative = capacity.is_some_and(|c| c < 0)
        || price.is_some_and(|p| !p.is_finite() || p < 0.0)
        || duration.is_some_and(|d| d < 0);
    if negative {
        return Err(ApiError::BadRequest(
            "Capacity, price, and duration cannot be negative.".into(),
        ));
    }
    Ok(())
}

pub fn validate_repeat(count: u8) -> Result<u8, ApiError> {
    if (1..=MAX_WEEKLY_REPEATS).contains(&count) {
        Ok(count)
    } else {
        Err(ApiError::BadRequest(format!(
            "repeatWeekly must be between 1 and {MAX_WEEKLY_REPEATS}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveTime;
    use serde_json::json;

    use super::*;

    fn item(title: Option<&str>, price: serde_json::Value) -> CartItem {
        CartItem {
            id: 1,
            title: title.map(str::to_string),
            price,
        }
    }

    fn message(err: ApiError) -> String {
        match err {
            ApiError::BadRequest(msg) => msg,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_validate_cart_accepts_prices() {
        let prices = validate_cart(&[item(Some("Flow"), json!(12.5)), item(None, json!(0))]).unwrap();
        assert_eq!(prices, vec![12.5, 0.0]);
    }

    #[test]
    fn test_validate_cart_rejects_empty() {
        assert_eq!(message(validate_cart(&[]).unwrap_err()), "No items provided");
    }

    #[test]
    fn test_validate_cart_names_bad_item() {
        let err = validate_cart(&[item(Some("Flow"), json!(10)), item(Some("Yin"), json!(-1))])
            .unwrap_err();
        assert!(message(err).contains("Yin"));

        let err = validate_cart(&[item(None, json!("ten"))]).unwrap_err();
        assert!(message(err).contains("Unknown Item"));
    }

    #[test]
    fn test_validate_cart_names_item_without_price() {
        let item: CartItem = serde_json::from_value(json!({ "id": 3, "title": "Yin" })).unwrap();
        assert_eq!(item.price, serde_json::Value::Null);
        assert!(message(validate_cart(&[item]).unwrap_err()).contains("Yin"));
    }

    #[test]
    fn test_to_minor_units_rounds() {
        assert_eq!(to_minor_units(12.5), 1250);
        assert_eq!(to_minor_units(19.999), 2000);
        assert_eq!(to_minor_units(0.1 + 0.2), 30);
    }

    #[test]
    fn test_validate_signup() {
        assert!(validate_signup("Jen", "jen@example.com", "secret1").is_ok());
        assert!(validate_signup("", "jen@example.com", "secret1").is_err());
        assert!(validate_signup("Jen", "jen@example.com", "short").is_err());
    }

    #[test]
    fn test_validate_new_class() {
        let today = NaiveDate::from_ymd_opt(2025, 11, 24).unwrap();
        let mut class = NewClass {
            title: "Flow".into(),
            description: None,
            date: today,
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            capacity: 10,
            price: 12.0,
            duration: 60,
        };
        assert!(validate_new_class(&class, today).is_ok());

        class.capacity = -1;
        assert!(validate_new_class(&class, today).is_err());

        class.capacity = 10;
        class.date = today.pred_opt().unwrap();
        assert!(validate_new_class(&class, today).is_err());
    }

    #[test]
    fn test_validate_repeat() {
        assert!(validate_repeat(1).is_ok());
        assert!(validate_repeat(52).is_ok());
        assert!(validate_repeat(0).is_err());
        assert!(validate_repeat(53).is_err());
    }
}
