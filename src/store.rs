use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use url::Url;

use crate::models::{
    Booking, BookingWithClass, ClassPatch, ClassWithBookings, GalleryImage, NewBooking, NewClass,
    NewResetCode, NewUser, ResetCode, User, YogaClass,
};

const CLASSES: &str = "classes";
const CLASS_VIEW: &str = "class_with_bookings";
const BOOKINGS: &str = "Bookings";
const USERS: &str = "Users";
const RESET_CODES: &str = "password_reset_codes";
const IMAGES: &str = "Images";

const BOOKING_WITH_CLASS: &str = "id,userid,created_at,classes:classid(*)";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("data store returned {status}: {message}")]
    Status { status: StatusCode, message: String },
    #[error("invalid store URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("missing or malformed Content-Range header")]
    MissingCount,
}

/// Outcome of the guarded seat write performed inside the data store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatOutcome {
    Booked,
    Full,
    Duplicate,
    ClassMissing,
}

impl SeatOutcome {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "booked" => Some(SeatOutcome::Booked),
            "full" => Some(SeatOutcome::Full),
            "duplicate" => Some(SeatOutcome::Duplicate),
            "not_found" => Some(SeatOutcome::ClassMissing),
            _ => None,
        }
    }
}

/// Client for the hosted PostgREST endpoint that owns every persistent row.
#[derive(Clone)]
pub struct StoreClient {
    client: reqwest::Client,
    rest_url: Url,
    service_key: String,
}

impl StoreClient {
    pub fn new(base_url: &Url, service_key: impl Into<String>) -> Result<Self, StoreError> {
        Ok(Self {
            client: reqwest::Client::new(),
            rest_url: base_url.join("rest/v1/")?,
            service_key: service_key.into(),
        })
    }

    fn table_url(&self, table: &str, params: &[(&str, String)]) -> Result<Url, StoreError> {
        let mut url = self.rest_url.join(table)?;
        if !params.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<reqwest::Response, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status { status, message })
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table, params)?;
        let response = self.send(self.request(Method::GET, url)).await?;
        Ok(response.json().await?)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
        prefer: &str,
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table, params)?;
        let builder = self
            .request(Method::POST, url)
            .header("Prefer", prefer)
            .json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn update<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
        body: &B,
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table, params)?;
        let builder = self
            .request(Method::PATCH, url)
            .header("Prefer", "return=representation")
            .json(body);
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn delete<T: DeserializeOwned>(
        &self,
        table: &str,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        let url = self.table_url(table, params)?;
        let builder = self
            .request(Method::DELETE, url)
            .header("Prefer", "return=representation");
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    async fn count(&self, table: &str, params: &[(&str, String)]) -> Result<u64, StoreError> {
        let url = self.table_url(table, params)?;
        let builder = self
            .request(Method::HEAD, url)
            .header("Prefer", "count=exact");
        let response = self.send(builder).await?;
        response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range_total)
            .ok_or(StoreError::MissingCount)
    }

    // Classes

    pub async fn get_class(&self, id: i64) -> Result<Option<YogaClass>, StoreError> {
        let rows: Vec<YogaClass> = self
            .select(CLASSES, &[("id", eq(id)), ("select", "*".into())])
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn classes_by_ids(&self, ids: &[i64]) -> Result<Vec<YogaClass>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(CLASSES, &[("id", in_list(ids)), ("select", "*".into())])
            .await
    }

    pub async fn list_classes_with_bookings(&self) -> Result<Vec<ClassWithBookings>, StoreError> {
        self.select(
            CLASS_VIEW,
            &[("select", "*".into()), ("order", "date.asc,time.asc".into())],
        )
        .await
    }

    pub async fn insert_classes(&self, classes: &[NewClass]) -> Result<Vec<YogaClass>, StoreError> {
        self.insert(CLASSES, &[], "return=representation", classes)
            .await
    }

    pub async fn update_class(
        &self,
        id: i64,
        patch: &ClassPatch,
    ) -> Result<Option<YogaClass>, StoreError> {
        let rows: Vec<YogaClass> = self.update(CLASSES, &[("id", eq(id))], patch).await?;
        Ok(rows.into_iter().next())
    }

    pub async fn delete_class(&self, id: i64) -> Result<bool, StoreError> {
        let rows: Vec<YogaClass> = self.delete(CLASSES, &[("id", eq(id))]).await?;
        Ok(!rows.is_empty())
    }

    // Bookings

    pub async fn count_bookings(&self, class_id: i64) -> Result<u64, StoreError> {
        self.count(BOOKINGS, &[("classid", eq(class_id)), ("select", "id".into())])
            .await
    }

    pub async fn find_booking(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<Option<Booking>, StoreError> {
        let rows: Vec<Booking> = self
            .select(
                BOOKINGS,
                &[
                    ("classid", eq(class_id)),
                    ("userid", eq(user_id)),
                    ("select", "*".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Calls the `book_class_seat` procedure, which locks the class row,
    /// re-checks capacity and inserts under the `(userid, classid)` unique key.
    pub async fn book_class_seat(
        &self,
        user_id: i64,
        class_id: i64,
    ) -> Result<SeatOutcome, StoreError> {
        let url = self.rest_url.join("rpc/book_class_seat")?;
        let body = serde_json::json!({ "p_user_id": user_id, "p_class_id": class_id });
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        let outcome: String = response.json().await?;
        SeatOutcome::parse(&outcome).ok_or_else(|| StoreError::Status {
            status: StatusCode::OK,
            message: format!("unexpected seat outcome {outcome:?}"),
        })
    }

    /// Batch insert; rows colliding on `(userid, classid)` are skipped and
    /// only the rows actually written come back.
    pub async fn insert_bookings(&self, rows: &[NewBooking]) -> Result<Vec<Booking>, StoreError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        self.insert(
            BOOKINGS,
            &[("on_conflict", "userid,classid".into())],
            "resolution=ignore-duplicates,return=representation",
            rows,
        )
        .await
    }

    pub async fn bookings_for_user(&self, user_id: i64) -> Result<Vec<BookingWithClass>, StoreError> {
        self.select(
            BOOKINGS,
            &[
                ("userid", eq(user_id)),
                ("select", BOOKING_WITH_CLASS.into()),
            ],
        )
        .await
    }

    pub async fn get_booking_with_class(
        &self,
        id: i64,
    ) -> Result<Option<BookingWithClass>, StoreError> {
        let rows: Vec<BookingWithClass> = self
            .select(
                BOOKINGS,
                &[("id", eq(id)), ("select", BOOKING_WITH_CLASS.into())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn bookings_for_class(&self, class_id: i64) -> Result<Vec<Booking>, StoreError> {
        self.select(
            BOOKINGS,
            &[
                ("classid", eq(class_id)),
                ("select", "*".into()),
                ("order", "id.asc".into()),
            ],
        )
        .await
    }

    pub async fn delete_booking(&self, id: i64) -> Result<bool, StoreError> {
        let rows: Vec<Booking> = self.delete(BOOKINGS, &[("id", eq(id))]).await?;
        Ok(!rows.is_empty())
    }

    // Users

    pub async fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        let rows: Vec<User> = self
            .select(USERS, &[("id", eq(id)), ("select", "*".into())])
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let rows: Vec<User> = self
            .select(
                USERS,
                &[("email", format!("eq.{email}")), ("select", "*".into())],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        self.select(
            USERS,
            &[
                ("id", in_list(ids)),
                ("select", "id,name,email,phone,is_admin".into()),
            ],
        )
        .await
    }

    pub async fn insert_user(&self, user: &NewUser) -> Result<Option<User>, StoreError> {
        let rows: Vec<User> = self
            .insert(
                USERS,
                &[("select", "id,name,email,phone,is_admin".into())],
                "return=representation",
                user,
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn update_password(&self, email: &str, hash: &str) -> Result<bool, StoreError> {
        let rows: Vec<serde_json::Value> = self
            .update(
                USERS,
                &[("email", format!("eq.{email}")), ("select", "id".into())],
                &serde_json::json!({ "password": hash }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    // Password reset codes

    pub async fn insert_reset_code(&self, code: &NewResetCode) -> Result<(), StoreError> {
        let _: Vec<ResetCode> = self
            .insert(RESET_CODES, &[], "return=representation", code)
            .await?;
        Ok(())
    }

    /// Newest unused code issued to `email`, expired or not.
    pub async fn latest_reset_code(&self, email: &str) -> Result<Option<ResetCode>, StoreError> {
        let rows: Vec<ResetCode> = self
            .select(
                RESET_CODES,
                &[
                    ("email", format!("eq.{email}")),
                    ("used", "is.false".into()),
                    ("select", "*".into()),
                    ("order", "expires_at.desc".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn mark_reset_code_used(&self, id: i64) -> Result<(), StoreError> {
        let _: Vec<ResetCode> = self
            .update(
                RESET_CODES,
                &[("id", eq(id))],
                &serde_json::json!({ "used": true }),
            )
            .await?;
        Ok(())
    }

    /// Atomically bumps the failed-attempt count through `record_reset_attempt`,
    /// which marks the code used once `max_attempts` is reached.
    pub async fn record_reset_attempt(&self, id: i64, max_attempts: i32) -> Result<i32, StoreError> {
        let url = self.rest_url.join("rpc/record_reset_attempt")?;
        let body = serde_json::json!({ "p_code_id": id, "p_max_attempts": max_attempts });
        let response = self
            .send(self.request(Method::POST, url).json(&body))
            .await?;
        let attempts: Option<i32> = response.json().await?;
        Ok(attempts.unwrap_or(max_attempts))
    }

    pub async fn delete_expired_reset_codes(&self, now: DateTime<Utc>) -> Result<usize, StoreError> {
        let rows: Vec<ResetCode> = self
            .delete(
                RESET_CODES,
                &[("expires_at", format!("lt.{}", now.to_rfc3339()))],
            )
            .await?;
        Ok(rows.len())
    }

    // Gallery images

    pub async fn list_images(&self) -> Result<Vec<GalleryImage>, StoreError> {
        self.select(
            IMAGES,
            &[("select", "*".into()), ("order", "id.desc".into())],
        )
        .await
    }

    pub async fn insert_image(
        &self,
        storage_path: &str,
        alt_text: &str,
    ) -> Result<Option<GalleryImage>, StoreError> {
        let rows: Vec<GalleryImage> = self
            .insert(
                IMAGES,
                &[],
                "return=representation",
                &serde_json::json!({ "storage_path": storage_path, "alt_text": alt_text }),
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn update_image_alt(&self, id: i64, alt_text: &str) -> Result<bool, StoreError> {
        let rows: Vec<GalleryImage> = self
            .update(
                IMAGES,
                &[("id", eq(id))],
                &serde_json::json!({ "alt_text": alt_text }),
            )
            .await?;
        Ok(!rows.is_empty())
    }

    pub async fn delete_image(&self, id: i64) -> Result<Option<GalleryImage>, StoreError> {
        let rows: Vec<GalleryImage> = self.delete(IMAGES, &[("id", eq(id))]).await?;
        Ok(rows.into_iter().next())
    }
}

fn eq(value: i64) -> String {
    format!("eq.{value}")
}

fn in_list(ids: &[i64]) -> String {
    let joined = ids
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");
    format!("in.({joined})")
}

/// `Content-Range` looks like `0-24/3573` or `*/0`; the total follows the slash.
fn parse_content_range_total(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/3573"), Some(3573));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-4/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_in_list() {
        assert_eq!(in_list(&[3, 5]), "in.(3,5)");
    }

    #[test]
    fn test_seat_outcome_parse() {
        assert_eq!(SeatOutcome::parse("booked"), Some(SeatOutcome::Booked));
        assert_eq!(SeatOutcome::parse("full"), Some(SeatOutcome::Full));
        assert_eq!(SeatOutcome::parse("not_found"), Some(SeatOutcome::ClassMissing));
        assert_eq!(SeatOutcome::parse("maybe"), None);
    }

    #[test]
    fn test_rest_url_keeps_base_path() {
        let store = StoreClient::new(&Url::parse("http://localhost:54321").unwrap(), "key").unwrap();
        let url = store
            .table_url(BOOKINGS, &[("classid", eq(3))])
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:54321/rest/v1/Bookings?classid=eq.3");
    }
}
