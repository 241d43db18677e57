use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct YogaClass {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[schema(value_type = String, format = "date", example = "2025-11-24")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "18:30:00")]
    pub time: NaiveTime,
    pub capacity: i32,
    pub price: f64,
    #[serde(default)]
    pub duration: i32,
}

impl YogaClass {
    /// Wall-clock start in the studio's timezone.
    pub fn starts_at(&self) -> NaiveDateTime {
        NaiveDateTime::new(self.date, self.time)
    }
}

/// Row of the `class_with_bookings` view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct ClassWithBookings {
    #[serde(flatten)]
    pub class: YogaClass,
    #[serde(default)]
    pub bookings_count: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct ClassListing {
    #[serde(flatten)]
    pub class: YogaClass,
    pub bookings_count: i64,
    pub spaces_left: i64,
}

impl From<ClassWithBookings> for ClassListing {
    fn from(value: ClassWithBookings) -> Self {
        let spaces_left = (i64::from(value.class.capacity) - value.bookings_count).max(0);
        Self {
            class: value.class,
            bookings_count: value.bookings_count,
            spaces_left,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct NewClass {
    pub title: String,
    pub description: Option<String>,
    #[schema(value_type = String, format = "date")]
    pub date: NaiveDate,
    #[schema(value_type = String, example = "18:30:00")]
    pub time: NaiveTime,
    pub capacity: i32,
    pub price: f64,
    pub duration: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub time: Option<NaiveTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Booking {
    pub id: i64,
    pub userid: i64,
    pub classid: i64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewBooking {
    pub userid: i64,
    pub classid: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// A booking with its class embedded through the `classid` foreign key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct BookingWithClass {
    pub id: i64,
    pub userid: i64,
    #[schema(value_type = String, format = "date-time")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "classes")]
    pub class: YogaClass,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub is_admin: bool,
}

/// What clients get to see of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct PublicUser {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub is_admin: bool,
}

impl From<User> for PublicUser {
    fn from(value: User) -> Self {
        Self {
            id: value.id,
            name: value.name,
            email: value.email,
            phone: value.phone,
            is_admin: value.is_admin,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewUser {
    pub name: String,
    pub phone: Option<String>,
    pub email: String,
    pub password: String,
    pub is_admin: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct CartItem {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    /// Kept loose so a missing or non-numeric price can be reported rather than rejected by the decoder.
    #[serde(default)]
    #[schema(value_type = f64)]
    pub price: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetCode {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub used: bool,
    #[serde(default)]
    pub attempts: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewResetCode {
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct GalleryImage {
    pub id: i64,
    pub storage_path: String,
    pub alt_text: String,
    #[serde(default)]
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct GalleryEntry {
    #[serde(flatten)]
    pub image: GalleryImage,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct RegisterRow {
    pub booking_id: i64,
    pub userid: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
}
