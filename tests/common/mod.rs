#![allow(dead_code)]

use axum::body::Body;
use axum::http::{Request, header};
use chrono::{DateTime, NaiveDateTime, Utc};
use chrono_tz::Europe::London;
use serde_json::{Value, json};
use url::Url;
use yoga_studio::auth::issue_session;
use yoga_studio::mailer::Mailer;
use yoga_studio::settings::Settings;
use yoga_studio::AppState;

pub const WEBHOOK_SECRET: &str = "whsec_test";

pub fn test_settings(store_url: Url, stripe_url: Url) -> Settings {
    Settings {
        debug: true,
        enable_swagger: true,
        port: 8080,
        site_url: Url::parse("https://zenjensyoga.test").unwrap(),
        store_url,
        store_service_key: "service-key".to_string(),
        gallery_bucket: "gallery-photos".to_string(),
        stripe_api_url: stripe_url,
        stripe_secret_key: "sk_test_123".to_string(),
        stripe_webhook_secret: WEBHOOK_SECRET.to_string(),
        currency: "gbp".to_string(),
        smtp_host: None,
        smtp_port: 587,
        smtp_username: None,
        smtp_password: None,
        mail_from: "Zen Jen's Yoga <bookings@zenjensyoga.test>".to_string(),
        contact_email: "hello@zenjensyoga.test".to_string(),
        session_secret: "test-session-secret".to_string(),
        session_ttl_minutes: 60,
        reset_code_ttl_minutes: 15,
        reset_code_max_attempts: 5,
        cancellation_cutoff_hours: 24,
        studio_timezone: London,
        studio_name: "Zen Jen's Yoga".to_string(),
        studio_address: "59 Kew Gardens, Uddingston, G71 6LT".to_string(),
    }
}

/// App state against mocked data store and gateway, with mail captured in memory.
pub fn create_test_state(store_url: &str, stripe_url: &str) -> AppState {
    let settings = test_settings(
        Url::parse(store_url).unwrap(),
        Url::parse(stripe_url).unwrap(),
    );
    let mailer = Mailer::in_memory(&settings);
    AppState::new(settings, mailer).unwrap()
}

pub fn bearer_for(state: &AppState, user_id: i64, admin: bool) -> String {
    format!("Bearer {}", issue_session(&state.settings, user_id, admin).unwrap())
}

pub async fn response_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn response_body_string(body: Body) -> String {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// Class row as the data store returns it, starting at `start` studio time.
pub fn class_json(id: i64, capacity: i32, start: NaiveDateTime) -> Value {
    json!({
        "id": id,
        "title": format!("Hatha {id}"),
        "description": "Gentle flow",
        "date": start.date().format("%Y-%m-%d").to_string(),
        "time": start.time().format("%H:%M:%S").to_string(),
        "capacity": capacity,
        "price": 12.5,
        "duration": 60
    })
}

/// Wall-clock studio time `hours` from now.
pub fn studio_time_in(hours: i64) -> NaiveDateTime {
    let at: DateTime<Utc> = Utc::now() + chrono::Duration::hours(hours);
    at.with_timezone(&London).naive_local()
}

pub fn user_json(id: i64, is_admin: bool) -> Value {
    json!({
        "id": id,
        "name": format!("Member {id}"),
        "email": format!("member{id}@example.com"),
        "phone": null,
        "is_admin": is_admin
    })
}

pub fn json_request(method: &str, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn get_request(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::empty()).unwrap()
}
