//! Session tokens and password hashing.
//!
//! Sessions are HS256 JWTs signed with `session_secret`. Reset tokens use the
//! same format with a different `purpose`, so one can never stand in for the other.

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use axum_extra::headers::Authorization;
use axum_extra::headers::authorization::Bearer;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::ApiError;
use crate::settings::Settings;
use crate::store::StoreClient;

const RESET_TOKEN_TTL_MINUTES: i64 = 15;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Session,
    PasswordReset,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: i64,
    #[serde(default)]
    pub email: String,
    pub admin: bool,
    pub purpose: TokenPurpose,
    pub iat: i64,
    pub exp: i64,
}

fn issue(settings: &Settings, claims: &Claims) -> Result<String, ApiError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(settings.session_secret.as_bytes()),
    )
    .map_err(|err| {
        error!("failed to sign token: {err}");
        ApiError::Internal("Failed to issue token".into())
    })
}

pub fn issue_session(settings: &Settings, user_id: i64, admin: bool) -> Result<String, ApiError> {
    let now = Utc::now();
    issue(
        settings,
        &Claims {
            sub: user_id,
            email: String::new(),
            admin,
            purpose: TokenPurpose::Session,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(settings.session_ttl_minutes)).timestamp(),
        },
    )
}

pub fn issue_reset_token(settings: &Settings, user_id: i64, email: &str) -> Result<String, ApiError> {
    let now = Utc::now();
    issue(
        settings,
        &Claims {
            sub: user_id,
            email: email.to_string(),
            admin: false,
            purpose: TokenPurpose::PasswordReset,
            iat: now.timestamp(),
            exp: (now + Duration::minutes(RESET_TOKEN_TTL_MINUTES)).timestamp(),
        },
    )
}

pub fn decode_token(
    settings: &Settings,
    token: &str,
    purpose: TokenPurpose,
) -> Result<Claims, ApiError> {
    let claims = decode::<Claims>(
        token,
        &DecodingKey::from_secret(settings.session_secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| ApiError::Unauthorized("Invalid authentication token".into()))?;

    if claims.purpose != purpose {
        return Err(ApiError::Unauthorized("Invalid authentication token".into()));
    }
    Ok(claims)
}

pub fn verify_session(
    settings: &Settings,
    auth: Option<Authorization<Bearer>>,
) -> Result<Claims, ApiError> {
    match auth {
        Some(auth) => decode_token(settings, auth.token(), TokenPurpose::Session),
        None => Err(ApiError::Unauthorized("Missing authentication token".into())),
    }
}

/// Session check plus a fresh `is_admin` read, so revoked admins lose access immediately.
pub async fn require_admin(
    settings: &Settings,
    store: &StoreClient,
    auth: Option<Authorization<Bearer>>,
) -> Result<Claims, ApiError> {
    let claims = verify_session(settings, auth)?;
    let is_admin = store
        .get_user(claims.sub)
        .await?
        .is_some_and(|user| user.is_admin);
    if !is_admin {
        error!(user_id = claims.sub, "admin check failed");
        return Err(ApiError::Forbidden(
            "Authorization Failed: User is not an admin".into(),
        ));
    }
    Ok(claims)
}

pub fn hash_password(password: &str) -> Result<String, ApiError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| {
            error!("password hashing failed: {err}");
            ApiError::Internal("Failed to hash password".into())
        })
}

/// A stored value that is not a valid PHC string never verifies.
pub fn verify_password(password: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    fn settings() -> Settings {
        let mut settings = Settings::from_env().unwrap();
        settings.session_secret = "secret".to_string();
        settings
    }

    #[test]
    #[serial]
    fn test_session_round_trip() {
        let settings = settings();
        let token = issue_session(&settings, 7, true).unwrap();
        let auth = Authorization::bearer(&token).unwrap();
        let claims = verify_session(&settings, Some(auth)).unwrap();
        assert_eq!(claims.sub, 7);
        assert!(claims.admin);
    }

    #[test]
    #[serial]
    fn test_verify_session_missing_or_bad() {
        let settings = settings();
        assert!(verify_session(&settings, None).is_err());
        let auth = Authorization::bearer("not-a-jwt").unwrap();
        assert!(verify_session(&settings, Some(auth)).is_err());
    }

    #[test]
    #[serial]
    fn test_reset_token_is_not_a_session() {
        let settings = settings();
        let token = issue_reset_token(&settings, 7, "jen@example.com").unwrap();
        let auth = Authorization::bearer(&token).unwrap();
        assert!(verify_session(&settings, Some(auth)).is_err());
        let claims = decode_token(&settings, &token, TokenPurpose::PasswordReset).unwrap();
        assert_eq!(claims.email, "jen@example.com");
    }

    #[test]
    #[serial]
    fn test_token_signed_with_other_secret_rejected() {
        let mut other = settings();
        other.session_secret = "other".into();
        let token = issue_session(&other, 7, false).unwrap();
        assert!(decode_token(&settings(), &token, TokenPurpose::Session).is_err());
    }

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_password("correct-horse", &hash));
        assert!(!verify_password("wrong-horse", &hash));
        assert!(!verify_password("correct-horse", "not-a-hash"));
    }
}
