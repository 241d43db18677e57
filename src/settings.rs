use chrono_tz::Tz;
use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};
use url::Url;

/// Placeholder signing key; only accepted when `debug` is on.
pub const DEFAULT_SESSION_SECRET: &str = "default-secret-change-me";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Settings {
    pub debug: bool,
    pub enable_swagger: bool,
    pub port: u16,
    /// Public URL of the front end, used for checkout redirects and CORS.
    pub site_url: Url,
    pub store_url: Url,
    pub store_service_key: String,
    pub gallery_bucket: String,
    pub stripe_api_url: Url,
    pub stripe_secret_key: String,
    pub stripe_webhook_secret: String,
    pub currency: String,
    /// Mail delivery is disabled when no SMTP host is configured.
    pub smtp_host: Option<String>,
    pub smtp_port: u16,
    pub smtp_username: Option<String>,
    pub smtp_password: Option<String>,
    pub mail_from: String,
    pub contact_email: String,
    pub session_secret: String,
    pub session_ttl_minutes: i64,
    pub reset_code_ttl_minutes: i64,
    /// Wrong guesses allowed before a reset code is burned.
    pub reset_code_max_attempts: i32,
    pub cancellation_cutoff_hours: i64,
    /// IANA zone the class timetable is written in; rejected at load when unknown.
    pub studio_timezone: Tz,
    pub studio_name: String,
    pub studio_address: String,
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let config = Config::builder()
            // APP_STRIPE_SECRET_KEY -> stripe_secret_key
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_default("debug", false)?
            .set_default("enable_swagger", true)?
            .set_default("port", 8080)?
            .set_default("site_url", "http://localhost:3000")?
            .set_default("store_url", "http://localhost:54321")?
            .set_default("store_service_key", "")?
            .set_default("gallery_bucket", "gallery-photos")?
            .set_default("stripe_api_url", "https://api.stripe.com")?
            .set_default("stripe_secret_key", "")?
            .set_default("stripe_webhook_secret", "")?
            .set_default("currency", "gbp")?
            .set_default("smtp_port", 587)?
            .set_default("mail_from", "Zen Jen's Yoga <bookings@zenjensyoga.co.uk>")?
            .set_default("contact_email", "hello@zenjensyoga.co.uk")?
            .set_default("session_secret", DEFAULT_SESSION_SECRET)?
            .set_default("session_ttl_minutes", 7 * 24 * 60)?
            .set_default("reset_code_ttl_minutes", 15)?
            .set_default("reset_code_max_attempts", 5)?
            .set_default("cancellation_cutoff_hours", 24)?
            .set_default("studio_timezone", "Europe/London")?
            .set_default("studio_name", "Zen Jen's Yoga")?
            .set_default("studio_address", "59 Kew Gardens, Uddingston, G71 6LT")?
            .build()?;

        config.try_deserialize()
    }

    pub fn uses_default_session_secret(&self) -> bool {
        self.session_secret == DEFAULT_SESSION_SECRET
    }

    /// Rejects settings that must not reach a production deployment.
    pub fn check_secrets(&self) -> Result<(), ConfigError> {
        if self.uses_default_session_secret() && !self.debug {
            return Err(ConfigError::Message(
                "APP_SESSION_SECRET must be set unless APP_DEBUG is enabled".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    #[serial]
    fn test_defaults() {
        let settings = Settings::from_env().unwrap();
        assert_eq!(settings.reset_code_ttl_minutes, 15);
        assert_eq!(settings.reset_code_max_attempts, 5);
        assert_eq!(settings.cancellation_cutoff_hours, 24);
        assert_eq!(settings.studio_timezone, chrono_tz::Europe::London);
        assert!(settings.uses_default_session_secret());
    }

    #[test]
    #[serial]
    fn test_default_session_secret_needs_debug() {
        let mut settings = Settings::from_env().unwrap();
        settings.debug = false;
        assert!(settings.check_secrets().is_err());

        settings.debug = true;
        assert!(settings.check_secrets().is_ok());

        settings.debug = false;
        settings.session_secret = "a-real-signing-key".into();
        assert!(settings.check_secrets().is_ok());
    }

    #[test]
    #[serial]
    fn test_env_override() {
        unsafe {
            std::env::set_var("APP_STRIPE_SECRET_KEY", "sk_test_123");
            std::env::set_var("APP_PORT", "9090");
        }
        let settings = Settings::from_env().unwrap();
        unsafe {
            std::env::remove_var("APP_STRIPE_SECRET_KEY");
            std::env::remove_var("APP_PORT");
        }
        assert_eq!(settings.stripe_secret_key, "sk_test_123");
        assert_eq!(settings.port, 9090);
    }

    #[test]
    #[serial]
    fn test_unknown_timezone_is_rejected() {
        unsafe {
            std::env::set_var("APP_STUDIO_TIMEZONE", "Europe/Atlantis");
        }
        let result = Settings::from_env();
        unsafe {
            std::env::remove_var("APP_STUDIO_TIMEZONE");
        }
        assert!(result.is_err());
    }
}
