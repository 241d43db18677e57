//! Outgoing mail through an authenticated SMTP relay.
//!
//! [`Mailer`] is built from [`Settings`]: with `smtp_host` set it delivers through
//! `lettre`'s async SMTP transport, without it messages are only logged. An
//! in-memory outbox keeps rendered messages for inspection instead of sending.

use std::sync::{Arc, Mutex};

use chrono_tz::Tz;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use thiserror::Error;
use tracing::{info, warn};

use crate::ical::google_calendar_link;
use crate::models::YogaClass;
use crate::settings::Settings;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
    #[error("email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("email build error: {0}")]
    Build(#[from] lettre::error::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub reply_to: Option<Mailbox>,
    pub subject: String,
    pub body: String,
    pub html: bool,
}

#[derive(Clone)]
enum Transport {
    Smtp(AsyncSmtpTransport<Tokio1Executor>),
    Disabled,
    Outbox(Arc<Mutex<Vec<OutgoingMail>>>),
}

#[derive(Clone)]
pub struct Mailer {
    transport: Transport,
    from: String,
    studio_name: String,
    studio_address: String,
    timezone: Tz,
}

impl Mailer {
    pub fn from_settings(settings: &Settings) -> Result<Self, MailError> {
        let transport = match &settings.smtp_host {
            Some(host) => {
                let mut builder =
                    AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)?.port(settings.smtp_port);
                if let (Some(user), Some(pass)) = (&settings.smtp_username, &settings.smtp_password) {
                    builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
                }
                Transport::Smtp(builder.build())
            }
            None => {
                warn!("APP_SMTP_HOST not set, outgoing mail will only be logged");
                Transport::Disabled
            }
        };
        Ok(Self::with_transport(transport, settings))
    }

    /// Keeps every message in memory instead of delivering it.
    pub fn in_memory(settings: &Settings) -> Self {
        Self::with_transport(Transport::Outbox(Arc::new(Mutex::new(Vec::new()))), settings)
    }

    fn with_transport(transport: Transport, settings: &Settings) -> Self {
        Self {
            transport,
            from: settings.mail_from.clone(),
            studio_name: settings.studio_name.clone(),
            studio_address: settings.studio_address.clone(),
            timezone: settings.studio_timezone,
        }
    }

    /// Messages held by an in-memory mailer; empty for the other transports.
    pub fn outbox(&self) -> Vec<OutgoingMail> {
        match &self.transport {
            Transport::Outbox(outbox) => outbox.lock().map(|o| o.clone()).unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    pub async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        let mut builder = Message::builder()
            .from(self.from.parse::<Mailbox>()?)
            .to(mail.to.parse::<Mailbox>()?)
            .subject(mail.subject.clone());
        if let Some(reply_to) = &mail.reply_to {
            builder = builder.reply_to(reply_to.clone());
        }
        let content_type = if mail.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        };
        let message = builder.header(content_type).body(mail.body.clone())?;

        match &self.transport {
            Transport::Smtp(smtp) => {
                smtp.send(message).await?;
            }
            Transport::Disabled => {
                info!(to = %mail.to, subject = %mail.subject, "mail delivery disabled, dropping message");
            }
            Transport::Outbox(outbox) => {
                if let Ok(mut outbox) = outbox.lock() {
                    outbox.push(mail);
                }
            }
        }
        Ok(())
    }

    pub fn booking_confirmation(&self, to: &str, name: &str, class: &YogaClass) -> OutgoingMail {
        let calendar_link = html_escape(&google_calendar_link(class, &self.studio_address, self.timezone));
        let description = html_escape(class.description.as_deref().unwrap_or_default());
        let body = format!(
            r#"<div style="font-family: Arial, sans-serif; line-height: 1.6;">
    <h2>Booking Confirmation</h2>
    <p>Dear {name},</p>
    <p>Thank you for booking your class with <strong>{studio}</strong>. We're excited to welcome you!</p>
    <h3>Booking Details:</h3>
    <ul>
        <li><strong>Class:</strong> {title}</li>
        <li><strong>Date:</strong> {date}</li>
        <li><strong>Time:</strong> {time}</li>
        <li><strong>Duration:</strong> {duration} minutes</li>
    </ul>
    <p>{description}</p>
    <p><a href="{calendar_link}" target="_blank">Add to Google Calendar</a></p>
    <p>We look forward to seeing you on the mat!</p>
    <p>Warm regards,<br/>The {studio} Team</p>
</div>"#,
            name = html_escape(display_name(name)),
            studio = html_escape(&self.studio_name),
            title = html_escape(&class.title),
            date = class.date.format("%A %-d %B %Y"),
            time = class.time.format("%H:%M"),
            duration = class.duration,
        );
        OutgoingMail {
            to: to.to_string(),
            reply_to: None,
            subject: format!("Booking Confirmation: {}", class.title),
            body,
            html: true,
        }
    }

    pub fn class_cancelled(&self, to: &str, name: &str, class: &YogaClass) -> OutgoingMail {
        let body = format!(
            "<p>Dear {name},</p>\
             <p>We regret to inform you that the class <strong>{title}</strong> on {date} has been cancelled.</p>\
             <p>Thank you for your understanding,<br/>{studio}</p>",
            name = html_escape(display_name(name)),
            title = html_escape(&class.title),
            date = class.date.format("%A %-d %B %Y"),
            studio = html_escape(&self.studio_name),
        );
        OutgoingMail {
            to: to.to_string(),
            reply_to: None,
            subject: format!("Class Cancellation: {}", class.title),
            body,
            html: true,
        }
    }

    pub fn reset_code(&self, to: &str, code: &str, ttl_minutes: i64) -> OutgoingMail {
        let body = format!(
            "<p>Hello,</p><p>Your password reset code is:</p><h2>{code}</h2>\
             <p>This code will expire in {ttl_minutes} minutes.</p>"
        );
        OutgoingMail {
            to: to.to_string(),
            reply_to: None,
            subject: "Your Password Reset Code".into(),
            body,
            html: true,
        }
    }

    /// Forwards a contact-form message; replies go straight back to `sender`.
    pub fn contact_message(&self, to: &str, sender: Mailbox, message: &str) -> OutgoingMail {
        let subject = match &sender.name {
            Some(name) => format!("New message from {name}"),
            None => format!("New message from {}", sender.email),
        };
        OutgoingMail {
            to: to.to_string(),
            reply_to: Some(sender),
            subject,
            body: message.to_string(),
            html: false,
        }
    }
}

fn display_name(name: &str) -> &str {
    if name.trim().is_empty() { "Yogi" } else { name }
}

/// Escapes text interpolated into the HTML templates.
fn html_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn settings() -> Settings {
        Settings::from_env().unwrap()
    }

    fn class() -> YogaClass {
        YogaClass {
            id: 3,
            title: "Hatha Basics".into(),
            description: Some("Gentle start".into()),
            date: NaiveDate::from_ymd_opt(2025, 12, 15).unwrap(),
            time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            capacity: 10,
            price: 12.5,
            duration: 60,
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_booking_confirmation_content() {
        let mailer = Mailer::in_memory(&settings());
        let mail = mailer.booking_confirmation("jen@example.com", "", &class());
        assert_eq!(mail.subject, "Booking Confirmation: Hatha Basics");
        assert!(mail.body.contains("Dear Yogi"));
        assert!(mail.body.contains("Monday 15 December 2025"));
        assert!(mail.body.contains("calendar.google.com"));
    }

    #[test]
    #[serial_test::serial]
    fn test_html_bodies_escape_user_text() {
        let mailer = Mailer::in_memory(&settings());
        let mut class = class();
        class.title = "Flow & Restore".into();
        let name = "<img src=x onerror=alert(1)>";

        let confirmation = mailer.booking_confirmation("jen@example.com", name, &class);
        assert!(!confirmation.body.contains("<img"));
        assert!(confirmation.body.contains("Dear &lt;img src=x onerror=alert(1)&gt;"));
        assert!(confirmation.body.contains("Flow &amp; Restore"));

        let cancelled = mailer.class_cancelled("jen@example.com", name, &class);
        assert!(!cancelled.body.contains("<img"));
        assert!(cancelled.body.contains("&lt;img"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_outbox_records_sent_mail() {
        let mailer = Mailer::in_memory(&settings());
        let mail = mailer.reset_code("jen@example.com", "123456", 15);
        mailer.send(mail).await.unwrap();
        let outbox = mailer.outbox();
        assert_eq!(outbox.len(), 1);
        assert!(outbox[0].body.contains("123456"));
    }

    #[tokio::test]
    #[serial_test::serial]
    async fn test_send_rejects_bad_address() {
        let mailer = Mailer::in_memory(&settings());
        let mail = mailer.reset_code("not an address", "123456", 15);
        assert!(matches!(mailer.send(mail).await, Err(MailError::Address(_))));
        assert!(mailer.outbox().is_empty());
    }
}
