//! Turns completed checkout sessions into booking rows.
//!
//! The batch insert skips rows that already exist for `(userid, classid)`, so
//! a redelivered event writes nothing new and mails nobody twice. Mail is
//! best effort: once the rows are in, the payment is considered reconciled.

use std::collections::HashSet;

use serde::Deserialize;
use tracing::{error, info, warn};

use crate::checkout::{GUEST, MetadataItem};
use crate::mailer::Mailer;
use crate::models::{Booking, NewBooking};
use crate::payments::{CHECKOUT_COMPLETED, WebhookEvent};
use crate::store::{StoreClient, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Not a completed checkout; acknowledged and ignored.
    Ignored,
    /// Metadata we cannot act on; acknowledged so the gateway stops retrying.
    Unusable(String),
    Booked { inserted: Vec<Booking>, emails_sent: usize },
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default)]
    metadata: SessionMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct SessionMetadata {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    items: Option<String>,
}

/// Rows to insert for a session, one per distinct class id.
fn booking_rows(session: &SessionObject) -> Result<Vec<NewBooking>, String> {
    let user = session
        .metadata
        .user_id
        .as_deref()
        .ok_or("metadata has no userId")?;
    if user == GUEST {
        return Err("guest checkout has no account to book against".into());
    }
    let user_id: i64 = user
        .parse()
        .map_err(|_| format!("userId {user:?} is not numeric"))?;

    let items = session.metadata.items.as_deref().ok_or("metadata has no items")?;
    let items: Vec<MetadataItem> =
        serde_json::from_str(items).map_err(|err| format!("items metadata unreadable: {err}"))?;

    let mut seen = HashSet::new();
    Ok(items
        .into_iter()
        .filter(|item| seen.insert(item.id))
        .map(|item| NewBooking {
            userid: user_id,
            classid: item.id,
            session_id: Some(session.id.clone()),
        })
        .collect())
}

pub async fn reconcile(
    store: &StoreClient,
    mailer: &Mailer,
    event: &WebhookEvent,
) -> Result<Reconciliation, StoreError> {
    if event.event_type != CHECKOUT_COMPLETED {
        return Ok(Reconciliation::Ignored);
    }

    let session: SessionObject = match serde_json::from_value(event.data.object.clone()) {
        Ok(session) => session,
        Err(err) => {
            warn!(event_id = %event.id, "unreadable checkout session: {err}");
            return Ok(Reconciliation::Unusable(err.to_string()));
        }
    };

    let rows = match booking_rows(&session) {
        Ok(rows) if !rows.is_empty() => rows,
        Ok(_) => return Ok(Reconciliation::Unusable("no items in session".into())),
        Err(reason) => {
            warn!(session_id = %session.id, "cannot book paid session: {reason}");
            return Ok(Reconciliation::Unusable(reason));
        }
    };

    let inserted = store.insert_bookings(&rows).await.inspect_err(|err| {
        error!(session_id = %session.id, "error creating bookings: {err}");
    })?;
    info!(
        session_id = %session.id,
        requested = rows.len(),
        inserted = inserted.len(),
        "paid bookings recorded"
    );

    let emails_sent = send_confirmations(store, mailer, &inserted).await;
    Ok(Reconciliation::Booked {
        inserted,
        emails_sent,
    })
}

/// One confirmation per newly booked class. Failures are logged and counted out.
async fn send_confirmations(store: &StoreClient, mailer: &Mailer, bookings: &[Booking]) -> usize {
    let Some(first) = bookings.first() else {
        return 0;
    };

    let user = match store.get_user(first.userid).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(user_id = first.userid, "booked user not found, skipping confirmations");
            return 0;
        }
        Err(err) => {
            error!("error fetching user for confirmation email: {err}");
            return 0;
        }
    };

    let class_ids: Vec<i64> = bookings.iter().map(|b| b.classid).collect();
    let classes = match store.classes_by_ids(&class_ids).await {
        Ok(classes) => classes,
        Err(err) => {
            error!("error fetching classes for confirmation email: {err}");
            return 0;
        }
    };

    let mut sent = 0;
    for class in &classes {
        let mail = mailer.booking_confirmation(&user.email, &user.name, class);
        match mailer.send(mail).await {
            Ok(()) => sent += 1,
            Err(err) => error!(class_id = class.id, to = %user.email, "failed to send confirmation email: {err}"),
        }
    }
    sent
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn session(metadata: serde_json::Value) -> SessionObject {
        serde_json::from_value(json!({ "id": "cs_1", "metadata": metadata })).unwrap()
    }

    #[test]
    fn test_booking_rows_from_metadata() {
        let rows = booking_rows(&session(json!({
            "userId": "7",
            "items": r#"[{"id":3},{"id":5},{"id":3}]"#
        })))
        .unwrap();
        assert_eq!(
            rows,
            vec![
                NewBooking { userid: 7, classid: 3, session_id: Some("cs_1".into()) },
                NewBooking { userid: 7, classid: 5, session_id: Some("cs_1".into()) },
            ]
        );
    }

    #[test]
    fn test_booking_rows_rejects_guest_and_garbage() {
        assert!(booking_rows(&session(json!({ "userId": "guest", "items": "[]" }))).is_err());
        assert!(booking_rows(&session(json!({ "userId": "7", "items": "nope" }))).is_err());
        assert!(booking_rows(&session(json!({ "items": r#"[{"id":3}]"# }))).is_err());
        assert!(booking_rows(&session(json!({}))).is_err());
    }
}
