//! Staff-initiated cancellation notices.

use std::collections::BTreeSet;

use futures::future::join_all;
use tracing::{error, info};

use crate::mailer::Mailer;
use crate::models::{User, YogaClass};
use crate::store::{StoreClient, StoreError};

/// Users booked onto `class_id`, each once.
pub async fn booked_users(store: &StoreClient, class_id: i64) -> Result<Vec<User>, StoreError> {
    let bookings = store.bookings_for_class(class_id).await?;
    let ids: Vec<i64> = bookings
        .iter()
        .map(|b| b.userid)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    store.users_by_ids(&ids).await
}

/// Mails every booked user that the class is off. Returns how many notices went out.
pub async fn notify_class_cancelled(
    store: &StoreClient,
    mailer: &Mailer,
    class: &YogaClass,
) -> Result<usize, StoreError> {
    let users = booked_users(store, class.id).await?;

    let sends = users
        .iter()
        .filter(|user| !user.email.trim().is_empty())
        .map(|user| async move {
            let mail = mailer.class_cancelled(&user.email, &user.name, class);
            mailer
                .send(mail)
                .await
                .inspect_err(|err| {
                    error!(class_id = class.id, to = %user.email, "failed to send cancellation email: {err}")
                })
                .is_ok()
        });
    let sent = join_all(sends).await.into_iter().filter(|ok| *ok).count();

    info!(class_id = class.id, booked = users.len(), sent, "cancellation notices sent");
    Ok(sent)
}
