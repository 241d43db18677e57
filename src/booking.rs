//! Seat booking and self-service cancellation.
//!
//! The capacity and duplicate checks run first so callers get a precise
//! error, but the seat is only taken by [`StoreClient::book_class_seat`],
//! which re-checks both under a row lock inside the data store. Two requests
//! racing for the last seat can both pass the advisory checks; only one of
//! them gets `booked` back from the guarded write.

use chrono::{DateTime, Duration, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::models::{BookingWithClass, YogaClass};
use crate::store::{SeatOutcome, StoreClient, StoreError};

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("Class not found")]
    ClassNotFound,
    #[error("Booking not found")]
    BookingNotFound,
    #[error("Class is full")]
    CapacityExceeded,
    #[error("Already booked")]
    DuplicateBooking,
    #[error("Booking belongs to another user")]
    NotOwner,
    #[error(
        "Cancellations are not permitted within {cutoff_hours} hours of the class start time."
    )]
    CancellationWindowClosed { cutoff_hours: i64 },
    #[error(transparent)]
    Store(#[from] StoreError),
}

fn seat_result(outcome: SeatOutcome) -> Result<(), BookingError> {
    match outcome {
        SeatOutcome::Booked => Ok(()),
        SeatOutcome::Full => Err(BookingError::CapacityExceeded),
        SeatOutcome::Duplicate => Err(BookingError::DuplicateBooking),
        SeatOutcome::ClassMissing => Err(BookingError::ClassNotFound),
    }
}

pub async fn book_class(
    store: &StoreClient,
    user_id: i64,
    class_id: i64,
) -> Result<YogaClass, BookingError> {
    let class = store
        .get_class(class_id)
        .await?
        .ok_or(BookingError::ClassNotFound)?;

    let booked = store.count_bookings(class_id).await?;
    if booked >= u64::try_from(class.capacity).unwrap_or(0) {
        return Err(BookingError::CapacityExceeded);
    }

    if store.find_booking(user_id, class_id).await?.is_some() {
        return Err(BookingError::DuplicateBooking);
    }

    let outcome = store.book_class_seat(user_id, class_id).await?;
    if outcome != SeatOutcome::Booked {
        warn!(user_id, class_id, ?outcome, "guarded seat write refused booking");
    }
    seat_result(outcome)?;

    info!(user_id, class_id, "class booked");
    Ok(class)
}

/// Class start as an instant, reading the stored wall-clock time in `tz`.
pub fn class_start(class: &YogaClass, tz: Tz) -> DateTime<Utc> {
    let local = class.starts_at();
    tz.from_local_datetime(&local)
        .earliest()
        // DST gap: no such local time, read it as UTC
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&local))
}

/// Cancelling is allowed only while more than `cutoff_hours` remain before the start.
pub fn cancellation_allowed(start: DateTime<Utc>, now: DateTime<Utc>, cutoff_hours: i64) -> bool {
    start - now > Duration::hours(cutoff_hours)
}

pub async fn cancel_booking(
    store: &StoreClient,
    user_id: i64,
    booking_id: i64,
    now: DateTime<Utc>,
    tz: Tz,
    cutoff_hours: i64,
) -> Result<BookingWithClass, BookingError> {
    let booking = store
        .get_booking_with_class(booking_id)
        .await?
        .ok_or(BookingError::BookingNotFound)?;

    if booking.userid != user_id {
        return Err(BookingError::NotOwner);
    }

    if !cancellation_allowed(class_start(&booking.class, tz), now, cutoff_hours) {
        return Err(BookingError::CancellationWindowClosed { cutoff_hours });
    }

    if !store.delete_booking(booking_id).await? {
        return Err(BookingError::BookingNotFound);
    }
    info!(user_id, booking_id, class_id = booking.class.id, "booking cancelled by user");
    Ok(booking)
}

#[derive(Debug, Clone, Serialize, PartialEq, ToSchema)]
pub struct MyBookings {
    pub upcoming: Vec<BookingWithClass>,
    pub past: Vec<BookingWithClass>,
}

/// Upcoming soonest first, past most recent first.
pub fn split_bookings(bookings: Vec<BookingWithClass>, now: DateTime<Utc>, tz: Tz) -> MyBookings {
    let (mut upcoming, mut past): (Vec<_>, Vec<_>) = bookings
        .into_iter()
        .partition(|b| class_start(&b.class, tz) > now);
    upcoming.sort_by_key(|b| b.class.starts_at());
    past.sort_by_key(|b| std::cmp::Reverse(b.class.starts_at()));
    MyBookings { upcoming, past }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use super::*;

    fn class_at(date: NaiveDate, hour: u32) -> YogaClass {
        YogaClass {
            id: 1,
            title: "Flow".into(),
            description: None,
            date,
            time: NaiveTime::from_hms_opt(hour, 0, 0).unwrap(),
            capacity: 10,
            price: 10.0,
            duration: 60,
        }
    }

    #[test]
    fn test_class_start_applies_timezone() {
        // 1 July is BST (UTC+1)
        let class = class_at(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(), 10);
        let start = class_start(&class, chrono_tz::Europe::London);
        assert_eq!(start.to_rfc3339(), "2025-07-01T09:00:00+00:00");

        let winter = class_at(NaiveDate::from_ymd_opt(2025, 12, 1).unwrap(), 10);
        let start = class_start(&winter, chrono_tz::Europe::London);
        assert_eq!(start.to_rfc3339(), "2025-12-01T10:00:00+00:00");
    }

    #[test]
    fn test_cancellation_cutoff() {
        let now = Utc::now();
        assert!(!cancellation_allowed(now + Duration::hours(23), now, 24));
        assert!(!cancellation_allowed(now + Duration::hours(24), now, 24));
        assert!(cancellation_allowed(now + Duration::hours(25), now, 24));
        assert!(!cancellation_allowed(now - Duration::hours(1), now, 24));
    }

    #[test]
    fn test_seat_outcome_maps_to_errors() {
        assert!(seat_result(SeatOutcome::Booked).is_ok());
        assert!(matches!(
            seat_result(SeatOutcome::Full),
            Err(BookingError::CapacityExceeded)
        ));
        assert!(matches!(
            seat_result(SeatOutcome::Duplicate),
            Err(BookingError::DuplicateBooking)
        ));
    }

    #[test]
    fn test_split_bookings() {
        let created_at = Utc::now();
        let booking = |id, date| BookingWithClass {
            id,
            userid: 7,
            created_at,
            class: class_at(date, 10),
        };
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let split = split_bookings(
            vec![
                booking(1, NaiveDate::from_ymd_opt(2025, 5, 1).unwrap()),
                booking(2, NaiveDate::from_ymd_opt(2025, 8, 1).unwrap()),
                booking(3, NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
                booking(4, NaiveDate::from_ymd_opt(2025, 5, 20).unwrap()),
            ],
            now,
            chrono_tz::Europe::London,
        );
        let ids = |v: &[BookingWithClass]| v.iter().map(|b| b.id).collect::<Vec<_>>();
        assert_eq!(ids(&split.upcoming), vec![3, 2]);
        assert_eq!(ids(&split.past), vec![4, 1]);
    }
}
