pub mod admin;
pub mod bookings;
pub mod checkout;
pub mod gallery;
pub mod public;
pub mod users;

use axum_extra::extract::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};

pub(crate) type BearerAuth = Option<TypedHeader<Authorization<Bearer>>>;

pub(crate) fn bearer(auth: BearerAuth) -> Option<Authorization<Bearer>> {
    auth.map(|TypedHeader(a)| a)
}
