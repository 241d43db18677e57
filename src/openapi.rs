use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::booking::MyBookings;
use crate::handlers::{admin, bookings, checkout, gallery, public, users};
use crate::models::{
    Booking, BookingWithClass, CartItem, ClassListing, ClassPatch, GalleryEntry, GalleryImage,
    NewClass, PublicUser, RegisterRow, YogaClass,
};

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        public::root,
        public::healthz_live,
        public::healthz_ready,
        public::list_classes,
        public::get_ical,
        public::contact,
        gallery::list_gallery,
        gallery::upload_image,
        gallery::edit_image,
        gallery::delete_image,
        bookings::book_class,
        bookings::my_bookings,
        bookings::cancel_my_booking,
        checkout::create_checkout_session,
        checkout::stripe_webhook,
        admin::create_class,
        admin::update_class,
        admin::delete_class,
        admin::class_register,
        admin::notify_cancellation,
        users::signup,
        users::login,
        users::send_reset_code,
        users::verify_reset_code,
        users::update_password
    ),
    components(schemas(
        YogaClass,
        ClassListing,
        NewClass,
        ClassPatch,
        Booking,
        BookingWithClass,
        MyBookings,
        CartItem,
        PublicUser,
        GalleryImage,
        GalleryEntry,
        RegisterRow,
        public::ContactRequest,
        bookings::BookClassRequest,
        checkout::CheckoutRequest,
        admin::CreateClassRequest,
        admin::NotifyRequest,
        gallery::EditImageRequest,
        gallery::UploadImageForm,
        users::SignupRequest,
        users::LoginRequest,
        users::ResetCodeRequest,
        users::VerifyCodeRequest,
        users::UpdatePasswordRequest
    )),
    tags(
        (name = "studio", description = "Timetable, health and contact"),
        (name = "bookings", description = "Member bookings"),
        (name = "checkout", description = "Paid bookings through the payment gateway"),
        (name = "admin", description = "Class management for studio staff"),
        (name = "gallery", description = "Studio photo gallery"),
        (name = "users", description = "Accounts and password reset")
    ),
    modifiers(&SecurityAddon),
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_routes_and_bearer_scheme() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/book-class"));
        assert!(doc.paths.paths.contains_key("/admin/classes/{id}/register"));
        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
