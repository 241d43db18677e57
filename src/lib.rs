pub mod auth;
pub mod booking;
pub mod checkout;
pub mod error;
pub mod handlers;
pub mod ical;
pub mod mailer;
pub mod models;
pub mod notify;
pub mod openapi;
pub mod payments;
pub mod settings;
pub mod storage;
pub mod store;
pub mod validation;
pub mod webhook;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, patch, post},
};
use http::{HeaderValue, Method};
use tower_http::LatencyUnit;
use tower_http::cors::CorsLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{admin, bookings, checkout as checkout_handlers, gallery, public, users};
use crate::ical::ICalExporter;
use crate::mailer::Mailer;
use crate::openapi::ApiDoc;
use crate::payments::PaymentGateway;
use crate::settings::Settings;
use crate::storage::ObjectStorage;
use crate::store::StoreClient;

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub settings: Settings,
    pub store: Arc<StoreClient>,
    pub storage: Arc<ObjectStorage>,
    pub payments: Arc<PaymentGateway>,
    pub mailer: Arc<Mailer>,
    pub exporter: Arc<ICalExporter>,
}

impl AppState {
    pub fn new(settings: Settings, mailer: Mailer) -> Result<Self, Box<dyn std::error::Error>> {
        let store = StoreClient::new(&settings.store_url, settings.store_service_key.clone())?;
        let storage = ObjectStorage::new(
            &settings.store_url,
            settings.gallery_bucket.clone(),
            settings.store_service_key.clone(),
        )?;
        let payments = PaymentGateway::new(
            settings.stripe_api_url.clone(),
            settings.stripe_secret_key.clone(),
            settings.stripe_webhook_secret.clone(),
            settings.currency.clone(),
        );
        let exporter = ICalExporter::new(
            settings.studio_name.clone(),
            settings.studio_address.clone(),
        );

        Ok(Self {
            settings,
            store: Arc::new(store),
            storage: Arc::new(storage),
            payments: Arc::new(payments),
            mailer: Arc::new(mailer),
            exporter: Arc::new(exporter),
        })
    }
}

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let settings = Settings::from_env()?;

    let env_filter = if settings.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .without_time()
        .init();

    settings.check_secrets()?;
    if settings.uses_default_session_secret() {
        warn!("APP_SESSION_SECRET is not set, using the insecure debug default");
    }
    if settings.stripe_secret_key.is_empty() {
        warn!("APP_STRIPE_SECRET_KEY is not set, checkout sessions will fail");
    }

    let mailer = Mailer::from_settings(&settings)?;
    let state = AppState::new(settings, mailer)?;
    let app = build_router(state.clone());

    let addr = SocketAddr::from(([0, 0, 0, 0], state.settings.port));
    info!("Starting yoga studio API on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(state: AppState) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let mut cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE]);
    if let Ok(origin) = HeaderValue::from_str(state.settings.site_url.origin().ascii_serialization().as_str()) {
        cors = cors.allow_origin(origin);
    }

    let mut router = Router::new()
        .route("/", get(public::root))
        .route("/healthz/live", get(public::healthz_live))
        .route("/healthz/ready", get(public::healthz_ready))
        .route("/classes", get(public::list_classes))
        .route("/classes.ical", get(public::get_ical))
        .route("/gallery", get(gallery::list_gallery))
        .route("/contact", post(public::contact))
        .route("/book-class", post(bookings::book_class))
        .route("/my-bookings", get(bookings::my_bookings))
        .route("/my-bookings/{id}", delete(bookings::cancel_my_booking))
        .route(
            "/create-checkout-session",
            post(checkout_handlers::create_checkout_session),
        )
        .route("/stripe-webhook", post(checkout_handlers::stripe_webhook))
        .route("/notify-cancellation", post(admin::notify_cancellation))
        .route("/auth/signup", post(users::signup))
        .route("/auth/login", post(users::login))
        .route("/send-reset-code", post(users::send_reset_code))
        .route("/verify-reset-code", post(users::verify_reset_code))
        .route("/update-password", post(users::update_password))
        .route("/admin/classes", post(admin::create_class))
        .route(
            "/admin/classes/{id}",
            patch(admin::update_class).delete(admin::delete_class),
        )
        .route("/admin/classes/{id}/register", get(admin::class_register))
        .route(
            "/admin/gallery",
            post(gallery::upload_image).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route(
            "/admin/gallery/{id}",
            patch(gallery::edit_image).delete(gallery::delete_image),
        )
        .with_state(state.clone());

    if state.settings.enable_swagger {
        let openapi = ApiDoc::openapi();
        let swagger = SwaggerUi::new("/docs").url("/openapi.json", openapi);
        router = router.merge(swagger);
    }

    router.layer(cors).layer(trace_layer)
}
