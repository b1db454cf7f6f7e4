pub mod error;
pub mod extractors;
pub mod routes;
pub mod state;
pub mod telemetry;

use axum::{
    Router,
    http::HeaderValue,
    routing::{get, patch, post},
};
use state::AppState;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(parsed)
}

pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.settings.app.cors_origins);

    // Health probes (no auth)
    let health_routes = Router::new()
        .route("/", get(routes::health::full))
        .route("/light", get(routes::health::light))
        .route("/fields", get(routes::health::fields));

    // Dashboard routes (read-only)
    let dashboard_routes = Router::new()
        .route("/kpis", get(routes::dashboard::kpis))
        .route("/trends", get(routes::dashboard::trends))
        .route("/per-county", get(routes::dashboard::per_county))
        .route("/new", get(routes::dashboard::new_bookings))
        .route("/recent", get(routes::dashboard::recent))
        .route("/top", get(routes::dashboard::top));

    // Case routes
    let case_routes = Router::new()
        .route("/", get(routes::case::list))
        .route("/{case_id}", get(routes::case::get))
        .route("/{case_id}/crm", patch(routes::case::update_crm))
        .route(
            "/{case_id}/checklist/{key}",
            patch(routes::case::set_checklist_item),
        )
        .route(
            "/{case_id}/documents",
            get(routes::document::list).post(routes::document::upload),
        )
        .route(
            "/{case_id}/documents/{attachment_id}",
            patch(routes::document::update).delete(routes::document::delete),
        )
        .route(
            "/{case_id}/documents/{attachment_id}/download",
            get(routes::document::download),
        )
        .route(
            "/{case_id}/checkins",
            get(routes::checkin::list).post(routes::checkin::create),
        );

    let checkin_routes = Router::new()
        .route("/{checkin_id}/done", post(routes::checkin::complete))
        .route("/{checkin_id}/pings", post(routes::checkin::ping));

    let message_routes = Router::new()
        .route("/", get(routes::message::list))
        .route("/send", post(routes::message::send));

    let user_routes = Router::new()
        .route("/", get(routes::user::list))
        .route("/me", get(routes::user::me))
        .route("/{uid}", patch(routes::user::update_access));

    // Compose API
    let api = Router::new()
        .nest("/health", health_routes)
        .nest("/dashboard", dashboard_routes)
        .nest("/cases", case_routes)
        .nest("/checkins", checkin_routes)
        .nest("/messages", message_routes)
        .nest("/users", user_routes);

    // Provider webhooks (signature-verified, no session)
    let twilio_routes = Router::new()
        .route("/status", post(routes::twilio::status))
        .route("/inbound", post(routes::twilio::inbound));

    Router::new()
        .nest("/api", api)
        .nest("/twilio", twilio_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
