//! HTTP surface
//!
//! Every response uses the same envelope: `status`, `code`, `message` and
//! `data`, plus `field_errors` on validation failures. Handlers stay thin;
//! transactions are opened inside the services.

pub mod extract;
pub mod handlers;
pub mod response;
pub mod state;

pub use extract::{AuthUser, ClientIp};
pub use response::{ApiError, ApiResponse, ApiResult, Envelope};
pub use state::AppState;

use axum::Router;
use axum::http::Method;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn build_router(state: AppState) -> Router {
    let v1 = Router::new()
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/complete-profile", post(handlers::complete_profile))
        .route("/user/profile", get(handlers::view_profile))
        .route("/location/countries", get(handlers::countries))
        .route("/location/cities", get(handlers::cities))
        .route("/event", get(handlers::events))
        .route("/event/categories", get(handlers::event_categories))
        .route("/event/subcategories", get(handlers::event_subcategories))
        .route("/event/:id", get(handlers::event_detail))
        .route("/test-email", post(handlers::test_email));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/v1", v1)
        .fallback(handlers::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS]),
        )
        .with_state(state)
}
