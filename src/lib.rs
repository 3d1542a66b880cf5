use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Core application services and components.
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod extract;
pub mod gate;
pub mod handlers;
pub mod models;
pub mod notifier;
pub mod repository;
pub mod tag_reads;

// Module for routing segregation (Public, Reader, Authenticated).
pub mod routes;
use routes::{authenticated, public, reader};

// --- Public Re-exports ---

pub use clock::{ClockState, SystemClock};
pub use config::AppConfig;
pub use repository::{InMemoryRepository, PostgresRepository, RepositoryState};
pub use tag_reads::{TagReadDispatcher, TagReadHandler, spawn_tag_read_worker};

/// ApiDoc
///
/// OpenAPI document aggregated from the `#[utoipa::path]` handlers and
/// `ToSchema` models, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::login, handlers::logout, handlers::get_current_user,
        handlers::list_users, handlers::create_user, handlers::show_user,
        handlers::update_user, handlers::delete_user,
        handlers::list_activation_records, handlers::create_activation_record,
        handlers::show_activation_record, handlers::update_activation_record,
        handlers::delete_activation_record, handlers::submit_tag_read
    ),
    components(
        schemas(
            models::Role, models::UserResource, models::ActivationRecord,
            models::LoginRequest, models::LoginResponse, models::CreateUserRequest,
            models::UpdateUserRequest, models::CreateActivationRecordRequest,
            events::TagReadEvent, error::ErrorBody,
        )
    ),
    tags(
        (name = "badge-gate", description = "Badge access control API")
    )
)]
struct ApiDoc;

/// AppState
///
/// Shared, cheaply clonable container for every service a handler may need.
#[derive(Clone)]
pub struct AppState {
    /// Persistence for users, activation records and revoked tokens.
    pub repo: RepositoryState,
    /// Source of "now" for manually appended activation records.
    pub clock: ClockState,
    /// Producer side of the tag-read queue.
    pub tag_reads: TagReadDispatcher,
    /// The loaded, immutable configuration.
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

// Let extractors such as `AuthContext` and `ReaderKey` pull single components
// out of the shared state.

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles the routing structure, applies global and scoped middleware, and
/// registers the application state.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(reader::reader_routes())
        // Authentication (401) then the access gate (403), before any handler.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                gate::require_enabled_user,
            )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span factory for `TraceLayer`: tags every log line of a request with its
/// method, URI and `x-request-id`.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
