//! ScoutDeck reference backend
//!
//! An in-memory REST service implementing the endpoints the ScoutDeck
//! client expects:
//! - Account registration, login and token refresh
//! - Teams and leagues
//! - Reports, with one report per team and analyst
//! - The activity feed the client polls for notifications

pub mod handlers;
pub mod middleware;
pub mod store;

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    routing::{get, post, put},
    BoxError, Router,
};
use scoutdeck_common::{auth::JwtManager, config::AppConfig, errors::AppError};
use std::sync::Arc;
use std::time::Duration;
use store::Store;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<Store>,
    pub jwt: Arc<JwtManager>,
}

impl AppState {
    /// State with a freshly seeded store
    pub fn new(config: AppConfig) -> Self {
        let secret = config.auth.jwt_secret.clone().unwrap_or_else(|| {
            tracing::warn!("No JWT secret configured, generating an ephemeral one");
            ephemeral_secret()
        });
        let jwt = JwtManager::new(&secret, config.auth.access_ttl_secs, config.auth.refresh_ttl_secs);

        Self {
            config: Arc::new(config),
            store: Arc::new(Store::seeded()),
            jwt: Arc::new(jwt),
        }
    }
}

fn ephemeral_secret() -> String {
    rand::random::<[u8; 32]>()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Load shedding and timeouts
    let limits = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_overload))
        .timeout(Duration::from_secs(state.config.server.request_timeout_secs))
        .concurrency_limit(state.config.server.max_concurrent_requests.max(1));

    let api_routes = Router::new()
        // Auth endpoints
        .route("/auth/register/", post(handlers::auth::register))
        .route("/auth/login/", post(handlers::auth::login))
        .route("/auth/token/refresh/", post(handlers::auth::refresh))
        .route("/auth/user/", get(handlers::auth::current_user))

        // Team endpoints
        .route(
            "/teams/",
            get(handlers::teams::list_teams).post(handlers::teams::create_team),
        )
        .route(
            "/teams/{id}/",
            get(handlers::teams::get_team)
                .put(handlers::teams::update_team)
                .delete(handlers::teams::delete_team),
        )
        .route("/leagues/", get(handlers::teams::list_leagues))

        // Report endpoints
        .route(
            "/reports/",
            get(handlers::reports::list_reports).post(handlers::reports::create_report),
        )
        .route(
            "/reports/{id}/",
            get(handlers::reports::get_report)
                .put(handlers::reports::update_report)
                .delete(handlers::reports::delete_report),
        )
        .route("/reports/{id}/status/", put(handlers::reports::update_status))
        .route("/reports/team/{team_id}/", get(handlers::reports::team_reports))
        .route(
            "/reports/my-report/team/{team_id}/",
            get(handlers::reports::my_report_for_team),
        )

        // Notifications
        .route("/activities/", get(handlers::activities::list_activities));

    // Compose the app
    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/api", api_routes)
        .layer(axum::middleware::from_fn(middleware::metrics::track_requests))
        .layer(limits)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .with_state(state)
}

async fn handle_overload(err: BoxError) -> AppError {
    if err.is::<tower::timeout::error::Elapsed>() {
        AppError::Api {
            status: StatusCode::REQUEST_TIMEOUT.as_u16(),
            message: "Request timed out".to_string(),
            payload: serde_json::json!({ "detail": "Request timed out" }),
        }
    } else {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}
