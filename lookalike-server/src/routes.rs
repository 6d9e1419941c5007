//! Router assembly: routes, static reference images and middleware.

use std::{sync::Arc, time::Duration};

use axum::{
    http::{header, Method, StatusCode},
    routing::{get, post},
    Json, Router,
};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::config::Config;
use crate::handlers::{health, index, ready, upload_handler};
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Router over an empty in-memory corpus with default settings.
pub fn create_router() -> Router {
    create_router_with_config(&Config::default())
}

/// Router over an empty in-memory corpus.
pub fn create_router_with_config(config: &Config) -> Router {
    create_router_with_state(AppState::in_memory(config.clone()), config)
}

/// Router around prepared state.
///
/// Rate limiting keys on the peer address, so when it is enabled the router
/// must be served with `into_make_service_with_connect_info::<SocketAddr>()`.
pub fn create_router_with_state(state: AppState, config: &Config) -> Router {
    let router = Router::new()
        .route("/", get(index))
        .route("/upload", post(upload_handler))
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .nest_service("/our_images", ServeDir::new(&config.reference_dir))
        .with_state(state)
        .layer(cors_layer(config.allowed_origins.as_deref()))
        .layer(RequestBodyLimitLayer::new(config.body_limit_mb * 1024 * 1024))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.timeout_secs),
        ));

    with_rate_limit(router, config).layer(TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: Option<&[String]>) -> CorsLayer {
    match allowed_origins {
        Some(origins) if !origins.is_empty() => {
            let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
            tracing::info!(origins = origins.len(), "CORS restricted");
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        }
        _ => {
            tracing::warn!("CORS open to all origins");
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    }
}

fn with_rate_limit(router: Router, config: &Config) -> Router {
    if !config.rate_limit_enabled {
        tracing::warn!("Rate limiting disabled");
        return router;
    }

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(config.rate_limit_per_sec)
        .burst_size(config.rate_limit_burst)
        .finish();

    match governor_conf {
        Some(governor_conf) => {
            tracing::info!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Rate limiting enabled"
            );
            router.layer(GovernorLayer::new(Arc::new(governor_conf)))
        }
        None => {
            tracing::warn!(
                per_sec = config.rate_limit_per_sec,
                burst = config.rate_limit_burst,
                "Invalid rate limit settings, rate limiting disabled"
            );
            router
        }
    }
}
