use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{self, SecurityConfig};
use crate::handlers::{provision, system};
use crate::middleware::admin_auth_middleware;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let settings = config::config();

    let router = Router::new()
        // Public
        .route("/", get(system::root))
        .route("/health", get(system::health))
        // Admin-only provisioning API
        .merge(provision_routes(state.clone()))
        // Global middleware
        .layer(DefaultBodyLimit::max(settings.api.max_request_size_bytes))
        .layer(cors_layer(&settings.security));

    let router = if settings.api.enable_request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };

    router.with_state(state)
}

fn provision_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/provision/preview", post(provision::preview))
        .route("/api/provision/trainees/:batch_id", post(provision::trainees))
        .route("/api/provision/memberships", post(provision::memberships))
        .route("/api/provision/users", post(provision::users))
        .route_layer(middleware::from_fn_with_state(state, admin_auth_middleware))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
