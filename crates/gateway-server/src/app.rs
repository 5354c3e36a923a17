//! Assembles every sub-router into the one [`Router`] the process binds
//! (spec §6). Mirrors the teacher's `turbomcp-transport::axum::router`
//! pattern of one `Router`-returning function per concern, merged here and
//! wrapped in a single `ServiceBuilder` middleware stack.

use crate::ratelimit::{enforce_auth, enforce_general};
use crate::state::AppState;
use crate::{frontdoor, health, mcp_http, oauth, webhook};
use axum::http::HeaderValue;
use axum::middleware;
use axum::Router;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Builds the complete application router from a constructed [`AppState`].
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new();

    if state.config.protocols.envelope {
        router = router.merge(
            frontdoor::envelope_router(&state.config.paths.rpc)
                .layer(middleware::from_fn_with_state(state.clone(), enforce_general)),
        );
    }
    if state.config.protocols.typed {
        router = router.merge(
            frontdoor::typed_router(&state.catalog, &state.config.paths.trpc)
                .layer(middleware::from_fn_with_state(state.clone(), enforce_general)),
        );
    }
    if state.config.mcp.enabled {
        router = router.merge(mcp_http::router().layer(middleware::from_fn_with_state(state.clone(), enforce_general)));
    }
    if state.config.oauth.enabled {
        router = router.merge(oauth::router().layer(middleware::from_fn_with_state(state.clone(), enforce_auth)));
    }
    if state.config.token_tracking.enabled {
        let webhook_prefix = state.config.token_tracking.webhook_path.clone();
        router = router.nest(&webhook_prefix, webhook::router());
    }
    router = router.merge(health::router(&state.config.paths.health));

    let cors = build_cors_layer(&state.config.cors);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(120)))
        .layer(CompressionLayer::new())
        .layer(cors);

    router.layer(middleware_stack).with_state(state)
}

fn build_cors_layer(config: &crate::config::CorsConfig) -> CorsLayer {
    let mut layer = CorsLayer::new()
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    layer = if config.origin == "*" {
        if config.credentials {
            // Credentialed requests cannot use a wildcard origin; fall back
            // to reflecting the request origin instead (spec leaves this
            // combination's resolution to the implementation).
            layer.allow_origin(tower_http::cors::AllowOrigin::mirror_request())
        } else {
            layer.allow_origin(tower_http::cors::Any)
        }
    } else {
        match HeaderValue::from_str(&config.origin) {
            Ok(value) => layer.allow_origin(value),
            Err(_) => layer.allow_origin(tower_http::cors::Any),
        }
    };

    if config.credentials {
        layer = layer.allow_credentials(true);
    }
    layer
}
