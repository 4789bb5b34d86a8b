//! Route configuration.

use crate::handlers;
use crate::state::AppState;
use axum::extract::Request;
use axum::http::{header::HeaderValue, Method};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Per-request timeout on the HTTP surface.
const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Create the application router.
///
/// Each feature group can be switched off via its `DISABLE_*` variable.
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new();

    if !state.config.disable_keyproof {
        router = router
            .route("/", get(handlers::get_home))
            .route("/id/{id}", get(handlers::get_proofs))
            .route("/qr", get(handlers::get_qr))
            .route("/favicon.ico", get(handlers::favicon));
    }

    if !state.config.disable_dns {
        router = router.route("/dns/{domain}", get(handlers::get_dns));
    }

    if !state.config.disable_vcard {
        router = router.route("/vcard/{jid}", get(handlers::get_vcard));
    }

    if !state.config.disable_wkd {
        router = router
            .route(
                "/.well-known/openpgpkey/hu/{hash}",
                get(handlers::get_key_by_hash),
            )
            .route(
                "/.well-known/openpgpkey/hu/{domain}/{hash}",
                get(handlers::get_key_by_domain),
            )
            .route("/pks/add", post(handlers::post_key));
    }

    if !state.config.disable_avatar {
        // Literal routes above take priority over the capture.
        router = router.route("/{kind}/{hash}", get(handlers::get_image));
    }

    let cors = cors_layer(&state.config.cors_methods, &state.config.cors_origin);

    router
        .layer(middleware::from_fn(security_headers))
        .layer(cors)
        .layer(TimeoutLayer::new(HTTP_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(methods: &str, origins: &str) -> CorsLayer {
    let methods: Vec<Method> = methods
        .split_whitespace()
        .filter_map(|m| m.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(methods);

    // Credentials cannot be combined with a wildcard origin.
    if origins.trim() == "*" {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = origins
            .split_whitespace()
            .filter_map(|o| o.parse().ok())
            .collect();
        layer.allow_origin(origins).allow_credentials(true)
    }
}

async fn security_headers(req: Request, next: Next) -> Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();
    headers.insert("X-XSS-Protection", HeaderValue::from_static("1; mode=block"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    resp
}
