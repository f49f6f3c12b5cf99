//! HTTP layer: route handlers, shared state and middleware.

pub mod error;
pub mod handlers;
pub mod security;
pub mod state;

use axum::{middleware, Extension, Router};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use error::AppError;
pub use handlers::router;
pub use security::{build_security_headers, security_headers_middleware};
pub use state::AppState;

use crate::config::SecurityHeadersConfig;

/// The complete application: routes, `/static` files, request tracing and
/// security headers.
pub fn app(state: AppState, security: &SecurityHeadersConfig, static_dir: &str) -> Router {
    let mut app = router(state)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http());

    if security.enabled {
        tracing::info!("Security headers enabled");
        app = app
            .layer(middleware::from_fn(security_headers_middleware))
            .layer(Extension(build_security_headers(security)));
    } else {
        tracing::info!("Security headers disabled");
    }

    app
}
