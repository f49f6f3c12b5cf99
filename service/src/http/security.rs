//! Security headers middleware for HTTP responses.
//!
//! Every response leaving the app carries caching, framing, sniffing, XSS and
//! transport-security directives built once from configuration.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, STRICT_TRANSPORT_SECURITY,
            X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS, X_XSS_PROTECTION,
        },
        HeaderMap, HeaderName, HeaderValue,
    },
    middleware::Next,
    response::Response,
    Extension,
};

use crate::config::SecurityHeadersConfig;

/// Build security headers from configuration.
///
/// Returns an `Arc`-wrapped `HeaderMap` that can be shared across requests
/// via Axum's `Extension` layer. Empty configured values omit their header.
#[must_use]
pub fn build_security_headers(config: &SecurityHeadersConfig) -> Arc<HeaderMap> {
    let mut headers = HeaderMap::new();

    // X-Content-Type-Options: nosniff (always)
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

    // X-XSS-Protection (legacy but still useful for older browsers)
    headers.insert(X_XSS_PROTECTION, HeaderValue::from_static("1; mode=block"));

    insert_configured(&mut headers, X_FRAME_OPTIONS, &config.frame_options);
    insert_configured(&mut headers, CACHE_CONTROL, &config.cache_control);
    insert_configured(
        &mut headers,
        CONTENT_SECURITY_POLICY,
        &config.content_security_policy,
    );
    insert_configured(&mut headers, REFERRER_POLICY, &config.referrer_policy);

    // HSTS (only if enabled - should only be used with HTTPS)
    if config.hsts_enabled {
        let hsts_value = if config.hsts_include_subdomains {
            format!("max-age={}; includeSubDomains", config.hsts_max_age)
        } else {
            format!("max-age={}", config.hsts_max_age)
        };
        insert_configured(&mut headers, STRICT_TRANSPORT_SECURITY, &hsts_value);
    }

    Arc::new(headers)
}

fn insert_configured(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    if value.is_empty() {
        return;
    }
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::warn!(header = %name, "ignoring invalid security header value"),
    }
}

/// Middleware to add security headers to all responses.
///
/// Reads the pre-built `HeaderMap` from an `Extension` and overwrites the
/// matching response headers. Add it as the outermost layer so static files
/// and error responses are covered too.
pub async fn security_headers_middleware(
    Extension(headers): Extension<Arc<HeaderMap>>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let response_headers = response.headers_mut();
    for (k, v) in headers.iter() {
        response_headers.insert(k.clone(), v.clone());
    }
    response
}
