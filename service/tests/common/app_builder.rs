//! Test app builder that mirrors main.rs wiring with injectable mocks.
//!
//! # Usage
//!
//! ```ignore
//! use crate::common::app_builder::TestAppBuilder;
//!
//! #[tokio::test]
//! async fn test_with_full_app() {
//!     let app = TestAppBuilder::new()
//!         .with_profile(MockProfileClient::returning("Adele Vance"))
//!         .build();
//!
//!     // Use app.router.clone().oneshot(...) to send requests
//! }
//! ```

use std::sync::Arc;

use axum::{
    http::{header::COOKIE, HeaderValue},
    Router,
};
use hello_service::{
    auth::mock::MockIdentityProvider,
    config::{SecurityHeadersConfig, SessionConfig},
    geo::{CountryLookup, NoCountryLookup},
    graph::mock::MockProfileClient,
    http::{app, AppState},
    repo::mock::MockSiteRepo,
    session::{SessionData, Sessions},
    telemetry::{mock::RecordingTelemetry, TelemetrySink},
    validator::HeaderValidator,
};

pub const BASE_URI: &str = "https://hello.example.com";
pub const LOGOUT_URL: &str =
    "https://login.example.com/contoso/oauth2/logout?post_logout_redirect_uri=https%3A%2F%2Fhello.example.com";
pub const SESSION_KEY: &str = "test-session-key-0123456789abcdef";
pub const COOKIE_NAME: &str = "hello_session";

/// A built app plus handles on its mocks for assertions.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MockSiteRepo>,
    pub identity: Arc<MockIdentityProvider>,
    pub profiles: Arc<MockProfileClient>,
    pub telemetry: Arc<RecordingTelemetry>,
    pub sessions: Sessions,
}

impl TestApp {
    /// Create a session holding `data` and return the matching `Cookie` header.
    pub async fn session_cookie(&self, data: SessionData) -> HeaderValue {
        let id = self.sessions.store.create(data).await;
        let value = format!("{COOKIE_NAME}={}", self.sessions.cookies.sign(&id));
        HeaderValue::from_str(&value).expect("cookie header")
    }

    /// Cookie for a visitor who has completed sign-in.
    pub async fn signed_in_cookie(&self, access_token: &str) -> HeaderValue {
        self.session_cookie(SessionData {
            state: None,
            access_token: Some(access_token.to_string()),
        })
        .await
    }

    /// Session data for the id carried by a `Cookie` header.
    pub async fn session_for(&self, cookie: &HeaderValue) -> Option<SessionData> {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(COOKIE, cookie.clone());
        self.sessions.load(&headers).await.map(|(_, data)| data)
    }
}

/// Builder for test applications that mirrors main.rs wiring.
pub struct TestAppBuilder {
    repo: MockSiteRepo,
    identity: MockIdentityProvider,
    profiles: MockProfileClient,
    countries: Arc<dyn CountryLookup>,
    with_telemetry: bool,
    security_headers: SecurityHeadersConfig,
}

impl Default for TestAppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TestAppBuilder {
    /// Mocks that succeed: an empty document table, a provider issuing
    /// `access-token`, and a Graph user named "Adele Vance".
    pub fn new() -> Self {
        Self {
            repo: MockSiteRepo::new(),
            identity: MockIdentityProvider::issuing("access-token"),
            profiles: MockProfileClient::returning("Adele Vance"),
            countries: Arc::new(NoCountryLookup),
            with_telemetry: true,
            security_headers: SecurityHeadersConfig::default(),
        }
    }

    pub fn with_repo(mut self, repo: MockSiteRepo) -> Self {
        self.repo = repo;
        self
    }

    pub fn with_identity(mut self, identity: MockIdentityProvider) -> Self {
        self.identity = identity;
        self
    }

    pub fn with_profile(mut self, profiles: MockProfileClient) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_countries(mut self, countries: Arc<dyn CountryLookup>) -> Self {
        self.countries = countries;
        self
    }

    pub fn without_telemetry(mut self) -> Self {
        self.with_telemetry = false;
        self
    }

    pub fn with_security_headers(mut self, config: SecurityHeadersConfig) -> Self {
        self.security_headers = config;
        self
    }

    pub fn build(self) -> TestApp {
        let repo = Arc::new(self.repo);
        let identity = Arc::new(self.identity);
        let profiles = Arc::new(self.profiles);
        let telemetry = Arc::new(RecordingTelemetry::new());

        let sessions = Sessions::from_config(&SessionConfig {
            secret_key: SESSION_KEY.to_string(),
            cookie_name: COOKIE_NAME.to_string(),
            secure_cookie: true,
            ..SessionConfig::default()
        })
        .expect("session config");

        let state = AppState {
            repo: repo.clone(),
            identity: identity.clone(),
            profiles: profiles.clone(),
            countries: self.countries,
            telemetry: self
                .with_telemetry
                .then(|| telemetry.clone() as Arc<dyn TelemetrySink>),
            sessions: sessions.clone(),
            validator: Arc::new(HeaderValidator::new()),
            base_uri: BASE_URI.to_string(),
            logout_url: LOGOUT_URL.to_string(),
        };

        let router = app(
            state,
            &self.security_headers,
            concat!(env!("CARGO_MANIFEST_DIR"), "/static"),
        );

        TestApp {
            router,
            repo,
            identity,
            profiles,
            telemetry,
            sessions,
        }
    }
}
