//! Dependencies shared by every handler.

use std::sync::Arc;

use crate::auth::IdentityProvider;
use crate::geo::CountryLookup;
use crate::graph::ProfileClient;
use crate::repo::SiteRepo;
use crate::session::Sessions;
use crate::telemetry::TelemetrySink;
use crate::validator::HeaderValidator;

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn SiteRepo>,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileClient>,
    pub countries: Arc<dyn CountryLookup>,
    /// `None` when no instrumentation key is configured.
    pub telemetry: Option<Arc<dyn TelemetrySink>>,
    pub sessions: Sessions,
    pub validator: Arc<HeaderValidator>,
    /// Scheme, host and port this app is served from.
    pub base_uri: String,
    /// Identity provider sign-out URL.
    pub logout_url: String,
}

impl AppState {
    /// `{base_uri}/login`
    #[must_use]
    pub fn login_uri(&self) -> String {
        format!("{}/login", self.base_uri)
    }
}
