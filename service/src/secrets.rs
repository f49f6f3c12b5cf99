//! Secret retrieval from Azure Key Vault.
//!
//! The vault is reached with a managed-identity token, so no credentials are
//! needed on disk. [`SecretStore`] is the seam the configuration layer uses;
//! [`HttpVaultClient`] is the real implementation and
//! [`mock::MockSecretStore`] backs unit tests.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::VaultConfig;

const VAULT_RESOURCE: &str = "https://vault.azure.net";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Errors that can occur when reading a secret.
#[derive(Debug, Error)]
pub enum SecretError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Managed identity token could not be acquired
    #[error("managed identity token unavailable: {0}")]
    Token(String),

    /// Secret does not exist in the vault
    #[error("secret not found: {0}")]
    NotFound(String),

    /// Vault returned an error response
    #[error("vault error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// Read-only access to named secrets.
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a secret's current value, or a specific version of it.
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, SecretError>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

/// Key Vault client authenticated with the host's managed identity.
///
/// The identity token is fetched on first use and reused for the lifetime of
/// the client; secrets are only read during startup.
pub struct HttpVaultClient {
    client: reqwest::Client,
    vault_uri: String,
    identity_endpoint: String,
    identity_header: Option<String>,
    api_version: String,
    token: OnceCell<String>,
}

impl HttpVaultClient {
    pub fn new(vault_uri: impl Into<String>, config: &VaultConfig) -> Self {
        Self::with_client(reqwest::Client::new(), vault_uri, config)
    }

    /// Build a client from configuration, if a vault URI is configured.
    #[must_use]
    pub fn from_config(config: &VaultConfig) -> Option<Self> {
        config
            .uri
            .as_deref()
            .filter(|uri| !uri.is_empty())
            .map(|uri| Self::new(uri, config))
    }

    /// Create a client with a custom `reqwest::Client` (for testing with custom config).
    pub fn with_client(
        client: reqwest::Client,
        vault_uri: impl Into<String>,
        config: &VaultConfig,
    ) -> Self {
        Self {
            client,
            vault_uri: vault_uri.into().trim_end_matches('/').to_string(),
            identity_endpoint: config.identity_endpoint.clone(),
            identity_header: config.identity_header.clone(),
            api_version: config.api_version.clone(),
            token: OnceCell::new(),
        }
    }

    async fn access_token(&self) -> Result<&str, SecretError> {
        self.token
            .get_or_try_init(|| self.fetch_token())
            .await
            .map(String::as_str)
    }

    async fn fetch_token(&self) -> Result<String, SecretError> {
        let request = match &self.identity_header {
            Some(header) => self
                .client
                .get(&self.identity_endpoint)
                .query(&[
                    ("api-version", APP_SERVICE_API_VERSION),
                    ("resource", VAULT_RESOURCE),
                ])
                .header("X-IDENTITY-HEADER", header),
            None => self
                .client
                .get(&self.identity_endpoint)
                .query(&[
                    ("api-version", IMDS_API_VERSION),
                    ("resource", VAULT_RESOURCE),
                ])
                .header("Metadata", "true"),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SecretError::Token(format!("{}: {message}", status.as_u16())));
        }

        let token: TokenResponse = response.json().await?;
        tracing::debug!("acquired managed identity token for key vault");
        Ok(token.access_token)
    }
}

#[async_trait]
impl SecretStore for HttpVaultClient {
    async fn get_secret(&self, name: &str, version: Option<&str>) -> Result<String, SecretError> {
        let token = self.access_token().await?;

        let url = match version.filter(|v| !v.is_empty()) {
            Some(v) => format!("{}/secrets/{name}/{v}", self.vault_uri),
            None => format!("{}/secrets/{name}", self.vault_uri),
        };

        let response = self
            .client
            .get(&url)
            .query(&[("api-version", self.api_version.as_str())])
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(SecretError::NotFound(name.to_string()));
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SecretError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let bundle: SecretBundle = response.json().await?;
        tracing::info!(secret = name, "loaded secret from key vault");
        Ok(bundle.value)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub mod mock {
    //! In-memory secret store for unit testing.

    use super::{SecretError, SecretStore};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Serves secrets from a map and records every name requested.
    #[derive(Default)]
    pub struct MockSecretStore {
        secrets: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl MockSecretStore {
        pub fn new() -> Self {
            Self::default()
        }

        #[must_use]
        pub fn with_secret(mut self, name: &str, value: &str) -> Self {
            self.secrets.insert(name.to_string(), value.to_string());
            self
        }

        /// Names passed to `get_secret`, in call order.
        pub fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SecretStore for MockSecretStore {
        async fn get_secret(
            &self,
            name: &str,
            _version: Option<&str>,
        ) -> Result<String, SecretError> {
            self.requested.lock().unwrap().push(name.to_string());
            self.secrets
                .get(name)
                .cloned()
                .ok_or_else(|| SecretError::NotFound(name.to_string()))
        }
    }
}
