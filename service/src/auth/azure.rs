use crate::config::OAuthConfig;
use async_trait::async_trait;
use oauth2::{basic::BasicClient, AuthUrl, ClientId, ClientSecret, CsrfToken, RedirectUrl, TokenUrl};
use serde::Deserialize;
use std::time::Duration;

use super::{AuthError, IdentityProvider};

/// Azure AD (v1 endpoint) authorization-code flow.
///
/// The v1 endpoint scopes tokens by `resource` rather than by scope, so the
/// resource is sent on both the authorize and the token request.
#[derive(Clone)]
pub struct AzureAdProvider {
    client: BasicClient,
    http: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    resource: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl AzureAdProvider {
    /// Build the provider from configuration.
    ///
    /// # Errors
    /// Returns an error if the authority or redirect URLs are malformed.
    pub fn new(config: &OAuthConfig) -> Result<Self, AuthError> {
        Self::with_client(reqwest::Client::new(), config)
    }

    /// Create a provider with a custom `reqwest::Client`.
    ///
    /// # Errors
    /// Returns an error if the authority or redirect URLs are malformed.
    pub fn with_client(http: reqwest::Client, config: &OAuthConfig) -> Result<Self, AuthError> {
        let authority = config.authority_url();
        let token_url = format!("{authority}/oauth2/token");

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            AuthUrl::new(format!("{authority}/oauth2/authorize"))
                .map_err(|e| AuthError::Config(e.to_string()))?,
            Some(TokenUrl::new(token_url.clone()).map_err(|e| AuthError::Config(e.to_string()))?),
        )
        .set_redirect_uri(
            RedirectUrl::new(config.redirect_uri.clone())
                .map_err(|e| AuthError::Config(e.to_string()))?,
        );

        Ok(Self {
            client,
            http,
            token_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            resource: config.resource.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for AzureAdProvider {
    fn authorization_url(&self, state: &str) -> String {
        let state = state.to_string();
        let (auth_url, _csrf) = self
            .client
            .authorize_url(move || CsrfToken::new(state))
            .add_extra_param("resource", &self.resource)
            .url();
        auth_url.to_string()
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        // Token responses from the v1 endpoint encode numeric fields as
        // strings, so only the access token is read from the body.
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("resource", self.resource.as_str()),
            ])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<TokenErrorResponse>(&body).map_or(body, |e| {
                e.error_description
                    .map_or_else(|| e.error.clone(), |d| format!("{}: {d}", e.error))
            });
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let token = response.json::<TokenResponse>().await?;
        Ok(token.access_token)
    }
}
