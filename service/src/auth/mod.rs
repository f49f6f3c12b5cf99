//! Sign-in through the external identity provider.

mod azure;

use async_trait::async_trait;
pub use azure::AzureAdProvider;

/// Errors from the authorization-code flow.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid OAuth configuration: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The identity provider refused the code exchange.
    #[error("token request rejected: {status} - {message}")]
    Rejected { status: u16, message: String },
}

/// An OAuth2 identity provider using the authorization-code grant.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to, carrying `state` for CSRF protection.
    fn authorization_url(&self, state: &str) -> String;

    /// Redeem an authorization code for an access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AuthError>;
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Mock implementation for unit testing.

    use super::{AuthError, IdentityProvider};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Identity provider returning a fixed token, or rejecting every code.
    pub struct MockIdentityProvider {
        token: Option<String>,
        exchanged_codes: Mutex<Vec<String>>,
    }

    impl MockIdentityProvider {
        /// Accept every code and return `token`.
        pub fn issuing(token: &str) -> Self {
            Self {
                token: Some(token.to_string()),
                exchanged_codes: Mutex::new(Vec::new()),
            }
        }

        /// Reject every code exchange.
        pub fn rejecting() -> Self {
            Self {
                token: None,
                exchanged_codes: Mutex::new(Vec::new()),
            }
        }

        /// Codes passed to `exchange_code`.
        pub fn exchanged_codes(&self) -> Vec<String> {
            self.exchanged_codes.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IdentityProvider for MockIdentityProvider {
        fn authorization_url(&self, state: &str) -> String {
            format!("https://idp.example.com/authorize?state={state}")
        }

        async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
            self.exchanged_codes.lock().unwrap().push(code.to_string());
            self.token.clone().ok_or_else(|| AuthError::Rejected {
                status: 400,
                message: "invalid_grant".into(),
            })
        }
    }
}
