//! Microsoft Graph profile lookup for the signed-in user.

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

const CLIENT_USER_AGENT: &str = concat!("hello-service/", env!("CARGO_PKG_VERSION"));

/// Errors that can occur when calling Graph.
#[derive(Debug, Error)]
pub enum GraphError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The access token was rejected (expired or revoked)
    #[error("access token rejected")]
    Unauthorized,

    /// Graph returned an error response
    #[error("Graph error: {status} - {message}")]
    Api { status: u16, message: String },
}

/// The subset of the Graph `user` resource shown on the page.
///
/// Any other properties Graph returns are kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphUser {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub surname: Option<String>,
    #[serde(default)]
    pub mail: Option<String>,
    #[serde(default)]
    pub user_principal_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GraphUser {
    /// Best available name for greeting the user.
    #[must_use]
    pub fn name(&self) -> &str {
        self.display_name
            .as_deref()
            .or(self.given_name.as_deref())
            .or(self.user_principal_name.as_deref())
            .unwrap_or("there")
    }
}

#[async_trait]
pub trait ProfileClient: Send + Sync {
    /// Fetch the profile of the user owning `access_token`.
    async fn me(&self, access_token: &str) -> Result<GraphUser, GraphError>;
}

pub struct HttpGraphClient {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpGraphClient {
    /// `endpoint` is the full `/me` URL, e.g. `https://graph.microsoft.com/v1.0/me/`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), endpoint)
    }

    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ProfileClient for HttpGraphClient {
    async fn me(&self, access_token: &str) -> Result<GraphUser, GraphError> {
        let response = self
            .client
            .get(&self.endpoint)
            .bearer_auth(access_token)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .header("client-request-id", Uuid::new_v4().to_string())
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(GraphError::Unauthorized);
        }

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GraphError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(any(test, feature = "test-utils"))]
#[allow(
    clippy::unwrap_used,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
pub mod mock {
    //! Mock implementation for unit testing.

    use super::{GraphError, GraphUser, ProfileClient};
    use async_trait::async_trait;
    use std::sync::Mutex;

    enum Outcome {
        User(GraphUser),
        Unauthorized,
        Failure(u16),
    }

    /// Returns a fixed user, or a fixed error.
    pub struct MockProfileClient {
        outcome: Outcome,
        tokens: Mutex<Vec<String>>,
    }

    impl MockProfileClient {
        fn with_outcome(outcome: Outcome) -> Self {
            Self {
                outcome,
                tokens: Mutex::new(Vec::new()),
            }
        }

        pub fn returning(display_name: &str) -> Self {
            Self::with_outcome(Outcome::User(GraphUser {
                display_name: Some(display_name.to_string()),
                ..GraphUser::default()
            }))
        }

        /// Reject every token as expired.
        pub fn unauthorized() -> Self {
            Self::with_outcome(Outcome::Unauthorized)
        }

        /// Fail every call with the given HTTP status.
        pub fn failing(status: u16) -> Self {
            Self::with_outcome(Outcome::Failure(status))
        }

        /// Access tokens presented so far.
        pub fn tokens(&self) -> Vec<String> {
            self.tokens.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProfileClient for MockProfileClient {
        async fn me(&self, access_token: &str) -> Result<GraphUser, GraphError> {
            self.tokens.lock().unwrap().push(access_token.to_string());
            match &self.outcome {
                Outcome::User(user) => Ok(user.clone()),
                Outcome::Unauthorized => Err(GraphError::Unauthorized),
                Outcome::Failure(status) => Err(GraphError::Api {
                    status: *status,
                    message: "service unavailable".into(),
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_graph_user_and_keeps_extra_fields() {
        let json = r#"{
            "@odata.context": "https://graph.microsoft.com/v1.0/$metadata#users/$entity",
            "id": "87d349ed-44d7-43e1-9a83-5f2406dee5bd",
            "displayName": "Adele Vance",
            "givenName": "Adele",
            "surname": "Vance",
            "mail": "AdeleV@contoso.com",
            "userPrincipalName": "AdeleV@contoso.com",
            "officeLocation": "18/2111"
        }"#;

        let user: GraphUser = serde_json::from_str(json).expect("should parse");
        assert_eq!(user.display_name.as_deref(), Some("Adele Vance"));
        assert_eq!(user.job_title, None);
        assert_eq!(user.extra.get("officeLocation"), Some(&serde_json::json!("18/2111")));
        assert_eq!(user.name(), "Adele Vance");
    }

    #[test]
    fn name_falls_back_through_available_fields() {
        let user = GraphUser {
            user_principal_name: Some("upn@contoso.com".into()),
            ..GraphUser::default()
        };
        assert_eq!(user.name(), "upn@contoso.com");
        assert_eq!(GraphUser::default().name(), "there");
    }
}
