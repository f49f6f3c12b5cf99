//! Error responses for the page handlers.

use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use thiserror::Error;

use crate::graph::GraphError;
use crate::repo::RepoError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("storage error: {0}")]
    Repo(#[from] RepoError),

    #[error("profile lookup failed: {0}")]
    Graph(#[from] GraphError),

    #[error("template rendering failed: {0}")]
    Template(#[from] askama::Error),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Graph(_) => StatusCode::BAD_GATEWAY,
            Self::Repo(_) | Self::Template(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = if let Self::BadRequest(message) = &self {
            tracing::debug!(%message, "rejecting request");
            message.clone()
        } else {
            tracing::error!(error = %self, "request failed");
            status
                .canonical_reason()
                .unwrap_or("Error")
                .to_string()
        };
        (status, Html(askama_escape::escape(&body, askama_escape::Html).to_string())).into_response()
    }
}
