//! Page and sign-in handlers.

use std::{net::SocketAddr, time::Instant};

use askama::Template;
use axum::{
    extract::{ConnectInfo, Query, Request},
    http::{
        header::{LOCATION, SET_COOKIE},
        request::Parts,
        HeaderMap, StatusCode,
    },
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Extension, Router,
};
use rand::seq::SliceRandom;
use serde::Deserialize;
use uuid::Uuid;

use super::{AppError, AppState};
use crate::analytics::capture_visitor;
use crate::graph::GraphError;
use crate::models::Document;
use crate::session::SessionData;
use crate::telemetry::{millis, TelemetrySink};

pub const DB_WRITE_METRIC: &str = "PostgreSQL Database Write Time";
pub const DB_READ_METRIC: &str = "PostgreSQL Database Read Time";
pub const RESPONSE_TIME_METRIC: &str = "Request Response Time";

/// Body of the load-balancer probe endpoint.
pub const HELLO_BODY: &str = "Hello World Security App";

/// Routes of the site. Static files and security headers are layered on by
/// [`super::app`].
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/login", get(login))
        .route("/token", get(token))
        .route("/logout", get(logout))
        .route("/hello", get(hello))
        .route("/health", get(health_check))
        .layer(Extension(state))
}

/// A document as shown on the index page. Fields were escaped when stored.
pub struct DocumentCard {
    pub title: String,
    pub url: String,
    pub category: String,
    pub class: &'static str,
}

impl From<&Document> for DocumentCard {
    fn from(document: &Document) -> Self {
        Self {
            title: document.title.clone().unwrap_or_default(),
            url: document.url.clone().unwrap_or_default(),
            category: document.category.clone().unwrap_or_default(),
            class: document.category_class(),
        }
    }
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub user_name: String,
    pub documents: Vec<DocumentCard>,
}

#[derive(Template)]
#[template(path = "intermediate.html")]
pub struct IntermediateTemplate {
    pub logout_url: String,
}

/// GET / -- signed-in landing page listing the documents in random order.
pub async fn index(
    Extension(state): Extension<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, _body) = request.into_parts();

    let Some((session_id, access_token)) = signed_in(&state, &parts.headers).await else {
        return Ok(Redirect::temporary(&state.login_uri()).into_response());
    };

    let user = match state.profiles.me(&access_token).await {
        Ok(user) => user,
        Err(GraphError::Unauthorized) => {
            tracing::info!("access token rejected by Graph, signing in again");
            state
                .sessions
                .store
                .update(&session_id, |data| data.access_token = None)
                .await;
            return Ok(Redirect::temporary(&state.login_uri()).into_response());
        }
        Err(err) => return Err(err.into()),
    };

    let started = Instant::now();
    record_visit(&state, &parts).await;

    let read_started = Instant::now();
    let mut documents = state.repo.list_documents().await?;
    let read_time = read_started.elapsed();
    documents.shuffle(&mut rand::thread_rng());

    if let Some(telemetry) = &state.telemetry {
        telemetry.track_metric(RESPONSE_TIME_METRIC, millis(started.elapsed()));
        telemetry.track_metric(DB_READ_METRIC, millis(read_time));
        flush(telemetry.as_ref()).await;
    }

    let page = IndexTemplate {
        user_name: user.name().to_string(),
        documents: documents.iter().map(DocumentCard::from).collect(),
    };
    Ok(Html(page.render()?).into_response())
}

/// Session id and access token of a signed-in visitor.
async fn signed_in(state: &AppState, headers: &HeaderMap) -> Option<(String, String)> {
    let (id, data) = state.sessions.load(headers).await?;
    let token = data.access_token.filter(|token| !token.is_empty())?;
    Some((id, token))
}

/// Store the visitor row. Failures are reported but never fail the page.
async fn record_visit(state: &AppState, parts: &Parts) {
    let remote_ip = parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let visitor = capture_visitor(
        &state.validator,
        state.countries.as_ref(),
        remote_ip,
        &parts.headers,
    );

    let write_started = Instant::now();
    let result = state.repo.save_visitor(&visitor).await;
    let write_time = write_started.elapsed();

    match (result, &state.telemetry) {
        (Ok(()), Some(telemetry)) => telemetry.track_metric(DB_WRITE_METRIC, millis(write_time)),
        (Ok(()), None) => {}
        (Err(err), telemetry) => {
            tracing::error!(error = %err, "failed to record visitor");
            if let Some(telemetry) = telemetry {
                telemetry.track_exception("RepoError", &err.to_string());
                flush(telemetry.as_ref()).await;
            }
        }
    }
}

async fn flush(telemetry: &dyn TelemetrySink) {
    if let Err(err) = telemetry.flush().await {
        tracing::warn!(error = %err, "failed to flush telemetry");
    }
}

/// GET /login -- start the authorization-code flow with a fresh state.
pub async fn login(Extension(state): Extension<AppState>, headers: HeaderMap) -> Response {
    let auth_state = Uuid::new_v4().to_string();
    let mut response = Redirect::temporary(&state.identity.authorization_url(&auth_state))
        .into_response();

    let updated = match state.sessions.cookies.session_id(&headers) {
        Some(id) => {
            state
                .sessions
                .store
                .update(&id, |data| data.state = Some(auth_state.clone()))
                .await
        }
        None => false,
    };

    if !updated {
        let id = state
            .sessions
            .store
            .create(SessionData {
                state: Some(auth_state),
                access_token: None,
            })
            .await;
        if let Some(cookie) = state.sessions.cookies.set_cookie(&id) {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
    }

    response
}

#[derive(Debug, Deserialize)]
pub struct TokenParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

/// GET /token -- identity provider callback. Redeems the code and returns
/// the browser to the landing page.
pub async fn token(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<TokenParams>,
) -> Result<Response, AppError> {
    let (Some(code), Some(returned_state)) = (params.code, params.state) else {
        return Err(AppError::BadRequest(
            "Missing code or state parameter".to_string(),
        ));
    };

    let session = state.sessions.load(&headers).await;
    if let Some((_, SessionData {
        state: Some(expected),
        ..
    })) = &session
    {
        if *expected != returned_state {
            return Err(AppError::BadRequest("State does not match".to_string()));
        }
    }

    let mut response = found(&state.base_uri);

    match state.identity.exchange_code(&code).await {
        Ok(access_token) => {
            let stored = match &session {
                Some((id, _)) => {
                    state
                        .sessions
                        .store
                        .update(id, |data| data.access_token = Some(access_token.clone()))
                        .await
                }
                None => false,
            };
            if !stored {
                let id = state
                    .sessions
                    .store
                    .create(SessionData {
                        state: None,
                        access_token: Some(access_token),
                    })
                    .await;
                if let Some(cookie) = state.sessions.cookies.set_cookie(&id) {
                    response.headers_mut().append(SET_COOKIE, cookie);
                }
            }
            tracing::info!("user signed in");
        }
        Err(err) => {
            tracing::warn!(error = %err, "authorization code exchange failed");
            if let Some((id, _)) = &session {
                state.sessions.store.remove(id).await;
            }
            if let Some(cookie) = state.sessions.cookies.removal_cookie() {
                response.headers_mut().append(SET_COOKIE, cookie);
            }
        }
    }

    Ok(response)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// GET /logout -- drop the session and hand over to the identity provider.
pub async fn logout(
    Extension(state): Extension<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    if let Some(id) = state.sessions.cookies.session_id(&headers) {
        state.sessions.store.remove(&id).await;
    }

    let page = IntermediateTemplate {
        logout_url: state.logout_url.clone(),
    };
    let mut response = Html(page.render()?).into_response();
    if let Some(cookie) = state.sessions.cookies.removal_cookie() {
        response.headers_mut().append(SET_COOKIE, cookie);
    }
    Ok(response)
}

pub async fn hello() -> &'static str {
    HELLO_BODY
}

pub async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}
