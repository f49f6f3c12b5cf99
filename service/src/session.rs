//! Server-side browser sessions.
//!
//! Session data stays in memory; the browser only holds the session id,
//! signed with HMAC-SHA256 so ids cannot be forged or guessed into.

use axum::http::{header::COOKIE, HeaderMap, HeaderValue};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use cookie::{Cookie, SameSite};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::SessionConfig;

type HmacSha256 = Hmac<Sha256>;

/// Per-visitor data kept between requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    /// OAuth `state` issued by the last `/login`.
    pub state: Option<String>,
    /// Access token for the Graph resource.
    pub access_token: Option<String>,
}

#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    max_entries: usize,
    entries: Arc<RwLock<HashMap<String, SessionEntry>>>,
}

struct SessionEntry {
    data: SessionData,
    touched_at: Instant,
}

impl SessionStore {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            ttl,
            max_entries,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Store `data` under a new random id and return the id.
    ///
    /// At capacity, the least recently touched session is evicted first.
    pub async fn create(&self, data: SessionData) -> String {
        let id = Uuid::new_v4().simple().to_string();
        let mut entries = self.entries.write().await;
        Self::prune_expired(self.ttl, &mut entries);
        while entries.len() >= self.max_entries.max(1) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, entry)| entry.touched_at)
                .map(|(key, _)| key.clone())
            else {
                break;
            };
            tracing::debug!("session store full; evicting least recently used");
            entries.remove(&oldest);
        }
        entries.insert(
            id.clone(),
            SessionEntry {
                data,
                touched_at: Instant::now(),
            },
        );
        id
    }

    /// Fetch the session if it is present and unexpired, extending its lifetime.
    pub async fn get(&self, id: &str) -> Option<SessionData> {
        let mut entries = self.entries.write().await;
        Self::prune_expired(self.ttl, &mut entries);
        entries.get_mut(id).map(|entry| {
            entry.touched_at = Instant::now();
            entry.data.clone()
        })
    }

    /// Apply `f` to a live session. Returns false if the session is gone.
    pub async fn update<F>(&self, id: &str, f: F) -> bool
    where
        F: FnOnce(&mut SessionData),
    {
        let mut entries = self.entries.write().await;
        Self::prune_expired(self.ttl, &mut entries);
        match entries.get_mut(id) {
            Some(entry) => {
                f(&mut entry.data);
                entry.touched_at = Instant::now();
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn remove(&self, id: &str) {
        self.entries.write().await.remove(id);
    }

    fn prune_expired(ttl: Duration, entries: &mut HashMap<String, SessionEntry>) {
        let now = Instant::now();
        entries.retain(|_, entry| now.duration_since(entry.touched_at) <= ttl);
    }
}

/// Signs session ids into cookies and reads them back.
#[derive(Clone)]
pub struct SessionCookies {
    mac: HmacSha256,
    name: String,
    secure: bool,
}

impl SessionCookies {
    /// # Errors
    /// Returns an error if the key cannot be used as an HMAC key.
    pub fn new(
        secret_key: &[u8],
        name: impl Into<String>,
        secure: bool,
    ) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret_key)?,
            name: name.into(),
            secure,
        })
    }

    fn signature(&self, id: &str) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.finalize().into_bytes().to_vec()
    }

    /// `id.signature` cookie value.
    #[must_use]
    pub fn sign(&self, id: &str) -> String {
        format!("{id}.{}", URL_SAFE_NO_PAD.encode(self.signature(id)))
    }

    /// Return the session id if `value` carries a valid signature.
    #[must_use]
    pub fn verify(&self, value: &str) -> Option<String> {
        let (id, signature) = value.rsplit_once('.')?;
        let signature = URL_SAFE_NO_PAD.decode(signature).ok()?;
        let mut mac = self.mac.clone();
        mac.update(id.as_bytes());
        mac.verify_slice(&signature).ok()?;
        Some(id.to_string())
    }

    /// Extract a verified session id from request cookies.
    #[must_use]
    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(Cookie::split_parse)
            .filter_map(Result::ok)
            .find(|cookie| cookie.name() == self.name)
            .and_then(|cookie| self.verify(cookie.value()))
    }

    /// `Set-Cookie` value establishing the session.
    #[must_use]
    pub fn set_cookie(&self, id: &str) -> Option<HeaderValue> {
        let cookie = Cookie::build((self.name.clone(), self.sign(id)))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }

    /// `Set-Cookie` value that deletes the session cookie.
    #[must_use]
    pub fn removal_cookie(&self) -> Option<HeaderValue> {
        let mut cookie = Cookie::build((self.name.clone(), ""))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .build();
        cookie.make_removal();
        HeaderValue::from_str(&cookie.to_string()).ok()
    }
}

/// Session store plus cookie codec, shared by the handlers.
#[derive(Clone)]
pub struct Sessions {
    pub store: SessionStore,
    pub cookies: SessionCookies,
}

impl Sessions {
    /// # Errors
    /// Returns an error if the configured secret key is unusable.
    pub fn from_config(config: &SessionConfig) -> Result<Self, hmac::digest::InvalidLength> {
        Ok(Self {
            store: SessionStore::new(
                Duration::from_secs(config.ttl_secs),
                config.max_sessions,
            ),
            cookies: SessionCookies::new(
                config.secret_key.as_bytes(),
                config.cookie_name.clone(),
                config.secure_cookie,
            )?,
        })
    }

    /// The request's live session, if any.
    pub async fn load(&self, headers: &HeaderMap) -> Option<(String, SessionData)> {
        let id = self.cookies.session_id(headers)?;
        let data = self.store.get(&id).await?;
        Some((id, data))
    }
}
