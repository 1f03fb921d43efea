//! Pull-through caching against an upstream package index.
//!
//! [`ProxyCache`] resolves a GET-style lookup by fetching from an
//! [`Origin`] and persisting successful responses in the backing store
//! under a key derived from the request path. Artifact paths are kept
//! byte-for-byte so later re-fetches by exact name hit the same key; index
//! paths have their last segment canonicalized so differently-spelled
//! requests for one project converge on one cache entry.
//!
//! A failed origin fetch never touches a previously cached value: the cache
//! is only ever overwritten by a successful fetch. What the *client* sees
//! on origin failure is configurable (`stale_read_through`).

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};
use crate::naming;
use crate::storage::{Key, Storage};

/// One upstream response: status, headers, fully-read body.
#[derive(Debug, Clone)]
pub struct OriginResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Origin-fetch capability consumed by [`ProxyCache`].
///
/// Transport-level failures are `Err`; an unsuccessful HTTP status is a
/// normal `Ok` response and the caller decides what to do with it.
#[async_trait]
pub trait Origin: Send + Sync {
    async fn fetch(&self, path: &str) -> AppResult<OriginResponse>;
}

/// HTTP client for the upstream package index.
pub struct HttpOrigin {
    client: Client,
    base: Url,
}

impl HttpOrigin {
    /// Create a new upstream client with the given configuration.
    pub fn new(config: &UpstreamConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("pypi-depot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::InternalError(format!("Failed to create HTTP client: {e}")))?;
        let base = Url::parse(&config.url)
            .map_err(|e| AppError::InternalError(format!("Invalid upstream URL: {e}")))?;
        Ok(Self { client, base })
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn fetch(&self, path: &str) -> AppResult<OriginResponse> {
        let url = self.base.join(path).map_err(|e| {
            AppError::BadRequest(format!("cannot resolve {path} against upstream: {e}"))
        })?;
        debug!(url = %url, "Fetching from upstream");

        let response = self.client.get(url.clone()).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Upstream fetch failed");
            AppError::UpstreamUnavailable(e.to_string())
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(e.to_string()))?;
        debug!(status = %status, size = body.len(), "Upstream responded");
        Ok(OriginResponse {
            status,
            headers,
            body,
        })
    }
}

/// Pull-through cache over the backing store.
///
/// No de-duplication of concurrent lookups is attempted: N concurrent
/// requests for an uncached key trigger N origin fetches and N overwrites
/// of the same storage key, last write wins.
pub struct ProxyCache {
    origin: std::sync::Arc<dyn Origin>,
    stale_read_through: bool,
}

impl ProxyCache {
    pub fn new(origin: std::sync::Arc<dyn Origin>, stale_read_through: bool) -> Self {
        Self {
            origin,
            stale_read_through,
        }
    }

    /// Cache key for a request path.
    ///
    /// Artifact filenames round-trip unmodified; for index paths the last
    /// segment is canonicalized.
    pub fn derive_key(path: &str) -> AppResult<Key> {
        if naming::is_artifact_path(path) {
            return Key::from_path(path);
        }
        let key = Key::from_path(path)?;
        if key.is_empty() {
            return Ok(key);
        }
        let normalized = naming::canonicalize(key.last_part())?;
        let parent = key
            .as_str()
            .rsplit_once('/')
            .map(|(head, _)| head.to_string())
            .unwrap_or_default();
        Ok(Key::from_segments([parent.as_str(), normalized.as_str()]))
    }

    /// Serve one lookup: fetch from origin, cache on success, mirror the
    /// origin's own failure otherwise.
    pub async fn handle(&self, store: &dyn Storage, path: &str) -> AppResult<Response> {
        let key = Self::derive_key(path)?;
        match self.origin.fetch(path).await {
            Ok(origin) if origin.status.is_success() => {
                store.put(&key, &origin.body).await?;
                info!(key = %key, size = origin.body.len(), "Cached upstream response");
                let content_type = origin
                    .headers
                    .get(header::CONTENT_TYPE)
                    .cloned()
                    .unwrap_or_else(|| guessed_content_type(path));
                Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, content_type)],
                    origin.body,
                )
                    .into_response())
            }
            Ok(origin) => {
                warn!(path = %path, status = %origin.status, "Upstream returned failure");
                if self.stale_read_through && store.exists(&key).await? {
                    info!(key = %key, "Serving stale cached value after upstream failure");
                    let cached = store.get(&key).await?;
                    return Ok((
                        StatusCode::OK,
                        [(header::CONTENT_TYPE, guessed_content_type(path))],
                        cached,
                    )
                        .into_response());
                }
                // Mirror the origin's status and headers verbatim; the
                // cache entry, if any, stays untouched.
                let mut response = Response::builder().status(origin.status);
                if let Some(headers) = response.headers_mut() {
                    headers.extend(origin.headers.clone());
                }
                response
                    .body(Body::empty())
                    .map_err(|e| AppError::InternalError(e.to_string()))
            }
            Err(err) => {
                if self.stale_read_through && store.exists(&key).await? {
                    info!(key = %key, "Serving stale cached value, upstream unreachable");
                    let cached = store.get(&key).await?;
                    return Ok((
                        StatusCode::OK,
                        [(header::CONTENT_TYPE, guessed_content_type(path))],
                        cached,
                    )
                        .into_response());
                }
                Err(err)
            }
        }
    }
}

/// Content type when the origin supplied none: artifact downloads are form
/// payloads to pip, anything else is an index page.
fn guessed_content_type(path: &str) -> HeaderValue {
    if naming::is_artifact_path(path) {
        HeaderValue::from_static("multipart/form-data")
    } else {
        HeaderValue::from_static("text/html")
    }
}
