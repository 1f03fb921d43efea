//! Request routing: an ordered rule table, first match wins.
//!
//! Every request lands in one catch-all [`dispatch`] handler which walks
//! the table in declaration order. A rule is a conjunction of HTTP method,
//! an optional full-match path pattern, and an optional `Content-Type`
//! prefix. No rule matching falls back to `404` for GET and `405` for
//! everything else. With an upstream configured the table collapses to
//! GET → pull-through cache.

use std::sync::{Arc, OnceLock};

use axum::body::to_bytes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{AppError, AppResult};
use crate::naming;
use crate::state::AppState;
use crate::storage::{Key, Storage};
use crate::{index, upload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Handler {
    Download,
    Upload,
    Search,
    Listing,
    Redirect,
}

struct Rule {
    method: Method,
    path: Option<Regex>,
    content_type_prefix: Option<&'static str>,
    handler: Handler,
}

impl Rule {
    fn matches(&self, method: &Method, path: &str, headers: &HeaderMap) -> bool {
        if *method != self.method {
            return false;
        }
        if let Some(pattern) = &self.path {
            if !pattern.is_match(path) {
                return false;
            }
        }
        if let Some(prefix) = self.content_type_prefix {
            let content_type = headers
                .get(header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            if !content_type.starts_with(prefix) {
                return false;
            }
        }
        true
    }
}

fn full_match(pattern: &str) -> Regex {
    Regex::new(&format!("^(?:{pattern})$"))
        .unwrap_or_else(|e| panic!("Failed to compile route pattern {pattern}: {}", e))
}

fn rules() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(|| {
        vec![
            Rule {
                method: Method::GET,
                path: Some(full_match(
                    r".*\.(whl|tar\.gz|zip|tar\.bz2|tar\.Z|tar|egg)",
                )),
                content_type_prefix: None,
                handler: Handler::Download,
            },
            Rule {
                method: Method::POST,
                path: None,
                content_type_prefix: Some("multipart"),
                handler: Handler::Upload,
            },
            Rule {
                method: Method::POST,
                path: None,
                content_type_prefix: Some("text"),
                handler: Handler::Search,
            },
            Rule {
                method: Method::GET,
                path: Some(full_match(r"/|.*/[a-z0-9\-]+/?")),
                content_type_prefix: None,
                handler: Handler::Listing,
            },
            Rule {
                method: Method::GET,
                path: None,
                content_type_prefix: None,
                handler: Handler::Redirect,
            },
        ]
    })
}

/// Catch-all request handler walking the rule table.
pub async fn dispatch(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let method = parts.method.clone();
    let path = parts.uri.path().to_string();
    let headers = parts.headers;

    let body = match to_bytes(body, state.config.limits.max_upload_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            return AppError::BadRequest(format!("failed to read request body: {err}"))
                .into_response()
        }
    };

    // Pull-through mode forwards every GET to the cache.
    if let Some(proxy) = &state.proxy {
        if method == Method::GET {
            debug!(path = %path, "Routing to pull-through cache");
            return match proxy.handle(state.store.as_ref(), &path).await {
                Ok(response) => response,
                Err(err) => err.into_response(),
            };
        }
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    for rule in rules() {
        if rule.matches(&method, &path, &headers) {
            debug!(method = %method, path = %path, handler = ?rule.handler, "Route matched");
            return run(rule.handler, &state, &path, &headers, &body)
                .await
                .unwrap_or_else(IntoResponse::into_response);
        }
    }

    if method == Method::GET {
        StatusCode::NOT_FOUND.into_response()
    } else {
        StatusCode::METHOD_NOT_ALLOWED.into_response()
    }
}

async fn run(
    handler: Handler,
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> AppResult<Response> {
    match handler {
        Handler::Download => download(state, path).await,
        Handler::Upload => {
            let status = upload::process(state, path, headers, body).await?;
            Ok(status.into_response())
        }
        Handler::Search => Ok(search_stub()),
        Handler::Listing => Ok(index::listing(state, path).await?.into_response()),
        Handler::Redirect => redirect(path, headers),
    }
}

async fn download(state: &AppState, path: &str) -> AppResult<Response> {
    let key = Key::from_path(path)?;
    crate::validate_filename(key.last_part())?;
    info!(key = %key, "Serving artifact download");
    let data = state.store.get(&key).await?;
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/octet-stream")],
        data,
    )
        .into_response())
}

/// `301` to the canonical spelling of the requested project path. An
/// `X-FullPath` header, when present, supplies the externally visible path
/// to rewrite instead of the local one.
fn redirect(path: &str, headers: &HeaderMap) -> AppResult<Response> {
    let trimmed = path.trim_end_matches('/');
    let last = trimmed.rsplit('/').next().unwrap_or("");
    let normalized = naming::canonicalize(last)?;
    let full_path = headers
        .get("x-fullpath")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(path);
    let location = match full_path.trim_end_matches('/').rsplit_once('/') {
        Some((head, _)) => format!("{head}/{normalized}"),
        None => format!("/{normalized}"),
    };
    info!(path = %path, location = %location, "Redirecting to canonical project path");
    Ok((
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, location)],
    )
        .into_response())
}

/// Legacy XML-RPC search endpoint: a stubbed empty result set.
fn search_stub() -> Response {
    const EMPTY: &str = "<methodResponse>\n<params>\n<param>\n<value><array><data>\n</data></array></value>\n</param>\n</params>\n</methodResponse>";
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/xml")], EMPTY).into_response()
}
