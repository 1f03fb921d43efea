//! # Application State Management
//!
//! Shared state threaded through every request handler: the backing store,
//! the configuration, and (in pull-through mode) the proxy cache. The state
//! is created once at server startup and shared via `Arc`; handlers hold no
//! other cross-request state.

use crate::config::Config;
use crate::proxy::ProxyCache;
use crate::storage::Storage;
use std::sync::Arc;

/// Application state containing shared configuration and resources.
///
/// `store` is the sole long-lived owner of committed artifacts and cached
/// objects. `proxy` is populated only when the upstream is enabled; its
/// presence switches the router into pull-through mode.
pub struct AppState {
    /// Backing object store (published artifacts and proxy cache alike)
    pub store: Arc<dyn Storage>,
    /// Application configuration
    pub config: Arc<Config>,
    /// Pull-through cache, present when `config.upstream.enabled`
    pub proxy: Option<ProxyCache>,
}
