//! Object-store contract and the filesystem-backed implementation.
//!
//! The adapter core only ever talks to a [`Storage`] in terms of [`Key`]s —
//! ordered `/`-joined segments. The published-artifact store and the proxy
//! cache are the same backing store, keyed identically. [`FsStorage`] maps
//! keys onto a data directory with `tokio::fs`; any other object store can
//! be dropped in behind the trait.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{AppError, AppResult};

/// Scratch area for uploads in flight; never listed, never public.
pub const STAGING_PREFIX: &str = ".staging";

/// An object-store key: ordered path segments joined by `/`, never rooted.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Key(String);

impl Key {
    pub fn root() -> Self {
        Key(String::new())
    }

    /// Build a key from a request path. Leading and trailing slashes are
    /// dropped; parent-directory segments are rejected.
    pub fn from_path(path: &str) -> AppResult<Self> {
        let trimmed = path.trim_matches('/');
        if trimmed.split('/').any(|segment| segment == "..") {
            return Err(AppError::BadRequest(format!(
                "path contains parent directory reference: {path}"
            )));
        }
        Ok(Key(trimmed.to_string()))
    }

    pub fn from_segments<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = segments
            .into_iter()
            .map(|s| s.as_ref().trim_matches('/').to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("/");
        Key(joined)
    }

    pub fn join(&self, segment: &str) -> Self {
        if self.0.is_empty() {
            Key(segment.to_string())
        } else {
            Key(format!("{}/{}", self.0, segment))
        }
    }

    /// Last path segment: the filename for artifact keys, the project name
    /// for listing keys.
    pub fn last_part(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Minimal capability set the adapter core consumes from a backing store.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn put(&self, key: &Key, data: &[u8]) -> AppResult<()>;
    async fn get(&self, key: &Key) -> AppResult<Vec<u8>>;
    async fn exists(&self, key: &Key) -> AppResult<bool>;
    /// Move, not copy: `src` is gone afterwards.
    async fn rename(&self, src: &Key, dst: &Key) -> AppResult<()>;
    async fn delete(&self, key: &Key) -> AppResult<()>;
    /// All keys under `prefix`, sorted. The staging area is never listed.
    async fn list(&self, prefix: &Key) -> AppResult<Vec<Key>>;
}

/// Filesystem-backed [`Storage`] rooted at a data directory.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_of(&self, key: &Key) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key.as_str().split('/').filter(|s| !s.is_empty()) {
            path.push(segment);
        }
        path
    }

    fn key_of(&self, path: &Path) -> Option<Key> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let segments: Vec<String> = relative
            .components()
            .filter_map(|component| match component {
                Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                _ => None,
            })
            .collect();
        Some(Key::from_segments(segments))
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn put(&self, key: &Key, data: &[u8]) -> AppResult<()> {
        let path = self.path_of(key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, data).await?;
        info!(key = %key, size = data.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, key: &Key) -> AppResult<Vec<u8>> {
        let path = self.path_of(key);
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                warn!(key = %key, "Object not found");
                Err(AppError::NotFound(format!("no such key: {key}")))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn exists(&self, key: &Key) -> AppResult<bool> {
        Ok(fs::try_exists(self.path_of(key)).await?)
    }

    async fn rename(&self, src: &Key, dst: &Key) -> AppResult<()> {
        let src_path = self.path_of(src);
        let dst_path = self.path_of(dst);
        if let Some(parent) = dst_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        match fs::rename(&src_path, &dst_path).await {
            Ok(()) => {}
            Err(_) => {
                // Cross-device move: fall back to copy + delete.
                fs::copy(&src_path, &dst_path).await?;
                fs::remove_file(&src_path).await?;
            }
        }
        debug!(src = %src, dst = %dst, "Moved object");
        Ok(())
    }

    async fn delete(&self, key: &Key) -> AppResult<()> {
        match fs::remove_file(self.path_of(key)).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn list(&self, prefix: &Key) -> AppResult<Vec<Key>> {
        let start = self.path_of(prefix);
        if !fs::try_exists(&start).await? {
            return Ok(Vec::new());
        }
        let mut pending = vec![start];
        let mut keys = Vec::new();
        while let Some(dir) = pending.pop() {
            let mut entries = fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_of(&path) {
                    if !key.as_str().starts_with(STAGING_PREFIX) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
