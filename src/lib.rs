//! # pypi-depot
//!
//! A repository-protocol adapter that lets a generic object store serve as
//! a package index speaking the PyPI "Simple Repository" protocol: it
//! renders per-project listing pages, accepts uploads from publishing
//! tools, and can run as a caching pull-through mirror of an upstream
//! index.
//!
//! ## Key Modules
//!
//! - [`naming`]: PEP 503 canonicalization and artifact filename grammars
//! - [`multipart`]: upload body decoding
//! - [`metadata`]: embedded `PKG-INFO`/`METADATA` extraction from seven
//!   archive encodings
//! - [`upload`]: the decode → stage → extract → validate → commit pipeline
//! - [`proxy`]: pull-through caching against an upstream index
//! - [`routes`]: the ordered request-routing table
//! - [`storage`]: the object-store contract and its filesystem backend
//!
//! ## Usage
//!
//! The main entry point is the server binary, but the library exposes the
//! naming, metadata, and storage utilities for independent use.

// Module declarations
pub mod config;
pub mod error;
pub mod index;
pub mod lzw;
pub mod metadata;
pub mod multipart;
pub mod naming;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;
pub mod storage;
pub mod upload;

// Re-export key types for convenience
pub use config::Config;
pub use error::{ApiErrorResponse, AppError, AppResult, ErrorCode};
pub use server::{app, run_server};
pub use state::AppState;
pub use storage::{FsStorage, Key, Storage};

/// Calculate SHA256 hash of data.
///
/// Returns the digest as a lowercase hexadecimal string, as used in the
/// `#sha256=` fragments of listing links.
///
/// # Examples
///
/// ```
/// # use pypi_depot::sha256_hash;
/// let hash = sha256_hash(b"hello world");
/// assert_eq!(hash.len(), 64); // SHA256 produces 64 hex characters
/// ```
pub fn sha256_hash(data: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Validates a filename to prevent path traversal attacks.
///
/// Applied to every client-supplied filename before it is used as a storage
/// key segment.
///
/// # Errors
///
/// Returns an error if the filename:
/// - Is empty or longer than 255 characters
/// - Contains `..`, null bytes, or control characters
/// - Starts with `/` or `\` (absolute paths)
///
/// # Examples
///
/// ```
/// # use pypi_depot::validate_filename;
/// assert!(validate_filename("pkg-1.0.tar.gz").is_ok());
/// assert!(validate_filename("../etc/passwd").is_err());
/// assert!(validate_filename("/absolute/path").is_err());
/// ```
pub fn validate_filename(filename: &str) -> Result<(), AppError> {
    const MAX_FILENAME_LENGTH: usize = 255;

    if filename.is_empty() {
        tracing::warn!("Empty filename provided");
        return Err(AppError::BadRequest("Filename cannot be empty".to_string()));
    }

    if filename.len() > MAX_FILENAME_LENGTH {
        tracing::warn!(filename = %filename, length = %filename.len(), "Filename too long");
        return Err(AppError::BadRequest(format!(
            "Filename too long: {} characters (max: {})",
            filename.len(),
            MAX_FILENAME_LENGTH
        )));
    }

    if filename.contains('\0') {
        tracing::warn!(filename = %filename, "Null byte detected in filename");
        return Err(AppError::BadRequest(
            "Filename contains null byte".to_string(),
        ));
    }

    if filename.chars().any(|c| c.is_control()) {
        tracing::warn!(filename = %filename, "Control character detected in filename");
        return Err(AppError::BadRequest(
            "Filename contains control characters".to_string(),
        ));
    }

    if filename.contains("..") {
        tracing::warn!(filename = %filename, "Path traversal attempt detected (..)");
        return Err(AppError::BadRequest(
            "Filename contains parent directory reference (..)".to_string(),
        ));
    }

    if filename.starts_with('/') || filename.starts_with('\\') {
        tracing::warn!(filename = %filename, "Absolute path detected");
        return Err(AppError::BadRequest(
            "Filename cannot be an absolute path".to_string(),
        ));
    }

    if filename.contains('/') || filename.contains('\\') {
        tracing::warn!(filename = %filename, "Path separator detected in filename");
        return Err(AppError::BadRequest(
            "Filename cannot contain path separators".to_string(),
        ));
    }

    Ok(())
}
