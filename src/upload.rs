//! Artifact intake: decode, stage, extract, validate, commit.
//!
//! One upload runs through a fixed sequence of steps and ends either
//! Committed (`201 Created`) or Rejected (`400`). The decoded bytes are
//! staged under a scratch key before metadata is known; every failure past
//! that point deletes the staged key before surfacing the error, and a
//! successful commit relocates it, so no scratch key outlives its request.
//!
//! Validation cross-checks the declared filename against the embedded
//! metadata rather than trusting either side alone: a file whose contents
//! disagree with its name would otherwise land under another project's
//! namespace.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::multipart::{self, FilePart};
use crate::state::AppState;
use crate::storage::{Key, Storage, STAGING_PREFIX};
use crate::{metadata, naming, validate_filename};

/// Run the upload pipeline for one request.
///
/// `path` is the request path the client published to; it becomes the
/// leading segments of the committed key, ahead of the canonical project
/// name and the original filename.
pub async fn process(
    state: &AppState,
    path: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> AppResult<StatusCode> {
    // Decoding
    let part = multipart::decode(headers, body)?;
    validate_filename(&part.filename)?;
    info!(filename = %part.filename, size = part.bytes.len(), "Processing artifact upload");

    // Staging: scratch key in the backing store, outside the public namespace
    let scratch_name = format!("{}-{}", Uuid::new_v4(), part.filename);
    let staged = Key::from_segments([STAGING_PREFIX, scratch_name.as_str()]);
    state.store.put(&staged, &part.bytes).await?;

    // Commit relocates the staged bytes; every other exit deletes them.
    let outcome = match validate(path, &part) {
        Ok(destination) => state
            .store
            .rename(&staged, &destination)
            .await
            .map(|()| destination),
        Err(err) => Err(err),
    };
    match outcome {
        Ok(destination) => {
            info!(key = %destination, "Artifact committed");
            Ok(StatusCode::CREATED)
        }
        Err(err) => {
            if let Err(cleanup) = state.store.delete(&staged).await {
                warn!(key = %staged, error = %cleanup, "Failed to clean up staged upload");
            }
            Err(err)
        }
    }
}

/// Metadata extraction and validation; returns the final storage key.
fn validate(path: &str, part: &FilePart) -> AppResult<Key> {
    // MetadataExtraction
    let meta = metadata::read_metadata(&part.bytes, &part.filename)?;

    // Validation: canonical names must agree, versions compare literally
    let descriptor = naming::parse_filename(&part.filename)?;
    let canonical = naming::canonicalize(&meta.name)?;
    if naming::canonicalize(&descriptor.name)? != canonical
        || descriptor.version != meta.version
    {
        warn!(
            filename = %part.filename,
            metadata_name = %meta.name,
            metadata_version = %meta.version,
            "Upload rejected, filename does not match metadata"
        );
        return Err(AppError::FilenameMetadataMismatch);
    }

    let base = Key::from_path(path)?;
    Ok(base.join(&canonical).join(&part.filename))
}
