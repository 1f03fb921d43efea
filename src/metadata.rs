//! Package metadata extraction from uploaded artifacts.
//!
//! Every supported upload is an archive carrying an embedded metadata
//! record: `PKG-INFO` for source distributions, `METADATA` for wheels and
//! eggs. The archive/compression scheme is picked once from the filename
//! suffix as an [`ArchiveFormat`]; each variant runs its own decompression
//! step and feeds the same entry scan, so every branch produces the same
//! [`PackageMetadata`] shape.

use std::io::{Cursor, Read};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::lzw;

/// Name and version read from the embedded metadata record.
///
/// Both fields are guaranteed non-empty; a record missing either is a hard
/// failure, never a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageMetadata {
    pub name: String,
    pub version: String,
}

/// Archive/compression scheme of an uploaded artifact, selected by filename
/// suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Tar,
    Zip,
    Wheel,
    Egg,
    TarGz,
    TarZ,
    TarBz2,
}

impl ArchiveFormat {
    pub fn from_filename(filename: &str) -> AppResult<Self> {
        if filename.ends_with(".tar") {
            Ok(ArchiveFormat::Tar)
        } else if filename.ends_with(".zip") {
            Ok(ArchiveFormat::Zip)
        } else if filename.ends_with(".whl") {
            Ok(ArchiveFormat::Wheel)
        } else if filename.ends_with(".egg") {
            Ok(ArchiveFormat::Egg)
        } else if filename.ends_with(".tar.gz") {
            Ok(ArchiveFormat::TarGz)
        } else if filename.ends_with(".tar.Z") {
            Ok(ArchiveFormat::TarZ)
        } else if filename.ends_with(".tar.bz2") {
            Ok(ArchiveFormat::TarBz2)
        } else {
            Err(AppError::UnsupportedArchiveType(filename.to_string()))
        }
    }
}

fn parse_failed(err: impl std::fmt::Display) -> AppError {
    AppError::ArchiveParseFailed(err.to_string())
}

/// Read the package metadata embedded in `bytes`.
///
/// The first archive entry whose name contains `PKG-INFO` or `METADATA` is
/// parsed as the record; exhausting all entries without one fails with
/// [`AppError::MetadataNotFound`]. Any I/O or decompression failure is
/// wrapped into [`AppError::ArchiveParseFailed`].
pub fn read_metadata(bytes: &[u8], filename: &str) -> AppResult<PackageMetadata> {
    let format = ArchiveFormat::from_filename(filename)?;
    debug!(filename = %filename, format = ?format, "Reading package metadata");
    let record = match format {
        ArchiveFormat::Tar => scan_tar(bytes)?,
        ArchiveFormat::Zip | ArchiveFormat::Wheel | ArchiveFormat::Egg => scan_zip(bytes)?,
        ArchiveFormat::TarGz => {
            let mut unpacked = Vec::new();
            GzDecoder::new(bytes)
                .read_to_end(&mut unpacked)
                .map_err(parse_failed)?;
            scan_tar(&unpacked)?
        }
        ArchiveFormat::TarBz2 => {
            let mut unpacked = Vec::new();
            BzDecoder::new(bytes)
                .read_to_end(&mut unpacked)
                .map_err(parse_failed)?;
            scan_tar(&unpacked)?
        }
        ArchiveFormat::TarZ => {
            let unpacked = lzw::decompress(bytes).map_err(parse_failed)?;
            scan_tar(&unpacked)?
        }
    };
    match record {
        Some(text) => PackageMetadata::from_record(&text),
        None => Err(AppError::MetadataNotFound),
    }
}

/// Scan tar entries for the metadata record. Directories and entries whose
/// data cannot be read are skipped.
fn scan_tar(bytes: &[u8]) -> AppResult<Option<String>> {
    let mut archive = tar::Archive::new(Cursor::new(bytes));
    for entry in archive.entries().map_err(parse_failed)? {
        let mut entry = match entry {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if entry.header().entry_type().is_dir() {
            continue;
        }
        let name = match entry.path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(_) => continue,
        };
        if name.contains("PKG-INFO") || name.contains("METADATA") {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(parse_failed)?;
            return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
        }
    }
    Ok(None)
}

/// Scan zip entries (also wheels and eggs) for the metadata record.
fn scan_zip(bytes: &[u8]) -> AppResult<Option<String>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).map_err(parse_failed)?;
    for index in 0..archive.len() {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(_) => continue,
        };
        if entry.is_dir() {
            continue;
        }
        if entry.name().contains("PKG-INFO") || entry.name().contains("METADATA") {
            let mut data = Vec::new();
            entry.read_to_end(&mut data).map_err(parse_failed)?;
            return Ok(Some(String::from_utf8_lossy(&data).into_owned()));
        }
    }
    Ok(None)
}

impl PackageMetadata {
    /// Parse the line-oriented `Key: value` record. Only line-prefix
    /// matching is required; the first `Name:` and `Version:` lines win.
    pub fn from_record(text: &str) -> AppResult<Self> {
        let name = Self::field(text, "Name:").ok_or(AppError::MetadataFieldNotFound("Name"))?;
        let version =
            Self::field(text, "Version:").ok_or(AppError::MetadataFieldNotFound("Version"))?;
        Ok(PackageMetadata { name, version })
    }

    fn field(text: &str, prefix: &str) -> Option<String> {
        text.lines()
            .find(|line| line.starts_with(prefix))
            .map(|line| line[prefix.len()..].trim().to_string())
            .filter(|value| !value.is_empty())
    }
}
