//! Project-name canonicalization and artifact filename parsing.
//!
//! PEP 503 allows only ASCII letters, digits, `.`, `-` and `_` in a project
//! name; the canonical form is lowercase with every run of `.`, `-`, `_`
//! collapsed to a single `-`. Uploaded filenames follow one of two grammars:
//! the generic archive form `<name>-<version>.<ext>` and the wheel form
//! `<name>-<version>(-<build>)?-<pytag>-<abitag>-<platformtag>.whl`.

use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

/// Name and version as declared by an artifact filename, before any
/// canonicalization of the name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilenameDescriptor {
    pub name: String,
    pub version: String,
}

fn valid_name_regex() -> &'static Regex {
    static VALID_NAME: OnceLock<Regex> = OnceLock::new();
    VALID_NAME.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._-]+$")
            .unwrap_or_else(|e| panic!("Failed to compile project name regex: {}", e))
    })
}

fn separator_run_regex() -> &'static Regex {
    static SEPARATOR_RUN: OnceLock<Regex> = OnceLock::new();
    SEPARATOR_RUN.get_or_init(|| {
        Regex::new(r"[-_.]+")
            .unwrap_or_else(|e| panic!("Failed to compile name normalization regex: {}", e))
    })
}

/// The version capture is intentionally permissive (digits, lowercase
/// letters, dots) so pre-release suffixes like `0.2rc1` pass; it is not a
/// formal version grammar.
fn archive_filename_regex() -> &'static Regex {
    static ARCHIVE: OnceLock<Regex> = OnceLock::new();
    ARCHIVE.get_or_init(|| {
        Regex::new(r"^(?P<name>.*)-(?P<version>[0-9a-z.]+?)\.(?P<ext>tar\.gz|tar\.bz2|tar\.Z|tar|zip|egg)$")
            .unwrap_or_else(|e| panic!("Failed to compile archive filename regex: {}", e))
    })
}

/// Wheel filename convention per PEP 427.
fn wheel_filename_regex() -> &'static Regex {
    static WHEEL: OnceLock<Regex> = OnceLock::new();
    WHEEL.get_or_init(|| {
        Regex::new(r"^(?P<name>.*?)-(?P<version>[0-9a-z.]+)(-\d+)?-((py\d.?)+)-(.*)-(.*)\.whl$")
            .unwrap_or_else(|e| panic!("Failed to compile wheel filename regex: {}", e))
    })
}

fn artifact_path_regex() -> &'static Regex {
    static ARTIFACT_PATH: OnceLock<Regex> = OnceLock::new();
    ARTIFACT_PATH.get_or_init(|| {
        Regex::new(r"^.*\.(whl|tar\.gz|zip|tar\.bz2|tar\.Z|tar|egg)$")
            .unwrap_or_else(|e| panic!("Failed to compile artifact path regex: {}", e))
    })
}

/// Does this request path name an artifact file rather than an index page?
pub fn is_artifact_path(path: &str) -> bool {
    artifact_path_regex().is_match(path)
}

/// Canonicalize a project name according to PEP 503.
///
/// Fails with [`AppError::InvalidName`] unless the input consists solely of
/// ASCII letters, digits, `.`, `-` and `_`. Canonicalization is idempotent:
/// `canonicalize(canonicalize(x)) == canonicalize(x)`.
///
/// # Examples
///
/// ```
/// # use pypi_depot::naming::canonicalize;
/// assert_eq!(canonicalize("My_Perfect_Python").unwrap(), "my-perfect-python");
/// assert_eq!(canonicalize("some._-Project").unwrap(), "some-project");
/// ```
pub fn canonicalize(raw: &str) -> AppResult<String> {
    if !valid_name_regex().is_match(raw) {
        return Err(AppError::InvalidName(raw.to_string()));
    }
    Ok(separator_run_regex()
        .replace_all(&raw.to_lowercase(), "-")
        .to_string())
}

/// Parse name and version out of a bare artifact filename.
///
/// The wheel grammar applies when the filename ends with `.whl`, the generic
/// archive grammar otherwise. The returned name is NOT canonicalized; callers
/// compare it against embedded metadata via [`canonicalize`].
pub fn parse_filename(filename: &str) -> AppResult<FilenameDescriptor> {
    let pattern = if filename.ends_with(".whl") {
        wheel_filename_regex()
    } else {
        archive_filename_regex()
    };
    let captures = pattern
        .captures(filename)
        .ok_or_else(|| AppError::InvalidFilename(filename.to_string()))?;
    Ok(FilenameDescriptor {
        name: captures["name"].to_string(),
        version: captures["version"].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_collapses_separator_runs() {
        assert_eq!(
            canonicalize("My_Perfect_Python").unwrap(),
            "my-perfect-python"
        );
        assert_eq!(canonicalize("some._-Project").unwrap(), "some-project");
        assert_eq!(canonicalize("Another_project").unwrap(), "another-project");
        assert_eq!(
            canonicalize("Django-REST-framework").unwrap(),
            "django-rest-framework"
        );
    }

    #[test]
    fn canonicalize_is_idempotent() {
        for raw in ["My_Perfect_Python", "some._-Project", "a1...b2__c3"] {
            let once = canonicalize(raw).unwrap();
            assert_eq!(canonicalize(&once).unwrap(), once);
        }
    }

    #[test]
    fn canonicalize_rejects_foreign_characters() {
        assert!(matches!(
            canonicalize("pkg name"),
            Err(AppError::InvalidName(_))
        ));
        assert!(matches!(canonicalize("pkg/é"), Err(AppError::InvalidName(_))));
        assert!(matches!(canonicalize(""), Err(AppError::InvalidName(_))));
    }

    #[test]
    fn parse_sdist_filename() {
        let desc = parse_filename("abc-0.1.tar.gz").unwrap();
        assert_eq!(desc.name, "abc");
        assert_eq!(desc.version, "0.1");
    }

    #[test]
    fn parse_keeps_raw_name_spelling() {
        let desc = parse_filename("My_Perfect_Python-1.0.tar.gz").unwrap();
        assert_eq!(desc.name, "My_Perfect_Python");
        assert_eq!(desc.version, "1.0");
    }

    #[test]
    fn parse_wheel_filename() {
        let desc = parse_filename("0Ther--Pr0ject-0.2.3-py2-none-any.whl").unwrap();
        assert_eq!(desc.name, "0Ther--Pr0ject");
        assert_eq!(desc.version, "0.2.3");
    }

    #[test]
    fn parse_wheel_with_build_tag() {
        let desc = parse_filename("sample_pkg-2.0-1-py3-none-any.whl").unwrap();
        assert_eq!(desc.name, "sample_pkg");
        assert_eq!(desc.version, "2.0");
    }

    #[test]
    fn parse_prerelease_version() {
        let desc = parse_filename("depot-testpkg-0.0.3rc1.tar.gz").unwrap();
        assert_eq!(desc.name, "depot-testpkg");
        assert_eq!(desc.version, "0.0.3rc1");
    }

    #[test]
    fn parse_rejects_versionless_filename() {
        assert!(matches!(
            parse_filename("noversion.tar.gz"),
            Err(AppError::InvalidFilename(_))
        ));
        assert!(matches!(
            parse_filename("strange.whl"),
            Err(AppError::InvalidFilename(_))
        ));
    }

    #[test]
    fn parse_rejects_unknown_extension() {
        assert!(matches!(
            parse_filename("abc-0.1.rar"),
            Err(AppError::InvalidFilename(_))
        ));
    }

    #[test]
    fn artifact_paths_by_suffix() {
        for path in [
            "/My.Project.whl",
            "/a/b/pkg-1.0.tar.gz",
            "/x.zip",
            "/x.tar.bz2",
            "/x.tar.Z",
            "/x.tar",
            "/x.egg",
        ] {
            assert!(is_artifact_path(path), "{path}");
        }
        assert!(!is_artifact_path("/simple/my-project/"));
        assert!(!is_artifact_path("/x.tar.br"));
    }

    #[test]
    fn parsed_egg_and_zip_extensions() {
        assert_eq!(parse_filename("proj-1.2.egg").unwrap().version, "1.2");
        assert_eq!(parse_filename("proj-1.2.zip").unwrap().version, "1.2");
        assert_eq!(parse_filename("proj-1.2.tar.Z").unwrap().version, "1.2");
    }
}
