use std::path::PathBuf;
use thiserror::Error;

use crate::core::update::UpdateStage;

/// Central error type for the whole update engine.
/// Every module returns `Result<T, UpdaterError>`.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Not enough free space at {path:?}: available={available} required={required}")]
    InsufficientDiskSpace {
        path: PathBuf,
        available: u64,
        required: u64,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request to {url} failed: HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Nothing published at {url}: HTTP {status}")]
    NotFound { url: String, status: u16 },

    #[error("Digest mismatch for {asset}: expected {expected}, got {actual}")]
    DigestMismatch {
        asset: String,
        expected: String,
        actual: String,
    },

    // ── Registry payload ────────────────────────────────
    #[error("Malformed release payload from {url}: {source}")]
    Parse {
        url: String,
        source: serde_json::Error,
    },

    #[error("Asset name {name:?} is not a plain file name")]
    UnsafeAssetName { name: String },

    // ── Archive ─────────────────────────────────────────
    #[error("Cannot expand archive {path:?}: {source}")]
    CorruptArchive {
        path: PathBuf,
        source: zip::result::ZipError,
    },

    #[error("Archive {archive:?} has an entry escaping the extraction root: {entry}")]
    UnsafeArchiveEntry { archive: PathBuf, entry: String },

    #[error("Release {tag} has no archive asset to extract")]
    NoArchiveAsset { tag: String },

    // ── Reconciliation ──────────────────────────────────
    #[error("{} file(s) failed to land in the installation directory: {}", .failed.len(), .failed.join(", "))]
    PartialCopy { failed: Vec<String> },

    #[error("Helper {program:?} exited with code {code:?}")]
    HelperFailed { program: PathBuf, code: Option<i32> },

    // ── Settings store ──────────────────────────────────
    #[error("XML parse error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("Invalid settings: {0}")]
    Config(String),

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

/// Coarse failure classes the caller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    NotFound,
    Parse,
    Io,
    CorruptArchive,
    PartialCopy,
}

impl UpdaterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdaterError::Network(_)
            | UpdaterError::HttpStatus { .. }
            | UpdaterError::DigestMismatch { .. } => ErrorKind::Network,
            UpdaterError::NotFound { .. } => ErrorKind::NotFound,
            UpdaterError::Parse { .. } | UpdaterError::UnsafeAssetName { .. } => ErrorKind::Parse,
            UpdaterError::CorruptArchive { .. }
            | UpdaterError::UnsafeArchiveEntry { .. }
            | UpdaterError::NoArchiveAsset { .. } => ErrorKind::CorruptArchive,
            UpdaterError::PartialCopy { .. } | UpdaterError::HelperFailed { .. } => {
                ErrorKind::PartialCopy
            }
            UpdaterError::Io { .. }
            | UpdaterError::InsufficientDiskSpace { .. }
            | UpdaterError::Xml(_)
            | UpdaterError::Config(_)
            | UpdaterError::Other(_) => ErrorKind::Io,
        }
    }

    /// Names of the files that did not land, if this is a partial copy.
    pub fn failed_files(&self) -> &[String] {
        match self {
            UpdaterError::PartialCopy { failed } => failed,
            _ => &[],
        }
    }
}

/// A run that stopped in `stage`. The installed-version marker is left
/// untouched whenever this is returned.
#[derive(Debug, Error)]
#[error("update failed while {stage}: {error}")]
pub struct PipelineError {
    pub stage: UpdateStage,
    #[source]
    pub error: UpdaterError,
}

impl PipelineError {
    pub fn new(stage: UpdateStage, error: UpdaterError) -> Self {
        Self { stage, error }
    }

    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_copy_lists_failed_files() {
        let err = UpdaterError::PartialCopy {
            failed: vec!["a.dll".into(), "b.addin".into()],
        };
        assert_eq!(err.kind(), ErrorKind::PartialCopy);
        assert_eq!(err.failed_files(), &["a.dll".to_string(), "b.addin".to_string()]);
        assert_eq!(
            err.to_string(),
            "2 file(s) failed to land in the installation directory: a.dll, b.addin"
        );
    }

    #[test]
    fn status_errors_are_classified() {
        let not_found = UpdaterError::NotFound {
            url: "https://example.com".into(),
            status: 404,
        };
        let server = UpdaterError::HttpStatus {
            url: "https://example.com".into(),
            status: 502,
        };
        assert_eq!(not_found.kind(), ErrorKind::NotFound);
        assert_eq!(server.kind(), ErrorKind::Network);
    }

    #[test]
    fn pipeline_error_names_the_stage() {
        let err = PipelineError::new(
            UpdateStage::Extracting,
            UpdaterError::NoArchiveAsset { tag: "v2".into() },
        );
        assert_eq!(err.kind(), ErrorKind::CorruptArchive);
        assert_eq!(
            err.to_string(),
            "update failed while extracting: Release v2 has no archive asset to extract"
        );
    }
}
