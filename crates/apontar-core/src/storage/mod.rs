//! Remote workbook stores.
//!
//! The reconciler only needs whole-file download and upload. Failures carry
//! a structured [`RemoteErrorKind`] so retry decisions never depend on the
//! wording of an error message.

mod graph;
mod local;

use std::fmt;

use chrono::NaiveDateTime;
use thiserror::Error;

pub use graph::{GraphConfig, GraphDriveStore, DEFAULT_GRAPH_BASE_URL};
pub use local::LocalFileStore;

use crate::util::split_remote_path;

/// Whole-file access to the shared workbook.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Fetch the current content of `path`.
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError>;

    /// Replace the content of `path`.
    ///
    /// With `overwrite == false` an existing file is a `VersionConflict`.
    async fn upload(&self, path: &str, content: &[u8], overwrite: bool)
        -> Result<(), RemoteError>;
}

/// Store chosen at runtime from configuration.
#[derive(Debug, Clone)]
pub enum AnyStore {
    Local(LocalFileStore),
    Graph(GraphDriveStore),
}

impl RemoteStore for AnyStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        match self {
            Self::Local(store) => store.download(path).await,
            Self::Graph(store) => store.download(path).await,
        }
    }

    async fn upload(&self, path: &str, content: &[u8], overwrite: bool) -> Result<(), RemoteError> {
        match self {
            Self::Local(store) => store.upload(path, content, overwrite).await,
            Self::Graph(store) => store.upload(path, content, overwrite).await,
        }
    }
}

/// Failure classes reported by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteErrorKind {
    NotFound,
    Unauthorized,
    /// The file changed or is locked by another editor.
    VersionConflict,
    RateLimited,
    Transport,
}

impl RemoteErrorKind {
    /// Signals that another writer or the service's throttling got in the way.
    #[must_use]
    pub const fn is_contention(self) -> bool {
        matches!(self, Self::VersionConflict | Self::RateLimited)
    }

    /// Map an HTTP status code to a failure class.
    #[must_use]
    pub const fn from_http_status(status: u16) -> Self {
        match status {
            404 | 410 => Self::NotFound,
            401 | 403 => Self::Unauthorized,
            409 | 412 | 423 => Self::VersionConflict,
            429 | 503 => Self::RateLimited,
            _ => Self::Transport,
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::NotFound => "not found",
            Self::Unauthorized => "unauthorized",
            Self::VersionConflict => "version conflict",
            Self::RateLimited => "rate limited",
            Self::Transport => "transport error",
        }
    }
}

impl fmt::Display for RemoteErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A failed store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct RemoteError {
    pub kind: RemoteErrorKind,
    /// HTTP status when the failure came from an HTTP response.
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }

    /// Build from an HTTP status, classifying it.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: RemoteErrorKind::from_http_status(status),
            status: Some(status),
            message: message.into(),
        }
    }

    #[must_use]
    pub const fn is_contention(&self) -> bool {
        self.kind.is_contention()
    }
}

/// Path used for the pre-merge backup written when an anomaly is detected.
///
/// `QA/apontamentos.xlsx` becomes `QA/apontamentos.backup-20240131T101500.xlsx`.
#[must_use]
pub fn backup_path(path: &str, at: NaiveDateTime) -> String {
    let (folder, file_name) = split_remote_path(path);
    let (stem, ext) = file_name.rsplit_once('.').unwrap_or((file_name, "xlsx"));
    let backup_name = format!("{stem}.backup-{}.{ext}", at.format("%Y%m%dT%H%M%S"));
    if folder.is_empty() {
        backup_name
    } else {
        format!("{folder}/{backup_name}")
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn http_status_classification() {
        assert_eq!(RemoteErrorKind::from_http_status(404), RemoteErrorKind::NotFound);
        assert_eq!(RemoteErrorKind::from_http_status(403), RemoteErrorKind::Unauthorized);
        for status in [409, 412, 423] {
            assert_eq!(
                RemoteErrorKind::from_http_status(status),
                RemoteErrorKind::VersionConflict
            );
        }
        assert_eq!(RemoteErrorKind::from_http_status(429), RemoteErrorKind::RateLimited);
        assert_eq!(RemoteErrorKind::from_http_status(500), RemoteErrorKind::Transport);
    }

    #[test]
    fn only_conflicts_and_throttling_are_contention() {
        assert!(RemoteErrorKind::VersionConflict.is_contention());
        assert!(RemoteErrorKind::RateLimited.is_contention());
        assert!(!RemoteErrorKind::NotFound.is_contention());
        assert!(!RemoteErrorKind::Unauthorized.is_contention());
        assert!(!RemoteErrorKind::Transport.is_contention());
    }

    #[test]
    fn backup_path_keeps_folder_and_extension() {
        let at = NaiveDate::from_ymd_opt(2024, 1, 31)
            .unwrap()
            .and_hms_opt(10, 15, 0)
            .unwrap();
        assert_eq!(
            backup_path("/QA/apontamentos.xlsx", at),
            "QA/apontamentos.backup-20240131T101500.xlsx"
        );
        assert_eq!(
            backup_path("dados", at),
            "dados.backup-20240131T101500.xlsx"
        );
    }
}
