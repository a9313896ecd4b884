//! Filesystem-backed store, used offline and in tests.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use super::{RemoteError, RemoteErrorKind, RemoteStore};

/// Stores workbooks under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a store path under the root, refusing to escape it.
    fn resolve(&self, path: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(RemoteError::new(
                RemoteErrorKind::Unauthorized,
                format!("Path '{path}' is outside the store root"),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl RemoteStore for LocalFileStore {
    async fn download(&self, path: &str) -> Result<Vec<u8>, RemoteError> {
        let full_path = self.resolve(path)?;
        tokio::fs::read(&full_path)
            .await
            .map_err(|error| io_error("read", &full_path, &error))
    }

    async fn upload(&self, path: &str, content: &[u8], overwrite: bool) -> Result<(), RemoteError> {
        let full_path = self.resolve(path)?;

        if !overwrite && tokio::fs::try_exists(&full_path).await.unwrap_or(false) {
            return Err(RemoteError::new(
                RemoteErrorKind::VersionConflict,
                format!("{} already exists", full_path.display()),
            ));
        }

        if let Some(parent) = full_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|error| io_error("create directory", parent, &error))?;
        }

        // Write beside the target and rename so readers never see a partial file.
        let staging = full_path.with_extension("partial");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|error| io_error("write", &staging, &error))?;
        tokio::fs::rename(&staging, &full_path)
            .await
            .map_err(|error| io_error("rename", &full_path, &error))?;

        Ok(())
    }
}

fn io_error(operation: &str, path: &Path, error: &std::io::Error) -> RemoteError {
    let kind = match error.kind() {
        ErrorKind::NotFound => RemoteErrorKind::NotFound,
        ErrorKind::PermissionDenied => RemoteErrorKind::Unauthorized,
        _ => RemoteErrorKind::Transport,
    };
    RemoteError::new(kind, format!("{operation} failed for {}: {error}", path.display()))
}
