use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use super::{ObjectMetadata, ObjectStore, SourceRef, SourceStore};
use crate::error::IoError;

/// Filesystem-backed source and thumbnail storage rooted at a directory.
///
/// - `Path(p)`: absolute paths are read as-is, relative paths under the root
/// - `Key(k)`: read from `{root}/{k}`
/// - `Url("file://...")`: read from the local path
///
/// Keys and thumbnail names may not escape the root (`..` components are
/// rejected).
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a storage rooted at `root`, serving objects under `base_url`.
    pub fn new(root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            root: root.into(),
            base_url,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, source: &SourceRef) -> Option<PathBuf> {
        match source {
            SourceRef::Path(p) => {
                let path = Path::new(p);
                if path.is_absolute() {
                    Some(path.to_path_buf())
                } else {
                    self.under_root(p)
                }
            }
            SourceRef::Key(k) => self.under_root(k),
            SourceRef::Url(u) => u.strip_prefix("file://").map(PathBuf::from),
        }
    }

    fn under_root(&self, relative: &str) -> Option<PathBuf> {
        let relative = Path::new(relative);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            None
        } else {
            Some(self.root.join(relative))
        }
    }
}

fn map_io_error(err: std::io::Error, path: &Path) -> IoError {
    if err.kind() == ErrorKind::NotFound {
        IoError::NotFound(path.display().to_string())
    } else {
        IoError::Local(format!("{}: {}", path.display(), err))
    }
}

#[async_trait]
impl SourceStore for LocalStorage {
    fn supports(&self, source: &SourceRef) -> bool {
        self.resolve(source).is_some()
    }

    async fn open(&self, source: &SourceRef) -> Result<Bytes, IoError> {
        let path = self
            .resolve(source)
            .ok_or_else(|| IoError::Unsupported(source.identity()))?;
        let data = tokio::fs::read(&path)
            .await
            .map_err(|e| map_io_error(e, &path))?;
        Ok(Bytes::from(data))
    }

    fn url(&self, source: &SourceRef) -> String {
        match source {
            SourceRef::Key(k) => format!("{}{}", self.base_url, k),
            _ => source.value().to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for LocalStorage {
    async fn exists(&self, name: &str) -> Result<bool, IoError> {
        let path = self
            .under_root(name)
            .ok_or_else(|| IoError::Unsupported(name.to_string()))?;
        tokio::fs::try_exists(&path)
            .await
            .map_err(|e| map_io_error(e, &path))
    }

    async fn write(
        &self,
        name: &str,
        data: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), IoError> {
        let path = self
            .under_root(name)
            .ok_or_else(|| IoError::Unsupported(name.to_string()))?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| map_io_error(e, parent))?;
        }
        tokio::fs::write(&path, &data)
            .await
            .map_err(|e| map_io_error(e, &path))?;

        debug!(
            path = %path.display(),
            bytes = data.len(),
            width = metadata.width,
            height = metadata.height,
            "Wrote thumbnail"
        );
        Ok(())
    }

    fn url(&self, name: &str) -> String {
        format!("{}{}", self.base_url, name)
    }
}
