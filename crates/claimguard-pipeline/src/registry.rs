//! Key/value store holding the champion model bundle.

use std::io::Write;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid registry key: {0}")]
    InvalidKey(String),

    #[error("registry key not found: {0}")]
    NotFound(String),

    #[error("registry unavailable at {path}: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;

/// Object storage boundary. Keys look like `bucket/path/to/object`.
pub trait ModelRegistry: Send + Sync {
    fn exists(&self, key: &str) -> RegistryResult<bool>;

    fn read(&self, key: &str) -> RegistryResult<Vec<u8>>;

    fn write(&self, key: &str, bytes: &[u8]) -> RegistryResult<()>;
}

/// Registry backed by a local directory; `bucket/path` maps to `<root>/bucket/path`.
#[derive(Debug, Clone)]
pub struct FsModelRegistry {
    root: PathBuf,
}

impl FsModelRegistry {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, key: &str) -> RegistryResult<PathBuf> {
        let relative = Path::new(key);
        let well_formed = !key.is_empty()
            && relative.components().all(|c| matches!(c, Component::Normal(_)))
            && relative.components().count() >= 2;
        if !well_formed {
            return Err(RegistryError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    fn check_root(&self) -> RegistryResult<()> {
        match std::fs::metadata(&self.root) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(RegistryError::Unavailable {
                path: self.root.clone(),
                source: std::io::Error::other("registry root is not a directory"),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(RegistryError::Unavailable { path: self.root.clone(), source }),
        }
    }
}

impl ModelRegistry for FsModelRegistry {
    fn exists(&self, key: &str) -> RegistryResult<bool> {
        let path = self.resolve(key)?;
        self.check_root()?;
        Ok(path.try_exists()? && path.is_file())
    }

    fn read(&self, key: &str) -> RegistryResult<Vec<u8>> {
        let path = self.resolve(key)?;
        self.check_root()?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Err(RegistryError::NotFound(key.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    /// Writes through a temp file in the target directory, then renames.
    fn write(&self, key: &str, bytes: &[u8]) -> RegistryResult<()> {
        let path = self.resolve(key)?;
        self.check_root()?;
        let parent = path.parent().ok_or_else(|| RegistryError::InvalidKey(key.to_string()))?;
        std::fs::create_dir_all(parent)?;

        let mut staged = tempfile::NamedTempFile::new_in(parent)?;
        staged.write_all(bytes)?;
        staged.as_file().sync_all()?;
        staged.persist(&path).map_err(|e| RegistryError::Io(e.error))?;
        info!(key, bytes = bytes.len(), "registry object written");
        Ok(())
    }
}
