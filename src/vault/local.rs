use std::path::{Component, Path, PathBuf};

use tokio::io::AsyncWriteExt as _;
use tracing::{debug, trace};

use super::Vault;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{path} escapes the vault root")]
    EscapesRoot { path: String },
    #[error("{path} is not a file")]
    NotAFile { path: String },
    #[error("{path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
}

/// A vault backed by a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalVault {
    root: PathBuf,
}

impl LocalVault {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, Error> {
        let relative = Path::new(path);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return Err(Error::EscapesRoot { path: path.into() });
        }
        Ok(self.root.join(relative))
    }

    fn io(path: &str) -> impl FnOnce(std::io::Error) -> Error + '_ {
        move |source| Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl Vault for LocalVault {
    type Error = Error;

    async fn exists(&self, path: &str) -> Result<bool, Self::Error> {
        let full = self.resolve(path)?;
        tokio::fs::try_exists(&full).await.map_err(Self::io(path))
    }

    async fn create_folder(&self, path: &str) -> Result<(), Self::Error> {
        let full = self.resolve(path)?;
        debug!(path, "create folder");
        tokio::fs::create_dir_all(&full).await.map_err(Self::io(path))
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let full = self.resolve(path)?;
        trace!(path, "create file");
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&full)
            .await
            .map_err(Self::io(path))?;
        file.write_all(content.as_bytes())
            .await
            .map_err(Self::io(path))?;
        file.flush().await.map_err(Self::io(path))
    }

    async fn modify(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let full = self.resolve(path)?;
        let metadata = tokio::fs::metadata(&full).await.map_err(Self::io(path))?;
        if !metadata.is_file() {
            return Err(Error::NotAFile { path: path.into() });
        }
        trace!(path, "modify file");
        tokio::fs::write(&full, content)
            .await
            .map_err(Self::io(path))
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let full = self.resolve(path)?;
        trace!(path, "write file");
        tokio::fs::write(&full, content)
            .await
            .map_err(Self::io(path))
    }

    async fn read(&self, path: &str) -> Result<String, Self::Error> {
        let full = self.resolve(path)?;
        tokio::fs::read_to_string(&full)
            .await
            .map_err(Self::io(path))
    }
}
