//! The note vault the reconciler writes into.
//!
//! Paths are vault-relative and already normalized (see [`crate::path::normalize_path`]).

pub mod local;
#[cfg(test)]
pub(crate) mod memory;

pub trait Vault {
    type Error: std::error::Error + Send + Sync + 'static;

    fn exists(&self, path: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Create a folder and any missing ancestors. No-op if it already exists.
    fn create_folder(&self, path: &str) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Create a new file; fails if one already exists.
    fn create(
        &self,
        path: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Replace the content of an existing file.
    fn modify(
        &self,
        path: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Raw write used for hidden/config paths that the vault index does not track.
    fn write(
        &self,
        path: &str,
        content: &str,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send;

    fn read(&self, path: &str) -> impl Future<Output = Result<String, Self::Error>> + Send;
}
