use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::Vault;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} already exists")]
    AlreadyExists(String),
    #[error("{0} does not exist")]
    NotFound(String),
    #[error("parent folder of {0} does not exist")]
    MissingParent(String),
    #[error("write to {0} refused")]
    Refused(String),
}

#[derive(Default)]
struct State {
    folders: BTreeSet<String>,
    files: BTreeMap<String, String>,
    writes: usize,
}

/// In-memory vault. Paths listed in `refuse` fail every write.
#[derive(Default)]
pub struct MemoryVault {
    state: tokio::sync::Mutex<State>,
    refuse: HashSet<String>,
}

fn parent(path: &str) -> Option<&str> {
    path.rsplit_once('/').map(|(parent, _)| parent)
}

impl MemoryVault {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn refusing(paths: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            refuse: paths.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub async fn files(&self) -> BTreeMap<String, String> {
        self.state.lock().await.files.clone()
    }

    pub async fn writes(&self) -> usize {
        self.state.lock().await.writes
    }

    pub async fn insert_file(&self, path: &str, content: &str) {
        let mut state = self.state.lock().await;
        let mut folder = parent(path);
        while let Some(f) = folder {
            state.folders.insert(f.to_owned());
            folder = parent(f);
        }
        state.files.insert(path.to_owned(), content.to_owned());
    }

    fn check(&self, state: &State, path: &str) -> Result<(), Error> {
        if self.refuse.contains(path) {
            return Err(Error::Refused(path.into()));
        }
        match parent(path) {
            Some(parent) if !state.folders.contains(parent) => {
                Err(Error::MissingParent(path.into()))
            }
            _ => Ok(()),
        }
    }
}

impl Vault for MemoryVault {
    type Error = Error;

    async fn exists(&self, path: &str) -> Result<bool, Self::Error> {
        let state = self.state.lock().await;
        Ok(state.files.contains_key(path) || state.folders.contains(path))
    }

    async fn create_folder(&self, path: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        let mut folder = Some(path);
        while let Some(f) = folder {
            state.folders.insert(f.to_owned());
            folder = parent(f);
        }
        Ok(())
    }

    async fn create(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        self.check(&state, path)?;
        if state.files.contains_key(path) {
            return Err(Error::AlreadyExists(path.into()));
        }
        state.files.insert(path.into(), content.into());
        state.writes += 1;
        Ok(())
    }

    async fn modify(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        self.check(&state, path)?;
        let Some(file) = state.files.get_mut(path) else {
            return Err(Error::NotFound(path.into()));
        };
        *file = content.into();
        state.writes += 1;
        Ok(())
    }

    async fn write(&self, path: &str, content: &str) -> Result<(), Self::Error> {
        let mut state = self.state.lock().await;
        self.check(&state, path)?;
        state.files.insert(path.into(), content.into());
        state.writes += 1;
        Ok(())
    }

    async fn read(&self, path: &str) -> Result<String, Self::Error> {
        let state = self.state.lock().await;
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| Error::NotFound(path.into()))
    }
}
