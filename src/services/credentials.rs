use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use color_eyre::eyre::{Result, WrapErr};

pub type CredentialMap = HashMap<String, String>;

/// Per-source credentials (cookie header values).
///
/// Readers always see a complete map: updates build a new map and swap it in
/// whole, nothing is mutated in place.
pub struct CredentialStore {
    path: PathBuf,
    current: ArcSwap<CredentialMap>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(CredentialMap::new()),
        }
    }

    #[cfg(test)]
    pub fn with_credentials(path: impl Into<PathBuf>, credentials: CredentialMap) -> Self {
        Self {
            path: path.into(),
            current: ArcSwap::from_pointee(credentials),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load credentials from the backing file. A missing file leaves an empty
    /// set, a malformed one is an error.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(path);
        store.reload()?;
        Ok(store)
    }

    pub fn reload(&self) -> Result<()> {
        if !self.path.exists() {
            log::debug!(
                "No credential file at {}, starting without credentials",
                self.path.display()
            );
            self.replace(CredentialMap::new());
            return Ok(());
        }

        let contents = std::fs::read_to_string(&self.path).wrap_err_with(|| {
            format!("Failed to read credential file: {}", self.path.display())
        })?;
        let credentials: CredentialMap = serde_json::from_str(&contents).wrap_err_with(|| {
            format!("Failed to parse credential file: {}", self.path.display())
        })?;

        log::info!(
            "Loaded credentials for {} sources from {}",
            credentials.len(),
            self.path.display()
        );
        self.replace(credentials);
        Ok(())
    }

    /// Credential for one source, read from the latest snapshot.
    pub fn get(&self, source: &str) -> Option<String> {
        self.current
            .load()
            .get(source)
            .filter(|credential| !credential.is_empty())
            .cloned()
    }

    pub fn snapshot(&self) -> Arc<CredentialMap> {
        self.current.load_full()
    }

    pub fn replace(&self, credentials: CredentialMap) {
        self.current.store(Arc::new(credentials));
    }

    /// Persist a new credential set and make it live.
    pub fn update(&self, credentials: CredentialMap) -> Result<()> {
        let contents = serde_json::to_string_pretty(&credentials)
            .wrap_err("Failed to serialize credentials")?;
        std::fs::write(&self.path, contents).wrap_err_with(|| {
            format!("Failed to write credential file: {}", self.path.display())
        })?;
        self.reload()
    }
}
