//! On-disk per-domain state.
//!
//! One pretty-printed JSON file per domain lives in the state directory,
//! named after the domain with dots replaced by underscores. Nothing is cached
//! between runs; every check re-reads its file.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::WatchError;
use crate::types::DomainState;
use crate::utils::state_key;

const STATE_EXTENSION: &str = "json";
const TEMP_SUFFIX: &str = ".tmp";

/// Reads, writes and prunes domain state files.
#[derive(Debug, Clone)]
pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// State file of `domain`: `example.com` becomes `example_com.json`.
    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", state_key(domain), STATE_EXTENSION))
    }

    /// Load the state of `domain`.
    ///
    /// A missing file is a fresh domain. An unreadable or malformed file is
    /// logged and also treated as fresh, which at worst costs one extra WHOIS
    /// lookup.
    pub async fn load(&self, domain: &str) -> DomainState {
        let path = self.path_for(domain);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return DomainState::default();
            }
            Err(e) => {
                warn!(domain, path = %path.display(), error = %e, "Failed to read state file");
                return DomainState::default();
            }
        };

        match serde_json::from_str(&content) {
            Ok(state) => state,
            Err(e) => {
                warn!(domain, path = %path.display(), error = %e, "Ignoring unparseable state file");
                DomainState::default()
            }
        }
    }

    /// Persist the state of `domain`. Failures are logged only.
    pub async fn save(&self, domain: &str, state: &DomainState) {
        if let Err(e) = self.try_save(domain, state).await {
            warn!(domain, error = %e, "Failed to save state");
        }
    }

    /// Write through a sibling temporary file and rename it into place.
    async fn try_save(&self, domain: &str, state: &DomainState) -> Result<(), WatchError> {
        let path = self.path_for(domain);
        let mut temp = path.clone().into_os_string();
        temp.push(TEMP_SUFFIX);
        let temp = PathBuf::from(temp);

        let content = serde_json::to_string_pretty(state)?;

        tokio::fs::write(&temp, content)
            .await
            .map_err(|e| WatchError::file_error(temp.display().to_string(), e.to_string()))?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(WatchError::file_error(
                path.display().to_string(),
                e.to_string(),
            ));
        }

        debug!(domain, path = %path.display(), "State saved");
        Ok(())
    }

    /// Whether `path` holds a record this program wrote.
    ///
    /// Only a complete three-field record with a valid timestamp qualifies.
    pub async fn is_app_generated_file(path: &Path) -> bool {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => serde_json::from_str::<DomainState>(&content).is_ok(),
            Err(_) => false,
        }
    }

    /// Delete state files of domains no longer configured.
    ///
    /// Only `.json` files holding a well-formed record are removed; anything
    /// else in the directory is left alone. Returns the removed paths.
    pub async fn cleanup(&self, domains: &[String]) -> Vec<PathBuf> {
        let current: HashSet<String> = domains
            .iter()
            .filter(|domain| !domain.trim().is_empty())
            .map(|domain| state_key(domain))
            .collect();

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(dir = %self.dir.display(), error = %e, "Cannot scan state directory");
                return Vec::new();
            }
        };

        let mut removed = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!(dir = %self.dir.display(), error = %e, "State directory scan aborted");
                    break;
                }
            };

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(STATE_EXTENSION) {
                continue;
            }
            match entry.file_type().await {
                Ok(kind) if kind.is_file() => {}
                _ => continue,
            }

            let Some(key) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if current.contains(key) {
                continue;
            }

            if !Self::is_app_generated_file(&path).await {
                debug!(path = %path.display(), "Skipping non-app file");
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Removed stale state");
                    removed.push(path);
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove stale state"),
            }
        }

        removed
    }
}
