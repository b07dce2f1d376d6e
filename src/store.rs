//! JSON file recording the first/last commit times of each repository.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::git::CommitInfoSink;
use crate::models::CommitTimestamps;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryState {
    pub first_commit: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

pub struct StateStore {
    path: PathBuf,
    state: Mutex<BTreeMap<String, RepositoryState>>,
}

impl StateStore {
    /// Load `path` if it exists, otherwise start empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            serde_json::from_str(&fs::read_to_string(&path)?)?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn get(&self, repository: &str) -> Option<RepositoryState> {
        self.state.lock().ok()?.get(repository).cloned()
    }

    fn persist(&self, state: &BTreeMap<String, RepositoryState>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl CommitInfoSink for StateStore {
    fn record_commit_info(&self, repository: &str, timestamps: &CommitTimestamps) -> Result<()> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        state.insert(
            repository.to_string(),
            RepositoryState {
                first_commit: timestamps.first_commit,
                last_commit: timestamps.last_commit,
                updated_at: Utc::now(),
            },
        );
        self.persist(&state)
    }
}
