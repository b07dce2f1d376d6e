//! Accounts and their repositories, loaded from a JSON manifest.
//!
//! ```json
//! { "accounts": [ {
//!     "id": 1,
//!     "emails": ["me@example.com"],
//!     "ssh": { "public_key": "/keys/id.pub", "private_key": "/keys/id" },
//!     "repositories": [ { "location": "git@github.com:me/tool", "tags": ["Rust"] } ]
//! } ] }
//! ```
//!
//! Repositories missing on disk are cloned on load. A repository that
//! cannot be opened or cloned is reported and left out, as is a second
//! entry that maps to a clone already in use.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::account::{Account, SshCredentials};
use crate::config::TrackerConfig;
use crate::error::{AppError, Result};
use crate::git::repository::repository_id;
use crate::git::{CommitInfoSink, SharedRepo, TrackedRepository};
use crate::location::RepositoryLocation;
use crate::models::RefreshFailure;
use crate::scheduler::RepositorySource;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(default)]
    pub accounts: Vec<AccountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountEntry {
    pub id: u64,
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub ssh: Option<SshCredentials>,
    #[serde(default)]
    pub repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryEntry {
    pub location: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Manifest {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }
}

struct Entry {
    account_id: u64,
    tags: Vec<String>,
    repo: SharedRepo,
}

pub struct Registry {
    entries: Vec<Entry>,
    /// Repositories left out because they could not be opened or cloned
    pub failures: Vec<RefreshFailure>,
}

impl Registry {
    /// Open or clone every repository in `manifest`. Fresh clones have
    /// their commit times handed to `sink`.
    pub fn build(manifest: &Manifest, config: Arc<TrackerConfig>, sink: &dyn CommitInfoSink) -> Self {
        let mut entries = Vec::new();
        let mut failures = Vec::new();

        for account_entry in &manifest.accounts {
            let mut account = Account::new(account_entry.id, &account_entry.emails);
            if let Some(ssh) = &account_entry.ssh {
                account = account.with_ssh(ssh.clone());
            }
            let account = Arc::new(account);

            for repository in &account_entry.repositories {
                let attached = claim(&entries, &account, &repository.location)
                    .and_then(|()| attach(&account, &repository.location, &config, sink));
                match attached {
                    Ok(repo) => entries.push(Entry {
                        account_id: account.id,
                        tags: repository.tags.clone(),
                        repo: Arc::new(repo),
                    }),
                    Err(err) => {
                        tracing::warn!("Skipping {} for account {}: {}", repository.location, account.id, err);
                        failures.push(RefreshFailure {
                            repository: repository.location.clone(),
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        tracing::info!("Tracking {} repositories ({} unavailable)", entries.len(), failures.len());
        Self { entries, failures }
    }

    pub fn all(&self) -> Vec<SharedRepo> {
        self.entries.iter().map(|e| Arc::clone(&e.repo)).collect()
    }

    pub fn for_account(&self, account_id: u64) -> Vec<SharedRepo> {
        self.entries
            .iter()
            .filter(|e| e.account_id == account_id)
            .map(|e| Arc::clone(&e.repo))
            .collect()
    }

    pub fn tagged(&self, account_id: u64, tag: &str) -> Vec<SharedRepo> {
        self.entries
            .iter()
            .filter(|e| e.account_id == account_id && e.tags.iter().any(|t| t == tag))
            .map(|e| Arc::clone(&e.repo))
            .collect()
    }

    /// Look up by `<account-id>/<repo-name>`.
    pub fn find(&self, id: &str) -> Option<SharedRepo> {
        self.entries
            .iter()
            .find(|e| e.repo.id() == id)
            .map(|e| Arc::clone(&e.repo))
    }
}

impl RepositorySource for Registry {
    fn repositories(&self) -> Vec<SharedRepo> {
        self.all()
    }
}

/// Refuse a location whose clone another entry already owns.
fn claim(entries: &[Entry], account: &Account, location: &str) -> Result<()> {
    let remote = RepositoryLocation::validate(location)?;
    let id = repository_id(account.id, &remote.repo_name);
    match entries.iter().find(|e| e.repo.id() == id) {
        Some(existing) => Err(AppError::LocationMismatch(format!(
            "{} is already tracked as {} from {}",
            location, id, existing.repo.location
        ))),
        None => Ok(()),
    }
}

/// Open the clone on disk, or clone it and record its commit times.
fn attach(
    account: &Arc<Account>,
    location: &str,
    config: &Arc<TrackerConfig>,
    sink: &dyn CommitInfoSink,
) -> Result<TrackedRepository> {
    let remote = RepositoryLocation::validate(location)?;
    if config.clone_path(account, &remote.repo_name).exists() {
        return TrackedRepository::open(Arc::clone(account), location, Arc::clone(config));
    }

    let repo = TrackedRepository::create(Arc::clone(account), location, Arc::clone(config))?;
    repo.update_commit_info(sink)?;
    Ok(repo)
}
