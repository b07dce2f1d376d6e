use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use git2::{ErrorCode, Repository};

use crate::account::Account;
use crate::config::TrackerConfig;
use crate::error::{AppError, Result};
use crate::git::remote::{self, Cancellation};
use crate::location::{RepositoryKind, RepositoryLocation};

/// One bare clone of a remote repository, owned by an account.
///
/// All access to the clone goes through a per-repository mutex, so a
/// refresh never interleaves with reads of the same clone. Different
/// repositories never contend.
pub struct TrackedRepository {
    repo: Mutex<Repository>,
    pub path: PathBuf,
    /// Remote location as the user entered it
    pub location: String,
    pub remote: RepositoryLocation,
    pub kind: RepositoryKind,
    pub(crate) account: Arc<Account>,
    pub(crate) config: Arc<TrackerConfig>,
}

impl TrackedRepository {
    /// Clone `location` for `account`, bounded by the configured fetch timeout.
    pub fn create(account: Arc<Account>, location: &str, config: Arc<TrackerConfig>) -> Result<Self> {
        let cancel = Cancellation::with_timeout(config.fetch_timeout);
        Self::create_with(account, location, config, &cancel)
    }

    pub fn create_with(
        account: Arc<Account>,
        location: &str,
        config: Arc<TrackerConfig>,
        cancel: &Cancellation,
    ) -> Result<Self> {
        let remote = RepositoryLocation::validate(location)?;
        let path = config.clone_path(&account, &remote.repo_name);
        let repo = remote::clone_bare(location, &path, &account, &remote.remote_user, cancel)?;

        Ok(Self::from_parts(repo, path, location, remote, account, config))
    }

    /// Attach to a clone made earlier by `create`. The clone's remote must
    /// point at `location`: two remotes sharing a name map to the same path.
    pub fn open(account: Arc<Account>, location: &str, config: Arc<TrackerConfig>) -> Result<Self> {
        let remote = RepositoryLocation::validate(location)?;
        let path = config.clone_path(&account, &remote.repo_name);
        let repo = Repository::open_bare(&path)
            .map_err(|_| AppError::RepoNotFound(path.display().to_string()))?;

        let cloned_from = repo
            .find_remote(&config.remote_name)
            .ok()
            .and_then(|r| r.url().map(str::to_string));
        if cloned_from.as_deref() != Some(location) {
            return Err(AppError::LocationMismatch(format!(
                "{} was cloned from {}, not {}",
                path.display(),
                cloned_from.as_deref().unwrap_or("(no remote)"),
                location
            )));
        }

        Ok(Self::from_parts(repo, path, location, remote, account, config))
    }

    /// Open the existing clone, or clone it if there is none yet.
    pub fn open_or_create(account: Arc<Account>, location: &str, config: Arc<TrackerConfig>) -> Result<Self> {
        let remote = RepositoryLocation::validate(location)?;
        if config.clone_path(&account, &remote.repo_name).exists() {
            Self::open(account, location, config)
        } else {
            Self::create(account, location, config)
        }
    }

    fn from_parts(
        repo: Repository,
        path: PathBuf,
        location: &str,
        remote: RepositoryLocation,
        account: Arc<Account>,
        config: Arc<TrackerConfig>,
    ) -> Self {
        Self {
            repo: Mutex::new(repo),
            path,
            location: location.to_string(),
            kind: RepositoryKind::detect(location),
            remote,
            account,
            config,
        }
    }

    /// `<account-id>/<repo-name>`, unique across the tracker.
    pub fn id(&self) -> String {
        repository_id(self.account.id, &self.remote.repo_name)
    }

    pub fn account(&self) -> &Account {
        &self.account
    }

    pub fn with_repo<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Repository) -> Result<T>,
    {
        let repo = self.repo.lock().map_err(|_| AppError::Internal("Lock poisoned".to_string()))?;
        f(&repo)
    }

    /// Fetch all remotes, then fast-forward the tracked branch to its remote
    /// counterpart. A rewritten upstream is refused unless the config sets
    /// `follow_rewrites`. Bounded by the configured fetch timeout.
    pub fn refresh(&self) -> Result<()> {
        let cancel = Cancellation::with_timeout(self.config.fetch_timeout);
        self.refresh_with(&cancel)
    }

    pub fn refresh_with(&self, cancel: &Cancellation) -> Result<()> {
        self.with_repo(|repo| {
            remote::fetch_all(repo, &self.account, &self.remote.remote_user, cancel)?;

            let branch = self.tracked_branch(repo);
            let remote_ref = format!("refs/remotes/{}/{}", self.config.remote_name, branch);
            let target = match repo.refname_to_id(&remote_ref) {
                Ok(oid) => oid,
                Err(err) if err.code() == ErrorCode::NotFound => {
                    tracing::debug!("{}: no {} to follow", self.id(), remote_ref);
                    return Ok(());
                }
                Err(err) => return Err(err.into()),
            };

            let local_ref = format!("refs/heads/{}", branch);
            if let Ok(current) = repo.refname_to_id(&local_ref) {
                if current == target {
                    return Ok(());
                }
                if !repo.graph_descendant_of(target, current)? {
                    if !self.config.follow_rewrites {
                        return Err(AppError::FetchFailed(format!(
                            "{}: {} was rewritten upstream, {} left at {}",
                            self.id(),
                            remote_ref,
                            local_ref,
                            current
                        )));
                    }
                    tracing::warn!(
                        "{}: {} is not a descendant of {}, following the remote",
                        self.id(),
                        remote_ref,
                        local_ref
                    );
                }
            }

            repo.reference(&local_ref, target, true, "git-tracker: fast-forward")?;
            tracing::info!("{}: {} -> {}", self.id(), local_ref, target);
            Ok(())
        })
    }

    /// Branch HEAD points at, falling back to the configured default.
    fn tracked_branch(&self, repo: &Repository) -> String {
        repo.find_reference("HEAD")
            .ok()
            .and_then(|head| {
                head.symbolic_target()
                    .and_then(|target| target.strip_prefix("refs/heads/"))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| self.config.default_branch.clone())
    }

    /// Free the on-disk clone. Removing the owning record is up to the caller.
    pub fn destroy(self) -> Result<()> {
        let path = self.path.clone();
        drop(self);
        fs::remove_dir_all(&path)?;
        tracing::info!("Removed clone at {}", path.display());
        Ok(())
    }
}

pub type SharedRepo = Arc<TrackedRepository>;

/// `<account-id>/<repo-name>`, as returned by `TrackedRepository::id`.
pub fn repository_id(account_id: u64, repo_name: &str) -> String {
    format!("{}/{}", account_id, repo_name)
}
