//! Network side of a tracked repository: credentials, bare clone, fetch.
//!
//! Clone and fetch both accept a `Cancellation`. It is polled from the
//! libgit2 credential and progress callbacks, so aborting takes effect at
//! the next prompt or packet. An aborted clone removes its directory; an
//! aborted fetch leaves every ref as it was, since libgit2 only updates tips
//! after the pack arrives.
//!
//! Callbacks never fire while a connection is being opened or while a
//! socket sits idle. Those waits are bounded by the process-wide libgit2
//! socket timeouts set through `apply_network_timeouts`. The SSH transport
//! goes through libssh2, which ignores them, so a stalled SSH handshake is
//! only cut short by the remote closing the connection.

use std::ffi::c_int;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use git2::build::RepoBuilder;
use git2::{Cred, CredentialType, ErrorClass, ErrorCode, FetchOptions, RemoteCallbacks, Repository};

use crate::account::Account;
use crate::config::TrackerConfig;
use crate::error::{AppError, Result};

/// libgit2 re-asks for credentials after each rejection.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Cooperative cancellation for clone/fetch, optionally with a deadline.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl Cancellation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    /// Shares this flag but carries its own deadline.
    pub fn child_with_timeout(&self, timeout: Option<Duration>) -> Self {
        Self {
            flag: Arc::clone(&self.flag),
            deadline: timeout.map(|t| Instant::now() + t),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Callbacks answering credential prompts from the account's SSH keys and
/// aborting the transfer once `cancel` fires.
pub fn remote_callbacks<'a>(
    account: &'a Account,
    remote_user: &'a str,
    cancel: &'a Cancellation,
) -> RemoteCallbacks<'a> {
    let mut callbacks = RemoteCallbacks::new();
    let mut attempts = 0;

    callbacks.credentials(move |_url, username_from_url, allowed| {
        if cancel.is_cancelled() {
            return Err(git2::Error::new(ErrorCode::User, ErrorClass::Callback, "transfer cancelled"));
        }
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::new(
                ErrorCode::Auth,
                ErrorClass::Callback,
                "credentials rejected by remote",
            ));
        }

        let user = username_from_url.unwrap_or(remote_user);
        if allowed.contains(CredentialType::USERNAME) {
            return Cred::username(user);
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(ssh) = &account.ssh {
                tracing::debug!("Offering SSH key {} as {}", ssh.public_key.display(), user);
                return Cred::ssh_key(
                    user,
                    Some(ssh.public_key.as_path()),
                    ssh.private_key.as_path(),
                    None,
                );
            }
        }
        if allowed.contains(CredentialType::DEFAULT) {
            return Cred::default();
        }

        Err(git2::Error::new(
            ErrorCode::Auth,
            ErrorClass::Callback,
            "no usable credentials for this remote",
        ))
    });

    callbacks.transfer_progress(move |_| !cancel.is_cancelled());
    callbacks.sideband_progress(move |_| !cancel.is_cancelled());

    callbacks
}

/// Bare-clone `location` into `path`, which must not exist yet.
pub fn clone_bare(
    location: &str,
    path: &Path,
    account: &Account,
    remote_user: &str,
    cancel: &Cancellation,
) -> Result<Repository> {
    if path.exists() {
        return Err(AppError::Filesystem(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} already exists", path.display()),
        )));
    }
    if cancel.is_cancelled() {
        return Err(AppError::Cancelled(format!("clone of {}", location)));
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    clone_into(location, path, account, remote_user, cancel)
}

/// Run the clone itself. Whatever it leaves behind on failure is removed.
fn clone_into(
    location: &str,
    path: &Path,
    account: &Account,
    remote_user: &str,
    cancel: &Cancellation,
) -> Result<Repository> {
    let mut fetch_options = FetchOptions::new();
    fetch_options.remote_callbacks(remote_callbacks(account, remote_user, cancel));

    let start = Instant::now();
    match RepoBuilder::new()
        .bare(true)
        .fetch_options(fetch_options)
        .clone(location, path)
    {
        Ok(repo) => {
            tracing::info!("Cloned {} into {} in {:?}", location, path.display(), start.elapsed());
            Ok(repo)
        }
        Err(err) => {
            discard_partial_clone(path);
            // An aborted callback surfaces as a generic libgit2 error.
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled(format!("clone of {}", location)));
            }
            Err(AppError::from_clone(err, location))
        }
    }
}

/// Fetch every configured remote of `repo`.
pub fn fetch_all(
    repo: &Repository,
    account: &Account,
    remote_user: &str,
    cancel: &Cancellation,
) -> Result<()> {
    let remotes = repo.remotes()?;

    for name in remotes.iter().flatten() {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!("fetch of {}", name)));
        }

        fetch_remote(repo, name, account, remote_user, cancel)?;
    }

    Ok(())
}

fn fetch_remote(
    repo: &Repository,
    name: &str,
    account: &Account,
    remote_user: &str,
    cancel: &Cancellation,
) -> Result<()> {
    let mut remote = repo.find_remote(name)?;
    let mut options = FetchOptions::new();
    options.remote_callbacks(remote_callbacks(account, remote_user, cancel));

    let start = Instant::now();
    if let Err(err) = remote.fetch::<&str>(&[], Some(&mut options), None) {
        if cancel.is_cancelled() {
            return Err(AppError::Cancelled(format!("fetch of {}", name)));
        }
        return Err(AppError::from_fetch(err, name));
    }

    let stats = remote.stats();
    tracing::debug!(
        "Fetched {}: {} objects, {} bytes in {:?}",
        name,
        stats.received_objects(),
        stats.received_bytes(),
        start.elapsed()
    );
    Ok(())
}

/// Set libgit2's socket connect and read/write timeouts from `config`.
///
/// # Safety
///
/// Writes libgit2 globals without synchronization. Call once at startup,
/// before any thread that might use libgit2 has been spawned.
pub unsafe fn apply_network_timeouts(config: &TrackerConfig) -> Result<()> {
    let connect = timeout_millis(config.connect_timeout);
    let stall = timeout_millis(config.stall_timeout);
    // SAFETY: upheld by the caller.
    unsafe {
        git2::opts::set_server_connect_timeout_in_milliseconds(connect)?;
        git2::opts::set_server_timeout_in_milliseconds(stall)?;
    }
    tracing::debug!("libgit2 socket timeouts: connect {} ms, read/write {} ms", connect, stall);
    Ok(())
}

/// libgit2 reads 0 as "no timeout".
fn timeout_millis(timeout: Option<Duration>) -> c_int {
    timeout.map_or(0, |t| c_int::try_from(t.as_millis()).unwrap_or(c_int::MAX).max(1))
}

fn discard_partial_clone(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(err) = fs::remove_dir_all(path) {
        tracing::warn!("Failed to remove partial clone {}: {}", path.display(), err);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_is_shared_between_clones() {
        let cancel = Cancellation::new();
        let observer = cancel.clone();
        assert!(!observer.is_cancelled());
        cancel.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn child_follows_parent_flag() {
        let parent = Cancellation::new();
        let child = parent.child_with_timeout(Some(Duration::from_secs(3600)));
        assert!(!child.is_cancelled());
        parent.cancel();
        assert!(child.is_cancelled());
    }

    #[test]
    fn elapsed_deadline_counts_as_cancelled() {
        let cancel = Cancellation::with_timeout(Some(Duration::ZERO));
        assert!(cancel.is_cancelled());
        assert!(!Cancellation::with_timeout(None).is_cancelled());
    }

    #[test]
    fn clone_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let account = Account::new(1, ["me@example.com"]);
        let err = clone_bare("/nowhere", dir.path(), &account, "git", &Cancellation::new()).err().unwrap();
        assert!(matches!(err, AppError::Filesystem(_)));
        assert!(dir.path().exists());
    }

    #[test]
    fn failed_clone_leaves_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("7").join("missing.git");
        let account = Account::new(7, ["me@example.com"]);
        let missing = dir.path().join("does-not-exist");

        let err = clone_bare(
            missing.to_str().unwrap(),
            &target,
            &account,
            "git",
            &Cancellation::new(),
        )
        .err().unwrap();

        assert!(matches!(err, AppError::RepoNotFound(_)));
        assert!(!target.exists());
    }

    #[test]
    fn cancelled_clone_never_starts() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("x.git");
        let account = Account::new(1, ["me@example.com"]);
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = clone_bare("/nowhere", &target, &account, "git", &cancel).err().unwrap();
        assert!(matches!(err, AppError::Cancelled(_)));
        assert!(!target.exists());
    }

    fn commit_on_head(repo: &Repository, message: &str) {
        let signature = git2::Signature::now("Me", "me@example.com").unwrap();
        let tree_id = repo.index().unwrap().write_tree().unwrap();
        let tree = repo.find_tree(tree_id).unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
            .unwrap();
    }

    fn ref_targets(repo: &Repository) -> Vec<(String, Option<git2::Oid>)> {
        let mut targets: Vec<_> = repo
            .references()
            .unwrap()
            .map(|r| {
                let r = r.unwrap();
                (r.name().unwrap().to_string(), r.target())
            })
            .collect();
        targets.sort();
        targets
    }

    #[test]
    fn timeouts_convert_to_libgit2_millis() {
        assert_eq!(timeout_millis(None), 0);
        assert_eq!(timeout_millis(Some(Duration::from_secs(30))), 30_000);
        assert_eq!(timeout_millis(Some(Duration::from_micros(10))), 1);
        assert_eq!(timeout_millis(Some(Duration::from_secs(u64::MAX))), c_int::MAX);
    }

    #[test]
    fn clone_cancelled_during_transfer_leaves_no_directory() {
        let dir = tempfile::tempdir().unwrap();
        let source = Repository::init(dir.path().join("source")).unwrap();
        commit_on_head(&source, "init");

        // file:// goes through the transport, so the clone directory exists
        // and the transfer has begun when the callbacks see the cancellation.
        let url = format!("file://{}", dir.path().join("source").display());
        let target = dir.path().join("clone.git");
        let account = Account::new(1, ["me@example.com"]);
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = clone_into(&url, &target, &account, "git", &cancel).err().unwrap();
        assert!(matches!(err, AppError::Cancelled(_)));
        assert!(!target.exists());
    }

    #[test]
    fn cancelled_fetch_keeps_refs() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("source");
        let source = Repository::init(&source_path).unwrap();
        commit_on_head(&source, "init");

        let account = Account::new(1, ["me@example.com"]);
        let target = dir.path().join("clone.git");
        let clone = clone_bare(
            source_path.to_str().unwrap(),
            &target,
            &account,
            "git",
            &Cancellation::new(),
        )
        .unwrap();
        let before = ref_targets(&clone);

        commit_on_head(&source, "upstream work");
        let cancel = Cancellation::new();
        cancel.cancel();

        let err = fetch_remote(&clone, "origin", &account, "git", &cancel).unwrap_err();
        assert!(matches!(err, AppError::Cancelled(_)));
        assert_eq!(ref_targets(&clone), before);

        fetch_all(&clone, &account, "git", &Cancellation::new()).unwrap();
        assert_ne!(ref_targets(&clone), before);
    }
}
