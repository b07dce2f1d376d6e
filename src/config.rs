//! Tracker configuration.
//!
//! One `TrackerConfig` is built at startup and handed to every component
//! that touches disk or schedules work.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, Offset, Utc};

use crate::account::Account;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10 * 60);
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STALL_TIMEOUT: Duration = Duration::from_secs(5 * 60);

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Base directory for clones: `<repo_root>/<account-id>/<repo-name>`
    pub repo_root: PathBuf,
    pub refresh_interval: Duration,
    /// Upper bound on repositories refreshed at once
    pub workers: usize,
    /// `None` lets clone and fetch run unbounded
    pub fetch_timeout: Option<Duration>,
    /// Socket connect timeout handed to libgit2
    pub connect_timeout: Option<Duration>,
    /// Longest a socket read or write may wait for the server
    pub stall_timeout: Option<Duration>,
    /// Branch tracked when HEAD is detached or missing
    pub default_branch: String,
    pub remote_name: String,
    /// Move the tracked branch even when upstream history was rewritten
    pub follow_rewrites: bool,
    pub bucketing: DayBucketing,
}

impl TrackerConfig {
    pub fn new<P: AsRef<Path>>(repo_root: P) -> Self {
        Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    pub fn account_dir(&self, account: &Account) -> PathBuf {
        self.repo_root.join(account.id.to_string())
    }

    pub fn clone_path(&self, account: &Account, repo_name: &str) -> PathBuf {
        self.account_dir(account).join(repo_name)
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("repositories"),
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            workers: 4,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            stall_timeout: Some(DEFAULT_STALL_TIMEOUT),
            default_branch: "master".to_string(),
            remote_name: "origin".to_string(),
            follow_rewrites: false,
            bucketing: DayBucketing::Local,
        }
    }
}

/// Time zone used to decide which calendar day a commit falls on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayBucketing {
    /// The server's local zone
    #[default]
    Local,
    Fixed(FixedOffset),
}

impl DayBucketing {
    pub fn utc() -> Self {
        DayBucketing::Fixed(Utc.fix())
    }

    pub fn from_offset_secs(secs: i32) -> Option<Self> {
        FixedOffset::east_opt(secs).map(DayBucketing::Fixed)
    }

    /// Bucket key for `commit_time`: midnight UTC of the day *after* the
    /// commit's local date. Chart consumers expect the extra day.
    pub fn day_key(&self, commit_time: i64) -> Option<i64> {
        let utc = DateTime::from_timestamp(commit_time, 0)?;
        let date = match self {
            DayBucketing::Local => utc.with_timezone(&Local).date_naive(),
            DayBucketing::Fixed(offset) => utc.with_timezone(offset).date_naive(),
        };
        let next = date.succ_opt()?;
        Some(next.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
    }
}
