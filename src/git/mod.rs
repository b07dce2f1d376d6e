//! Git-backed repository handles and the analytics computed from them.
//!
//! - `remote`: credentials, bare clone, fetch, cancellation
//! - `repository`: `TrackedRepository` lifecycle (create, open, refresh, destroy)
//! - `walk`: authorized commit walks
//! - `stats`: counts, numstat, refs, histograms of a single repository

pub mod remote;
pub mod repository;
pub mod stats;
pub mod walk;

use std::sync::Arc;

pub use remote::Cancellation;
pub use repository::{SharedRepo, TrackedRepository};
pub use walk::{CommitWalk, WalkOrder};

use crate::error::Result;
use crate::models::{ActivityWindow, CommitRecord, CommitTimestamps};

/// What the multi-repository aggregate needs from each of its sources.
pub trait GitQueryable: Send + Sync {
    fn label(&self) -> String;
    fn first_updated(&self) -> Result<Option<i64>>;
    fn last_updated(&self) -> Result<Option<i64>>;
    /// Authorized commits inside `window`, oldest first.
    fn commits_between(&self, window: ActivityWindow) -> Result<Vec<CommitRecord>>;
}

impl<T: GitQueryable + ?Sized> GitQueryable for Arc<T> {
    fn label(&self) -> String {
        (**self).label()
    }

    fn first_updated(&self) -> Result<Option<i64>> {
        (**self).first_updated()
    }

    fn last_updated(&self) -> Result<Option<i64>> {
        (**self).last_updated()
    }

    fn commits_between(&self, window: ActivityWindow) -> Result<Vec<CommitRecord>> {
        (**self).commits_between(window)
    }
}

/// Persistence collaborator told about first/last commit times after clone
/// and refresh. Git stays the source of truth; this is a listing cache.
pub trait CommitInfoSink: Send + Sync {
    fn record_commit_info(&self, repository: &str, timestamps: &CommitTimestamps) -> Result<()>;
}
