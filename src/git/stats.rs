//! Read-only analytics over a tracked repository.
//!
//! Commit-based figures (`commit_count`, `author_count`, first/last update,
//! histograms) only see authorized commits. `file_count` and `line_count`
//! describe the whole HEAD snapshot regardless of authorship. An empty
//! clone yields zeros and empty lists, never an error.

use std::collections::HashSet;

use git2::{BranchType, Commit, DiffStats, ObjectType, Oid, Repository};

use crate::aggregate::NO_DATA;
use crate::error::{AppError, Result};
use crate::git::repository::TrackedRepository;
use crate::git::walk::{CommitWalk, WalkOrder, is_unborn};
use crate::git::{CommitInfoSink, GitQueryable};
use crate::histogram::histogram_of;
use crate::models::{ActivityWindow, CommitRecord, CommitTimestamps, HistogramBucket, Numstat, RefInfo};

/// Shown in place of a branch that does not exist.
pub const MISSING_BRANCH: &str = "(none)";

const SHORT_SHA_LEN: usize = 6;

impl TrackedRepository {
    /// Authorized commits, newest first in topological order.
    pub fn commits(&self, count: Option<usize>) -> Result<Vec<CommitRecord>> {
        self.with_repo(|repo| {
            CommitWalk::new(repo, &self.account, WalkOrder::Topological)?
                .limit(count)
                .collect()
        })
    }

    /// Run `f` over a fresh authorized walk without materializing it.
    pub fn with_walk<F, T>(&self, order: WalkOrder, f: F) -> Result<T>
    where
        F: FnOnce(CommitWalk<'_>) -> Result<T>,
    {
        self.with_repo(|repo| f(CommitWalk::new(repo, &self.account, order)?))
    }

    /// Authorized commits inside `window`, oldest first.
    pub fn commits_between(&self, window: ActivityWindow) -> Result<Vec<CommitRecord>> {
        if window.is_empty() {
            return Ok(Vec::new());
        }
        let mut commits = self.with_walk(WalkOrder::OldestFirst, |walk| {
            let mut inside = Vec::new();
            for commit in walk {
                let commit = commit?;
                if window.contains(commit.commit_time) {
                    inside.push(commit);
                }
            }
            Ok(inside)
        })?;
        // Time sorting in libgit2 tolerates clock skew between parent and child.
        commits.sort_by_key(|c| c.commit_time);
        Ok(commits)
    }

    pub fn first_updated(&self) -> Result<Option<i64>> {
        self.with_walk(WalkOrder::OldestFirst, |mut walk| {
            walk.next().transpose().map(|c| c.map(|c| c.commit_time))
        })
    }

    pub fn last_updated(&self) -> Result<Option<i64>> {
        self.with_walk(WalkOrder::NewestFirst, |mut walk| {
            walk.next().transpose().map(|c| c.map(|c| c.commit_time))
        })
    }

    pub fn commit_count(&self) -> Result<usize> {
        self.with_walk(WalkOrder::NewestFirst, |walk| {
            let mut count = 0;
            for commit in walk {
                commit?;
                count += 1;
            }
            Ok(count)
        })
    }

    /// Distinct author emails among authorized commits.
    pub fn author_count(&self) -> Result<usize> {
        self.with_walk(WalkOrder::NewestFirst, |walk| {
            let mut authors = HashSet::new();
            for commit in walk {
                authors.insert(commit?.author_email.to_lowercase());
            }
            Ok(authors.len())
        })
    }

    /// Histogram of authorized commits. Open bounds default to the first and
    /// last authorized commit.
    pub fn histogram(&self, start: Option<i64>, end: Option<i64>) -> Result<Vec<HistogramBucket>> {
        let first = match start {
            Some(start) => start,
            None => self.first_updated()?.unwrap_or(NO_DATA),
        };
        let last = match end {
            Some(end) => end,
            None => self.last_updated()?.unwrap_or(0),
        };
        let window = ActivityWindow::new(first, last);
        let commits = self.commits_between(window)?;
        Ok(histogram_of(&commits, window, &self.config.bucketing))
    }

    pub fn numstat(&self, commit_id: &str) -> Result<Numstat> {
        let oid = Oid::from_str(commit_id).map_err(|_| AppError::InvalidReference(commit_id.to_string()))?;
        self.with_repo(|repo| {
            let commit = repo
                .find_commit(oid)
                .map_err(|_| AppError::InvalidReference(commit_id.to_string()))?;
            numstat(repo, &commit)
        })
    }

    pub fn file_count(&self) -> Result<usize> {
        self.with_repo(|repo| Ok(head_snapshot(repo)?.map_or(0, |stats| stats.files_changed())))
    }

    pub fn line_count(&self) -> Result<usize> {
        self.with_repo(|repo| Ok(head_snapshot(repo)?.map_or(0, |stats| stats.deletions())))
    }

    pub fn latest_refs(&self, count: Option<usize>) -> Result<Vec<RefInfo>> {
        self.with_repo(|repo| latest_refs(repo, count))
    }

    pub fn tags(&self) -> Result<Vec<String>> {
        self.with_repo(|repo| reference_names(repo, &["refs/tags/"]))
    }

    /// Remote-tracking branch names, e.g. `origin/master`.
    pub fn branches(&self) -> Result<Vec<String>> {
        self.with_repo(|repo| {
            let mut names = Vec::new();
            for branch in repo.branches(Some(BranchType::Remote))? {
                let (branch, _) = branch?;
                if let Some(name) = branch.name()? {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })
    }

    pub fn branch_shorthand(&self, name: &str) -> String {
        self.with_repo(|repo| {
            Ok(repo
                .find_branch(name, BranchType::Local)
                .ok()
                .and_then(|branch| branch.get().shorthand().map(str::to_string)))
        })
        .ok()
        .flatten()
        .unwrap_or_else(|| MISSING_BRANCH.to_string())
    }

    /// First six hex digits of the commit `name` points at.
    pub fn branch_sha(&self, name: &str) -> String {
        self.with_repo(|repo| {
            Ok(repo
                .find_branch(name, BranchType::Local)
                .ok()
                .and_then(|branch| branch.get().peel_to_commit().ok())
                .map(|commit| commit.id().to_string()[..SHORT_SHA_LEN].to_string()))
        })
        .ok()
        .flatten()
        .unwrap_or_else(|| MISSING_BRANCH.to_string())
    }

    /// Hand the current first/last authorized commit times to `sink`.
    pub fn update_commit_info(&self, sink: &dyn CommitInfoSink) -> Result<CommitTimestamps> {
        let timestamps = CommitTimestamps::from_unix(self.first_updated()?, self.last_updated()?);
        sink.record_commit_info(&self.id(), &timestamps)?;
        Ok(timestamps)
    }
}

impl GitQueryable for TrackedRepository {
    fn label(&self) -> String {
        self.id()
    }

    fn first_updated(&self) -> Result<Option<i64>> {
        TrackedRepository::first_updated(self)
    }

    fn last_updated(&self) -> Result<Option<i64>> {
        TrackedRepository::last_updated(self)
    }

    fn commits_between(&self, window: ActivityWindow) -> Result<Vec<CommitRecord>> {
        TrackedRepository::commits_between(self, window)
    }
}

/// Diff `commit` against its first parent, or the empty tree for a root.
pub fn numstat(repo: &Repository, commit: &Commit) -> Result<Numstat> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };

    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), None)?;
    let stats = diff.stats()?;

    Ok(Numstat {
        changed_files: stats.files_changed(),
        additions: stats.insertions(),
        deletions: stats.deletions(),
    })
}

/// HEAD tree diffed against the empty tree: every file and line shows up
/// as a deletion. `None` for an empty clone.
fn head_snapshot(repo: &Repository) -> Result<Option<DiffStats>> {
    let tree = match repo.head().and_then(|head| head.peel_to_tree()) {
        Ok(tree) => tree,
        Err(err) if is_unborn(&err) => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let diff = repo.diff_tree_to_tree(Some(&tree), None, None)?;
    Ok(Some(diff.stats()?))
}

/// Tags and remote-tracking refs, newest commit first.
pub fn latest_refs(repo: &Repository, count: Option<usize>) -> Result<Vec<RefInfo>> {
    let mut refs = Vec::new();
    for name in reference_names(repo, &["refs/tags/", "refs/remotes/"])? {
        let commit_time = commit_time_of(repo, &name)?;
        refs.push(RefInfo { name, commit_time });
    }

    refs.sort_by(|a, b| b.commit_time.cmp(&a.commit_time));
    if let Some(count) = count {
        refs.truncate(count);
    }
    Ok(refs)
}

/// Commit time of whatever `name` resolves to, peeling annotated tags.
pub fn commit_time_of(repo: &Repository, name: &str) -> Result<i64> {
    let object = repo.revparse_single(name)?;
    let commit = match object.kind() {
        Some(ObjectType::Commit) | Some(ObjectType::Tag) => object
            .peel_to_commit()
            .map_err(|_| AppError::InvalidReference(name.to_string()))?,
        _ => return Err(AppError::InvalidReference(name.to_string())),
    };
    Ok(commit.time().seconds())
}

fn reference_names(repo: &Repository, prefixes: &[&str]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for reference in repo.references()? {
        let reference = reference?;
        if let Some(name) = reference.name() {
            if prefixes.iter().any(|prefix| name.starts_with(prefix)) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}
