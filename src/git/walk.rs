//! Authorized commit walks.
//!
//! A `CommitWalk` is forward-only; open a new one from the repository to
//! start over. Commits by authors outside the account's verified emails are
//! skipped before any `limit` is applied, so limits count authorized
//! commits only.

use git2::{Commit, ErrorCode, Repository, Revwalk, Sort};

use crate::account::Account;
use crate::error::Result;
use crate::models::CommitRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkOrder {
    /// Newest first, children always before their parents
    Topological,
    /// Newest commit time first
    NewestFirst,
    /// Oldest commit time first
    OldestFirst,
}

impl WalkOrder {
    fn sorting(self) -> Sort {
        match self {
            WalkOrder::Topological => Sort::TOPOLOGICAL,
            WalkOrder::NewestFirst => Sort::TIME,
            WalkOrder::OldestFirst => Sort::TIME | Sort::REVERSE,
        }
    }
}

pub struct CommitWalk<'a> {
    repo: &'a Repository,
    account: &'a Account,
    /// `None` when HEAD is unborn: the walk is empty
    revwalk: Option<Revwalk<'a>>,
    remaining: Option<usize>,
}

impl<'a> CommitWalk<'a> {
    pub fn new(repo: &'a Repository, account: &'a Account, order: WalkOrder) -> Result<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(order.sorting())?;

        let revwalk = match revwalk.push_head() {
            Ok(()) => Some(revwalk),
            Err(err) if is_unborn(&err) => None,
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            repo,
            account,
            revwalk,
            remaining: None,
        })
    }

    /// Stop after `count` authorized commits.
    pub fn limit(mut self, count: Option<usize>) -> Self {
        self.remaining = count;
        self
    }
}

impl Iterator for CommitWalk<'_> {
    type Item = Result<CommitRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == Some(0) {
            return None;
        }
        let revwalk = self.revwalk.as_mut()?;

        loop {
            let oid = match revwalk.next()? {
                Ok(oid) => oid,
                Err(err) => return Some(Err(err.into())),
            };
            let commit = match self.repo.find_commit(oid) {
                Ok(commit) => commit,
                Err(err) => return Some(Err(err.into())),
            };

            if !self.account.is_authorized(commit.author().email().unwrap_or("")) {
                continue;
            }

            if let Some(remaining) = self.remaining.as_mut() {
                *remaining -= 1;
            }
            return Some(Ok(commit_record(&commit)));
        }
    }
}

pub fn commit_record(commit: &Commit) -> CommitRecord {
    let author = commit.author();
    CommitRecord {
        id: commit.id().to_string(),
        commit_time: commit.time().seconds(),
        author_email: author.email().unwrap_or("").to_string(),
        author_name: author.name().unwrap_or("Unknown").to_string(),
        message: commit.message().unwrap_or("").trim().to_string(),
        parent_id: commit.parent_id(0).ok().map(|id| id.to_string()),
    }
}

/// An empty clone has a HEAD that points at a branch with no commits.
pub fn is_unborn(err: &git2::Error) -> bool {
    matches!(err.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound)
}
