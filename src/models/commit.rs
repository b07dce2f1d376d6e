use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One commit as seen by the analytics layer. Always re-derived by walking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub id: String,
    /// Unix seconds
    pub commit_time: i64,
    pub author_email: String,
    pub author_name: String,
    pub message: String,
    /// First parent, absent for root commits
    pub parent_id: Option<String>,
}

/// Changed files and line counts of a commit against its first parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Numstat {
    pub changed_files: usize,
    pub additions: usize,
    pub deletions: usize,
}

/// First and last authorized commit, as handed to persistence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitTimestamps {
    pub first_commit: Option<DateTime<Utc>>,
    pub last_commit: Option<DateTime<Utc>>,
}

impl CommitTimestamps {
    pub fn from_unix(first: Option<i64>, last: Option<i64>) -> Self {
        Self {
            first_commit: first.and_then(|t| DateTime::from_timestamp(t, 0)),
            last_commit: last.and_then(|t| DateTime::from_timestamp(t, 0)),
        }
    }
}
