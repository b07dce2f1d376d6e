use serde::{Deserialize, Serialize};

/// A tag or remote-tracking ref paired with the commit time it points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefInfo {
    pub name: String,
    pub commit_time: i64,
}
