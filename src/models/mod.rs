//! Data transfer objects produced by the analytics engine.
//!
//! - `commit`: CommitRecord, Numstat, CommitTimestamps
//! - `histogram`: HistogramBucket, ActivityWindow
//! - `refs`: RefInfo
//! - `refresh`: RefreshReport, RefreshFailure

pub mod commit;
pub mod histogram;
pub mod refresh;
pub mod refs;

pub use commit::*;
pub use histogram::*;
pub use refresh::*;
pub use refs::*;
