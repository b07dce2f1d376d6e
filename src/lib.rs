//! Git Tracker - commit-activity analytics over a user's git repositories.
//!
//! Repositories are kept as bare clones under `<root>/<account-id>/<name>`
//! and refreshed periodically. Analytics only count commits whose author
//! email belongs to the owning account.
//!
//! - `location`: parse remote location strings
//! - `git`: clone, refresh and read tracked repositories
//! - `histogram` / `aggregate`: day-bucketed activity for one or many repositories
//! - `scheduler`: periodic refresh of everything tracked
//! - `registry` / `store`: JSON manifest and commit-time state used by the binary

pub mod account;
pub mod aggregate;
pub mod config;
pub mod error;
pub mod git;
pub mod histogram;
pub mod location;
pub mod models;
pub mod registry;
pub mod scheduler;
pub mod store;

pub use account::{Account, SshCredentials};
pub use aggregate::{ActivitySummary, Aggregate, NO_DATA};
pub use config::{DayBucketing, TrackerConfig};
pub use error::{AppError, GitErrorKind, Result};
pub use git::{GitQueryable, SharedRepo, TrackedRepository};
pub use location::{RepositoryKind, RepositoryLocation, parse_location};
