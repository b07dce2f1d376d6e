//! Periodic refresh of every tracked repository.
//!
//! A pass fetches each repository and records its new first/last commit
//! times. Repositories are refreshed on blocking threads, at most
//! `workers` at once. One repository failing never stops the pass.
//! Passes never overlap: a pass requested while another runs is skipped.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;

use crate::config::TrackerConfig;
use crate::error::{AppError, Result};
use crate::git::{Cancellation, CommitInfoSink, SharedRepo};
use crate::models::{CommitTimestamps, RefreshFailure, RefreshReport};

/// Supplies the repositories a pass should refresh.
pub trait RepositorySource: Send + Sync {
    fn repositories(&self) -> Vec<SharedRepo>;
}

impl RepositorySource for Vec<SharedRepo> {
    fn repositories(&self) -> Vec<SharedRepo> {
        self.clone()
    }
}

pub struct Refresher {
    config: Arc<TrackerConfig>,
    source: Arc<dyn RepositorySource>,
    sink: Arc<dyn CommitInfoSink>,
    pass_lock: Mutex<()>,
}

impl Refresher {
    pub fn new(
        config: Arc<TrackerConfig>,
        source: Arc<dyn RepositorySource>,
        sink: Arc<dyn CommitInfoSink>,
    ) -> Self {
        Self {
            config,
            source,
            sink,
            pass_lock: Mutex::new(()),
        }
    }

    /// Run one pass. `None` if another pass is still in flight.
    pub async fn refresh_all(&self) -> Option<RefreshReport> {
        self.refresh_all_with(&Cancellation::new()).await
    }

    pub async fn refresh_all_with(&self, cancel: &Cancellation) -> Option<RefreshReport> {
        let Ok(_pass) = self.pass_lock.try_lock() else {
            tracing::warn!("Refresh pass already running, skipping");
            return None;
        };

        let repositories = self.source.repositories();
        let start = Instant::now();
        tracing::info!("Refreshing {} repositories", repositories.len());

        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut tasks = JoinSet::new();

        for repo in repositories {
            let semaphore = Arc::clone(&semaphore);
            let sink = Arc::clone(&self.sink);
            let cancel = cancel.child_with_timeout(self.config.fetch_timeout);

            tasks.spawn(async move {
                let id = repo.id();
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => refresh_blocking(repo, sink, cancel).await,
                    Err(err) => Err(AppError::Internal(format!("semaphore closed: {err}"))),
                };
                (id, result)
            });
        }

        let mut report = RefreshReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((id, Ok(_))) => report.succeeded.push(id),
                Ok((id, Err(err))) => {
                    tracing::warn!("Failed to refresh {}: {}", id, err);
                    report.failed.push(RefreshFailure {
                        repository: id,
                        reason: err.to_string(),
                    });
                }
                Err(err) => {
                    tracing::error!("Refresh task panicked: {}", err);
                    report.failed.push(RefreshFailure {
                        repository: "(unknown)".to_string(),
                        reason: err.to_string(),
                    });
                }
            }
        }

        report.succeeded.sort();
        report.failed.sort_by(|a, b| a.repository.cmp(&b.repository));
        tracing::info!(
            "Refresh pass done in {:?}: {} succeeded, {} failed",
            start.elapsed(),
            report.succeeded.len(),
            report.failed.len()
        );
        Some(report)
    }

    /// Refresh one repository on demand. Shares the per-repository lock
    /// with scheduled passes.
    pub async fn refresh_one(&self, repo: SharedRepo) -> Result<CommitTimestamps> {
        let cancel = Cancellation::with_timeout(self.config.fetch_timeout);
        refresh_blocking(repo, Arc::clone(&self.sink), cancel).await
    }

    /// Refresh on every interval tick until `shutdown` resolves. A pass in
    /// flight at shutdown is cancelled and awaited.
    pub async fn run<F>(self: Arc<Self>, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.config.refresh_interval;
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick fires immediately; the first pass waits one period.
        ticker.tick().await;

        tokio::pin!(shutdown);
        loop {
            if let Ok(period) = chrono::Duration::from_std(period) {
                tracing::info!("Next refresh at {} UTC", (Utc::now() + period).format("%Y-%m-%d %H:%M:%S"));
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }

            let cancel = Cancellation::new();
            let pass = self.refresh_all_with(&cancel);
            tokio::pin!(pass);

            tokio::select! {
                _ = &mut pass => {}
                _ = &mut shutdown => {
                    tracing::info!("Shutdown requested, cancelling refresh pass");
                    cancel.cancel();
                    pass.await;
                    break;
                }
            }
        }

        tracing::info!("Refresher stopped");
    }
}

async fn refresh_blocking(
    repo: SharedRepo,
    sink: Arc<dyn CommitInfoSink>,
    cancel: Cancellation,
) -> Result<CommitTimestamps> {
    tokio::task::spawn_blocking(move || {
        repo.refresh_with(&cancel)?;
        repo.update_commit_info(sink.as_ref())
    })
    .await
    .map_err(|err| AppError::Internal(format!("refresh task failed: {err}")))?
}
