//! Activity across many repositories: all of an account's, or all that
//! carry one tag.
//!
//! Per-source commit collection runs in parallel; results keep source order,
//! so merges of equal timestamps are deterministic for a given input.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::DayBucketing;
use crate::error::Result;
use crate::git::GitQueryable;
use crate::histogram::{histogram_of, merge_by_time};
use crate::models::{ActivityWindow, HistogramBucket};

/// `first_updated` of a collection with no commits at all.
pub const NO_DATA: i64 = i64::MAX;

pub struct Aggregate<'a, Q> {
    sources: &'a [Q],
    bucketing: DayBucketing,
}

impl<'a, Q: GitQueryable> Aggregate<'a, Q> {
    pub fn new(sources: &'a [Q], bucketing: DayBucketing) -> Self {
        Self { sources, bucketing }
    }

    /// Oldest authorized commit across all sources, or `NO_DATA`.
    pub fn first_updated(&self) -> Result<i64> {
        let firsts = self
            .sources
            .par_iter()
            .map(|source| source.first_updated())
            .collect::<Result<Vec<_>>>()?;
        Ok(firsts.into_iter().flatten().min().unwrap_or(NO_DATA))
    }

    /// Newest authorized commit across all sources, or 0.
    pub fn last_updated(&self) -> Result<i64> {
        let lasts = self
            .sources
            .par_iter()
            .map(|source| source.last_updated())
            .collect::<Result<Vec<_>>>()?;
        Ok(lasts.into_iter().flatten().max().unwrap_or(0))
    }

    pub fn histogram(&self, start: i64, end: i64) -> Result<Vec<HistogramBucket>> {
        let window = ActivityWindow::new(start, end);
        if window.is_empty() || self.sources.is_empty() {
            return Ok(Vec::new());
        }

        let per_source = self
            .sources
            .par_iter()
            .map(|source| {
                let commits = source.commits_between(window)?;
                tracing::debug!("{}: {} commits in window", source.label(), commits.len());
                Ok(commits)
            })
            .collect::<Result<Vec<_>>>()?;

        let merged = merge_by_time(per_source);
        Ok(histogram_of(&merged, window, &self.bucketing))
    }
}

/// Window and histogram for an activity view. Missing bounds fall back to
/// the collection's first and last update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySummary {
    pub first_updated: i64,
    pub last_updated: i64,
    pub histogram: Vec<HistogramBucket>,
}

impl ActivitySummary {
    pub fn compute<Q: GitQueryable>(
        aggregate: &Aggregate<'_, Q>,
        start: Option<i64>,
        end: Option<i64>,
    ) -> Result<Self> {
        let first_updated = match start {
            Some(start) => start,
            None => aggregate.first_updated()?,
        };
        let last_updated = match end {
            Some(end) => end,
            None => aggregate.last_updated()?,
        };
        let histogram = aggregate.histogram(first_updated, last_updated)?;

        Ok(Self {
            first_updated,
            last_updated,
            histogram,
        })
    }
}
