//! Day-granularity commit histograms.
//!
//! Input must already be ordered by commit time, oldest first. The window
//! filter is a single forward scan, so unsorted input silently drops commits.

use crate::config::DayBucketing;
use crate::models::{ActivityWindow, CommitRecord, HistogramBucket};

/// Bucket `commit_times` that fall inside `window` (both ends inclusive).
///
/// Only days with at least one commit produce a bucket.
pub fn histogram<I>(commit_times: I, window: ActivityWindow, bucketing: &DayBucketing) -> Vec<HistogramBucket>
where
    I: IntoIterator<Item = i64>,
{
    let mut buckets: Vec<HistogramBucket> = Vec::new();

    let in_window = commit_times
        .into_iter()
        .skip_while(|&time| time < window.start)
        .take_while(|&time| time <= window.end);

    for time in in_window {
        let Some(date) = bucketing.day_key(time) else {
            tracing::warn!("Commit time {} is out of range, skipping", time);
            continue;
        };
        match buckets.last_mut() {
            Some(last) if last.date == date => last.value += 1,
            _ => buckets.push(HistogramBucket { date, value: 1 }),
        }
    }

    buckets
}

/// Convenience wrapper over time-ascending commit records.
pub fn histogram_of(commits: &[CommitRecord], window: ActivityWindow, bucketing: &DayBucketing) -> Vec<HistogramBucket> {
    histogram(commits.iter().map(|c| c.commit_time), window, bucketing)
}

/// Stable sort of commits from several sources into one ascending sequence.
pub fn merge_by_time(sources: Vec<Vec<CommitRecord>>) -> Vec<CommitRecord> {
    let mut merged: Vec<CommitRecord> = sources.into_iter().flatten().collect();
    merged.sort_by_key(|c| c.commit_time);
    merged
}
