//! Time-series DTOs.
//!
//! - `HistogramBucket`: commits on one calendar day (sparse series)
//! - `ActivityWindow`: inclusive `[start, end]` range in unix seconds

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Day key, see `DayBucketing::day_key`
    pub date: i64,
    pub value: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub start: i64,
    pub end: i64,
}

impl ActivityWindow {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: i64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }
}
