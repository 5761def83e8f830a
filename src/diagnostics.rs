//! Failure reporting sink.
//!
//! When an item exhausts every candidate, the resolver hands a
//! [`FailureReport`] to its [`FailureSink`]. The report carries the full
//! attempt log so an operator can see which hosts timed out and which
//! returned something that was not a usable image.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::AttemptError;

/// One failed candidate attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub url: String,
    /// `0` for the primary pass, `1..` for retry passes.
    pub pass: u32,
    pub error: AttemptError,
}

/// Everything known about an item that ended without a cover.
#[derive(Debug, Clone, Serialize)]
pub struct FailureReport {
    pub item_id: String,
    pub title: String,
    pub author: String,
    pub tried_urls: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
    pub reported_at: DateTime<Utc>,
}

impl FailureReport {
    pub fn timeouts(&self) -> usize {
        self.attempts.iter().filter(|a| a.error.is_timeout()).count()
    }
}

/// Receives reports for items that exhausted all candidates.
pub trait FailureSink: Send + Sync {
    fn report_failure(&self, report: &FailureReport);
}

/// Discards reports.
pub struct NoopSink;

impl FailureSink for NoopSink {
    fn report_failure(&self, _report: &FailureReport) {}
}

/// Writes each report to the `tracing` log: one `warn!` summary and a
/// `debug!` line per failed attempt.
pub struct LogSink;

impl FailureSink for LogSink {
    fn report_failure(&self, report: &FailureReport) {
        warn!(
            item = %report.item_id,
            title = %report.title,
            tried = ?report.tried_urls,
            attempts = report.attempts.len(),
            timeouts = report.timeouts(),
            "no cover found"
        );
        for attempt in &report.attempts {
            debug!(
                item = %report.item_id,
                url = %attempt.url,
                pass = attempt.pass,
                error = %attempt.error,
                "failed attempt"
            );
        }
    }
}

/// Keeps the most recent reports in memory, one per item.
pub struct MemoryFailureLog {
    reports: Mutex<VecDeque<FailureReport>>,
    capacity: usize,
}

impl MemoryFailureLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            reports: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Reports, oldest first.
    pub fn reports(&self) -> Vec<FailureReport> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<FailureReport>> {
        self.reports.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MemoryFailureLog {
    fn default() -> Self {
        Self::new(500)
    }
}

impl FailureSink for MemoryFailureLog {
    fn report_failure(&self, report: &FailureReport) {
        let mut reports = self.lock();
        reports.retain(|r| r.item_id != report.item_id);
        if reports.len() == self.capacity {
            reports.pop_front();
        }
        reports.push_back(report.clone());
    }
}
