//! Last-outcome board for scheduled jobs.
//!
//! Jobs report a summary after every run; the board keeps the most recent
//! report per job for the status surface. Stale data stays visible — a
//! failed run records its failure but never erases the previous report's
//! context for operators comparing runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// Outcome summary of one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    /// Job name, e.g. "quote_refresh"
    pub job: String,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// Run duration in milliseconds
    pub elapsed_ms: u64,
    /// Items that succeeded
    pub succeeded: usize,
    /// Items that were skipped (no-ops count as one skip)
    pub skipped: usize,
    /// Items that failed
    pub failed: usize,
    /// Free-form outcome note
    pub message: String,
}

/// Shared board of the latest report per job.
pub struct StatusBoard {
    reports: RwLock<HashMap<String, JobReport>>,
}

impl StatusBoard {
    /// Create an empty board.
    pub fn new() -> Self {
        Self {
            reports: RwLock::new(HashMap::new()),
        }
    }

    /// Record a job run, replacing the previous report for that job.
    pub fn record(&self, report: JobReport) {
        self.reports
            .write()
            .unwrap()
            .insert(report.job.clone(), report);
    }

    /// Latest report for one job.
    pub fn get(&self, job: &str) -> Option<JobReport> {
        self.reports.read().unwrap().get(job).cloned()
    }

    /// All latest reports, sorted by job name.
    pub fn snapshot(&self) -> Vec<JobReport> {
        let mut out: Vec<JobReport> = self.reports.read().unwrap().values().cloned().collect();
        out.sort_by(|a, b| a.job.cmp(&b.job));
        out
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}
