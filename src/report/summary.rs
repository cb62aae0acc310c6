//! Sweep report types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::canister::{ModuleType, UpgradeTarget};
use crate::sweep::OrderingOutcome;

/// Current version of the report format.
pub const REPORT_VERSION: &str = "1.0";

/// Result of a complete sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepReport {
    /// Report format version.
    pub version: String,
    /// Unique identifier of the run.
    pub run_id: String,
    /// Version every module was upgraded to.
    pub target: UpgradeTarget,
    /// Module types under test, as given.
    pub modules: Vec<ModuleType>,
    /// Result log of the run.
    pub log_path: PathBuf,
    /// When the sweep started.
    pub started_at: DateTime<Utc>,
    /// When the last ordering finished.
    pub finished_at: Option<DateTime<Utc>>,
    /// One entry per ordering, in the order they ran.
    pub orderings: Vec<OrderingReport>,
}

/// Result of one ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderingReport {
    /// Ordering number, starting at 1.
    pub index: usize,
    /// Modules in upgrade order.
    pub order: Vec<ModuleType>,
    /// How the ordering ended.
    pub outcome: OrderingOutcome,
    /// Wall-clock time spent on the ordering.
    pub duration_secs: u64,
    /// Error from discarding the deployment, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discard_error: Option<String>,
}

impl OrderingReport {
    /// Space-separated module names.
    #[must_use]
    pub fn label(&self) -> String {
        self.order
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl SweepReport {
    /// Starts a report for a run.
    #[must_use]
    pub fn new(target: UpgradeTarget, modules: Vec<ModuleType>, log_path: PathBuf) -> Self {
        Self {
            version: String::from(REPORT_VERSION),
            run_id: uuid::Uuid::new_v4().to_string(),
            target,
            modules,
            log_path,
            started_at: Utc::now(),
            finished_at: None,
            orderings: Vec::new(),
        }
    }

    /// Adds the result of an ordering.
    pub fn push(&mut self, ordering: OrderingReport) {
        self.orderings.push(ordering);
    }

    /// Marks the sweep as finished.
    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Number of orderings attempted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.orderings.len()
    }

    /// Number of orderings that passed.
    #[must_use]
    pub fn passed(&self) -> usize {
        self.orderings
            .iter()
            .filter(|o| o.outcome.is_passed())
            .count()
    }

    /// Number of orderings that did not pass.
    #[must_use]
    pub fn aborted(&self) -> usize {
        self.total() - self.passed()
    }

    /// Returns true if any ordering did not pass.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.aborted() > 0
    }

    /// One-line summary of the sweep.
    #[must_use]
    pub fn summary_line(&self) -> String {
        let modules = self
            .modules
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "Tested {} orderings of [{modules}] at {}: {} passed, {} aborted",
            self.total(),
            self.target,
            self.passed(),
            self.aborted()
        )
    }
}
