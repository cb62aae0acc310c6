//! Sweep reporting.
//!
//! This module contains the append-only [`ResultLog`], the attempt registry,
//! and the final [`SweepReport`] with its JSON persistence.

mod log;
mod store;
mod summary;

pub use log::{AttemptOutcome, LogEntry, LogEvent, ResultLog, UpgradeAttempt};
pub use store::ReportStore;
pub use summary::{OrderingReport, REPORT_VERSION, SweepReport};
