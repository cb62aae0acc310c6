//! Append-only result log.
//!
//! Every progress and failure line is tagged with its ordering and step,
//! appended to the log file, kept in memory for the final report, and echoed
//! to the console through `tracing`. Write failures are reported but never
//! stop the sweep.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::artifact::ArtifactVariant;
use crate::canister::ModuleType;
use crate::error::{ReportError, Result};

/// Kind of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum LogEvent {
    /// The sweep started.
    RunStarted,
    /// An ordering started.
    OrderingStarted,
    /// A deployment was created for an ordering.
    Provisioned,
    /// No deployment could be created.
    ProvisionFailed,
    /// An artifact was published.
    Upload,
    /// An upgrade proposal was submitted.
    Proposed,
    /// A module reports the expected version or hash.
    PollOk,
    /// A step failed.
    StepFailed,
    /// Compressed and decompressed hashes differ.
    HashesDiffer,
    /// Compressed and decompressed hashes coincide.
    HashesSame,
    /// A module converged on its decompressed artifact.
    IntegrityPass,
    /// The deployment of an ordering was discarded.
    Discarded,
    /// An ordering passed.
    Finished,
    /// An ordering was abandoned.
    Aborted,
    /// The sweep finished.
    Summary,
}

impl LogEvent {
    /// Short tag written in each line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RunStarted => "run-started",
            Self::OrderingStarted => "ordering-started",
            Self::Provisioned => "provisioned",
            Self::ProvisionFailed => "provision-failed",
            Self::Upload => "upload",
            Self::Proposed => "proposed",
            Self::PollOk => "poll-ok",
            Self::StepFailed => "step-failed",
            Self::HashesDiffer => "hashes-differ",
            Self::HashesSame => "hashes-same",
            Self::IntegrityPass => "integrity-pass",
            Self::Discarded => "discarded",
            Self::Finished => "finished",
            Self::Aborted => "aborted",
            Self::Summary => "summary",
        }
    }

    /// Returns true for events that report a failure.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::ProvisionFailed | Self::StepFailed | Self::HashesSame | Self::Aborted
        )
    }
}

/// One line of the result log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    /// When the line was written.
    pub timestamp: DateTime<Utc>,
    /// Ordering the line belongs to, as displayed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ordering: Option<String>,
    /// Step number, starting at 1.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<usize>,
    /// Module of the step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<ModuleType>,
    /// Artifact variant in use.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<ArtifactVariant>,
    /// Kind of line.
    pub event: LogEvent,
    /// Human-readable text.
    pub message: String,
}

impl LogEntry {
    /// Creates an untagged entry.
    #[must_use]
    pub fn new(event: LogEvent, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            ordering: None,
            step: None,
            module: None,
            variant: None,
            event,
            message: message.into(),
        }
    }

    /// Tags the entry with an ordering.
    #[must_use]
    pub fn ordering(mut self, ordering: impl fmt::Display) -> Self {
        self.ordering = Some(ordering.to_string());
        self
    }

    /// Tags the entry with a step.
    #[must_use]
    pub const fn step(mut self, step: usize, module: ModuleType) -> Self {
        self.step = Some(step);
        self.module = Some(module);
        self
    }

    /// Tags the entry with an artifact variant.
    #[must_use]
    pub const fn variant(mut self, variant: ArtifactVariant) -> Self {
        self.variant = Some(variant);
        self
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ", self.timestamp.format("%Y-%m-%dT%H:%M:%SZ"))?;
        if let Some(ordering) = &self.ordering {
            write!(f, "[{ordering}] ")?;
        }
        if let (Some(step), Some(module)) = (self.step, self.module) {
            write!(f, "[step {step} {module}] ")?;
        }
        write!(f, "{}: {}", self.event.as_str(), self.message)
    }
}

/// Result of one upgrade attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The module reached the expected version or hash.
    Converged,
    /// The step deadline passed first.
    TimedOut,
    /// A request was refused.
    Rejected,
}

/// One module upgrade within one ordering with one artifact variant.
///
/// Attempts are immutable once recorded.
#[derive(Debug, Clone, Serialize)]
pub struct UpgradeAttempt {
    ordering: usize,
    step: usize,
    module: ModuleType,
    variant: ArtifactVariant,
    outcome: AttemptOutcome,
    recorded_at: DateTime<Utc>,
}

impl UpgradeAttempt {
    /// Creates an attempt record.
    #[must_use]
    pub fn new(
        ordering: usize,
        step: usize,
        module: ModuleType,
        variant: ArtifactVariant,
        outcome: AttemptOutcome,
    ) -> Self {
        Self {
            ordering,
            step,
            module,
            variant,
            outcome,
            recorded_at: Utc::now(),
        }
    }

    /// Ordering number, starting at 1.
    #[must_use]
    pub const fn ordering(&self) -> usize {
        self.ordering
    }

    /// Step number, starting at 1.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Module upgraded.
    #[must_use]
    pub const fn module(&self) -> ModuleType {
        self.module
    }

    /// Artifact variant used.
    #[must_use]
    pub const fn variant(&self) -> ArtifactVariant {
        self.variant
    }

    /// How the attempt ended.
    #[must_use]
    pub const fn outcome(&self) -> AttemptOutcome {
        self.outcome
    }

    /// When the attempt was recorded.
    #[must_use]
    pub const fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }
}

/// Append-only log of a sweep.
#[derive(Debug)]
pub struct ResultLog {
    path: PathBuf,
    writer: LineWriter<File>,
    entries: Vec<LogEntry>,
    attempts: Vec<UpgradeAttempt>,
    recorded: HashSet<(usize, usize, ArtifactVariant)>,
    write_failures: usize,
}

impl ResultLog {
    /// Creates the log file at `path`, along with missing parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let write_failed = |e: std::io::Error| ReportError::WriteFailed {
            path: path.clone(),
            message: e.to_string(),
        };

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(write_failed)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(write_failed)?;

        Ok(Self {
            writer: LineWriter::new(file),
            path,
            entries: Vec::new(),
            attempts: Vec::new(),
            recorded: HashSet::new(),
            write_failures: 0,
        })
    }

    /// Default log file location inside `dir`, unique per run.
    #[must_use]
    pub fn default_path(dir: &Path) -> PathBuf {
        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let id = uuid::Uuid::new_v4().simple().to_string();
        dir.join(format!("upgrade-orders-{stamp}-{}.log", &id[..8]))
    }

    /// Path of the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a line to the file and echoes it to the console.
    pub fn append(&mut self, entry: LogEntry) {
        if entry.event.is_failure() {
            warn!("{entry}");
        } else {
            info!("{entry}");
        }

        if let Err(e) = writeln!(self.writer, "{entry}") {
            self.write_failures += 1;
            warn!("Failed to write to {}: {e}", self.path.display());
        }

        self.entries.push(entry);
    }

    /// Registers an upgrade attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if an attempt for the same ordering, step and variant
    /// was already recorded. The first record is kept.
    pub fn record_attempt(&mut self, attempt: UpgradeAttempt) -> Result<()> {
        let key = (attempt.ordering, attempt.step, attempt.variant);
        if !self.recorded.insert(key) {
            return Err(ReportError::DuplicateAttempt {
                ordering: attempt.ordering,
                step: attempt.step,
                variant: attempt.variant.to_string(),
            }
            .into());
        }

        self.attempts.push(attempt);
        Ok(())
    }

    /// Every line appended so far.
    #[must_use]
    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    /// Lines tagged with the given ordering, as displayed.
    pub fn entries_for<'a>(&'a self, ordering: &'a str) -> impl Iterator<Item = &'a LogEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.ordering.as_deref() == Some(ordering))
    }

    /// Every attempt recorded so far.
    #[must_use]
    pub fn attempts(&self) -> &[UpgradeAttempt] {
        &self.attempts
    }

    /// Number of lines that could not be written to the file.
    #[must_use]
    pub const fn write_failures(&self) -> usize {
        self.write_failures
    }
}
