//! JSON persistence of sweep reports.

use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{ReportError, Result};

use super::summary::SweepReport;

/// Reads and writes a [`SweepReport`] as JSON.
#[derive(Debug, Clone)]
pub struct ReportStore {
    path: PathBuf,
}

impl ReportStore {
    /// Creates a store writing to `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store writing next to a result log, at `<log>.json`.
    #[must_use]
    pub fn for_log(log_path: &Path) -> Self {
        let mut path = log_path.as_os_str().to_owned();
        path.push(".json");
        Self::new(path)
    }

    /// Path of the report file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_failed(&self, message: String) -> ReportError {
        ReportError::WriteFailed {
            path: self.path.clone(),
            message,
        }
    }

    /// Writes the report, replacing any previous one atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the report cannot be serialized or written.
    pub async fn save(&self, report: &SweepReport) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.write_failed(format!("Failed to create directory: {e}")))?;
        }

        let content = serde_json::to_string_pretty(report)
            .map_err(|e| ReportError::serialization(format!("Failed to serialize report: {e}")))?;

        // Write to a temporary file first, then rename
        let temp_path = self.path.with_extension("json.tmp");

        let mut file = fs::File::create(&temp_path)
            .await
            .map_err(|e| self.write_failed(format!("Failed to create temp report file: {e}")))?;

        file.write_all(content.as_bytes())
            .await
            .map_err(|e| self.write_failed(format!("Failed to write report: {e}")))?;

        file.sync_all()
            .await
            .map_err(|e| self.write_failed(format!("Failed to sync report: {e}")))?;

        fs::rename(&temp_path, &self.path)
            .await
            .map_err(|e| self.write_failed(format!("Failed to rename report: {e}")))?;

        info!("Report written to {}", self.path.display());
        Ok(())
    }

    /// Reads the report, if one was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load(&self) -> Result<Option<SweepReport>> {
        if !self.path.exists() {
            debug!("No report at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.write_failed(format!("Failed to read report: {e}")))?;

        let report = serde_json::from_str(&content)
            .map_err(|e| ReportError::serialization(format!("Failed to parse report: {e}")))?;

        Ok(Some(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canister::{ModuleType, UpgradeTarget};
    use crate::report::OrderingReport;
    use crate::sweep::OrderingOutcome;

    #[test]
    fn test_report_path_follows_log() {
        let store = ReportStore::for_log(Path::new("/tmp/upgrade-orders-1.log"));
        assert_eq!(store.path(), Path::new("/tmp/upgrade-orders-1.log.json"));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_path = dir.path().join("run.log");
        let store = ReportStore::for_log(&log_path);

        assert!(store.load().await.unwrap().is_none());

        let mut report = SweepReport::new(
            UpgradeTarget::new("abc123"),
            vec![ModuleType::Swap],
            log_path.clone(),
        );
        report.push(OrderingReport {
            index: 1,
            order: vec![ModuleType::Swap],
            outcome: OrderingOutcome::ProvisionFailed {
                message: String::from("wallet empty"),
            },
            duration_secs: 3,
            discard_error: None,
        });
        report.finish();

        store.save(&report).await.unwrap();
        let loaded = store.load().await.unwrap().unwrap();

        assert_eq!(loaded.run_id, report.run_id);
        assert_eq!(loaded.orderings.len(), 1);
        assert_eq!(loaded.orderings[0].outcome, report.orderings[0].outcome);
        assert!(!dir.path().join("run.log.json.tmp").exists());
    }
}
