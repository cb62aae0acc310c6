//! Output formatting for the CLI.
//!
//! This module renders the sweep report and status messages either as
//! coloured text for operators or as JSON for automation.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::report::SweepReport;
use crate::sweep::OrderingOutcome;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Ordering row for table display.
#[derive(Tabled)]
struct OrderingRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Upgrade order")]
    order: String,
    #[tabled(rename = "Outcome")]
    outcome: String,
    #[tabled(rename = "Failed step")]
    step: String,
    #[tabled(rename = "Duration")]
    duration: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats the sweep report for display.
    #[must_use]
    pub fn format_report(&self, report: &SweepReport) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(report).unwrap_or_default(),
            OutputFormat::Text => Self::format_report_text(report),
        }
    }

    /// Formats the report as text.
    fn format_report_text(report: &SweepReport) -> String {
        let mut output = String::new();

        let _ = write!(
            output,
            "\nUpgrade orders for version {}\n\n",
            report.target.to_string().bold()
        );

        if report.orderings.is_empty() {
            output.push_str("   No orderings were tested.\n");
            return output;
        }

        let rows: Vec<OrderingRow> = report
            .orderings
            .iter()
            .map(|o| OrderingRow {
                index: o.index,
                order: o.label(),
                outcome: Self::format_outcome(&o.outcome),
                step: o
                    .outcome
                    .failed_step()
                    .map_or_else(|| String::from("-"), |(step, module)| format!("{step} ({module})")),
                duration: format!("{}s", o.duration_secs),
            })
            .collect();

        output.push_str(&Table::new(rows).to_string());
        output.push('\n');

        let failures: Vec<_> = report
            .orderings
            .iter()
            .filter(|o| !o.outcome.is_passed())
            .collect();
        if !failures.is_empty() {
            let _ = write!(output, "\n{} Failures:\n", "⚠".yellow());
            for ordering in failures {
                let _ = writeln!(
                    output,
                    "   #{} {}: {}",
                    ordering.index,
                    ordering.label(),
                    Self::failure_message(&ordering.outcome)
                );
            }
        }

        let discard_failures = report
            .orderings
            .iter()
            .filter(|o| o.discard_error.is_some())
            .count();
        if discard_failures > 0 {
            let _ = writeln!(
                output,
                "\n{} {discard_failures} deployments could not be discarded",
                "⚠".yellow()
            );
        }

        let status = if report.has_failures() {
            "✗".red()
        } else {
            "✓".green()
        };
        let _ = write!(output, "\n{status} {}\n", report.summary_line());
        let _ = writeln!(output, "   Log: {}", report.log_path.display());

        output
    }

    /// Formats an outcome with color.
    fn format_outcome(outcome: &OrderingOutcome) -> String {
        match outcome {
            OrderingOutcome::Passed => "passed".green().to_string(),
            OrderingOutcome::ProvisionFailed { .. } => "provision failed".yellow().to_string(),
            OrderingOutcome::UpgradeFailed { reason, .. } => {
                format!("upgrade {reason}").red().to_string()
            }
            OrderingOutcome::IntegrityFailed { reason, .. } => {
                format!("integrity {reason}").red().to_string()
            }
        }
    }

    /// Error message carried by a failed outcome.
    fn failure_message(outcome: &OrderingOutcome) -> String {
        match outcome {
            OrderingOutcome::Passed => String::new(),
            OrderingOutcome::ProvisionFailed { message }
            | OrderingOutcome::UpgradeFailed { message, .. }
            | OrderingOutcome::IntegrityFailed { message, .. } => Self::truncate(message, 160),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }

    /// Formats an error message.
    #[must_use]
    pub fn error(&self, message: &str) -> String {
        self.status_line("error", &"✗".red().to_string(), message)
    }

    fn status_line(&self, status: &str, symbol: &str, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({ "status": status, "message": message });
                serde_json::to_string(&json).unwrap_or_default()
            }
            OutputFormat::Text => format!("{symbol} {message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canister::{ModuleType, UpgradeTarget};
    use crate::report::OrderingReport;
    use crate::sweep::AbortReason;
    use std::path::PathBuf;

    fn report() -> SweepReport {
        let mut report = SweepReport::new(
            UpgradeTarget::new("1.0.0"),
            vec![ModuleType::Root, ModuleType::Governance],
            PathBuf::from("/tmp/upgrade-orders.log"),
        );
        report.push(OrderingReport {
            index: 1,
            order: vec![ModuleType::Root, ModuleType::Governance],
            outcome: OrderingOutcome::Passed,
            duration_secs: 40,
            discard_error: None,
        });
        report.push(OrderingReport {
            index: 2,
            order: vec![ModuleType::Governance, ModuleType::Root],
            outcome: OrderingOutcome::IntegrityFailed {
                step: 1,
                module: ModuleType::Governance,
                reason: AbortReason::HashMismatch,
                message: String::from("Compressed and decompressed governance artifacts share hash ab"),
            },
            duration_secs: 20,
            discard_error: Some(String::from("uninstall failed")),
        });
        report.finish();
        report
    }

    #[test]
    fn test_text_report_lists_every_ordering() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_report(&report());

        assert!(text.contains("root governance"));
        assert!(text.contains("governance root"));
        assert!(text.contains("integrity hashes identical"));
        assert!(text.contains("1 (governance)"));
        assert!(text.contains("1 deployments could not be discarded"));
        assert!(text.contains("Tested 2 orderings of [root, governance] at 1.0.0: 1 passed, 1 aborted"));
    }

    #[test]
    fn test_json_report_is_machine_readable() {
        let json = OutputFormatter::new(OutputFormat::Json).format_report(&report());
        let parsed: SweepReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.orderings.len(), 2);
        assert!(parsed.orderings[1].discard_error.is_some());
    }

    #[test]
    fn test_status_lines() {
        let json = OutputFormatter::new(OutputFormat::Json).error("PEM is missing");
        assert_eq!(json, r#"{"message":"PEM is missing","status":"error"}"#);

        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).error("preflight failed");
        assert_eq!(text, "✗ preflight failed");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 10), "short");
        assert_eq!(OutputFormatter::truncate("abcdefghijkl", 8), "abcde...");
    }
}
