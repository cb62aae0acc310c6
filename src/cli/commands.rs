//! CLI argument definitions.
//!
//! This module defines the command line of the validator using clap.

use clap::Parser;
use std::path::PathBuf;

use crate::canister::ModuleType;

/// Upgrade-orders - proves a release upgrades cleanly in every module order.
#[derive(Parser, Debug)]
#[command(name = "upgrade-orders")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Version (revision id) every module is upgraded to.
    #[arg(id = "target_version", value_name = "VERSION")]
    pub version: String,

    /// Module types to upgrade: root, governance, ledger, swap, index.
    #[arg(required = true, num_args = 1..)]
    pub module_types: Vec<ModuleType>,

    /// Path to the configuration file.
    #[arg(short, long, env = "UPGRADE_ORDERS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format of the final summary (text, json).
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Write the result log here instead of a fresh file in the log directory.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Exit with status 3 if any ordering did not pass.
    #[arg(long)]
    pub fail_on_abort: bool,

    /// Seconds between two convergence probes.
    #[arg(long)]
    pub poll_interval_secs: Option<u64>,

    /// Seconds a single upgrade step may take.
    #[arg(long)]
    pub step_timeout_secs: Option<u64>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn test_parses_version_and_modules() {
        let cli = Cli::try_parse_from(["upgrade-orders", "1.0.0", "root", "governance"]).unwrap();
        assert_eq!(cli.version, "1.0.0");
        assert_eq!(cli.module_types, vec![ModuleType::Root, ModuleType::Governance]);
        assert_eq!(cli.output, OutputFormat::Text);
        assert!(!cli.fail_on_abort);
    }

    #[test]
    fn test_overrides() {
        let cli = Cli::try_parse_from([
            "upgrade-orders",
            "--poll-interval-secs",
            "5",
            "--step-timeout-secs",
            "300",
            "--output",
            "json",
            "--fail-on-abort",
            "abc123",
            "ledger",
        ])
        .unwrap();
        assert_eq!(cli.poll_interval_secs, Some(5));
        assert_eq!(cli.step_timeout_secs, Some(300));
        assert_eq!(cli.output, OutputFormat::Json);
        assert!(cli.fail_on_abort);
    }

    #[test]
    fn test_module_types_required() {
        let err = Cli::try_parse_from(["upgrade-orders", "1.0.0"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);

        let err = Cli::try_parse_from(["upgrade-orders"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_unknown_module_type_rejected() {
        let err = Cli::try_parse_from(["upgrade-orders", "1.0.0", "wallet"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValueValidation);
    }
}
