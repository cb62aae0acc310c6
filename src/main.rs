//! Upgrade-orders CLI entrypoint.
//!
//! This is the main entrypoint for the upgrade-orders command-line tool.

use std::path::Path;
use std::process::ExitCode;

use canister_upgrade_orders::artifact::{GzipCodec, HttpArtifactSource};
use canister_upgrade_orders::canister::UpgradeTarget;
use canister_upgrade_orders::cli::{Cli, OutputFormatter};
use canister_upgrade_orders::config::{ConfigParser, ConfigValidator, ValidatorConfig};
use canister_upgrade_orders::error::Result;
use canister_upgrade_orders::network::SnsCliNetwork;
use canister_upgrade_orders::report::{ReportStore, ResultLog, SweepReport};
use canister_upgrade_orders::sweep::{OrderGenerator, SweepRunner};

use clap::CommandFactory;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code when the configuration or a collaborator is unusable.
const EXIT_SETUP_FAILURE: u8 = 1;

/// Exit code when `--fail-on-abort` is set and an ordering did not pass.
const EXIT_ORDERING_ABORTED: u8 = 3;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse_args();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    runtime.block_on(run(cli))
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> ExitCode {
    let formatter = OutputFormatter::new(cli.output);

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            if e.is_configuration() {
                eprintln!("\n{}", Cli::command().render_usage());
            }
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    let report = match sweep(&cli, &config).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("{}", formatter.error(&e.to_string()));
            return ExitCode::from(EXIT_SETUP_FAILURE);
        }
    };

    println!("{}", formatter.format_report(&report));

    if cli.fail_on_abort && report.has_failures() {
        ExitCode::from(EXIT_ORDERING_ABORTED)
    } else {
        ExitCode::SUCCESS
    }
}

/// Loads bindings and tunables, applies command-line overrides and validates
/// the result together with the module selection.
fn load_config(cli: &Cli) -> Result<ValidatorConfig> {
    let parser = match cli.config.as_deref().and_then(Path::parent) {
        Some(dir) if !dir.as_os_str().is_empty() => ConfigParser::new().with_base_path(dir),
        _ => ConfigParser::new(),
    };

    let mut config = parser.load(cli.config.as_deref())?;

    if let Some(secs) = cli.poll_interval_secs {
        debug!("Overriding polling.interval_secs from command line");
        config.settings.polling.interval_secs = secs;
    }
    if let Some(secs) = cli.step_timeout_secs {
        debug!("Overriding polling.step_timeout_secs from command line");
        config.settings.polling.step_timeout_secs = secs;
    }

    let validator = ConfigValidator::new();
    validator.validate(&config)?;
    validator.validate_modules(&cli.module_types)?;

    Ok(config)
}

/// Runs the full sweep and persists its report next to the result log.
async fn sweep(cli: &Cli, config: &ValidatorConfig) -> Result<SweepReport> {
    let generator = OrderGenerator::new(&cli.module_types)?;

    let log_path = cli
        .log_file
        .clone()
        .unwrap_or_else(|| ResultLog::default_path(&config.log_dir()));
    let mut log = ResultLog::create(log_path)?;
    eprintln!("Logging results to {}", log.path().display());

    let source = HttpArtifactSource::new(&config.settings.artifacts.base_url)?;
    let network = SnsCliNetwork::new(config)?;
    network.preflight().await?;

    let codec = GzipCodec::default();
    let runner = SweepRunner::new(
        &network,
        &source,
        &codec,
        config.polling(),
        UpgradeTarget::new(cli.version.as_str()),
    );

    info!(
        "Testing {} orderings of {} modules",
        generator
            .total()
            .map_or_else(|| String::from("?"), |total| total.to_string()),
        cli.module_types.len()
    );
    let report = runner.run(&generator, &mut log).await;

    let store = ReportStore::for_log(log.path());
    match store.save(&report).await {
        Ok(()) => info!("Report saved to {}", store.path().display()),
        Err(e) => warn!("Failed to save report: {e}"),
    }
    if log.write_failures() > 0 {
        warn!("{} log lines could not be written to {}", log.write_failures(), log.path().display());
    }

    Ok(report)
}
