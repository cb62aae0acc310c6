//! Sweep orchestration.
//!
//! Runs every ordering against its own freshly provisioned deployment, one
//! after the other. A failed ordering is recorded and the sweep moves on; only
//! the caller decides what a failed ordering means for the process.

use std::time::Instant;
use tracing::warn;

use crate::artifact::{ArtifactSource, Codec};
use crate::canister::{DeploymentInstance, UpgradeTarget};
use crate::config::PollingConfig;
use crate::network::GovernedNetwork;
use crate::report::{LogEntry, LogEvent, OrderingReport, ResultLog, SweepReport};

use super::context::{OrderingContext, StepFailure};
use super::driver::UpgradeDriver;
use super::integrity::ArtifactIntegrityChecker;
use super::machine::OrderingOutcome;
use super::orders::{OrderGenerator, UpgradeOrder};
use super::poll::{StepDeadline, retry_until};

/// Runs a complete sweep over every ordering.
pub struct SweepRunner<'a> {
    network: &'a dyn GovernedNetwork,
    driver: UpgradeDriver<'a>,
    codec: &'a dyn Codec,
    polling: PollingConfig,
    target: UpgradeTarget,
}

impl<'a> SweepRunner<'a> {
    /// Creates a runner upgrading to `target`.
    #[must_use]
    pub const fn new(
        network: &'a dyn GovernedNetwork,
        source: &'a dyn ArtifactSource,
        codec: &'a dyn Codec,
        polling: PollingConfig,
        target: UpgradeTarget,
    ) -> Self {
        Self {
            network,
            driver: UpgradeDriver::new(network, source, polling),
            codec,
            polling,
            target,
        }
    }

    /// Attempts every ordering produced by `generator` and reports the results.
    pub async fn run(&self, generator: &OrderGenerator, log: &mut ResultLog) -> SweepReport {
        let mut report = SweepReport::new(
            self.target.clone(),
            generator.modules().to_vec(),
            log.path().to_path_buf(),
        );
        let total = generator
            .total()
            .map_or_else(|| String::from("?"), |t| t.to_string());

        log.append(LogEntry::new(
            LogEvent::RunStarted,
            format!("Testing {total} upgrade orderings at version {}", self.target),
        ));

        for (index, order) in (1..).zip(generator.orderings()) {
            let ordering = self.run_ordering(index, &total, &order, log).await;
            report.push(ordering);
        }

        report.finish();
        log.append(LogEntry::new(LogEvent::Summary, report.summary_line()));
        report
    }

    /// Provisions, tests and discards the deployment of one ordering.
    async fn run_ordering(
        &self,
        index: usize,
        total: &str,
        order: &UpgradeOrder,
        log: &mut ResultLog,
    ) -> OrderingReport {
        let started = Instant::now();
        log.append(
            LogEntry::new(
                LogEvent::OrderingStarted,
                format!("Testing '{order}' ({index} of {total})"),
            )
            .ordering(order),
        );

        let id = uuid::Uuid::new_v4().simple().to_string();
        let label = format!("upgrade-order-{index}-{}", &id[..8]);
        let deadline = StepDeadline::start(&self.polling);
        let network = self.network;
        let label_ref = label.as_str();

        let instance = match retry_until(&deadline, "Provisioning", move || {
            network.provision(label_ref)
        })
        .await
        {
            Ok(instance) => instance,
            Err(e) => {
                log.append(
                    LogEntry::new(LogEvent::ProvisionFailed, format!("Could not provision '{label}': {e}"))
                        .ordering(order),
                );
                log.append(
                    LogEntry::new(LogEvent::Aborted, format!("Aborted testing '{order}'"))
                        .ordering(order),
                );
                return OrderingReport {
                    index,
                    order: order.modules().to_vec(),
                    outcome: OrderingOutcome::ProvisionFailed {
                        message: e.to_string(),
                    },
                    duration_secs: started.elapsed().as_secs(),
                    discard_error: None,
                };
            }
        };

        log.append(
            LogEntry::new(
                LogEvent::Provisioned,
                format!(
                    "Provisioned deployment '{}' with {} canisters",
                    instance.label(),
                    instance.modules().len()
                ),
            )
            .ordering(order),
        );

        let outcome = self.test_ordering(index, order, &instance, log).await;

        let message = match &outcome {
            OrderingOutcome::Passed => format!("Finished testing '{order}'"),
            failed => format!("Aborted testing '{order}': {failed}"),
        };
        let event = if outcome.is_passed() {
            LogEvent::Finished
        } else {
            LogEvent::Aborted
        };
        log.append(LogEntry::new(event, message).ordering(order));

        let discard_error = match self.network.discard(instance).await {
            Ok(()) => {
                log.append(
                    LogEntry::new(LogEvent::Discarded, format!("Discarded deployment '{label}'"))
                        .ordering(order),
                );
                None
            }
            Err(e) => {
                warn!("Failed to discard deployment '{label}': {e}");
                Some(e.to_string())
            }
        };

        OrderingReport {
            index,
            order: order.modules().to_vec(),
            outcome,
            duration_secs: started.elapsed().as_secs(),
            discard_error,
        }
    }

    /// Runs the upgrade pass and then the integrity pass.
    async fn test_ordering(
        &self,
        index: usize,
        order: &UpgradeOrder,
        instance: &DeploymentInstance,
        log: &mut ResultLog,
    ) -> OrderingOutcome {
        let mut ctx = match OrderingContext::provisioned(index, order, instance, &self.target) {
            Ok(ctx) => ctx,
            Err(e) => {
                return OrderingOutcome::ProvisionFailed {
                    message: e.to_string(),
                };
            }
        };

        let pass = match self.driver.run(&mut ctx, log).await {
            Ok(pass) => pass,
            Err(failure) => {
                let StepFailure {
                    step,
                    module,
                    reason,
                    error,
                } = failure;
                return OrderingOutcome::UpgradeFailed {
                    step,
                    module,
                    reason,
                    message: error.to_string(),
                };
            }
        };

        let checker = ArtifactIntegrityChecker::new(&self.driver, self.codec);
        match checker.run(&mut ctx, &pass, log).await {
            Ok(()) => OrderingOutcome::Passed,
            Err(StepFailure {
                step,
                module,
                reason,
                error,
            }) => OrderingOutcome::IntegrityFailed {
                step,
                module,
                reason,
                message: error.to_string(),
            },
        }
    }
}
