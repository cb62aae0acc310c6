//! Upgrade pass over one ordering.
//!
//! For each module in turn the driver fetches the compressed artifact,
//! publishes it, proposes the upgrade and polls until the module reports the
//! target version. The whole step shares one deadline; a failed step ends the
//! ordering.

use tracing::{debug, warn};

use crate::artifact::{Artifact, ArtifactHasher, ArtifactSource, ArtifactVariant};
use crate::canister::{DeploymentInstance, ModuleType, UpgradeTarget};
use crate::config::PollingConfig;
use crate::error::Result;
use crate::network::GovernedNetwork;
use crate::report::{AttemptOutcome, LogEvent, ResultLog};

use super::context::{OrderingContext, StepFailure, attempt_outcome};
use super::machine::OrderingPhase;
use super::poll::{Expectation, StepDeadline, poll_until, retry_until};

/// What a module must report before a step counts as converged.
#[derive(Debug, Clone, Copy)]
pub enum Convergence<'a> {
    /// The running version equals the target.
    Version(&'a UpgradeTarget),
    /// The installed module hash equals the given content hash.
    ContentHash(&'a str),
}

/// Artifacts that carried a successful upgrade pass, in step order.
#[derive(Debug, Clone)]
pub struct UpgradePass {
    artifacts: Vec<Artifact>,
}

impl UpgradePass {
    /// The compressed artifacts, one per step.
    #[must_use]
    pub fn artifacts(&self) -> &[Artifact] {
        &self.artifacts
    }
}

/// Drives upgrades through the governed network.
pub struct UpgradeDriver<'a> {
    network: &'a dyn GovernedNetwork,
    source: &'a dyn ArtifactSource,
    polling: PollingConfig,
}

impl<'a> UpgradeDriver<'a> {
    /// Creates a driver.
    #[must_use]
    pub const fn new(
        network: &'a dyn GovernedNetwork,
        source: &'a dyn ArtifactSource,
        polling: PollingConfig,
    ) -> Self {
        Self {
            network,
            source,
            polling,
        }
    }

    /// Polling parameters in use.
    #[must_use]
    pub const fn polling(&self) -> &PollingConfig {
        &self.polling
    }

    /// Upgrades every module of the ordering with its compressed artifact.
    ///
    /// # Errors
    ///
    /// Returns the first step that failed; later steps are not attempted.
    pub async fn run(
        &self,
        ctx: &mut OrderingContext<'_>,
        log: &mut ResultLog,
    ) -> std::result::Result<UpgradePass, StepFailure> {
        let order = ctx.order();
        let mut artifacts = Vec::with_capacity(order.len());

        for (step, module) in (1..).zip(order.modules().iter().copied()) {
            match self.upgrade_step(ctx, step, module, log).await {
                Ok(artifact) => {
                    ctx.record_attempt(
                        log,
                        step,
                        module,
                        ArtifactVariant::Compressed,
                        AttemptOutcome::Converged,
                    );
                    artifacts.push(artifact);
                }
                Err(error) => {
                    let failure = ctx.fail(step, module, error);
                    ctx.record_attempt(
                        log,
                        step,
                        module,
                        ArtifactVariant::Compressed,
                        attempt_outcome(failure.reason),
                    );
                    log.append(ctx.step_entry(
                        step,
                        module,
                        ArtifactVariant::Compressed,
                        LogEvent::StepFailed,
                        format!("Upgrade {}: {}", failure.reason, failure.error),
                    ));
                    return Err(failure);
                }
            }
        }

        Ok(UpgradePass { artifacts })
    }

    /// Runs one step and returns the artifact that was installed.
    async fn upgrade_step(
        &self,
        ctx: &mut OrderingContext<'_>,
        step: usize,
        module: ModuleType,
        log: &mut ResultLog,
    ) -> Result<Artifact> {
        let deadline = StepDeadline::start(&self.polling);
        let target = ctx.target();
        let instance = ctx.instance();
        let variant = ArtifactVariant::Compressed;

        ctx.advance(OrderingPhase::Uploading(step))?;
        let source = self.source;
        let artifact = retry_until(&deadline, "Artifact download", move || {
            source.fetch_compressed(module, target)
        })
        .await?;
        self.publish(&deadline, &artifact).await?;
        log.append(ctx.step_entry(step, module, variant, LogEvent::Upload, format!("Uploaded {artifact}")));

        ctx.advance(OrderingPhase::Proposing(step))?;
        self.propose(instance, module, &artifact).await?;
        log.append(ctx.step_entry(
            step,
            module,
            variant,
            LogEvent::Proposed,
            format!("Proposed upgrade of {module} to {target}"),
        ));

        ctx.advance(OrderingPhase::Polling(step))?;
        self.await_convergence(&deadline, instance, module, Convergence::Version(target))
            .await?;
        log.append(ctx.step_entry(
            step,
            module,
            variant,
            LogEvent::PollOk,
            format!(
                "{module} reports version {target} after {}s",
                deadline.elapsed().as_secs()
            ),
        ));
        ctx.advance(OrderingPhase::VersionOk(step))?;

        Ok(artifact)
    }

    /// Publishes an artifact, retrying transient failures.
    ///
    /// # Errors
    ///
    /// Returns the store's rejection or the last transient error at the deadline.
    pub async fn publish(&self, deadline: &StepDeadline, artifact: &Artifact) -> Result<()> {
        let network = self.network;
        retry_until(deadline, "Artifact publish", move || {
            network.publish_artifact(artifact)
        })
        .await
    }

    /// Submits the upgrade proposal once.
    ///
    /// Proposals are not idempotent, so a submission whose outcome is unknown
    /// (a transport failure or client timeout) is never repeated. The step
    /// goes on to poll and converges only if the proposal did land.
    ///
    /// # Errors
    ///
    /// Returns the governing system's rejection.
    pub async fn propose(
        &self,
        instance: &DeploymentInstance,
        module: ModuleType,
        artifact: &Artifact,
    ) -> Result<()> {
        match self.network.propose_upgrade(instance, module, artifact).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_retryable() => {
                warn!("Upgrade proposal for {module} did not complete, polling for its effect: {e}");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Polls the module until it matches `convergence`.
    ///
    /// # Errors
    ///
    /// Returns a timeout carrying the last observation once the deadline passes.
    pub async fn await_convergence(
        &self,
        deadline: &StepDeadline,
        instance: &DeploymentInstance,
        module: ModuleType,
        convergence: Convergence<'_>,
    ) -> Result<String> {
        let network = self.network;
        let observed = match convergence {
            Convergence::Version(target) => {
                let expectation = Expectation {
                    module,
                    property: "version",
                    expected: target.as_str(),
                };
                poll_until(
                    deadline,
                    expectation,
                    move || network.running_version(instance, module),
                    |observed| target.matches(observed),
                )
                .await?
            }
            Convergence::ContentHash(hash) => {
                let expectation = Expectation {
                    module,
                    property: "module hash",
                    expected: hash,
                };
                poll_until(
                    deadline,
                    expectation,
                    move || network.module_hash(instance, module),
                    |observed| ArtifactHasher::hashes_match(observed, hash),
                )
                .await?
            }
        };

        debug!("{module} converged on {observed}");
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canister::CanisterId;
    use crate::error::{NetworkError, UpgradeOrdersError};
    use crate::network::MockGovernedNetwork;
    use crate::sweep::machine::AbortReason;
    use crate::sweep::orders::OrderGenerator;
    use crate::sweep::testing::FakeArtifactSource;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn instance() -> DeploymentInstance {
        let canisters = HashMap::from([
            (ModuleType::Root, CanisterId::new("r7inp-6aaaa-aaaaa-aaabq-cai")),
            (ModuleType::Governance, CanisterId::new("rrkah-fqaaa-aaaaa-aaaaq-cai")),
            (ModuleType::Ledger, CanisterId::new("ryjl3-tyaaa-aaaaa-aaaba-cai")),
        ]);
        DeploymentInstance::new(String::from("upgrade-order-1-test"), canisters)
    }

    fn polling() -> PollingConfig {
        PollingConfig::new(Duration::from_millis(1), Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_transient_poll_errors_are_retried() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = ResultLog::create(dir.path().join("run.log")).unwrap();

        let reads = Arc::new(AtomicU32::new(0));
        let mut network = MockGovernedNetwork::new();
        network.expect_publish_artifact().times(1).returning(|_| Ok(()));
        network
            .expect_propose_upgrade()
            .times(1)
            .returning(|_, _, _| Ok(()));
        let counter = Arc::clone(&reads);
        network.expect_running_version().returning(move |_, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(NetworkError::transport("connection reset").into())
            } else {
                Ok(String::from("1.0.0"))
            }
        });

        let source = FakeArtifactSource::new();
        let driver = UpgradeDriver::new(&network, &source, polling());

        let generator = OrderGenerator::new(&[ModuleType::Ledger]).unwrap();
        let order = generator.orderings().next().unwrap();
        let instance = instance();
        let target = UpgradeTarget::new("1.0.0");
        let mut ctx = OrderingContext::provisioned(1, &order, &instance, &target).unwrap();

        let pass = driver.run(&mut ctx, &mut log).await.unwrap();

        assert_eq!(pass.artifacts().len(), 1);
        assert_eq!(pass.artifacts()[0].variant(), ArtifactVariant::Compressed);
        assert_eq!(reads.load(Ordering::SeqCst), 2);
        assert_eq!(ctx.machine().phase(), OrderingPhase::VersionOk(1));
        assert_eq!(log.attempts().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_proposal_stops_the_ordering() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = ResultLog::create(dir.path().join("run.log")).unwrap();

        let mut network = MockGovernedNetwork::new();
        network.expect_publish_artifact().returning(|_| Ok(()));
        network.expect_propose_upgrade().times(1).returning(|_, _, _| {
            Err(UpgradeOrdersError::from(NetworkError::Rejected {
                message: String::from("proposal invalid"),
            }))
        });
        network.expect_running_version().never();

        let source = FakeArtifactSource::new();
        let driver = UpgradeDriver::new(&network, &source, polling());

        let generator = OrderGenerator::new(&[ModuleType::Root, ModuleType::Ledger]).unwrap();
        let order = generator.orderings().next().unwrap();
        let instance = instance();
        let target = UpgradeTarget::new("1.0.0");
        let mut ctx = OrderingContext::provisioned(1, &order, &instance, &target).unwrap();

        let failure = driver.run(&mut ctx, &mut log).await.unwrap_err();

        assert_eq!(failure.step, 1);
        assert_eq!(failure.module, ModuleType::Root);
        assert_eq!(failure.reason, AbortReason::Rejected);
        assert_eq!(ctx.machine().phase(), OrderingPhase::Aborted);
        assert!(ctx.machine().history().contains(&OrderingPhase::Rejected(1)));
        assert_eq!(log.attempts()[0].outcome(), AttemptOutcome::Rejected);
        assert!(log.entries().iter().any(|e| e.event == LogEvent::StepFailed));
    }

    #[tokio::test]
    async fn test_unfinished_proposal_is_not_resubmitted() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut log = ResultLog::create(dir.path().join("run.log")).unwrap();

        let mut network = MockGovernedNetwork::new();
        network.expect_publish_artifact().returning(|_| Ok(()));
        network.expect_propose_upgrade().times(1).returning(|_, _, _| {
            Err(UpgradeOrdersError::from(NetworkError::transport(
                "governance client timed out after 120s",
            )))
        });
        network
            .expect_running_version()
            .returning(|_, _| Ok(String::from("1.0.0")));

        let source = FakeArtifactSource::new();
        let driver = UpgradeDriver::new(&network, &source, polling());

        let generator = OrderGenerator::new(&[ModuleType::Ledger]).unwrap();
        let order = generator.orderings().next().unwrap();
        let instance = instance();
        let target = UpgradeTarget::new("1.0.0");
        let mut ctx = OrderingContext::provisioned(1, &order, &instance, &target).unwrap();

        let pass = driver.run(&mut ctx, &mut log).await.unwrap();

        assert_eq!(pass.artifacts().len(), 1);
        assert_eq!(ctx.machine().phase(), OrderingPhase::VersionOk(1));
    }
}
