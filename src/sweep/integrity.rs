//! Compressed versus decompressed artifact integrity.
//!
//! After an ordering upgraded every module with its compressed artifact, each
//! artifact is decompressed and must hash differently from its input. The
//! decompressed bytes are then installed the same way and the module must end
//! up running exactly that content.

use crate::artifact::{Artifact, ArtifactHasher, ArtifactVariant, Codec};
use crate::error::{IntegrityError, Result};
use crate::report::{AttemptOutcome, LogEvent, ResultLog};

use super::context::{OrderingContext, StepFailure, attempt_outcome};
use super::driver::{Convergence, UpgradeDriver, UpgradePass};
use super::machine::{AbortReason, OrderingPhase};
use super::poll::StepDeadline;

/// Log line written when decompression did not change the artifact.
pub const HASHES_SAME_MESSAGE: &str = "Hashes were the same, aborting rest of test...";

/// Re-checks an upgrade pass with the decompressed artifacts.
pub struct ArtifactIntegrityChecker<'a> {
    driver: &'a UpgradeDriver<'a>,
    codec: &'a dyn Codec,
}

impl<'a> ArtifactIntegrityChecker<'a> {
    /// Creates a checker that installs through `driver` and decompresses with `codec`.
    #[must_use]
    pub const fn new(driver: &'a UpgradeDriver<'a>, codec: &'a dyn Codec) -> Self {
        Self { driver, codec }
    }

    /// Runs the integrity pass over every step of `pass`.
    ///
    /// # Errors
    ///
    /// Returns the first step that failed; later steps are not checked.
    pub async fn run(
        &self,
        ctx: &mut OrderingContext<'_>,
        pass: &UpgradePass,
        log: &mut ResultLog,
    ) -> std::result::Result<(), StepFailure> {
        let variant = ArtifactVariant::Decompressed;

        for (step, compressed) in (1..).zip(pass.artifacts()) {
            let module = compressed.module();

            match self.check_step(ctx, step, compressed, log).await {
                Ok(()) => {
                    ctx.record_attempt(log, step, module, variant, AttemptOutcome::Converged);
                }
                Err(error) => {
                    let reupgrading = ctx.machine().phase() == OrderingPhase::ReUpgrade(step);
                    let failure = ctx.fail(step, module, error);

                    if reupgrading {
                        ctx.record_attempt(log, step, module, variant, attempt_outcome(failure.reason));
                    }
                    if failure.reason != AbortReason::HashMismatch {
                        log.append(ctx.step_entry(
                            step,
                            module,
                            variant,
                            LogEvent::StepFailed,
                            format!("Integrity check {}: {}", failure.reason, failure.error),
                        ));
                    }
                    return Err(failure);
                }
            }
        }

        Ok(())
    }

    /// Checks one artifact and replays its upgrade with the decompressed bytes.
    async fn check_step(
        &self,
        ctx: &mut OrderingContext<'_>,
        step: usize,
        compressed: &Artifact,
        log: &mut ResultLog,
    ) -> Result<()> {
        let module = compressed.module();
        let variant = ArtifactVariant::Decompressed;

        if step == 1 {
            ctx.advance(OrderingPhase::IntegrityCheck)?;
        }

        let bytes = self.codec.decompress(compressed.bytes()).map_err(|e| {
            IntegrityError::DecompressionFailed {
                module,
                codec: self.codec.name(),
                reason: e.to_string(),
            }
        })?;
        let decompressed = Artifact::new(module, compressed.target().clone(), variant, bytes);

        if ArtifactHasher::hashes_match(compressed.hash(), decompressed.hash()) {
            log.append(ctx.step_entry(step, module, variant, LogEvent::HashesSame, HASHES_SAME_MESSAGE));
            return Err(IntegrityError::HashesIdentical {
                module,
                hash: compressed.hash().to_string(),
            }
            .into());
        }

        log.append(ctx.step_entry(
            step,
            module,
            variant,
            LogEvent::HashesDiffer,
            format!(
                "Compressed {} differs from decompressed {}",
                ArtifactHasher::short_hash(compressed.hash()),
                ArtifactHasher::short_hash(decompressed.hash())
            ),
        ));
        ctx.advance(OrderingPhase::HashDiffOk(step))?;

        ctx.advance(OrderingPhase::ReUpgrade(step))?;
        let deadline = StepDeadline::start(self.driver.polling());
        let instance = ctx.instance();

        self.driver.publish(&deadline, &decompressed).await?;
        log.append(ctx.step_entry(step, module, variant, LogEvent::Upload, format!("Uploaded {decompressed}")));

        self.driver
            .propose(instance, module, &decompressed)
            .await?;
        log.append(ctx.step_entry(
            step,
            module,
            variant,
            LogEvent::Proposed,
            format!("Proposed upgrade of {module} to its decompressed artifact"),
        ));

        self.driver
            .await_convergence(
                &deadline,
                instance,
                module,
                Convergence::ContentHash(decompressed.hash()),
            )
            .await?;
        ctx.advance(OrderingPhase::ContentHashOk(step))?;
        log.append(ctx.step_entry(
            step,
            module,
            variant,
            LogEvent::IntegrityPass,
            format!(
                "{module} runs decompressed content {}",
                ArtifactHasher::short_hash(decompressed.hash())
            ),
        ));

        if step == ctx.machine().steps() {
            ctx.advance(OrderingPhase::Done)?;
        }

        Ok(())
    }
}
