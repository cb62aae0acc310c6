//! State carried through the processing of one ordering.

use tracing::warn;

use crate::artifact::ArtifactVariant;
use crate::canister::{DeploymentInstance, ModuleType, UpgradeTarget};
use crate::error::{Result, UpgradeOrdersError};
use crate::report::{AttemptOutcome, LogEntry, LogEvent, ResultLog, UpgradeAttempt};

use super::machine::{AbortReason, OrderingMachine, OrderingPhase};
use super::orders::UpgradeOrder;

/// One ordering being processed against its own deployment.
#[derive(Debug)]
pub struct OrderingContext<'a> {
    index: usize,
    order: &'a UpgradeOrder,
    instance: &'a DeploymentInstance,
    target: &'a UpgradeTarget,
    machine: OrderingMachine,
}

impl<'a> OrderingContext<'a> {
    /// Starts processing `order` on a freshly provisioned `instance`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state machine rejects the provisioned state.
    pub fn provisioned(
        index: usize,
        order: &'a UpgradeOrder,
        instance: &'a DeploymentInstance,
        target: &'a UpgradeTarget,
    ) -> Result<Self> {
        let mut machine = OrderingMachine::new(order.len());
        machine.advance(OrderingPhase::Provisioned)?;

        Ok(Self {
            index,
            order,
            instance,
            target,
            machine,
        })
    }

    /// Ordering number, starting at 1.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// The ordering.
    #[must_use]
    pub const fn order(&self) -> &'a UpgradeOrder {
        self.order
    }

    /// The deployment owned by this ordering.
    #[must_use]
    pub const fn instance(&self) -> &'a DeploymentInstance {
        self.instance
    }

    /// Version every module is upgraded to.
    #[must_use]
    pub const fn target(&self) -> &'a UpgradeTarget {
        self.target
    }

    /// The ordering's state machine.
    #[must_use]
    pub const fn machine(&self) -> &OrderingMachine {
        &self.machine
    }

    /// Moves the state machine to `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition is not allowed.
    pub fn advance(&mut self, phase: OrderingPhase) -> Result<()> {
        self.machine.advance(phase)
    }

    /// A log entry tagged with this ordering.
    #[must_use]
    pub fn entry(&self, event: LogEvent, message: impl Into<String>) -> LogEntry {
        LogEntry::new(event, message).ordering(self.order)
    }

    /// A log entry tagged with this ordering and one of its steps.
    #[must_use]
    pub fn step_entry(
        &self,
        step: usize,
        module: ModuleType,
        variant: ArtifactVariant,
        event: LogEvent,
        message: impl Into<String>,
    ) -> LogEntry {
        self.entry(event, message).step(step, module).variant(variant)
    }

    /// Registers an attempt; a duplicate is reported and otherwise ignored.
    pub fn record_attempt(
        &self,
        log: &mut ResultLog,
        step: usize,
        module: ModuleType,
        variant: ArtifactVariant,
        outcome: AttemptOutcome,
    ) {
        let attempt = UpgradeAttempt::new(self.index, step, module, variant, outcome);
        if let Err(e) = log.record_attempt(attempt) {
            warn!("{e}");
        }
    }

    /// Ends the ordering because `step` failed with `error`.
    pub fn fail(&mut self, step: usize, module: ModuleType, error: UpgradeOrdersError) -> StepFailure {
        let reason = AbortReason::from_error(&error);
        if self.machine.advance(reason.failure_phase(step)).is_err() {
            warn!(
                "Ordering #{}: no '{reason}' transition from {}",
                self.index,
                self.machine.phase()
            );
        }
        self.machine.abort();

        StepFailure {
            step,
            module,
            reason,
            error,
        }
    }
}

/// The step that ended an ordering.
#[derive(Debug)]
pub struct StepFailure {
    /// Step number, starting at 1.
    pub step: usize,
    /// Module of the step.
    pub module: ModuleType,
    /// Failure class.
    pub reason: AbortReason,
    /// Underlying error.
    pub error: UpgradeOrdersError,
}

/// Attempt outcome for a step that ended for `reason`.
#[must_use]
pub const fn attempt_outcome(reason: AbortReason) -> AttemptOutcome {
    match reason {
        AbortReason::Timeout => AttemptOutcome::TimedOut,
        _ => AttemptOutcome::Rejected,
    }
}
