//! Exhaustive upgrade-order sweep.
//!
//! This module generates every ordering of the selected module types and, for
//! each one, provisions a fresh deployment, upgrades its modules in that order
//! and re-checks every upgrade with the decompressed artifact.

mod context;
mod driver;
mod integrity;
mod machine;
mod orders;
mod poll;
mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use context::{OrderingContext, StepFailure};
pub use driver::{Convergence, UpgradeDriver, UpgradePass};
pub use integrity::{ArtifactIntegrityChecker, HASHES_SAME_MESSAGE};
pub use machine::{AbortReason, OrderingMachine, OrderingOutcome, OrderingPhase};
pub use orders::{OrderGenerator, Orderings, UpgradeOrder};
pub use poll::{Expectation, StepDeadline, poll_until, retry_until};
pub use runner::SweepRunner;
