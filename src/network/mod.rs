//! Governed network integration.
//!
//! This module provides the operation surface the validator needs from the
//! governance system (provisioning, publishing, proposing, observing) and its
//! production implementation over the governance-client binary.

mod command;
mod sns_cli;
mod traits;

pub use command::{CommandResult, CommandRunner, DEFAULT_COMMAND_TIMEOUT_SECS};
pub use sns_cli::SnsCliNetwork;
pub use traits::GovernedNetwork;

#[cfg(test)]
pub use traits::MockGovernedNetwork;
