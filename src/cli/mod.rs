//! CLI module for the upgrade-order validator.
//!
//! This module provides the command-line arguments and the rendering of the
//! final sweep summary.

mod commands;
mod output;

pub use commands::{Cli, OutputFormat};
pub use output::OutputFormatter;
