// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![warn(missing_docs)]                // All public items should be documented
#![warn(dead_code)]                   // Unused code is flagged
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![warn(unused_imports)]              // Unused imports are flagged
#![warn(unused_variables)]            // Unused variables are flagged
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Canister Upgrade Orders
//!
//! An exhaustive upgrade-order validator for governed canister deployments.
//!
//! ## Overview
//!
//! A release changes several module types at once (root, governance, ledger,
//! swap, index). Operators may upgrade them in any order, so this crate proves
//! that every order works:
//!
//! - Generate every permutation of the selected module types
//! - Provision a fresh deployment for each ordering
//! - Upgrade the modules in that order through governance proposals
//! - Re-upgrade every module with the decompressed artifact and check that the
//!   running content hash follows
//! - Record every step in a result log and a JSON report
//!
//! ## Architecture
//!
//! Each ordering runs through a small state machine:
//!
//! 1. **Provision**: a clean deployment labelled after the ordering
//! 2. **Upgrade pass**: upload, propose, poll until the version converges
//! 3. **Integrity pass**: decompress, compare hashes, re-upgrade, poll until
//!    the content hash converges
//! 4. **Discard**: the deployment is never reused
//!
//! A failure aborts only the current ordering; the sweep always continues.
//!
//! ## Modules
//!
//! - [`canister`]: Module types, deployments and upgrade targets
//! - [`artifact`]: Release artifacts, codecs, hashing and the artifact store
//! - [`config`]: Environment bindings, tunables and validation
//! - [`network`]: The governed network collaborator
//! - [`sweep`]: Ordering generation and the per-ordering upgrade machine
//! - [`report`]: Result log and persisted sweep report
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```text
//! upgrade-orders 0123abcd root governance ledger
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod artifact;
pub mod canister;
pub mod cli;
pub mod config;
pub mod error;
pub mod network;
pub mod report;
pub mod sweep;

// ============================================================================
// Re-exports
// ============================================================================

pub use artifact::{Artifact, ArtifactSource, ArtifactVariant, Codec, GzipCodec, HttpArtifactSource};
pub use canister::{DeploymentInstance, ModuleType, UpgradeTarget};
pub use cli::{Cli, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, PollingConfig, ValidatorConfig};
pub use error::{Result, UpgradeOrdersError};
pub use network::{GovernedNetwork, SnsCliNetwork};
pub use report::{ReportStore, ResultLog, SweepReport};
pub use sweep::{OrderGenerator, OrderingOutcome, SweepRunner, UpgradeOrder};
