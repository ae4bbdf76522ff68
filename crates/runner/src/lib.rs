#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`target`]: CLI patterns to test directories (`TargetResolver`)
//! - [`graph`]: Prerequisite expansion into an ordered plan (`PlanBuilder`, `ExecutionPlan`)
//! - [`unit`]: Per-test state and phase snapshots (`TestUnit`, `PhaseBuilder`)
//! - [`layout`]: Config and query file discovery (`TestLayout`, `QuerySpec`)
//! - [`env`]: Explicit run environment (`RunEnvironment`, `ResourceNames`)
//! - [`process`]: External process invocation (`CommandSpec`)
//! - [`provisioner`]: Provisioner abstraction (`Provisioner` trait, `TerraformProvisioner`)
//! - [`query`]: Query runner abstraction (`QueryRunner` trait, `SteampipeRunner`)
//! - [`template`]: Placeholder rendering (`TemplateRenderer` trait, `BraceTemplate`)
//! - [`diff`]: Actual vs expected comparison
//! - [`executor`]: Five-phase lifecycle for one unit (`PhaseExecutor`)
//! - [`orchestrator`]: Plan-wide forward pass and reverse teardown (`Orchestrator`)
//! - [`summary`]: Pass/fail counts and exit code (`Summary`)
//!
//! # Architecture
//!
//! ```text
//! args --> TargetResolver --> PlanBuilder --> Vec<TestUnit>
//!                                                 |
//!                                            Orchestrator
//!                                                 |
//!                                 PhaseExecutor (Provisioner, QueryRunner)
//!                                                 |
//!                                  RunEvent --mpsc--> console
//!                                                 |
//!                                             Summary
//! ```

pub mod diff;
pub mod env;
pub mod executor;
pub mod graph;
pub mod layout;
pub mod orchestrator;
pub mod process;
pub mod provisioner;
pub mod query;
pub mod summary;
pub mod target;
pub mod template;
pub mod unit;

// --- Public API Re-exports ---

// Resolution
pub use graph::{DEPENDENCIES_FILE, ExecutionPlan, PlanBuilder, PlannedUnit};
pub use target::TargetResolver;

// Units
pub use unit::{PhaseBuilder, PhaseRecord, PhaseReport, TestUnit};

// Collaborators
pub use layout::{QuerySpec, TestLayout};
pub use provisioner::{Provisioner, TerraformProvisioner};
pub use query::{QueryRunner, SteampipeRunner};
pub use template::{BraceTemplate, TemplateRenderer};

// Environment
pub use env::{ResourceNames, RunEnvironment};

// Execution
pub use executor::{Aborted, PhaseExecutor};
pub use orchestrator::{Orchestrator, RunAbort, RunResults};
pub use summary::Summary;
