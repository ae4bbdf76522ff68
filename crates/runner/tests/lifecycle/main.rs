//! Lifecycle integration tests for tint-runner.
//!
//! These tests drive the real resolver, plan builder, executor and
//! orchestrator over temporary test trees, with scripted provisioner and
//! query-runner collaborators standing in for external processes.
//!
//! # Test Structure
//!
//! - `helpers/` -- Test tree builder, scripted collaborators, call log
//! - `scenarios/` -- Test files organized by concern
//!
//! # Running
//!
//! ```bash
//! cargo test -p tint-runner --test lifecycle
//! ```

mod helpers;
mod scenarios;
