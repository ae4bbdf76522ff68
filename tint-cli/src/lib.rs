//! tint CLI library
//!
//! The `tint` binary is a thin wrapper over these modules; they are exposed
//! as a library so integration tests can drive commands directly.
//!
//! # Module Structure
//!
//! - [`cli`]: clap argument definitions
//! - [`commands`]: run and plan handlers, configuration loading
//! - [`console`]: colored printer for the run event stream
//! - [`output`]: text / JSON report rendering
//! - [`logging`]: tracing subscriber setup
//! - [`error`]: CLI errors and exit codes

pub mod cli;
pub mod commands;
pub mod console;
pub mod error;
pub mod logging;
pub mod output;
