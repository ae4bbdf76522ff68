//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no side effects or I/O.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "tint.toml";

/// tint -- run provisioned integration tests and compare query results.
///
/// Targets are test directory names or glob patterns. A bare name is looked
/// up under the tests root (`foo` means `tests/foo`); no targets runs every
/// test.
#[derive(Parser, Debug)]
#[command(name = "tint", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file [default: tint.toml, optional].
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Output format for the summary.
    #[arg(long, default_value = "text")]
    pub output: OutputFormat,

    /// Resolve and print the execution plan without running it.
    #[arg(long)]
    pub plan: bool,

    /// Disable colored output.
    #[arg(long)]
    pub no_color: bool,

    /// Test targets (names or glob patterns).
    pub targets: Vec<String>,
}

impl Cli {
    /// Configuration path, and whether it was given explicitly.
    pub fn config_path(&self) -> (&Path, bool) {
        match &self.config {
            Some(path) => (path.as_path(), true),
            None => (Path::new(DEFAULT_CONFIG), false),
        }
    }
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored console output with phase banners and diffs.
    Text,
    /// Machine-readable JSON summary, no event stream.
    Json,
}
