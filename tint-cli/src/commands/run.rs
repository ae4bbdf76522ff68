//! `tint [TARGETS]`: resolve, run every phase, report

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};

use tint_core::config::TintConfig;
use tint_runner::{
    BraceTemplate, Orchestrator, PhaseExecutor, PlanBuilder, RunEnvironment, SteampipeRunner,
    Summary, TargetResolver, TerraformProvisioner, TestLayout, TestUnit,
};

use crate::cli::OutputFormat;
use crate::console::{ConsolePrinter, EVENT_CHANNEL_CAPACITY};
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute a run and return the process exit code.
///
/// Text output streams run events to the console as they happen; JSON output
/// only prints the final report.
pub async fn execute(
    base_dir: &Path,
    targets: &[String],
    config: &TintConfig,
    writer: &OutputWriter,
) -> Result<i32, CliError> {
    let selected = TargetResolver::new(base_dir, config.run.tests_root.as_str())
        .resolve(targets)
        .await?;
    let plan = PlanBuilder::new(base_dir).build(&selected).await?;
    if plan.is_empty() {
        writer.render(&NoTargets::default())?;
        return Ok(0);
    }

    let layout = TestLayout::new(
        base_dir,
        config.provisioner.extensions.clone(),
        config.run.env_file.as_str(),
    );
    let mut executor = PhaseExecutor::new(
        TerraformProvisioner::from_config(&config.provisioner),
        SteampipeRunner::from_config(&config.query, base_dir),
        BraceTemplate,
        layout,
    );
    let printer = match writer.format() {
        OutputFormat::Text => {
            let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
            executor = executor.with_events(tx);
            Some(tokio::spawn(ConsolePrinter::stdout().drain(rx)))
        }
        OutputFormat::Json => None,
    };

    let orchestrator = Orchestrator::new(executor, config.run.resource_name_prefix.as_str());
    info!(run_id = %orchestrator.run_id(), units = plan.len(), "starting run");
    let units = plan.into_units(&config.run.scratch_root());
    let env = RunEnvironment::from_process(config.run.env_prefix.as_str());
    let results = orchestrator.run(units, env).await;

    // dropping the executor closes the event channel
    drop(orchestrator);
    if let Some(handle) = printer {
        match handle.await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(error = %e, "console output failed"),
            Err(e) => warn!(error = %e, "console printer task failed"),
        }
    }

    let summary = Summary::from_results(&results);
    let exit_code = summary.exit_code();
    let report = RunReport {
        summary,
        units: config.debug_enabled().then_some(results.units),
    };
    writer.render(&report)?;
    Ok(exit_code)
}

/// Printed instead of a report when no test matches the targets.
#[derive(Debug, Serialize)]
pub struct NoTargets {
    pub message: &'static str,
}

impl Default for NoTargets {
    fn default() -> Self {
        Self {
            message: "No matching targets. Stopping.",
        }
    }
}

impl Render for NoTargets {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}", self.message)
    }
}

/// Final report of a run. `units` carries every unit record in debug mode.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub units: Option<Vec<TestUnit>>,
}

impl Render for RunReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if let Some(units) = &self.units {
            let dump = serde_json::to_string_pretty(units).map_err(std::io::Error::other)?;
            writeln!(w, "{dump}")?;
        }

        writeln!(w, "{}", "SUMMARY:".bold())?;
        let summary = &self.summary;
        if !summary.failing.is_empty() {
            writeln!(w)?;
            for id in &summary.failing {
                writeln!(w, "{}", format!("✘ {id} failed.").red())?;
            }
        }
        if let Some(abort) = &summary.aborted {
            writeln!(w)?;
            writeln!(
                w,
                "{}",
                format!(
                    "Run stopped during {} of {}: {}",
                    abort.phase, abort.unit, abort.message
                )
                .red()
            )?;
        }

        let line = format!("{}/{} passed.", summary.passed, summary.total);
        let line = if summary.all_passed() {
            line.bright_green()
        } else if summary.none_passed() {
            line.bright_red()
        } else {
            line.bright_yellow()
        };
        writeln!(w)?;
        writeln!(w, "{line}")?;
        writeln!(w)
    }
}
