//! `tint --plan`: resolve targets and show the execution plan

use std::io::Write;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;
use tracing::info;

use tint_core::config::TintConfig;
use tint_runner::{PlanBuilder, PlannedUnit, TargetResolver};

use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute plan mode. Nothing is provisioned or queried.
pub async fn execute(
    base_dir: &Path,
    targets: &[String],
    config: &TintConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = build_plan_report(base_dir, targets, config).await?;
    info!(units = report.units.len(), "plan resolved");
    writer.render(&report)?;
    Ok(())
}

pub(crate) async fn build_plan_report(
    base_dir: &Path,
    targets: &[String],
    config: &TintConfig,
) -> Result<PlanReport, CliError> {
    let selected = TargetResolver::new(base_dir, config.run.tests_root.as_str())
        .resolve(targets)
        .await?;
    let plan = PlanBuilder::new(base_dir).build(&selected).await?;
    Ok(PlanReport {
        units: plan.units().to_vec(),
    })
}

/// Ordered execution plan.
#[derive(Debug, Serialize)]
pub struct PlanReport {
    pub units: Vec<PlannedUnit>,
}

impl Render for PlanReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        if self.units.is_empty() {
            return writeln!(w, "No matching targets.");
        }
        writeln!(w, "{}", "PLAN:".bold())?;
        for (i, unit) in self.units.iter().enumerate() {
            if unit.prereqs.is_empty() {
                writeln!(w, "{:>3}. {}", i + 1, unit.id)?;
            } else {
                let prereqs: Vec<&str> = unit.prereqs.iter().map(|p| p.as_str()).collect();
                writeln!(
                    w,
                    "{:>3}. {} {}",
                    i + 1,
                    unit.id,
                    format!("(after {})", prereqs.join(", ")).dimmed()
                )?;
            }
        }
        Ok(())
    }
}
