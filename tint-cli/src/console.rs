//! Console printer for the run event stream.
//!
//! Turns [`RunEvent`]s into the human-readable run log: phase banners,
//! provisioning notices, query verdicts with a colored line diff, forwarded
//! stderr of external processes and teardown warnings. Color follows the
//! global `colored` override set from `--no-color` / `general.color`.

use std::io::{self, Write};

use colored::Colorize;
use tokio::sync::mpsc;

use tint_core::event::RunEvent;
use tint_core::types::{DiffKind, DiffLine, Phase, UnitId};

/// Buffer size of the event channel between the orchestrator and the printer.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Writes run events to a terminal (or any writer).
pub struct ConsolePrinter<W> {
    out: W,
}

impl ConsolePrinter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ConsolePrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print events until every sender is dropped.
    pub async fn drain(mut self, mut events: mpsc::Receiver<RunEvent>) -> io::Result<Self> {
        while let Some(event) = events.recv().await {
            self.print(&event)?;
        }
        self.out.flush()?;
        Ok(self)
    }

    pub fn print(&mut self, event: &RunEvent) -> io::Result<()> {
        match event {
            RunEvent::PlanResolved { units } => {
                writeln!(self.out, "Test names: {}", join(units, ", "))?;
            }
            RunEvent::PhaseStarted {
                unit,
                phase,
                prereqs,
            } => {
                let banner = match phase {
                    Phase::Setup => format!(
                        "{}: {} [{}]",
                        phase_label(*phase),
                        unit,
                        join(prereqs, ",")
                    ),
                    _ => format!("{}: {}", phase_label(*phase), unit),
                };
                writeln!(self.out)?;
                writeln!(self.out, "{}", banner.bold())?;
            }
            RunEvent::CustomEnv { name, value } => {
                writeln!(self.out, "Custom env variable {name}={value}")?;
            }
            RunEvent::ProvisionStarted { .. } => {
                writeln!(self.out, "{}", "Running provisioner".yellow())?;
            }
            RunEvent::ProvisionFailed { .. } => {
                writeln!(
                    self.out,
                    "{}",
                    "Provisioning failed, skipping queries".bright_red().bold()
                )?;
            }
            RunEvent::ProcessStderr { text, .. } => {
                write!(self.out, "{}", text.bright_black())?;
                if !text.ends_with('\n') {
                    writeln!(self.out)?;
                }
            }
            RunEvent::QueryStarted { file, .. } => {
                writeln!(self.out)?;
                writeln!(self.out, "{}", format!("Running query: {file}").yellow())?;
            }
            RunEvent::QueryFinished {
                phase,
                passed,
                diff,
                ..
            } => self.print_verdict(*phase, *passed, diff)?,
            RunEvent::Aborted { message, .. } => {
                writeln!(self.out)?;
                writeln!(
                    self.out,
                    "{}",
                    "ERROR DETECTED: Stopping test run and entering teardown phase."
                        .red()
                        .bold()
                )?;
                writeln!(self.out, "{}", message.red().bold())?;
            }
            RunEvent::TeardownWarning { message, .. } => {
                writeln!(self.out, "{}", message.yellow())?;
            }
        }
        Ok(())
    }

    fn print_verdict(&mut self, phase: Phase, passed: bool, diff: &[DiffLine]) -> io::Result<()> {
        if passed {
            // only the test phase announces a pass
            if phase == Phase::Test {
                writeln!(self.out, "{}", "✔ PASSED".bright_green().bold())?;
            }
            return Ok(());
        }
        if !diff.is_empty() {
            writeln!(self.out)?;
            for line in diff {
                let text = match line.kind {
                    DiffKind::Added => format!("+ {}", line.text).green(),
                    DiffKind::Removed => format!("- {}", line.text).red(),
                    DiffKind::Unchanged => format!("  {}", line.text).dimmed(),
                };
                writeln!(self.out, "{text}")?;
            }
        }
        writeln!(self.out)?;
        writeln!(self.out, "{}", "✘ FAILED".bright_red().bold())
    }
}

fn phase_label(phase: Phase) -> String {
    phase.as_str().to_uppercase()
}

fn join(ids: &[UnitId], sep: &str) -> String {
    ids.iter().map(UnitId::as_str).collect::<Vec<_>>().join(sep)
}
