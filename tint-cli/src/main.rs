use std::process::ExitCode;

use clap::Parser;
use colored::Colorize;

use tint_cli::cli::Cli;
use tint_cli::commands;
use tint_cli::error::CliError;
use tint_cli::logging;
use tint_cli::output::OutputWriter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e}", "error:".red().bold());
            e.exit_code()
        }
    };
    // exit codes are capped at 255 by the summary
    ExitCode::from(u8::try_from(code).unwrap_or(u8::MAX))
}

async fn run(cli: Cli) -> Result<i32, CliError> {
    let (config_path, explicit) = cli.config_path();
    let config =
        commands::load_config(config_path, explicit, cli.log_level.as_deref()).await?;

    if cli.no_color || !config.general.color {
        colored::control::set_override(false);
    }
    logging::init_tracing(&config.general).map_err(|e| CliError::Command(e.to_string()))?;
    tracing::debug!(targets = ?cli.targets, plan = cli.plan, "tint starting");

    let base_dir = std::env::current_dir()?;
    let writer = OutputWriter::new(cli.output);
    if cli.plan {
        commands::plan::execute(&base_dir, &cli.targets, &config, &writer).await?;
        return Ok(0);
    }
    commands::run::execute(&base_dir, &cli.targets, &config, &writer).await
}
