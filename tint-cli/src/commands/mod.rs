//! Command handlers -- one module per mode

pub mod plan;
pub mod run;

use std::path::Path;

use tracing::debug;

use tint_core::config::TintConfig;

use crate::error::CliError;

/// Load configuration for a command.
///
/// The default path is optional (missing file means defaults); an
/// explicitly given path must exist. `log_level` from the command line wins
/// over file and environment.
pub async fn load_config(
    path: &Path,
    explicit: bool,
    log_level: Option<&str>,
) -> Result<TintConfig, CliError> {
    let mut config = if explicit {
        TintConfig::load(path).await?
    } else {
        TintConfig::load_or_default(path).await?
    };
    if let Some(level) = log_level {
        config.general.log_level = level.to_owned();
        config.validate()?;
    }
    debug!(path = %path.display(), explicit, "configuration loaded");
    Ok(config)
}
