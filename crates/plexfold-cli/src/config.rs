use std::path::Path;

use plexfold::engine::config::StaticParams;
use tracing::{debug, info};

use crate::error::{CliError, Result};

/// Loads the static algorithm constants, falling back to the built-in
/// defaults when no config file is given. The file is read once; the
/// resulting parameters are immutable for the whole run.
pub fn load_static_params(path: Option<&Path>) -> Result<StaticParams> {
    let Some(path) = path else {
        debug!("No static config file given; using built-in defaults.");
        return Ok(StaticParams::default());
    };

    let content = std::fs::read_to_string(path).map_err(|e| {
        CliError::Config(format!("cannot read '{}': {}", path.display(), e))
    })?;
    let params: StaticParams = toml::from_str(&content).map_err(|e| {
        CliError::Config(format!("cannot parse '{}': {}", path.display(), e))
    })?;

    info!(config = %path.display(), "Static configuration loaded.");
    Ok(params)
}
