//! Command implementations.

mod info;
mod run;
mod validate;

use std::path::Path;

use contracts::BridgeConfig;

use crate::error::{CliError, Result};

pub use info::run_info;
pub use run::run_pipeline;
pub use validate::run_validate;

/// Defaults, optional file and process environment, not yet validated
pub(crate) fn load_layers(path: Option<&Path>) -> Result<BridgeConfig> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(CliError::config_not_found(path));
        }
    }
    Ok(config_loader::ConfigLoader::load_unvalidated(
        path,
        |key| std::env::var(key).ok(),
    )?)
}
