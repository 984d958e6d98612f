//! Command implementations.

mod convert;
mod info;
mod run;
mod validate;

pub use convert::run_convert;
pub use info::run_info;
pub use run::run_capture;
pub use validate::run_validate;

use std::path::Path;

use contracts::CaptureConfig;

use crate::error::{CliError, Result};

/// Load and validate a configuration file
pub(crate) fn load_config(path: &Path) -> Result<CaptureConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path.display().to_string()));
    }
    config_loader::ConfigLoader::load_from_path(path).map_err(CliError::Config)
}
