//! Location of the persisted configuration.

use std::path::PathBuf;

use super::error::PathError;
use super::platform::data_root;

pub const CONFIG_FILE_NAME: &str = "config.json";

/// Path to `config.json` under the data root.
pub fn config_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join(CONFIG_FILE_NAME))
}
