//! Managed llama-server binary location.

use std::path::PathBuf;

use super::error::PathError;
use super::platform::data_root;

#[cfg(target_os = "windows")]
pub const LLAMA_SERVER_BINARY: &str = "llama-server.exe";

#[cfg(not(target_os = "windows"))]
pub const LLAMA_SERVER_BINARY: &str = "llama-server";

/// Path where a managed llama-server binary is expected (`<data root>/bin`).
pub fn llama_server_path() -> Result<PathBuf, PathError> {
    Ok(data_root()?.join("bin").join(LLAMA_SERVER_BINARY))
}
