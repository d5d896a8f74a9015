//! Path utilities for paperclip data directories and user-configurable locations.
//!
//! This module provides the canonical path resolution for all components:
//! - Data root and the persisted config file
//! - Models directory
//! - Managed llama-server binary
//!
//! # Design
//!
//! - Returns `PathBuf` and `PathError` for clear error handling
//! - No interactive/terminal I/O - adapters handle user prompts separately
//! - OS-specific logic is kept private in `platform`

mod config;
mod ensure;
mod error;
mod llama;
mod models;
mod platform;
mod resolver;

#[cfg(test)]
mod test_utils;

/// Overrides the data root.
pub const DATA_DIR_ENV: &str = "PAPERCLIP_DATA_DIR";

/// Overrides the models directory.
pub const MODELS_DIR_ENV: &str = "PAPERCLIP_MODELS_DIR";

pub use config::{CONFIG_FILE_NAME, config_path};
pub use ensure::ensure_directory;
pub use error::PathError;
pub use llama::{LLAMA_SERVER_BINARY, llama_server_path};
pub use models::{ModelsDirResolution, ModelsDirSource, default_models_dir, resolve_models_dir};
pub use platform::data_root;
pub use resolver::ResolvedPaths;
