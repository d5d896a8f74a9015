//! Model file discovery and selection.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// File extension identifying a loadable model (compared case-insensitively).
pub const MODEL_EXTENSION: &str = "gguf";

/// A model file found in the models directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDescriptor {
    pub file_name: String,
    pub size_bytes: Option<u64>,
}

fn has_model_extension(name: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MODEL_EXTENSION))
}

/// List model files in `dir` in directory listing order.
///
/// A missing or unreadable directory yields an empty list.
pub fn list_models(dir: &Path) -> Vec<ModelDescriptor> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "Models directory not readable");
            return Vec::new();
        }
    };

    entries
        .filter_map(Result::ok)
        .filter_map(|entry| {
            let file_name = entry.file_name().into_string().ok()?;
            if !has_model_extension(&file_name) {
                return None;
            }
            let meta = entry.metadata().ok();
            if meta.as_ref().is_some_and(std::fs::Metadata::is_dir) {
                return None;
            }
            Some(ModelDescriptor {
                file_name,
                size_bytes: meta.map(|m| m.len()),
            })
        })
        .collect()
}

/// File names of the models in `dir`.
pub fn list_model_names(dir: &Path) -> Vec<String> {
    list_models(dir).into_iter().map(|m| m.file_name).collect()
}

/// Pick the model to load.
///
/// Returns `desired` if it is available, otherwise the first available model,
/// otherwise `None`.
pub fn resolve<'a>(desired: Option<&str>, available: &'a [String]) -> Option<&'a str> {
    desired
        .and_then(|want| available.iter().find(|name| name.as_str() == want))
        .or_else(|| available.first())
        .map(String::as_str)
}
