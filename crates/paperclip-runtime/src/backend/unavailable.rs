//! Backend used when no inference engine can be found.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use paperclip_core::{InferenceBackend, InferenceError, LoadParams, LoadedModel};

/// Every load fails, which puts the session into demo mode.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl InferenceBackend for UnavailableBackend {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    async fn load_model(
        &self,
        _path: &Path,
        _params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, InferenceError> {
        Err(InferenceError::BackendUnavailable(self.reason.clone()))
    }
}
