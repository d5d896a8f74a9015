//! Backend for an already running OpenAI-compatible endpoint.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use paperclip_core::{InferenceBackend, InferenceError, LoadParams, LoadedModel};
use tracing::info;

use super::health::check_http_health;
use super::openai::{ChatCompletionClient, HttpModel, model_file_name};

/// Talks to a server someone else started (`--llama-url`).
///
/// The selected model file only names the model; the endpoint serves
/// whatever it has loaded, and `unload` leaves the server running.
#[derive(Debug, Clone)]
pub struct RemoteEndpointBackend {
    base_url: String,
}

impl RemoteEndpointBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl InferenceBackend for RemoteEndpointBackend {
    fn name(&self) -> &'static str {
        "remote"
    }

    async fn load_model(
        &self,
        path: &Path,
        _params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, InferenceError> {
        match check_http_health(&self.base_url).await {
            Ok(true) => {}
            Ok(false) => {
                return Err(InferenceError::LoadFailed(format!(
                    "{} is not ready",
                    self.base_url
                )));
            }
            Err(e) => {
                return Err(InferenceError::BackendUnavailable(format!(
                    "{} unreachable: {e}",
                    self.base_url
                )));
            }
        }

        info!(url = %self.base_url, model = %path.display(), "Using remote endpoint");
        let client = ChatCompletionClient::new(&self.base_url, model_file_name(path))?;
        Ok(Arc::new(HttpModel::new(path, client, None)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_trimmed() {
        assert_eq!(
            RemoteEndpointBackend::new("http://localhost:8080/").base_url(),
            "http://localhost:8080"
        );
    }

    #[tokio::test]
    async fn test_unreachable_endpoint() {
        let port = crate::backend::process::allocate_port(39_300, &[]).await.unwrap();
        let backend = RemoteEndpointBackend::new(format!("http://127.0.0.1:{port}"));
        let err = backend
            .load_model(Path::new("m.gguf"), &LoadParams::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, InferenceError::BackendUnavailable(_)));
    }
}
