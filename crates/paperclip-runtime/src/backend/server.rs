//! Backend that spawns a private llama-server per loaded model.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paperclip_core::{InferenceBackend, InferenceError, LoadParams, LoadedModel};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::health::wait_for_http_health;
use super::openai::{ChatCompletionClient, HttpModel};
use super::process::{DEFAULT_BASE_PORT, allocate_port, shutdown_child};

/// How long a freshly spawned server gets to load its model.
pub const DEFAULT_STARTUP_TIMEOUT: Duration = Duration::from_secs(120);

/// Spawns `llama-server -m <model> --host 127.0.0.1 --port <free> -c <ctx>`.
#[derive(Debug, Clone)]
pub struct LlamaServerBackend {
    binary: PathBuf,
    base_port: u16,
    startup_timeout: Duration,
}

impl LlamaServerBackend {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            base_port: DEFAULT_BASE_PORT,
            startup_timeout: DEFAULT_STARTUP_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }

    fn spawn(&self, model_path: &Path, port: u16, params: &LoadParams) -> std::io::Result<Child> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-m")
            .arg(model_path)
            .arg("--host")
            .arg("127.0.0.1")
            .arg("--port")
            .arg(port.to_string())
            .arg("-c")
            .arg(params.context_size.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn()?;
        spawn_log_readers(&mut child, port);
        Ok(child)
    }
}

/// Forward server output to tracing at debug level.
fn spawn_log_readers(child: &mut Child, port: u16) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "llama_server", port, "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "llama_server", port, "{line}");
            }
        });
    }
}

#[async_trait]
impl InferenceBackend for LlamaServerBackend {
    fn name(&self) -> &'static str {
        "llama-server"
    }

    async fn load_model(
        &self,
        path: &Path,
        params: &LoadParams,
    ) -> Result<Arc<dyn LoadedModel>, InferenceError> {
        if !path.is_file() {
            return Err(InferenceError::ModelNotFound(path.display().to_string()));
        }

        let port = allocate_port(self.base_port, &[])
            .await
            .map_err(|e| InferenceError::LoadFailed(e.to_string()))?;
        let mut child = self.spawn(path, port, params).map_err(|e| {
            InferenceError::BackendUnavailable(format!(
                "failed to spawn {}: {e}",
                self.binary.display()
            ))
        })?;
        info!(model = %path.display(), port, pid = ?child.id(), "Spawned llama-server");

        let base_url = format!("http://127.0.0.1:{port}");
        let ready = tokio::select! {
            ready = wait_for_http_health(&base_url, self.startup_timeout) => {
                ready.map_err(|e| e.to_string())
            }
            status = child.wait() => Err(match status {
                Ok(status) => format!("llama-server exited during startup ({status})"),
                Err(e) => format!("llama-server exited during startup: {e}"),
            }),
        };

        if let Err(reason) = ready {
            warn!(model = %path.display(), %reason, "llama-server failed to start");
            if let Err(e) = shutdown_child(child).await {
                debug!(error = %e, "Cleanup of failed llama-server");
            }
            return Err(InferenceError::LoadFailed(reason));
        }

        let client = ChatCompletionClient::new(&base_url, super::openai::model_file_name(path))?;
        Ok(Arc::new(HttpModel::new(path, client, Some(child))))
    }
}
