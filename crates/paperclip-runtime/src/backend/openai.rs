//! Streaming client for the OpenAI-compatible chat API served by llama-server.
//!
//! SSE format: `data: {"choices":[{"delta":{"content":"hi"}}]}\n\n`,
//! terminated by `data: [DONE]`.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use bytes::BytesMut;
use futures_util::StreamExt;
use paperclip_core::{
    ChatContext, ChatTurn, GenerationOptions, InferenceError, LoadedModel, TokenSink,
};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::process::shutdown_child;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// One decoded SSE event.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Data(String),
    Done,
}

/// Incremental decoder for `data:` lines of a Server-Sent Events stream.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buf: BytesMut,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Next complete event, or `None` if more bytes are needed.
    pub(crate) fn next_event(&mut self) -> Option<SseEvent> {
        while let Some(line_end) = find_newline(&self.buf) {
            let line = self.buf.split_to(line_end);
            let line = String::from_utf8_lossy(&line);
            let trimmed = line.trim();

            // Blank separators and comments.
            if trimmed.is_empty() || trimmed.starts_with(':') {
                continue;
            }

            if let Some(data) = trimmed.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    return Some(SseEvent::Done);
                }
                return Some(SseEvent::Data(data.to_string()));
            }
        }
        None
    }
}

fn find_newline(buf: &BytesMut) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n').map(|pos| pos + 1)
}

/// `choices[0].delta.content` of a streaming chunk.
fn delta_content(chunk: &Value) -> Option<&str> {
    chunk
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatTurn],
    stream: bool,
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_tokens: u32,
    stop: &'a [String],
}

/// Client for `POST /v1/chat/completions` with `stream: true`.
#[derive(Debug, Clone)]
pub struct ChatCompletionClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self, InferenceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| InferenceError::BackendUnavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Stream a completion for `messages`, pushing content deltas into `on_token`.
    ///
    /// Returns once the server sends `[DONE]`, the stream ends, `on_token`
    /// breaks or `cancel` fires. Dropping the response closes the connection,
    /// which makes llama-server stop generating.
    pub async fn stream_chat(
        &self,
        messages: &[ChatTurn],
        options: &GenerationOptions,
        cancel: &CancellationToken,
        on_token: &mut TokenSink<'_>,
    ) -> Result<(), InferenceError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages,
            stream: true,
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: &options.stop_sequences,
        };
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = tokio::select! {
            response = self.http.post(&url).json(&body).send() => {
                response.map_err(|e| InferenceError::Generation(e.to_string()))?
            }
            () = cancel.cancelled() => return Ok(()),
        };

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(if status.as_u16() == 400 {
                InferenceError::InvalidOptions(detail)
            } else {
                InferenceError::Generation(format!("HTTP {status}: {detail}"))
            });
        }

        let mut stream = response.bytes_stream();
        let mut decoder = SseDecoder::default();

        loop {
            while let Some(event) = decoder.next_event() {
                let data = match event {
                    SseEvent::Done => return Ok(()),
                    SseEvent::Data(data) => data,
                };
                let chunk: Value = match serde_json::from_str(&data) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        debug!(error = %e, "Skipping unparseable SSE chunk");
                        continue;
                    }
                };
                if let Some(error) = chunk.get("error") {
                    return Err(InferenceError::Generation(error.to_string()));
                }
                match delta_content(&chunk) {
                    Some(piece) if !piece.is_empty() => {
                        if cancel.is_cancelled() || on_token(piece).is_break() {
                            return Ok(());
                        }
                    }
                    _ => {}
                }
            }

            let next = tokio::select! {
                next = stream.next() => next,
                () = cancel.cancelled() => return Ok(()),
            };
            match next {
                Some(Ok(bytes)) => decoder.push(&bytes),
                Some(Err(e)) => return Err(InferenceError::Generation(e.to_string())),
                None => return Ok(()),
            }
        }
    }
}

/// A chat context backed by the HTTP API. History lives client-side.
pub struct HttpChatContext {
    client: ChatCompletionClient,
    system_prompt: Option<String>,
    history: Vec<ChatTurn>,
    released: CancellationToken,
}

impl HttpChatContext {
    fn messages_for(&self, prompt: &str) -> Vec<ChatTurn> {
        self.system_prompt
            .iter()
            .map(ChatTurn::system)
            .chain(self.history.iter().cloned())
            .chain(std::iter::once(ChatTurn::user(prompt)))
            .collect()
    }
}

#[async_trait]
impl ChatContext for HttpChatContext {
    async fn generate(
        &mut self,
        prompt: &str,
        options: &GenerationOptions,
        cancel: &CancellationToken,
        on_token: &mut TokenSink<'_>,
    ) -> Result<(), InferenceError> {
        if self.released.is_cancelled() {
            return Err(InferenceError::Disposed);
        }
        let messages = self.messages_for(prompt);
        self.client
            .stream_chat(&messages, options, cancel, on_token)
            .await
    }

    fn commit_turn(&mut self, prompt: &str, reply: &str) {
        self.history.push(ChatTurn::user(prompt));
        self.history.push(ChatTurn::assistant(reply));
    }
}

/// A model reachable over HTTP, optionally backed by a process we own.
pub struct HttpModel {
    name: String,
    client: ChatCompletionClient,
    released: CancellationToken,
    process: tokio::sync::Mutex<Option<tokio::process::Child>>,
}

impl HttpModel {
    pub(crate) fn new(
        model_path: &Path,
        client: ChatCompletionClient,
        process: Option<tokio::process::Child>,
    ) -> Self {
        Self {
            name: model_file_name(model_path),
            client,
            released: CancellationToken::new(),
            process: tokio::sync::Mutex::new(process),
        }
    }
}

pub(crate) fn model_file_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

#[async_trait]
impl LoadedModel for HttpModel {
    fn model_name(&self) -> &str {
        &self.name
    }

    async fn create_context(
        &self,
        system_prompt: Option<&str>,
    ) -> Result<Box<dyn ChatContext>, InferenceError> {
        if self.released.is_cancelled() {
            return Err(InferenceError::Disposed);
        }
        Ok(Box::new(HttpChatContext {
            client: self.client.clone(),
            system_prompt: system_prompt.map(str::to_string),
            history: Vec::new(),
            released: self.released.clone(),
        }))
    }

    async fn unload(&self) {
        self.released.cancel();
        let child = self.process.lock().await.take();
        if let Some(child) = child {
            match shutdown_child(child).await {
                Ok(status) => debug!(model = %self.name, %status, "llama-server stopped"),
                Err(e) => warn!(model = %self.name, error = %e, "Failed to stop llama-server"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::ops::ControlFlow;

    #[test]
    fn test_decoder_handles_split_lines() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data: {\"a\"");
        assert_eq!(decoder.next_event(), None);
        decoder.push(b":1}\n\n: keep-alive\n\ndata: [DONE]\n");
        assert_eq!(decoder.next_event(), Some(SseEvent::Data("{\"a\":1}".into())));
        assert_eq!(decoder.next_event(), Some(SseEvent::Done));
        assert_eq!(decoder.next_event(), None);
    }

    #[test]
    fn test_decoder_accepts_crlf_and_no_space() {
        let mut decoder = SseDecoder::default();
        decoder.push(b"data:{}\r\n\r\nevent: ping\r\n");
        assert_eq!(decoder.next_event(), Some(SseEvent::Data("{}".into())));
        assert_eq!(decoder.next_event(), None);
    }

    #[test]
    fn test_delta_content() {
        let chunk = json!({"choices":[{"delta":{"content":"hi"}}]});
        assert_eq!(delta_content(&chunk), Some("hi"));
        let role_only = json!({"choices":[{"delta":{"role":"assistant"}}]});
        assert_eq!(delta_content(&role_only), None);
        assert_eq!(delta_content(&json!({})), None);
    }

    #[test]
    fn test_request_body_shape() {
        let options = GenerationOptions::default();
        let messages = [ChatTurn::system("be brief"), ChatTurn::user("hi")];
        let body = serde_json::to_value(ChatCompletionRequest {
            model: "tiny.gguf",
            messages: &messages,
            stream: true,
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            stop: &options.stop_sequences,
        })
        .unwrap();

        assert_eq!(body["stream"], true);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["top_k"], 40);
        assert_eq!(body["max_tokens"], 256);
        assert_eq!(body["stop"][0], "</s>");
    }

    #[tokio::test]
    async fn test_context_history() {
        let client = ChatCompletionClient::new("http://127.0.0.1:1/", "m").unwrap();
        assert_eq!(client.base_url(), "http://127.0.0.1:1");
        let model = HttpModel::new(Path::new("/models/m.gguf"), client, None);
        assert_eq!(model.model_name(), "m.gguf");

        let mut ctx = HttpChatContext {
            client: model.client.clone(),
            system_prompt: Some("sys".into()),
            history: Vec::new(),
            released: model.released.clone(),
        };
        ctx.commit_turn("q1", "a1");
        let messages = ctx.messages_for("q2");
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, ["system", "user", "assistant", "user"]);
        assert_eq!(messages[3].content, "q2");
    }

    #[tokio::test]
    async fn test_unloaded_model_refuses_contexts() {
        let client = ChatCompletionClient::new("http://127.0.0.1:1", "m").unwrap();
        let model = HttpModel::new(Path::new("m.gguf"), client, None);
        let mut ctx = model.create_context(None).await.unwrap();

        model.unload().await;

        assert!(matches!(
            model.create_context(None).await,
            Err(InferenceError::Disposed)
        ));
        let mut sink = |_: &str| ControlFlow::Continue(());
        let result = ctx
            .generate("hi", &GenerationOptions::default(), &CancellationToken::new(), &mut sink)
            .await;
        assert_eq!(result, Err(InferenceError::Disposed));
    }
}
