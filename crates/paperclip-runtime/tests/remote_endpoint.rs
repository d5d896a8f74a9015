//! The assistant against a local OpenAI-compatible endpoint.
//!
//! A minimal HTTP server answers `/health` and streams scripted SSE replies
//! from `/v1/chat/completions`, so the whole path from `submit_message`
//! through the HTTP client and SSE decoding is exercised.

use std::sync::{Arc, Mutex};

use paperclip_core::{
    AssistantEvent, ConfigStore, FinishReason, InferenceBackend, MemoryConfigStore,
};
use paperclip_runtime::{AssistantService, RemoteEndpointBackend};
use serde_json::{Value, json};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Scripted SSE server. Each completion request consumes the next reply.
struct FakeServer {
    base_url: String,
    bodies: Arc<Mutex<Vec<Value>>>,
}

impl FakeServer {
    async fn start(replies: Vec<Vec<&'static str>>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let replies = Arc::new(Mutex::new(replies.into_iter()));

        let recorded = Arc::clone(&bodies);
        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let recorded = Arc::clone(&recorded);
                let replies = Arc::clone(&replies);
                tokio::spawn(async move {
                    handle(stream, &recorded, &replies).await;
                });
            }
        });

        Self { base_url, bodies }
    }

    fn bodies(&self) -> Vec<Value> {
        self.bodies.lock().unwrap().clone()
    }
}

async fn read_request(stream: &mut TcpStream) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert!(n > 0, "client closed before sending headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);

    let mut body = buf[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    (head, body)
}

async fn handle(
    mut stream: TcpStream,
    recorded: &Mutex<Vec<Value>>,
    replies: &Mutex<std::vec::IntoIter<Vec<&'static str>>>,
) {
    let (head, body) = read_request(&mut stream).await;
    let request_line = head.lines().next().unwrap_or_default().to_string();

    if request_line.starts_with("GET /health") {
        let body = r#"{"status":"ok"}"#;
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = stream.write_all(response.as_bytes()).await;
        return;
    }

    if request_line.starts_with("POST /v1/chat/completions") {
        recorded
            .lock()
            .unwrap()
            .push(serde_json::from_slice(&body).unwrap_or(Value::Null));
        let pieces = replies.lock().unwrap().next().unwrap_or_default();

        let _ = stream
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
            )
            .await;
        for piece in pieces {
            let event = json!({ "choices": [{ "delta": { "content": piece } }] });
            let _ = stream
                .write_all(format!("data: {event}\n\n").as_bytes())
                .await;
            let _ = stream.flush().await;
        }
        let _ = stream.write_all(b"data: [DONE]\n\n").await;
        return;
    }

    let _ = stream
        .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
        .await;
}

fn models_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("tiny.gguf"), b"GGUF").unwrap();
    dir
}

fn service(server: &FakeServer, dir: &TempDir) -> AssistantService {
    let backend: Arc<dyn InferenceBackend> = Arc::new(RemoteEndpointBackend::new(&server.base_url));
    let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::default());
    AssistantService::new(backend, config, dir.path())
}

#[tokio::test]
async fn streams_reply_and_keeps_history() {
    let server = FakeServer::start(vec![
        vec!["Hello", " from", " the", " endpoint!"],
        vec!["Second", " answer."],
    ])
    .await;
    let dir = models_dir();
    let service = service(&server, &dir);
    let status = service.sessions().initialize().await;
    assert!(status.ready, "{status:?}");

    let mut tokens = Vec::new();
    let reply = service
        .submit_message_with("hi", &mut |t| tokens.push(t.to_string()))
        .await
        .unwrap();
    assert_eq!(reply.text, "Hello from the endpoint!");
    assert_eq!(reply.finish, FinishReason::Completed);
    assert_eq!(tokens.len(), 4);

    let reply = service.submit_message("and again").await.unwrap();
    assert_eq!(reply.text, "Second answer.");

    let bodies = server.bodies();
    assert_eq!(bodies.len(), 2);
    assert_eq!(bodies[0]["stream"], true);
    assert_eq!(bodies[0]["model"], "tiny.gguf");
    assert_eq!(bodies[0]["messages"][0]["role"], "system");

    let second: Vec<(String, String)> = bodies[1]["messages"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| {
            (
                m["role"].as_str().unwrap().to_string(),
                m["content"].as_str().unwrap().to_string(),
            )
        })
        .skip(1)
        .collect();
    assert_eq!(
        second,
        [
            ("user".to_string(), "hi".to_string()),
            ("assistant".to_string(), "Hello from the endpoint!".to_string()),
            ("user".to_string(), "and again".to_string()),
        ]
    );
}

#[tokio::test]
async fn stop_sequence_split_across_events_is_withheld() {
    let server = FakeServer::start(vec![vec!["Sure.", "\nUs", "er: leak"]]).await;
    let dir = models_dir();
    let service = service(&server, &dir);
    service.sessions().initialize().await;
    let mut events = service.subscribe();

    let reply = service.submit_message("hi").await.unwrap();
    assert_eq!(reply.finish, FinishReason::StopSequence);
    assert_eq!(reply.text, "Sure.");

    let mut streamed = String::new();
    while let Ok(event) = events.try_recv() {
        if let AssistantEvent::Token { text, .. } = event {
            streamed.push_str(&text);
        }
    }
    assert!(!streamed.contains("User"));
    assert!(!streamed.contains("leak"));
}

#[tokio::test]
async fn unreachable_endpoint_falls_back_to_demo() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let dir = models_dir();
    let backend: Arc<dyn InferenceBackend> = Arc::new(RemoteEndpointBackend::new(base_url));
    let config: Arc<dyn ConfigStore> = Arc::new(MemoryConfigStore::default());
    let service = AssistantService::new(backend, config, dir.path())
        .with_demo_delay(std::time::Duration::ZERO);

    let status = service.initialize().await;
    assert!(status.demo_mode);
    assert!(status.model_detected);

    let reply = service.submit_message("hello").await.unwrap();
    assert!(reply.demo);
    assert!(reply.text.contains("hello"));
}
