//! Inference backends.
//!
//! All backends speak the same port ([`paperclip_core::InferenceBackend`]).
//! One is chosen at startup by [`detect_backend`]:
//!
//! - [`RemoteEndpointBackend`] - an already running OpenAI-compatible server
//! - [`LlamaServerBackend`] - a llama-server process spawned per model
//! - [`UnavailableBackend`] - nothing found; every load fails into demo mode

mod detect;
mod health;
mod openai;
pub mod process;
mod remote;
mod server;
mod unavailable;

pub use detect::{
    BackendChoice, BackendOptions, LLAMA_SERVER_ENV, LLAMA_URL_ENV, choose_backend,
    detect_backend,
};
pub use health::{check_http_health, wait_for_http_health};
pub use openai::{ChatCompletionClient, HttpChatContext, HttpModel};
pub use remote::RemoteEndpointBackend;
pub use server::{DEFAULT_STARTUP_TIMEOUT, LlamaServerBackend};
pub use unavailable::UnavailableBackend;
