//! Core domain types, configuration and port definitions for paperclip.
//!
//! This crate has no knowledge of HTTP, processes or terminals. Adapters
//! implement the ports in [`ports`] and compose them at the edges.

#![deny(unused_crate_dependencies)]

pub mod config;
pub mod domain;
pub mod events;
pub mod paths;
pub mod ports;
pub mod registry;

// Re-export commonly used types for convenience
pub use config::{
    Config, ConfigUpdate, JsonConfigStore, LlmConfig, MemoryConfigStore, PrivacyConfig,
    SettingsError, Theme, UiConfig, validate_config,
};
pub use domain::{
    ChatTurn, Completion, DEFAULT_STOP_SEQUENCES, ErrorKind, FinishReason, GenerationError,
    GenerationOptions, GenerationRequest, MessageRole, SessionState, SessionStatus,
};
pub use events::{AssistantEvent, RequestId};
pub use ports::{
    ChatContext, ConfigError, ConfigStore, CoreError, InferenceBackend, InferenceError,
    LoadParams, LoadedModel, TokenSink,
};
pub use registry::{MODEL_EXTENSION, ModelDescriptor, list_model_names, list_models, resolve};

// Re-export path utilities
pub use paths::{
    ModelsDirResolution, ModelsDirSource, PathError, ResolvedPaths, config_path, data_root,
    default_models_dir, ensure_directory, llama_server_path, resolve_models_dir,
};
