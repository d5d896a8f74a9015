//! Core domain types.
//!
//! These types represent the pure domain model, independent of any
//! infrastructure concerns (inference backend, filesystem, transport).
//!
//! # Structure
//!
//! - `chat` - Chat roles and conversation turns
//! - `generation` - Generation requests, options and outcomes
//! - `status` - Session lifecycle state and transport-facing status

pub mod chat;
pub mod generation;
pub mod status;

pub use chat::{ChatTurn, MessageRole};
pub use generation::{
    Completion, DEFAULT_STOP_SEQUENCES, ErrorKind, FinishReason, GenerationError,
    GenerationOptions, GenerationRequest,
};
pub use status::{SessionState, SessionStatus};
