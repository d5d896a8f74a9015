//! Inference backends, generation sessions and the assistant service.
//!
//! ```text
//! AssistantService
//!   ├── GenerationCoordinator   latest request wins
//!   ├── SessionManager          primary InferenceSession or demo mode
//!   ├── FactPrefetchQueue       ephemeral contexts, single-flight refill
//!   └── EventBroadcaster        token / status events for front ends
//! ```

#![deny(unsafe_code)]

pub mod assistant;
pub mod backend;
pub mod coordinator;
mod deadline;
pub mod demo;
pub mod events;
pub mod facts;
pub mod fetch;
pub mod session;
pub mod stop;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use assistant::{AssistantService, Reply, SYSTEM_PROMPT};
pub use backend::{
    BackendChoice, BackendOptions, ChatCompletionClient, LlamaServerBackend,
    RemoteEndpointBackend, UnavailableBackend, choose_backend, detect_backend,
};
pub use coordinator::{GenerationCoordinator, RequestTicket};
pub use events::EventBroadcaster;
pub use facts::{Fact, FactError, FactOrigin, FactPrefetchQueue, FactSource, SessionFactSource};
pub use fetch::{FetchOutcome, FetchSource, fetch_default_model};
pub use session::{EphemeralContext, InferenceSession, SessionManager};
