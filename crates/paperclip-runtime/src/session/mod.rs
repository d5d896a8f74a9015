//! Inference sessions.
//!
//! - [`InferenceSession`]: a loaded model and its primary chat context
//! - [`EphemeralContext`]: isolated side contexts (fun facts)
//! - [`SessionManager`]: owns the primary session, falls back to demo mode

mod ephemeral;
mod generate;
mod inference;
mod manager;

pub use ephemeral::EphemeralContext;
pub use inference::InferenceSession;
pub use manager::SessionManager;
