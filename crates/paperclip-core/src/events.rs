//! Events pushed to front ends while the assistant works.
//!
//! # Wire Format
//!
//! Events are serialized with a `type` tag:
//!
//! ```json
//! { "type": "token", "requestId": 3, "text": "Hel" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::{ErrorKind, FinishReason, SessionStatus};

/// Identifier of one chat submission, unique per service instance.
pub type RequestId = u64;

/// Assistant event union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AssistantEvent {
    /// A piece of reply text for an in-flight request.
    Token { request_id: RequestId, text: String },

    /// A request finished (including cancelled and timed-out requests).
    Completed {
        request_id: RequestId,
        text: String,
        finish: FinishReason,
    },

    /// A request failed.
    Failed {
        request_id: RequestId,
        kind: ErrorKind,
        message: String,
    },

    /// The session status changed.
    StatusChanged { status: SessionStatus },

    /// A different model was loaded after a settings change.
    ModelReloaded { model_name: Option<String> },
}

impl AssistantEvent {
    /// Request this event belongs to, if any.
    pub const fn request_id(&self) -> Option<RequestId> {
        match self {
            Self::Token { request_id, .. }
            | Self::Completed { request_id, .. }
            | Self::Failed { request_id, .. } => Some(*request_id),
            Self::StatusChanged { .. } | Self::ModelReloaded { .. } => None,
        }
    }
}
