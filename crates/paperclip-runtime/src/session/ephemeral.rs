//! Isolated, independently cancellable chat contexts.

use paperclip_core::{ChatContext, Completion, FinishReason, GenerationError, GenerationRequest};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::generate::run_generation;
use crate::deadline::Deadline;

/// A chat context separate from the primary conversation.
///
/// Has its own history and its own cancellation token. Cancelling it stops
/// only its own generations; unloading the model cancels it too. The context
/// is released when dropped.
pub struct EphemeralContext {
    ctx: Option<Box<dyn ChatContext>>,
    token: CancellationToken,
}

impl EphemeralContext {
    pub(crate) fn new(ctx: Box<dyn ChatContext>, token: CancellationToken) -> Self {
        Self {
            ctx: Some(ctx),
            token,
        }
    }

    /// Token cancelling every generation on this context, now and later.
    pub fn cancel_token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_disposed(&self) -> bool {
        self.ctx.is_none()
    }

    /// Generate a reply bounded by `request.timeout`.
    pub async fn generate(
        &mut self,
        request: &GenerationRequest,
        on_token: &mut (dyn FnMut(&str) + Send),
    ) -> Result<Completion, GenerationError> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Err(GenerationError::not_ready("context has been disposed"));
        };

        let call = self.token.child_token();
        let deadline = Deadline::arm(call.clone(), request.timeout);
        let mut completion =
            run_generation(&mut **ctx, &request.prompt, &request.options, &call, on_token).await?;

        if completion.finish == FinishReason::Cancelled && deadline.fired() {
            debug!(timeout = ?request.timeout, "Ephemeral generation timed out");
            completion.finish = FinishReason::TimedOut;
        }
        Ok(completion)
    }

    /// Cancel outstanding work and release the context.
    pub fn dispose(&mut self) {
        self.token.cancel();
        self.ctx = None;
    }
}

impl Drop for EphemeralContext {
    fn drop(&mut self) {
        self.dispose();
    }
}
