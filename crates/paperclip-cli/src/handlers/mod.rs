//! Command handlers that delegate to the assistant service.
//!
//! Handlers follow the canonical pattern:
//! - Signature: `pub async fn execute(ctx: &CliContext, ...) -> Result<()>`
//! - Thin wrappers that:
//!   1. Parse/validate CLI-specific input
//!   2. Call `AssistantService` methods
//!   3. Format output for the terminal
//!
//! Handlers that print are split into an `execute` writing to stdout and a
//! function taking `&mut dyn Write` that tests drive directly.

pub mod ask;
pub mod chat;
pub mod config;
pub mod fact;
pub mod fetch_model;
pub mod models;
pub mod paths;
pub mod status;

use std::io::{self, Write};
use std::sync::Arc;

use paperclip_runtime::{AssistantService, Reply};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{ASSISTANT_PROMPT, finish_note};

/// Cancels the in-flight request on Ctrl-C while alive.
pub(crate) struct CancelOnInterrupt(JoinHandle<()>);

impl CancelOnInterrupt {
    pub(crate) fn arm(service: Arc<AssistantService>) -> Self {
        Self(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if let Some(id) = service.cancel() {
                    debug!(request = %id, "Interrupted by user");
                }
            }
        }))
    }
}

impl Drop for CancelOnInterrupt {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Submit `prompt` and stream the reply to `out` as it arrives.
pub(crate) async fn stream_reply(
    ctx: &CliContext,
    prompt: &str,
    out: &mut (dyn Write + Send),
) -> Result<Reply, CliError> {
    let _interrupt = CancelOnInterrupt::arm(Arc::clone(ctx.service()));

    write!(out, "{ASSISTANT_PROMPT}")?;
    out.flush()?;

    let mut write_error: Option<io::Error> = None;
    let reply = ctx
        .service()
        .submit_message_with(prompt, &mut |token| {
            if write_error.is_none() {
                if let Err(e) = out.write_all(token.as_bytes()).and_then(|()| out.flush()) {
                    write_error = Some(e);
                }
            }
        })
        .await;

    if let Some(e) = write_error {
        return Err(e.into());
    }
    let reply = match reply {
        Ok(reply) => reply,
        Err(e) => {
            writeln!(out)?;
            return Err(e.into());
        }
    };

    writeln!(out)?;
    if let Some(note) = finish_note(reply.finish) {
        writeln!(out, "{note}")?;
    }
    Ok(reply)
}
