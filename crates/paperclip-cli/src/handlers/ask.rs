//! Ask command handler: one streamed answer, then exit.

use std::io::{self, Write};

use anyhow::Result;
use paperclip_runtime::Reply;

use super::stream_reply;
use crate::bootstrap::CliContext;
use crate::error::CliError;

/// Execute the ask command.
///
/// Loads the preferred model (or falls back to demo replies), streams the
/// answer to stdout and unloads the model again.
pub async fn execute(ctx: &CliContext, prompt: &[String]) -> Result<()> {
    let mut stdout = io::stdout();
    let result = answer(ctx, &prompt.join(" "), &mut stdout).await;
    ctx.service().shutdown().await;
    result?;
    Ok(())
}

/// Initialize the assistant and stream one reply to `out`.
pub async fn answer(
    ctx: &CliContext,
    prompt: &str,
    out: &mut (dyn Write + Send),
) -> Result<Reply, CliError> {
    if prompt.trim().is_empty() {
        return Err(CliError::Arguments("the question is empty".into()));
    }
    let status = ctx.service().initialize().await;
    if status.demo_mode {
        tracing::info!(detail = ?status.detail, "Answering in demo mode");
    }
    stream_reply(ctx, prompt, out).await
}
