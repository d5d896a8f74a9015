//! Status command handler.

use std::io::{self, Write};

use anyhow::Result;

use crate::bootstrap::CliContext;
use crate::presentation::format_status;

/// Execute the status command.
///
/// Tries to load the preferred model so the report reflects whether real
/// replies are possible, then unloads it.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let result = report(ctx, &mut io::stdout()).await;
    ctx.service().shutdown().await;
    result
}

pub async fn report(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
    let status = ctx.service().initialize().await;
    let backend = ctx.service().sessions().backend_name();
    writeln!(out, "{}", format_status(&status, backend))?;
    writeln!(out, "models:   {}", ctx.models_dir().display())?;
    Ok(())
}
