//! Fact command handler.

use std::io::{self, Write};

use anyhow::Result;
use paperclip_runtime::Fact;

use crate::bootstrap::CliContext;
use crate::presentation::{ASSISTANT_PROMPT, fact_origin_label};

/// Execute the fact command.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    ctx.service().initialize().await;
    let fact = ctx.service().fun_fact().await;
    let printed = print_fact(&fact, &mut io::stdout());
    ctx.service().shutdown().await;
    Ok(printed?)
}

pub fn print_fact(fact: &Fact, out: &mut dyn Write) -> std::io::Result<()> {
    tracing::debug!(origin = fact_origin_label(fact.origin), "Fun fact");
    writeln!(out, "{ASSISTANT_PROMPT}Did you know? {}", fact.text)
}
