//! Models command handler.

use std::io::{self, Write};

use anyhow::Result;
use paperclip_core::{list_models, resolve};

use crate::bootstrap::CliContext;
use crate::presentation::format_model_line;

/// Execute the models command.
///
/// Lists the `.gguf` files in the models directory and marks the one that
/// would be loaded. No model is loaded.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    list(ctx, &mut io::stdout()).await
}

pub async fn list(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
    let dir = ctx.models_dir();
    let models = list_models(dir);
    if models.is_empty() {
        writeln!(out, "No models found in {}", dir.display())?;
        writeln!(out, "Run `paperclip fetch-model` to download a small default model.")?;
        return Ok(());
    }

    let config = ctx.service().settings().await;
    let names: Vec<String> = models.iter().map(|m| m.file_name.clone()).collect();
    let selected = resolve(config.preferred_model(), &names);

    writeln!(out, "Models in {}:", dir.display())?;
    for model in &models {
        let is_selected = selected == Some(model.file_name.as_str());
        writeln!(
            out,
            "{}",
            format_model_line(&model.file_name, model.size_bytes, is_selected)
        )?;
    }
    if let Some(preferred) = config.preferred_model() {
        if selected != Some(preferred) {
            writeln!(out, "(preferred model '{preferred}' is missing)")?;
        }
    }
    Ok(())
}
