//! Config command handler.

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};

use crate::bootstrap::CliContext;
use crate::config_commands::{ConfigCommand, SetArgs};
use crate::error::CliError;
use crate::presentation::format_config;

/// Execute the config command.
///
/// Settings are validated and persisted through the assistant service; no
/// model is loaded.
pub async fn execute(ctx: &CliContext, command: ConfigCommand) -> Result<()> {
    let mut stdout = io::stdout();
    match command {
        ConfigCommand::Show { json } => show(ctx, json, &mut stdout).await,
        ConfigCommand::Set(args) => set(ctx, &args, &mut stdout).await,
        ConfigCommand::Reset { force } => {
            if !force && !confirm("Reset all settings to defaults?")? {
                println!("Reset cancelled.");
                return Ok(());
            }
            reset(ctx, &mut stdout).await
        }
    }
}

pub async fn show(ctx: &CliContext, json: bool, out: &mut dyn Write) -> Result<()> {
    let config = ctx.service().settings().await;
    if json {
        writeln!(out, "{}", serde_json::to_string_pretty(&config)?)?;
    } else {
        writeln!(out, "{}", format_config(&config))?;
        writeln!(out, "(stored in {})", ctx.paths().config_path.display())?;
    }
    Ok(())
}

pub async fn set(ctx: &CliContext, args: &SetArgs, out: &mut dyn Write) -> Result<()> {
    let update = args.to_update();
    if update.is_empty() {
        return Err(CliError::Arguments(
            "no settings given, see `paperclip config set --help`".into(),
        )
        .into());
    }
    let config = ctx
        .service()
        .apply_settings(&update)
        .await
        .map_err(CliError::from)?;
    writeln!(out, "✓ Settings updated.")?;
    writeln!(out, "{}", format_config(&config))?;
    Ok(())
}

pub async fn reset(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
    ctx.service()
        .reset_settings()
        .await
        .map_err(CliError::from)?;
    writeln!(out, "✓ Settings reset to defaults.")?;
    Ok(())
}

/// Ask a yes/no question on stdin. Anything but "y"/"yes" is a no.
fn confirm(question: &str) -> Result<bool> {
    print!("{question} [y/N]: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .lock()
        .read_line(&mut input)
        .context("Failed to read user input")?;
    Ok(matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}
