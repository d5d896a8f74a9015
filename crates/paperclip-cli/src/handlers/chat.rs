//! Chat command handler: an interactive REPL on top of the assistant.
//!
//! Lines starting with `/` are REPL commands; everything else is sent to
//! the assistant and the reply is streamed as it is generated. Ctrl-C
//! cancels the reply in progress, Ctrl-D or `/quit` leaves.

use std::io::{self, Write};

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::debug;

use super::fact::print_fact;
use super::stream_reply;
use crate::bootstrap::CliContext;
use crate::error::CliError;
use crate::presentation::{ASSISTANT_PROMPT, format_status};

const USER_PROMPT: &str = "you> ";

const HELP: &str = "\
Commands:
  /fact     a fun fact about paperclips
  /status   model and demo mode status
  /help     this help
  /quit     leave (Ctrl-D works too)";

/// What the REPL does after a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    Continue,
    Quit,
}

/// Execute the chat command.
pub async fn execute(ctx: &CliContext) -> Result<()> {
    let result = repl(ctx).await;
    ctx.service().shutdown().await;
    result
}

async fn repl(ctx: &CliContext) -> Result<()> {
    let mut stdout = io::stdout();
    greet(ctx, &mut stdout).await?;

    let mut editor = DefaultEditor::new()?;
    loop {
        let line = tokio::task::block_in_place(|| editor.readline(USER_PROMPT));
        match line {
            Ok(line) => {
                if !line.trim().is_empty() {
                    if let Err(e) = editor.add_history_entry(line.as_str()) {
                        debug!(error = %e, "Could not record history");
                    }
                }
                if handle_line(ctx, &line, &mut stdout).await? == LineOutcome::Quit {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {}
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }
    writeln!(stdout, "{ASSISTANT_PROMPT}Bye! Keep your papers together.")?;
    Ok(())
}

/// Load the model and print a greeting that says whether it worked.
pub async fn greet(ctx: &CliContext, out: &mut dyn Write) -> Result<()> {
    let status = ctx.service().initialize().await;
    writeln!(
        out,
        "{ASSISTANT_PROMPT}Hi! I'm Paperclip. It looks like you're writing a question."
    )?;
    match (&status.model_name, status.demo_mode) {
        (Some(model), false) => writeln!(out, "   Using model {model}.")?,
        (_, true) if status.model_detected => writeln!(
            out,
            "   (demo mode: a model was found but could not be loaded, see /status)"
        )?,
        _ => writeln!(
            out,
            "   (demo mode: no model yet, try `paperclip fetch-model`)"
        )?,
    }
    writeln!(out, "   Type /help for commands.")?;
    Ok(())
}

/// Handle one REPL line.
///
/// Generation failures are printed inline and the REPL carries on; only
/// terminal I/O errors end it.
pub async fn handle_line(
    ctx: &CliContext,
    line: &str,
    out: &mut (dyn Write + Send),
) -> Result<LineOutcome> {
    let line = line.trim();
    match line {
        "" => {}
        "/quit" | "/exit" => return Ok(LineOutcome::Quit),
        "/help" => writeln!(out, "{HELP}")?,
        "/fact" => {
            let fact = ctx.service().fun_fact().await;
            print_fact(&fact, out)?;
        }
        "/status" => {
            let status = ctx.service().status().await;
            let backend = ctx.service().sessions().backend_name();
            writeln!(out, "{}", format_status(&status, backend))?;
        }
        command if command.starts_with('/') => {
            writeln!(out, "Unknown command {command}, try /help")?;
        }
        message => {
            if let Err(e) = stream_reply(ctx, message, out).await {
                if matches!(e, CliError::Io(_)) {
                    return Err(e.into());
                }
                writeln!(out, "⚠️  {e}")?;
            }
        }
    }
    Ok(LineOutcome::Continue)
}
