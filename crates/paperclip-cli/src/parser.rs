//! Main CLI parser and top-level argument handling.
//!
//! This module defines the root CLI structure with global options.

use clap::Parser;

use crate::commands::Commands;

/// Paperclip, the friendly office assistant, in your terminal.
#[derive(Parser, Debug)]
#[command(name = "paperclip")]
#[command(about = "A friendly local-LLM office assistant")]
#[command(version)]
pub struct Cli {
    /// Directory scanned for .gguf models (default: PAPERCLIP_MODELS_DIR or <data root>/models)
    #[arg(long = "models-dir", global = true)]
    pub models_dir: Option<String>,

    /// Use an already running OpenAI-compatible server instead of spawning llama-server
    #[arg(long = "llama-url", env = "PAPERCLIP_LLAMA_URL", global = true)]
    pub llama_url: Option<String>,

    /// Path to the llama-server binary
    #[arg(long = "llama-server", env = "PAPERCLIP_LLAMA_SERVER", global = true)]
    pub llama_server: Option<String>,

    /// Enable verbose/debug output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}
