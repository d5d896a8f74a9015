//! Settings subcommands.

use clap::{ArgAction, Args, Subcommand};
use paperclip_core::{ConfigUpdate, Theme};

/// Configuration management commands.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show all current settings
    Show {
        /// Print the raw JSON document
        #[arg(long)]
        json: bool,
    },
    /// Update settings
    Set(SetArgs),
    /// Reset all settings to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
}

/// Flags accepted by `config set`. Omitted flags leave the setting as is.
#[derive(Args, Debug, Default)]
pub struct SetArgs {
    /// Preferred model file name (must exist in the models directory)
    #[arg(long, conflicts_with = "clear_model")]
    pub model: Option<String>,
    /// Forget the preferred model and use the first one found
    #[arg(long)]
    pub clear_model: bool,
    /// Sampling temperature (0.0-2.0)
    #[arg(long)]
    pub temperature: Option<f32>,
    /// Maximum tokens per reply (1-8192)
    #[arg(long)]
    pub max_tokens: Option<u32>,
    /// Context window size in tokens (512-1000000)
    #[arg(long)]
    pub context_size: Option<u32>,
    /// Top-k sampling (1-1000)
    #[arg(long)]
    pub top_k: Option<u32>,
    /// Top-p sampling, in (0, 1]
    #[arg(long)]
    pub top_p: Option<f32>,
    /// Generation timeout in milliseconds (1000-600000)
    #[arg(long)]
    pub timeout_ms: Option<u64>,
    /// UI theme (classic or modern)
    #[arg(long)]
    pub theme: Option<Theme>,
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub animations: Option<bool>,
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub chat_bubbles: Option<bool>,
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub store_conversations: Option<bool>,
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub analytics: Option<bool>,
    #[arg(long, action = ArgAction::Set, value_name = "BOOL")]
    pub telemetry: Option<bool>,
}

impl SetArgs {
    /// The settings patch these flags describe.
    pub fn to_update(&self) -> ConfigUpdate {
        let default_model = if self.clear_model {
            Some(None)
        } else {
            self.model.clone().map(Some)
        };
        ConfigUpdate {
            default_model,
            context_size: self.context_size,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_k: self.top_k,
            top_p: self.top_p,
            timeout_ms: self.timeout_ms,
            theme: self.theme,
            animations: self.animations,
            chat_bubbles: self.chat_bubbles,
            store_conversations: self.store_conversations,
            analytics: self.analytics,
            telemetry: self.telemetry,
        }
    }
}
