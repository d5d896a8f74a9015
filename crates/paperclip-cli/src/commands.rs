//! Top-level subcommands.

use clap::Subcommand;

use crate::config_commands::ConfigCommand;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat interactively (type /help inside for commands)
    Chat,
    /// Ask a single question and stream the answer
    Ask {
        /// The question (several words are joined with spaces)
        #[arg(required = true, num_args = 1..)]
        prompt: Vec<String>,
    },
    /// Show whether a model is loaded or demo replies are served
    Status,
    /// List the models found in the models directory
    Models,
    /// View or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Print a fun fact about paperclips
    Fact,
    /// Download a default model if none is installed
    FetchModel {
        /// Download URL (default: TinyLlama 1.1B chat, or PAPERCLIP_DEFAULT_GGUF_URL)
        #[arg(long)]
        url: Option<String>,
        /// File name to save the model as
        #[arg(long)]
        file: Option<String>,
        /// Download even if a model is already installed
        #[arg(long)]
        force: bool,
    },
    /// Show resolved data, config and models paths
    Paths,
}

#[cfg(test)]
mod tests {
    use crate::parser::Cli;
    use clap::Parser;

    use super::*;

    #[test]
    fn test_ask_joins_words() {
        let cli = Cli::parse_from(["paperclip", "ask", "what", "is", "a", "paperclip?"]);
        match cli.command {
            Some(Commands::Ask { prompt }) => assert_eq!(prompt.join(" "), "what is a paperclip?"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_ask_requires_prompt() {
        assert!(Cli::try_parse_from(["paperclip", "ask"]).is_err());
    }

    #[test]
    fn test_fetch_model_flags() {
        let cli = Cli::parse_from([
            "paperclip",
            "fetch-model",
            "--url",
            "https://example.invalid/m.gguf",
            "--file",
            "m.gguf",
            "--force",
        ]);
        match cli.command {
            Some(Commands::FetchModel { url, file, force }) => {
                assert_eq!(url.as_deref(), Some("https://example.invalid/m.gguf"));
                assert_eq!(file.as_deref(), Some("m.gguf"));
                assert!(force);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
