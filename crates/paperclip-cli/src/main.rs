//! CLI entry point.
//!
//! Parses the command line, wires the assistant through [`bootstrap`] and
//! routes each command to its handler.

use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use paperclip_core::resolve_models_dir;

use paperclip_cli::handlers::fetch_model::FetchArgs;
use paperclip_cli::{
    Cli, CliConfig, Commands, bootstrap, exit_code_for, handlers, init_logging, load_dotenv,
};

#[tokio::main]
async fn main() -> ExitCode {
    // .env first so RUST_LOG and PAPERCLIP_* from it apply to everything below
    let dotenv = load_dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env");
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let code = u8::try_from(exit_code_for(&e)).unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = CliConfig::from_cli(&cli);

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    // Paths and fetch-model run without composing the assistant
    let assistant = || bootstrap(&config);

    match command {
        Commands::Paths => handlers::paths::execute(&config),
        Commands::FetchModel { url, file, force } => {
            let models_dir = resolve_models_dir(config.models_dir.as_deref())?.path;
            let args = FetchArgs { url, file, force };
            handlers::fetch_model::execute(&models_dir, &args).await
        }
        Commands::Chat => handlers::chat::execute(&assistant()?).await,
        Commands::Ask { prompt } => handlers::ask::execute(&assistant()?, &prompt).await,
        Commands::Status => handlers::status::execute(&assistant()?).await,
        Commands::Models => handlers::models::execute(&assistant()?).await,
        Commands::Config { command } => handlers::config::execute(&assistant()?, command).await,
        Commands::Fact => handlers::fact::execute(&assistant()?).await,
    }
}
