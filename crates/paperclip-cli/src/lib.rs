//! Terminal front end for the paperclip assistant.
//!
//! `main.rs` parses the command line, [`bootstrap`] composes the assistant
//! and [`handlers`] run one command each.

#![deny(unsafe_code)]
#![deny(unused_crate_dependencies)]

#[cfg(test)]
use tokio_test as _;

pub mod bootstrap;
pub mod commands;
pub mod config_commands;
pub mod error;
pub mod handlers;
pub mod parser;
pub mod presentation;

// Re-export primary types for convenient access
pub use bootstrap::{CliConfig, CliContext, bootstrap, init_logging, load_dotenv};
pub use commands::Commands;
pub use config_commands::{ConfigCommand, SetArgs};
pub use error::{CliError, exit_code_for};
pub use parser::Cli;
