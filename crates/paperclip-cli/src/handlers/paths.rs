//! Paths command handler.
//!
//! Displays all resolved paths and the backend that would be used, for
//! diagnosing setup problems.

use anyhow::Result;
use paperclip_core::paths::ResolvedPaths;
use paperclip_runtime::{BackendChoice, choose_backend};

use crate::bootstrap::CliConfig;

/// Execute the paths command. Needs no bootstrap.
pub fn execute(config: &CliConfig) -> Result<()> {
    let paths = ResolvedPaths::resolve(config.models_dir.as_deref())?;
    println!("{paths}");
    println!("backend = {}", describe_backend(&choose_backend(&config.backend)));
    Ok(())
}

fn describe_backend(choice: &BackendChoice) -> String {
    match choice {
        BackendChoice::Remote(url) => format!("remote endpoint {url}"),
        BackendChoice::LlamaServer(path) => format!("llama-server {}", path.display()),
        BackendChoice::Unavailable(reason) => format!("none, demo replies only ({reason})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_describe_backend() {
        let remote = BackendChoice::Remote("http://127.0.0.1:8080".into());
        assert_eq!(describe_backend(&remote), "remote endpoint http://127.0.0.1:8080");

        let server = BackendChoice::LlamaServer(PathBuf::from("/usr/bin/llama-server"));
        assert_eq!(describe_backend(&server), "llama-server /usr/bin/llama-server");
    }
}
