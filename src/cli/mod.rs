//! Command-line interface: argument parsing, document splitting, command
//! handlers, and terminal output.

pub mod commands;
pub mod document;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

/// Print an error in the requested format and exit non-zero.
pub fn handle_error(err: &anyhow::Error, json: bool) -> ! {
    if json {
        let payload = serde_json::json!({ "error": format!("{err:#}") });
        println!("{payload}");
    } else {
        eprintln!("{} {err:#}", console::style("error:").red().bold());
    }
    std::process::exit(1);
}
