//! Redraft CLI entry point.

use clap::Parser;

use redraft::cli::{commands, handle_error, Cli, Commands};
use redraft::infrastructure::config::ConfigLoader;
use redraft::infrastructure::logging::Logger;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };
    let config = match config {
        Ok(config) => config,
        Err(err) => handle_error(&err, cli.json),
    };

    // The guard flushes the file appender on drop; keep it alive for the
    // whole process.
    let _logger = match Logger::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(&err, cli.json),
    };

    let result = match cli.command {
        Commands::Run {
            ref input,
            ref output,
            score_baseline,
        } => {
            commands::run::execute(
                &config,
                input,
                output.as_deref(),
                score_baseline,
                cli.json,
            )
            .await
        }
        Commands::Resume {
            ref run_id,
            ref output,
        } => commands::run::execute_resume(&config, run_id, output.as_deref(), cli.json).await,
        Commands::Report { ref run_id } => {
            commands::report::execute(&config, run_id, cli.json).await
        }
    };

    if let Err(err) = result {
        handle_error(&err, cli.json);
    }
}
