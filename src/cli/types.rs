//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "redraft")]
#[command(about = "Redraft - iterative text refinement with quality gates", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to .redraft/config.yaml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Refine a document until every section meets the detection target
    Run {
        /// Input document (markdown)
        input: PathBuf,

        /// Write the refined document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Score each original section before refining it
        #[arg(long)]
        score_baseline: bool,
    },

    /// Resume an interrupted run from its latest checkpoints
    Resume {
        /// Run id printed when the run was registered
        run_id: String,

        /// Write the refined document here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show per-section outcomes for a run
    Report {
        /// Run id
        run_id: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_parses_with_flags() {
        let cli = Cli::parse_from(["redraft", "run", "paper.md", "--output", "out.md", "--json"]);
        assert!(cli.json);
        match cli.command {
            Commands::Run { input, output, score_baseline } => {
                assert_eq!(input, PathBuf::from("paper.md"));
                assert_eq!(output, Some(PathBuf::from("out.md")));
                assert!(!score_baseline);
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn resume_takes_a_run_id() {
        let cli = Cli::parse_from(["redraft", "resume", "run-1a2b3c4d"]);
        match cli.command {
            Commands::Resume { run_id, output } => {
                assert_eq!(run_id, "run-1a2b3c4d");
                assert!(output.is_none());
            }
            _ => panic!("expected resume command"),
        }
    }

    #[test]
    fn global_config_flag_is_accepted_after_subcommand() {
        let cli = Cli::parse_from(["redraft", "report", "run-1a2b3c4d", "--config", "alt.yaml"]);
        assert_eq!(cli.config, Some(PathBuf::from("alt.yaml")));
    }
}
