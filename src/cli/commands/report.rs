//! The `report` command.

use anyhow::Result;

use crate::application::ReportBuilder;
use crate::cli::output::TableFormatter;
use crate::domain::models::Config;

use super::open_stores;

/// Handle the `report` command: show per-unit outcomes for a run.
pub async fn execute(config: &Config, run_id: &str, json: bool) -> Result<()> {
    let (store, registry) = open_stores(config).await?;
    let builder = ReportBuilder::new(registry, store);
    let report = builder.build(run_id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!(
            "Run {} ({}), created {}",
            report.run_id,
            report.input_path,
            report.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        let formatter = TableFormatter::new();
        println!("{}", formatter.format_report(&report));
        println!("{}", formatter.format_totals(&report));
    }

    Ok(())
}
