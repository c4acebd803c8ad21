//! The `run` and `resume` commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::adapters::providers::{HttpScoreProvider, HttpTransformProvider};
use crate::application::{DocumentRunner, ReportBuilder, RunOutcome};
use crate::cli::document;
use crate::cli::output::{RunProgress, TableFormatter};
use crate::domain::models::{Config, RefineConfig};
use crate::domain::ports::{ScoreProvider, TransformProvider};
use crate::infrastructure::config::load_glossary;
use crate::infrastructure::gate::ProviderGate;
use crate::services::{RefinementLoop, TermVault};

use super::open_stores;

/// Handle the `run` command: split the document, register a run, refine it.
pub async fn execute(
    config: &Config,
    input: &Path,
    output: Option<&Path>,
    score_baseline: bool,
    json: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read input document {}", input.display()))?;
    let sections = document::split_sections(&text);
    anyhow::ensure!(
        !sections.is_empty(),
        "input document {} has no refinable sections",
        input.display()
    );

    let mut refine = config.refine.clone();
    refine.score_baseline = refine.score_baseline || score_baseline;
    let max_iterations = refine.max_iterations;

    let (runner, report) = build_runner(config, refine).await?;
    let run = runner
        .register_run(&input.display().to_string(), sections)
        .await?;
    if !json {
        eprintln!("{} {}", console::style("run").bold(), run.id);
    }

    drive(runner, &report, &run.id, output, max_iterations, json).await
}

/// Handle the `resume` command: continue a run's ACTIVE units from their
/// latest checkpoints.
pub async fn execute_resume(
    config: &Config,
    run_id: &str,
    output: Option<&Path>,
    json: bool,
) -> Result<()> {
    let max_iterations = config.refine.max_iterations;
    let (runner, report) = build_runner(config, config.refine.clone()).await?;
    drive(runner, &report, run_id, output, max_iterations, json).await
}

/// Assemble the full refinement stack from configuration.
async fn build_runner(
    config: &Config,
    refine: RefineConfig,
) -> Result<(DocumentRunner, ReportBuilder)> {
    let (store, registry) = open_stores(config).await?;

    let vault = TermVault::new(load_glossary(&config.glossary)?);
    let gate = ProviderGate::new(refine.provider_concurrency, config.providers.rate_limit_rps);
    let transformer: Arc<dyn TransformProvider> = Arc::new(HttpTransformProvider::new(
        &config.providers,
        refine.provider_timeout_secs,
    )?);
    let scorer: Arc<dyn ScoreProvider> = Arc::new(HttpScoreProvider::new(
        &config.providers,
        refine.provider_timeout_secs,
    )?);

    let refinement = RefinementLoop::new(
        transformer,
        scorer,
        Arc::clone(&store),
        vault,
        gate,
        refine.clone(),
    );
    let runner = DocumentRunner::new(refinement, Arc::clone(&registry), refine);
    Ok((runner, ReportBuilder::new(registry, store)))
}

/// Refine to completion or interruption, then emit the document and the
/// outcome summary.
async fn drive(
    mut runner: DocumentRunner,
    report: &ReportBuilder,
    run_id: &str,
    output: Option<&Path>,
    max_iterations: u32,
    json: bool,
) -> Result<()> {
    // Ctrl-C lands at the next stage boundary of every in-flight worker;
    // commits in progress always complete first.
    let shutdown = runner.shutdown_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown.send(());
        }
    });

    let mut events = runner
        .take_event_receiver()
        .context("event receiver already taken")?;
    let display = tokio::spawn(async move {
        let mut progress = if json {
            RunProgress::hidden(max_iterations)
        } else {
            RunProgress::new(max_iterations)
        };
        while let Some(event) = events.recv().await {
            progress.handle(&event);
        }
        progress.finish();
    });

    let outcome = runner.run(run_id).await;
    // Dropping the runner closes the event channel and ends the display.
    drop(runner);
    let _ = display.await;
    let outcome = outcome?;

    // Even an interrupted run has a best-so-far document: units without
    // commits contribute their original text.
    let document = report.assemble_document(run_id).await?;
    if let Some(path) = output {
        std::fs::write(path, &document)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if json {
        let mut payload = summary_json(run_id, &outcome, output);
        if output.is_none() {
            payload["document"] = serde_json::json!(document);
        }
        println!("{}", serde_json::to_string_pretty(&payload)?);
    } else {
        if output.is_none() {
            println!("{document}");
        }
        let run_report = report.build(run_id).await?;
        let formatter = TableFormatter::new();
        eprintln!("{}", formatter.format_report(&run_report));
        eprintln!("{}", formatter.format_totals(&run_report));
        if let Some(path) = output {
            eprintln!("refined document written to {}", path.display());
        }
        if !outcome.is_complete() {
            eprintln!(
                "{} {} unit(s) interrupted; continue with `redraft resume {run_id}`",
                console::style("note:").yellow().bold(),
                outcome.interrupted
            );
        }
    }

    Ok(())
}

fn summary_json(run_id: &str, outcome: &RunOutcome, output: Option<&Path>) -> serde_json::Value {
    serde_json::json!({
        "run_id": run_id,
        "accepted": outcome.accepted,
        "borderline": outcome.borderline,
        "failed": outcome.failed,
        "interrupted": outcome.interrupted,
        "output": output.map(|p| p.display().to_string()),
    })
}
