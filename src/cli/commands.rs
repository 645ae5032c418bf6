//! CLI command definitions for datawash.
//!
//! This module wires the pipeline, the quality report and the sandbox to
//! command-line subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::dataset::load_csv;
use crate::llm::{ChatClient, LlmConfig};
use crate::pipeline::{Pipeline, PipelineConfig, PipelineEvent, SynthesisStage};
use crate::quality::IssueReport;
use crate::sandbox::SandboxExecutor;
use crate::storage::SnapshotStore;
use crate::synthesis::{CleaningRule, CleaningRules, ProcedureSynthesizer};

/// Model-guided data cleaning for tabular datasets.
#[derive(Parser)]
#[command(name = "datawash")]
#[command(about = "Profile a CSV dataset, synthesize a cleaning procedure and apply it safely")]
#[command(version)]
#[command(
    long_about = "datawash loads a CSV dataset, reports its quality issues, asks a language model for a cleaning procedure, runs that procedure in a sandbox and stores raw and clean snapshots in SQLite.\n\nExample usage:\n  datawash run --input titanic.csv --database pipeline.db\n  datawash run --input titanic.csv --offline --fill-median Age --drop-column Cabin"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full ingest, check, synthesize and apply pipeline.
    Run(RunArgs),

    /// Print the quality report of a CSV file.
    Profile(ProfileArgs),

    /// Apply a procedure file to a CSV file and store the result.
    Apply(ApplyArgs),
}

/// Arguments for `datawash run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// CSV file to clean.
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// SQLite database for the snapshots.
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Table for the raw snapshot.
    #[arg(long)]
    pub raw_table: Option<String>,

    /// Table for the cleaned snapshot.
    #[arg(long)]
    pub clean_table: Option<String>,

    /// Model, or Azure deployment name, asked for the procedure.
    #[arg(short, long)]
    pub model: Option<String>,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Fill missing values of this column with its median (repeatable).
    #[arg(long = "fill-median", value_name = "COL")]
    pub fill_median: Vec<String>,

    /// Drop this column if present (repeatable).
    #[arg(long = "drop-column", value_name = "COL")]
    pub drop_column: Vec<String>,

    /// Do not ask for duplicate rows to be removed.
    #[arg(long)]
    pub keep_duplicates: bool,

    /// Compile the rules directly instead of calling a model.
    #[arg(long)]
    pub offline: bool,
}

/// Arguments for `datawash profile`.
#[derive(Parser, Debug)]
pub struct ProfileArgs {
    /// CSV file to profile.
    #[arg(short, long)]
    pub input: PathBuf,
}

/// Arguments for `datawash apply`.
#[derive(Parser, Debug)]
pub struct ApplyArgs {
    /// CSV file to clean.
    #[arg(short, long)]
    pub input: PathBuf,

    /// File holding the cleaning procedure.
    #[arg(short, long)]
    pub procedure: PathBuf,

    /// SQLite database for the snapshot.
    #[arg(short, long)]
    pub database: Option<PathBuf>,

    /// Table for the cleaned snapshot.
    #[arg(long)]
    pub clean_table: Option<String>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
///
/// For more control over logging initialization, use `parse_cli()` and `run_with_cli()`.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_pipeline_command(args).await,
        Commands::Profile(args) => run_profile_command(args).await,
        Commands::Apply(args) => run_apply_command(args).await,
    }
}

// ============================================================================
// Run
// ============================================================================

async fn run_pipeline_command(args: RunArgs) -> anyhow::Result<()> {
    let config = pipeline_config(&args)?;
    let rules = cleaning_rules(&args);

    let synthesis = if args.offline {
        info!(rules = rules.len(), "Offline run, compiling rules");
        SynthesisStage::from_rules(rules)
    } else {
        let client = ChatClient::new(LlmConfig::from_env()?.with_model(config.model.clone()))?;
        if !client.has_api_key() {
            warn!("No API key configured; requests will be sent unauthenticated");
        }
        SynthesisStage::from_model(ProcedureSynthesizer::new(
            Arc::new(client),
            config.synthesis_config(rules),
        ))
    };

    let store = SnapshotStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let pipeline = Pipeline::standard(&config, store.clone(), synthesis)?;

    let (tx, mut rx) = mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                PipelineEvent::StageStarted { stage } => println!("-> {}", stage),
                PipelineEvent::StageCompleted {
                    stage,
                    marker,
                    elapsed,
                } => println!("   {} done ({}, {} ms)", stage, marker, elapsed.as_millis()),
                PipelineEvent::CleaningFellBack { reason } => {
                    println!("   procedure failed, keeping original data: {}", reason)
                }
                PipelineEvent::PipelineCompleted { .. } => {}
            }
        }
    });

    let result = pipeline.run_with_events(Some(tx)).await;
    // the sender is dropped with the pipeline run, so the printer drains and exits
    let _ = printer.await;
    store.close().await;
    let run = result?;

    if let Some(report) = run.state.issue_report() {
        println!("Issues: {}", report);
    }
    if let Some(procedure) = run.state.cleaning_procedure() {
        if !procedure.is_empty() {
            println!("Procedure:\n{}", procedure.source());
        }
    }
    println!("Final state is: {}", run.final_stage());
    if let Some(outcome) = run.outcome() {
        println!("Outcome: {}", outcome);
    }
    Ok(())
}

fn pipeline_config(args: &RunArgs) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(input) = &args.input {
        config = config.with_input_path(input);
    }
    if let Some(database) = &args.database {
        config = config.with_database_path(database);
    }
    if let Some(table) = &args.raw_table {
        config = config.with_raw_table(table);
    }
    if let Some(table) = &args.clean_table {
        config = config.with_clean_table(table);
    }
    if let Some(model) = &args.model {
        config = config.with_model(model);
    }
    if let Some(temperature) = args.temperature {
        config = config.with_temperature(temperature);
    }
    config.validate()?;
    Ok(config)
}

/// Rules from the flags, or the defaults when no column flag is given.
fn cleaning_rules(args: &RunArgs) -> CleaningRules {
    let mut rules: CleaningRules = if args.fill_median.is_empty() && args.drop_column.is_empty() {
        CleaningRules::default()
            .rules()
            .iter()
            .filter(|r| **r != CleaningRule::DropDuplicateRows)
            .cloned()
            .collect()
    } else {
        args.fill_median
            .iter()
            .map(|c| CleaningRule::FillMissingWithMedian { column: c.clone() })
            .chain(
                args.drop_column
                    .iter()
                    .map(|c| CleaningRule::DropColumnIfExists { column: c.clone() }),
            )
            .collect()
    };
    if !args.keep_duplicates {
        rules.push(CleaningRule::DropDuplicateRows);
    }
    rules
}

// ============================================================================
// Profile
// ============================================================================

async fn run_profile_command(args: ProfileArgs) -> anyhow::Result<()> {
    let dataset = load_csv(&args.input)
        .await
        .with_context(|| format!("loading {}", args.input.display()))?;
    let report = IssueReport::from_dataset(&dataset);

    println!("{}", report.render());
    Ok(())
}

// ============================================================================
// Apply
// ============================================================================

async fn run_apply_command(args: ApplyArgs) -> anyhow::Result<()> {
    let mut config = PipelineConfig::from_env()?;
    if let Some(database) = args.database {
        config = config.with_database_path(database);
    }
    if let Some(table) = args.clean_table {
        config = config.with_clean_table(table);
    }
    config.validate()?;

    let dataset = load_csv(&args.input)
        .await
        .with_context(|| format!("loading {}", args.input.display()))?;
    let source = tokio::fs::read_to_string(&args.procedure)
        .await
        .with_context(|| format!("reading {}", args.procedure.display()))?;
    let before = dataset.shape();

    let executor = SandboxExecutor::new(config.sandbox_config());
    let cleaned = executor
        .execute_bounded(source, dataset)
        .await
        .context("procedure failed")?;

    let store = SnapshotStore::open(&config.database_path)
        .await
        .with_context(|| format!("opening {}", config.database_path.display()))?;
    let rows = store.write_table(&config.clean_table, &cleaned).await?;
    store.close().await;

    println!(
        "Applied: {} rows x {} columns -> {} rows x {} columns",
        before.0,
        before.1,
        cleaned.row_count(),
        cleaned.column_count()
    );
    println!(
        "Stored {} rows in '{}' ({})",
        rows,
        config.clean_table,
        config.database_path.display()
    );
    Ok(())
}
