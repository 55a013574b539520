use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gliderpipe_core::artifact::Stage;
use gliderpipe_core::config::PipelineConfig;
use gliderpipe_core::pipeline::{self, ArtifactInfo, PipelineReport, PipelineState, StageOutcome};
use tracing::info;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(author, version, about = "SeaExplorer glider telemetry pipeline", long_about = None)]
struct Cli {
    /// Data directory holding raw payload files and stage artifacts
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Optional TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all four stages in order
    Run,
    /// Decode raw payload files into per-sequence segment CSVs
    Split,
    /// Concatenate segments in sequence order into one dataset
    Merge,
    /// Convert sensor columns to oceanographic units
    ConvertUnits,
    /// Apply canonical column names to the newest converted dataset
    RenameVars,
    /// Report which stage artifacts exist and what would run next
    Status {
        /// Emit the survey as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run => {
            let report = pipeline::run_pipeline(&cli.data_dir, &config);
            print_report(&report);
            if let PipelineState::Failed(stage) = report.state {
                anyhow::bail!("pipeline failed at stage {stage}");
            }
            Ok(())
        }
        Command::Split => run_single(Stage::Split, &cli.data_dir, &config),
        Command::Merge => run_single(Stage::Merge, &cli.data_dir, &config),
        Command::ConvertUnits => run_single(Stage::ConvertUnits, &cli.data_dir, &config),
        Command::RenameVars => run_single(Stage::RenameVars, &cli.data_dir, &config),
        Command::Status { json } => status(&cli.data_dir, &config, json),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::load(path)
                .with_context(|| format!("loading configuration from {}", path.display()))?;
            info!("Configuration loaded from {}", path.display());
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn run_single(stage: Stage, data_dir: &Path, config: &PipelineConfig) -> Result<()> {
    let outcome = pipeline::run_stage(Uuid::new_v4(), stage, data_dir, config)
        .with_context(|| format!("stage {stage} failed"))?;
    print_outcome(&outcome);
    Ok(())
}

fn status(data_dir: &Path, config: &PipelineConfig, json: bool) -> Result<()> {
    let survey = pipeline::survey(data_dir, config)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&survey)?);
        return Ok(());
    }

    println!("\n--- Data Directory Status ---");
    println!("  Raw payload files: {}", survey.raw_files);
    println!("  Segments: {}", survey.segments);
    print_artifact("Merged", survey.merged.as_ref());
    print_artifact("Units converted", survey.units_converted.as_ref());
    print_artifact("Renamed", survey.renamed.as_ref());
    match survey.next_stage {
        Some(stage) => println!("  Next stage: {stage}"),
        None => println!("  ✅ All stage artifacts present."),
    }
    Ok(())
}

fn print_report(report: &PipelineReport) {
    println!("\n--- Pipeline Summary ---");
    println!("  Run id: {}", report.run_id);
    for outcome in &report.stages {
        print_outcome(outcome);
    }
    match (&report.state, &report.error) {
        (PipelineState::Failed(stage), Some(error)) => {
            println!("  ⚠️  {stage}: {error}");
        }
        _ => println!("  ✅ All stages complete."),
    }
}

fn print_outcome(outcome: &StageOutcome) {
    println!(
        "  ✅ {}: {} rows -> {} ({:.2}s)",
        outcome.stage,
        outcome.rows,
        outcome.artifact.display(),
        outcome.elapsed_secs
    );
    for warning in &outcome.warnings {
        println!("     ⚠️  {warning}");
    }
}

fn print_artifact(label: &str, artifact: Option<&ArtifactInfo>) {
    match artifact {
        Some(info) => println!(
            "  {label}: {} ({} bytes, {})",
            info.name,
            info.size_bytes,
            info.modified.format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  {label}: none"),
    }
}
