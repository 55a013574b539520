use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use gliderpipe_parser::extract_sequence;
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use crate::artifact::{generation_stamp, read_csv, Provenance, Stage, StageArtifact};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::merge::{merge_segments, Segment};
use crate::rename::rename_columns;
use crate::resolver::{self, CandidateFile, ResolveError, ResolveRules};
use crate::split::split_stage;
use crate::units::convert_units;

/// Orchestrator state. `Succeeded(stage)` means every stage up to and
/// including that one completed; `Failed(stage)` is where the run halted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", content = "stage", rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Running(Stage),
    Succeeded(Stage),
    Failed(Stage),
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Pending => f.write_str("pending"),
            PipelineState::Running(stage) => write!(f, "running {stage}"),
            PipelineState::Succeeded(stage) => write!(f, "succeeded through {stage}"),
            PipelineState::Failed(stage) => write!(f, "failed at {stage}"),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StageOutcome {
    pub stage: Stage,
    pub artifact: PathBuf,
    pub rows: usize,
    pub warnings: Vec<String>,
    pub elapsed_secs: f64,
}

#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub run_id: Uuid,
    pub data_dir: PathBuf,
    pub state: PipelineState,
    pub stages: Vec<StageOutcome>,
    pub error: Option<String>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.state == PipelineState::Succeeded(Stage::RenameVars)
    }
}

/// Runs the four stages in order against one data directory. A stage only
/// starts after the previous one published its artifact; the first failure
/// halts the run, later stages are never attempted against stale inputs.
pub fn run_pipeline(data_dir: &Path, config: &PipelineConfig) -> PipelineReport {
    let run_id = Uuid::new_v4();
    info!(run_id = %run_id, data_dir = %data_dir.display(), "pipeline run started");

    let mut report = PipelineReport {
        run_id,
        data_dir: data_dir.to_path_buf(),
        state: PipelineState::Pending,
        stages: Vec::new(),
        error: None,
    };

    for stage in Stage::ALL {
        report.state = PipelineState::Running(stage);
        match run_stage(run_id, stage, data_dir, config) {
            Ok(outcome) => {
                report.stages.push(outcome);
                report.state = PipelineState::Succeeded(stage);
            }
            Err(err) => {
                error!(stage = stage.as_str(), error = %err, "stage failed, halting run");
                report.state = PipelineState::Failed(stage);
                report.error = Some(err.to_string());
                return report;
            }
        }
    }

    info!(run_id = %run_id, "pipeline run complete");
    report
}

/// Runs a single stage, re-resolving its input from disk so a re-run after a
/// partial failure picks up the correct state. The wall-clock budget is
/// checked after the stage returns; an over-budget stage counts as failed
/// even though its artifact was written.
pub fn run_stage(
    run_id: Uuid,
    stage: Stage,
    data_dir: &Path,
    config: &PipelineConfig,
) -> Result<StageOutcome> {
    info!(stage = stage.as_str(), "stage started");
    let started = Instant::now();

    let (artifact, rows, warnings) = match stage {
        Stage::Split => run_split(data_dir, config)?,
        Stage::Merge => run_merge(run_id, data_dir, config)?,
        Stage::ConvertUnits => run_convert_units(run_id, data_dir, config)?,
        Stage::RenameVars => run_rename_vars(run_id, data_dir, config)?,
    };

    let elapsed_secs = enforce_budget(stage, started, config.stage_timeout_secs)?;
    info!(
        stage = stage.as_str(),
        artifact = %artifact.display(),
        rows,
        warnings = warnings.len(),
        elapsed_secs,
        "stage complete"
    );
    Ok(StageOutcome {
        stage,
        artifact,
        rows,
        warnings,
        elapsed_secs,
    })
}

fn run_split(data_dir: &Path, config: &PipelineConfig) -> Result<(PathBuf, usize, Vec<String>)> {
    let outcome = split_stage(data_dir, config)?;
    info!(
        segments = outcome.segments_written.len(),
        sources = ?outcome.source_files,
        rows = outcome.rows_written,
        dropped_empty = outcome.rows_dropped_empty,
        coerced = outcome.coerced_cells,
        "raw payloads decoded"
    );

    let mut warnings = outcome.warnings;
    if !outcome.missing_sequences.is_empty() {
        warnings.push(format!(
            "sequence numbers missing within the observed range: {:?}",
            outcome.missing_sequences
        ));
    }
    Ok((
        data_dir.join(&config.segments_dir),
        outcome.rows_written,
        warnings,
    ))
}

fn run_merge(
    run_id: Uuid,
    data_dir: &Path,
    config: &PipelineConfig,
) -> Result<(PathBuf, usize, Vec<String>)> {
    let segments_dir = data_dir.join(&config.segments_dir);
    if !segments_dir.is_dir() {
        return Err(ResolveError::NotFound {
            stage: Stage::Merge,
            dir: segments_dir,
            rejected: Vec::new(),
        }
        .into());
    }

    let snapshot = resolver::snapshot_directory(&segments_dir)?;
    let inputs = resolver::resolve_all(
        Stage::Merge,
        &segments_dir,
        &snapshot,
        config.rules_for(Stage::Merge),
    )?;

    let mut segments = Vec::with_capacity(inputs.len());
    for input in &inputs {
        segments.push(Segment {
            name: input.name.clone(),
            sequence: extract_sequence(&input.name),
            dataframe: read_csv(&input.path)?,
        });
    }

    let merged = merge_segments(segments, config.gap_tolerance)?;
    let mut provenance = Provenance::new(
        run_id,
        Stage::Merge,
        inputs.iter().map(|input| input.name.clone()).collect(),
        hash_inputs(&inputs)?,
    );
    provenance.warnings = merged.warnings.clone();

    let file_name = config.merged_file_name(&generation_stamp(Utc::now()));
    let mut artifact = StageArtifact {
        dataframe: merged.dataframe,
        provenance,
    };
    let path = artifact.publish(data_dir, &file_name)?;
    Ok((path, artifact.dataframe.height(), merged.warnings))
}

fn run_convert_units(
    run_id: Uuid,
    data_dir: &Path,
    config: &PipelineConfig,
) -> Result<(PathBuf, usize, Vec<String>)> {
    let snapshot = resolver::snapshot_directory(data_dir)?;
    let input = resolver::resolve(
        Stage::ConvertUnits,
        data_dir,
        &snapshot,
        config.rules_for(Stage::ConvertUnits),
    )?;
    info!(input = input.name.as_str(), "converting units");

    let dataframe = read_csv(&input.path)?;
    let outcome = convert_units(&dataframe, &config.unit_specs)?;

    let mut provenance = Provenance::new(
        run_id,
        Stage::ConvertUnits,
        vec![input.name.clone()],
        hash_inputs(std::slice::from_ref(&input))?,
    );
    provenance.warnings = outcome.warnings.clone();
    provenance.coerced_cells = outcome.coerced_cells;

    let file_name = config.derived_file_name(
        &input.name,
        &config.units_token,
        &generation_stamp(Utc::now()),
    );
    let mut artifact = StageArtifact {
        dataframe: outcome.dataframe,
        provenance,
    };
    let path = artifact.publish(data_dir, &file_name)?;
    Ok((path, artifact.dataframe.height(), outcome.warnings))
}

fn run_rename_vars(
    run_id: Uuid,
    data_dir: &Path,
    config: &PipelineConfig,
) -> Result<(PathBuf, usize, Vec<String>)> {
    let snapshot = resolver::snapshot_directory(data_dir)?;
    let input = resolver::resolve(
        Stage::RenameVars,
        data_dir,
        &snapshot,
        config.rules_for(Stage::RenameVars),
    )?;
    info!(input = input.name.as_str(), "applying canonical names");

    let dataframe = read_csv(&input.path)?;
    let outcome = rename_columns(&dataframe, &config.rename_map)?;

    let provenance = Provenance::new(
        run_id,
        Stage::RenameVars,
        vec![input.name.clone()],
        hash_inputs(std::slice::from_ref(&input))?,
    );

    let file_name = config.derived_file_name(
        &input.name,
        &config.renamed_token,
        &generation_stamp(Utc::now()),
    );
    let mut artifact = StageArtifact {
        dataframe: outcome.dataframe,
        provenance,
    };
    let path = artifact.publish(data_dir, &file_name)?;
    Ok((path, artifact.dataframe.height(), Vec::new()))
}

fn hash_inputs(inputs: &[CandidateFile]) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for input in inputs {
        hasher.update(&fs::read(&input.path)?);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

fn enforce_budget(stage: Stage, started: Instant, budget_secs: u64) -> Result<f64> {
    let elapsed = started.elapsed();
    if budget_secs > 0 && elapsed.as_secs() > budget_secs {
        return Err(PipelineError::Timeout {
            stage,
            elapsed_secs: elapsed.as_secs(),
            budget_secs,
        });
    }
    Ok(elapsed.as_secs_f64())
}

/// Read-only inspection of a data directory: which stage artifacts exist,
/// their sizes and timestamps, and the next stage a run would execute.
#[derive(Debug, Serialize)]
pub struct DirectorySurvey {
    pub data_dir: PathBuf,
    pub raw_files: usize,
    pub segments: usize,
    pub merged: Option<ArtifactInfo>,
    pub units_converted: Option<ArtifactInfo>,
    pub renamed: Option<ArtifactInfo>,
    pub next_stage: Option<Stage>,
}

#[derive(Debug, Serialize)]
pub struct ArtifactInfo {
    pub name: String,
    pub size_bytes: u64,
    pub modified: DateTime<Utc>,
}

impl ArtifactInfo {
    fn from_candidate(candidate: &CandidateFile) -> Self {
        Self {
            name: candidate.name.clone(),
            size_bytes: candidate.size_bytes,
            modified: candidate.modified.into(),
        }
    }
}

pub fn survey(data_dir: &Path, config: &PipelineConfig) -> Result<DirectorySurvey> {
    let snapshot = resolver::snapshot_directory(data_dir)?;

    let raw_files = resolver::resolve_all(
        Stage::Split,
        data_dir,
        &snapshot,
        config.rules_for(Stage::Split),
    )
    .map(|files| files.len())
    .unwrap_or(0);

    let segments_dir = data_dir.join(&config.segments_dir);
    let segments = if segments_dir.is_dir() {
        resolver::resolve_all(
            Stage::Merge,
            &segments_dir,
            &resolver::snapshot_directory(&segments_dir)?,
            config.rules_for(Stage::Merge),
        )
        .map(|files| files.len())
        .unwrap_or(0)
    } else {
        0
    };

    let merged = newest(
        Stage::Merge,
        data_dir,
        &snapshot,
        &config.merged_token,
        &[&config.units_token, &config.renamed_token],
    );
    let units_converted = newest(
        Stage::ConvertUnits,
        data_dir,
        &snapshot,
        &config.units_token,
        &[&config.renamed_token],
    );
    let renamed = newest(Stage::RenameVars, data_dir, &snapshot, &config.renamed_token, &[]);

    let next_stage = if renamed.is_some() {
        None
    } else if units_converted.is_some() {
        Some(Stage::RenameVars)
    } else if merged.is_some() {
        Some(Stage::ConvertUnits)
    } else if segments > 0 {
        Some(Stage::Merge)
    } else {
        Some(Stage::Split)
    };

    Ok(DirectorySurvey {
        data_dir: data_dir.to_path_buf(),
        raw_files,
        segments,
        merged,
        units_converted,
        renamed,
        next_stage,
    })
}

/// Newest snapshot entry produced by `stage`, identified by its name token.
fn newest(
    stage: Stage,
    dir: &Path,
    snapshot: &[CandidateFile],
    token: &str,
    excluded: &[&str],
) -> Option<ArtifactInfo> {
    let rules = ResolveRules {
        required: vec![token.to_string()],
        fallback_required: Vec::new(),
        excluded: excluded.iter().map(|keyword| keyword.to_string()).collect(),
        min_size_bytes: 1,
    };
    resolver::resolve(stage, dir, snapshot, &rules)
        .ok()
        .map(|candidate| ArtifactInfo::from_candidate(&candidate))
}
