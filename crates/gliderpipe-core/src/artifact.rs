use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Split,
    Merge,
    ConvertUnits,
    RenameVars,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::Split,
        Stage::Merge,
        Stage::ConvertUnits,
        Stage::RenameVars,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Split => "split",
            Stage::Merge => "merge",
            Stage::ConvertUnits => "convert_units",
            Stage::RenameVars => "rename_vars",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a stage output came from: inputs, run identity, and everything the
/// stage wants the operator to know about (warnings, coerced cell counts).
#[derive(Debug, Clone)]
pub struct Provenance {
    pub run_id: Uuid,
    pub stage: Stage,
    pub source_files: Vec<String>,
    pub source_hash: String,
    pub created_at: DateTime<Utc>,
    pub warnings: Vec<String>,
    pub coerced_cells: usize,
}

impl Provenance {
    pub fn new(run_id: Uuid, stage: Stage, source_files: Vec<String>, source_hash: String) -> Self {
        Self {
            run_id,
            stage,
            source_files,
            source_hash,
            created_at: Utc::now(),
            warnings: Vec::new(),
            coerced_cells: 0,
        }
    }
}

/// A dataset produced by one stage, paired with its provenance.
#[derive(Debug, Clone)]
pub struct StageArtifact {
    pub dataframe: DataFrame,
    pub provenance: Provenance,
}

impl StageArtifact {
    /// Publishes the artifact under `dir/file_name` via a temporary file and
    /// an atomic rename, so a reader never observes a partial write. The
    /// provenance goes to the structured log; artifacts themselves stay
    /// plain CSV so their names keep driving the stage resolution.
    pub fn publish(&mut self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let path = dir.join(file_name);
        publish_csv(&mut self.dataframe, &path)?;
        info!(
            run_id = %self.provenance.run_id,
            stage = self.provenance.stage.as_str(),
            artifact = file_name,
            sources = ?self.provenance.source_files,
            source_hash = self.provenance.source_hash.as_str(),
            created_at = %self.provenance.created_at,
            warnings = self.provenance.warnings.len(),
            coerced = self.provenance.coerced_cells,
            "artifact published"
        );
        Ok(path)
    }
}

pub fn publish_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    let tmp = path.with_extension("csv.tmp");
    {
        let mut file = fs::File::create(&tmp)?;
        CsvWriter::new(&mut file).include_header(true).finish(df)?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

pub fn read_csv(path: &Path) -> Result<DataFrame> {
    let file = fs::File::open(path)?;
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(1000))
        .with_parse_options(CsvParseOptions::default().with_try_parse_dates(true))
        .into_reader_with_file_handle(file)
        .finish()?;
    Ok(df)
}

pub fn generation_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}
