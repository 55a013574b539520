use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::artifact::Stage;
use crate::error::{PipelineError, Result};
use crate::rename::{canonical_rename_entries, RenameEntry};
use crate::resolver::ResolveRules;
use crate::units::{canonical_unit_specs, ColumnUnitSpec};

/// Full pipeline configuration. Every field has a mission-ready default, so
/// an empty TOML file (or no file at all) runs the canonical SeaExplorer
/// processing chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Subdirectory of the data directory that receives segment files.
    pub segments_dir: String,
    /// Prefix for segment file names, also the merge stage's input keyword.
    pub segment_prefix: String,
    /// Zero-padding width for segment sequence numbers.
    pub sequence_pad_width: usize,
    /// Name token of the merged artifact.
    pub merged_token: String,
    /// Name token appended by the unit conversion stage.
    pub units_token: String,
    /// Name token appended by the rename stage.
    pub renamed_token: String,
    /// Allowed shortfall between consecutive sequence numbers before a gap
    /// warning is recorded (0 warns on any missing segment).
    pub gap_tolerance: u32,
    /// Wall-clock budget per stage in seconds; 0 disables the budget.
    pub stage_timeout_secs: u64,
    pub resolve: ResolveConfig,
    pub unit_specs: Vec<ColumnUnitSpec>,
    pub rename_map: Vec<RenameEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveConfig {
    pub split: ResolveRules,
    pub merge: ResolveRules,
    pub convert_units: ResolveRules,
    pub rename_vars: ResolveRules,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            segments_dir: "segments".to_string(),
            segment_prefix: "mission_".to_string(),
            sequence_pad_width: 3,
            merged_token: "complete_merged".to_string(),
            units_token: "units_converted".to_string(),
            renamed_token: "renamed".to_string(),
            gap_tolerance: 0,
            stage_timeout_secs: 300,
            resolve: ResolveConfig::default(),
            unit_specs: canonical_unit_specs(),
            rename_map: canonical_rename_entries(),
        }
    }
}

impl Default for ResolveConfig {
    fn default() -> Self {
        Self {
            split: ResolveRules {
                required: keywords(&[".raw.", ".sub."]),
                fallback_required: Vec::new(),
                excluded: Vec::new(),
                min_size_bytes: 1,
            },
            merge: ResolveRules {
                required: keywords(&["mission_"]),
                fallback_required: Vec::new(),
                excluded: keywords(&[
                    "merged",
                    "backup",
                    "sample",
                    "metadata",
                    "units_converted",
                    "renamed",
                    "latest",
                    "tmp",
                ]),
                min_size_bytes: 1,
            },
            convert_units: ResolveRules {
                required: keywords(&["merged"]),
                fallback_required: keywords(&[".csv"]),
                excluded: keywords(&[
                    "backup",
                    "sample",
                    "metadata",
                    "units_converted",
                    "renamed",
                    "tmp",
                ]),
                min_size_bytes: 1,
            },
            rename_vars: ResolveRules {
                required: keywords(&["units_converted"]),
                fallback_required: keywords(&["merged"]),
                excluded: keywords(&["backup", "sample", "metadata", "renamed", "tmp"]),
                min_size_bytes: 1,
            },
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: PipelineConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("segments_dir", &self.segments_dir),
            ("segment_prefix", &self.segment_prefix),
            ("merged_token", &self.merged_token),
            ("units_token", &self.units_token),
            ("renamed_token", &self.renamed_token),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::Config(format!("{field} cannot be empty")));
            }
        }
        Ok(())
    }

    pub fn rules_for(&self, stage: Stage) -> &ResolveRules {
        match stage {
            Stage::Split => &self.resolve.split,
            Stage::Merge => &self.resolve.merge,
            Stage::ConvertUnits => &self.resolve.convert_units,
            Stage::RenameVars => &self.resolve.rename_vars,
        }
    }

    pub fn segment_file_name(&self, sequence: u32) -> String {
        format!(
            "{}{:0width$}.csv",
            self.segment_prefix,
            sequence,
            width = self.sequence_pad_width
        )
    }

    pub fn merged_file_name(&self, stamp: &str) -> String {
        format!("{}{}_{}.csv", self.segment_prefix, self.merged_token, stamp)
    }

    /// Derived artifact names stack the stage token onto the input stem, the
    /// naming later stages key their resolution on.
    pub fn derived_file_name(&self, input: &str, token: &str, stamp: &str) -> String {
        let stem = input.strip_suffix(".csv").unwrap_or(input);
        format!("{stem}_{token}_{stamp}.csv")
    }
}

fn keywords(items: &[&str]) -> Vec<String> {
    items.iter().map(|item| item.to_string()).collect()
}
