use std::collections::HashMap;

use once_cell::sync::Lazy;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::error::Result;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenameEntry {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Error)]
pub enum RenameError {
    #[error("renaming would collide on {target:?}: columns {sources:?} all end up with that name")]
    Collision {
        target: String,
        sources: Vec<String>,
    },

    #[error("rename map names source column {column:?} twice with different targets")]
    DuplicateSource { column: String },
}

#[derive(Debug)]
pub struct RenameOutcome {
    pub dataframe: DataFrame,
    pub applied: Vec<(String, String)>,
}

/// Canonical sensor-channel names for the final artifact.
static CANONICAL_RENAME_ENTRIES: Lazy<Vec<RenameEntry>> = Lazy::new(|| {
    [
        ("PLD_REALTIMECLOCK", "TIME"),
        ("LEGATO_CODA_DO", "DOXY"),
        ("FLBBCD_BB_700_SCALED", "TURB"),
        ("FLBBCD_CHL_SCALED", "CHLA"),
        ("LEGATO_CONDUCTIVITY", "CNDC"),
        ("LEGATO_TEMPERATURE", "TEMP"),
        ("LEGATO_PRESSURE", "PRES"),
        ("NAV_DEPTH", "DEPTH"),
        ("NAV_LATITUDE", "LATITUDE"),
        ("NAV_LONGITUDE", "LONGITUDE"),
    ]
    .into_iter()
    .map(|(from, to)| RenameEntry {
        from: from.to_string(),
        to: to.to_string(),
    })
    .collect()
});

pub fn canonical_rename_entries() -> Vec<RenameEntry> {
    CANONICAL_RENAME_ENTRIES.clone()
}

/// Renames column headers in one shot. The final header set is validated for
/// uniqueness first; on any collision nothing is renamed. Columns without a
/// map entry keep their names, row values are never touched.
pub fn rename_columns(input: &DataFrame, entries: &[RenameEntry]) -> Result<RenameOutcome> {
    let mut map: HashMap<&str, &str> = HashMap::new();
    for entry in entries {
        if let Some(previous) = map.insert(entry.from.as_str(), entry.to.as_str()) {
            if previous != entry.to {
                return Err(RenameError::DuplicateSource {
                    column: entry.from.clone(),
                }
                .into());
            }
        }
    }

    let current: Vec<String> = input
        .get_column_names_str()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let target: Vec<String> = current
        .iter()
        .map(|name| map.get(name.as_str()).map_or(name.clone(), |to| to.to_string()))
        .collect();

    let mut sources_by_target: HashMap<&str, Vec<&str>> = HashMap::new();
    for (source, goal) in current.iter().zip(&target) {
        sources_by_target
            .entry(goal.as_str())
            .or_default()
            .push(source.as_str());
    }
    for goal in &target {
        let sources = &sources_by_target[goal.as_str()];
        if sources.len() > 1 {
            return Err(RenameError::Collision {
                target: goal.clone(),
                sources: sources.iter().map(|s| s.to_string()).collect(),
            }
            .into());
        }
    }

    let mut dataframe = input.clone();
    dataframe.set_column_names(target.iter().map(|name| name.as_str()))?;

    let applied: Vec<(String, String)> = current
        .into_iter()
        .zip(target)
        .filter(|(from, to)| from != to)
        .collect();
    info!(renamed = applied.len(), "applied canonical column names");

    Ok(RenameOutcome { dataframe, applied })
}
