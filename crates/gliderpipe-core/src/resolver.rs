use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::artifact::Stage;

/// One filesystem entry from a directory snapshot. Recomputed on every
/// resolution call, never persisted.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    pub name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub modified: SystemTime,
}

impl CandidateFile {
    /// Keywords from `vocabulary` found in the file name, case-insensitive.
    pub fn tags(&self, vocabulary: &[String]) -> Vec<String> {
        let lower = self.name.to_lowercase();
        vocabulary
            .iter()
            .filter(|keyword| lower.contains(&keyword.to_lowercase()))
            .cloned()
            .collect()
    }
}

/// Keyword rules for one stage. A candidate must contain at least one
/// `required` keyword and none of the `excluded` keywords. When no candidate
/// passes the primary rule, `fallback_required` is tried with the same
/// exclusions before giving up.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolveRules {
    pub required: Vec<String>,
    pub fallback_required: Vec<String>,
    pub excluded: Vec<String>,
    pub min_size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct RejectedCandidate {
    pub name: String,
    pub reason: String,
}

impl RejectedCandidate {
    pub fn new(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("no input file for stage {stage} in {dir:?}; rejected: {rejected:?}")]
    NotFound {
        stage: Stage,
        dir: PathBuf,
        rejected: Vec<RejectedCandidate>,
    },
}

/// Reads a directory into a candidate list, skipping subdirectories, hidden
/// files, and in-flight `.tmp` artifacts. Sorted by name so discovery order
/// is deterministic.
pub fn snapshot_directory(dir: &Path) -> std::io::Result<Vec<CandidateFile>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let metadata = entry.metadata()?;
        if !metadata.is_file() {
            continue;
        }
        let name = match entry.file_name().to_str() {
            Some(name) => name.to_string(),
            None => continue,
        };
        if name.starts_with('.') || name.ends_with(".tmp") {
            continue;
        }
        candidates.push(CandidateFile {
            name,
            path: entry.path(),
            size_bytes: metadata.len(),
            modified: metadata.modified()?,
        });
    }
    candidates.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(candidates)
}

/// Selects the single input file for a stage. The primary keyword set is
/// tried first; the fallback set is only consulted when the primary set
/// matches nothing at all, so a stage-specific artifact always beats a
/// generic one regardless of modification times. Among qualified candidates
/// the most recently modified wins, with the greater name breaking exact
/// timestamp ties.
pub fn resolve(
    stage: Stage,
    dir: &Path,
    candidates: &[CandidateFile],
    rules: &ResolveRules,
) -> Result<CandidateFile, ResolveError> {
    let (qualified, rejected) = filter_candidates(candidates, &rules.required, rules);

    let (qualified, rejected) = if qualified.is_empty() && !rules.fallback_required.is_empty() {
        let (fallback_qualified, fallback_rejected) =
            filter_candidates(candidates, &rules.fallback_required, rules);
        if fallback_qualified.is_empty() {
            (Vec::new(), merge_rejections(rejected, fallback_rejected))
        } else {
            (fallback_qualified, Vec::new())
        }
    } else {
        (qualified, rejected)
    };

    let winner = qualified
        .into_iter()
        .max_by(|a, b| {
            a.modified
                .cmp(&b.modified)
                .then_with(|| a.name.cmp(&b.name))
        })
        .ok_or(ResolveError::NotFound {
            stage,
            dir: dir.to_path_buf(),
            rejected,
        })?;

    let mut vocabulary = rules.required.clone();
    vocabulary.extend(rules.fallback_required.iter().cloned());
    debug!(
        stage = stage.as_str(),
        file = winner.name.as_str(),
        tags = ?winner.tags(&vocabulary),
        "stage input resolved"
    );
    Ok(winner)
}

/// Selects every qualified input file for a stage, in snapshot order. Used
/// by the merge stage, which consumes all segments rather than one winner.
pub fn resolve_all(
    stage: Stage,
    dir: &Path,
    candidates: &[CandidateFile],
    rules: &ResolveRules,
) -> Result<Vec<CandidateFile>, ResolveError> {
    let (qualified, rejected) = filter_candidates(candidates, &rules.required, rules);

    if qualified.is_empty() {
        return Err(ResolveError::NotFound {
            stage,
            dir: dir.to_path_buf(),
            rejected,
        });
    }
    Ok(qualified)
}

fn filter_candidates(
    candidates: &[CandidateFile],
    required: &[String],
    rules: &ResolveRules,
) -> (Vec<CandidateFile>, Vec<RejectedCandidate>) {
    let mut qualified = Vec::new();
    let mut rejected = Vec::new();

    for candidate in candidates {
        match qualify(candidate, required, rules) {
            Ok(()) => qualified.push(candidate.clone()),
            Err(reason) => rejected.push(RejectedCandidate::new(&candidate.name, reason)),
        }
    }

    (qualified, rejected)
}

fn qualify(candidate: &CandidateFile, required: &[String], rules: &ResolveRules) -> Result<(), String> {
    let lower = candidate.name.to_lowercase();

    if let Some(keyword) = rules
        .excluded
        .iter()
        .find(|keyword| lower.contains(&keyword.to_lowercase()))
    {
        return Err(format!("contains excluded keyword {keyword:?}"));
    }

    if !required.is_empty()
        && !required
            .iter()
            .any(|keyword| lower.contains(&keyword.to_lowercase()))
    {
        return Err(format!("matches none of the required keywords {required:?}"));
    }

    if candidate.size_bytes < rules.min_size_bytes {
        return Err(format!(
            "file is {} bytes, below the {} byte minimum",
            candidate.size_bytes, rules.min_size_bytes
        ));
    }

    Ok(())
}

fn merge_rejections(
    primary: Vec<RejectedCandidate>,
    fallback: Vec<RejectedCandidate>,
) -> Vec<RejectedCandidate> {
    primary
        .into_iter()
        .zip(fallback)
        .map(|(first, second)| {
            if first.reason == second.reason {
                first
            } else {
                RejectedCandidate::new(
                    first.name,
                    format!("{}; fallback: {}", first.reason, second.reason),
                )
            }
        })
        .collect()
}
