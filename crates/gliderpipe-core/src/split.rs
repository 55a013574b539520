use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use gliderpipe_parser::{extract_sequence, parse_payload};
use polars::prelude::*;
use tracing::{info, warn};

use crate::artifact::{publish_csv, Stage};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::resolver;

#[derive(Debug)]
pub struct SplitOutcome {
    pub segments_written: Vec<String>,
    pub source_files: Vec<String>,
    pub rows_written: usize,
    pub rows_dropped_empty: usize,
    pub coerced_cells: usize,
    pub missing_sequences: Vec<u32>,
    pub warnings: Vec<String>,
}

/// Decodes every raw payload file in the data directory into one CSV segment
/// under the segments subdirectory, named by zero-padded sequence number.
/// Files that cannot be decoded or carry no sequence marker are skipped with
/// a warning; the stage fails only when nothing decodes at all.
pub fn split_stage(data_dir: &Path, config: &PipelineConfig) -> Result<SplitOutcome> {
    let snapshot = resolver::snapshot_directory(data_dir)?;
    let raw_files = resolver::resolve_all(
        Stage::Split,
        data_dir,
        &snapshot,
        config.rules_for(Stage::Split),
    )?;

    let segments_dir = data_dir.join(&config.segments_dir);
    fs::create_dir_all(&segments_dir)?;

    let mut outcome = SplitOutcome {
        segments_written: Vec::new(),
        source_files: Vec::new(),
        rows_written: 0,
        rows_dropped_empty: 0,
        coerced_cells: 0,
        missing_sequences: Vec::new(),
        warnings: Vec::new(),
    };
    let mut written: BTreeMap<u32, String> = BTreeMap::new();

    for raw in &raw_files {
        let Some(sequence) = extract_sequence(&raw.name) else {
            skip(&mut outcome, &raw.name, "no sequence marker in the file name");
            continue;
        };
        if let Some(previous) = written.get(&sequence) {
            skip(
                &mut outcome,
                &raw.name,
                &format!("sequence {sequence} already decoded from {previous:?}"),
            );
            continue;
        }

        let content = match fs::read_to_string(&raw.path) {
            Ok(content) => content,
            Err(err) => {
                skip(&mut outcome, &raw.name, &format!("unreadable: {err}"));
                continue;
            }
        };
        let decoded = match parse_payload(&content) {
            Ok(decoded) => decoded,
            Err(err) => {
                skip(&mut outcome, &raw.name, &format!("decode failed: {err}"));
                continue;
            }
        };

        let mut dataframe = decoded.dataframe;
        let height = dataframe.height();
        dataframe.with_column(Series::new(
            "source_file".into(),
            vec![raw.name.clone(); height],
        ))?;
        dataframe.with_column(Series::new(
            "file_number".into(),
            vec![sequence as i64; height],
        ))?;

        let segment_name = config.segment_file_name(sequence);
        publish_csv(&mut dataframe, &segments_dir.join(&segment_name))?;
        info!(
            segment = segment_name.as_str(),
            source = raw.name.as_str(),
            rows = height,
            "wrote segment"
        );

        outcome.rows_written += height;
        outcome.rows_dropped_empty += decoded.stats.rows_dropped_empty;
        outcome.coerced_cells += decoded.stats.coerced_cells;
        if decoded.stats.had_coercions() {
            outcome.warnings.push(format!(
                "{}: {} cells and {} timestamps coerced to missing",
                raw.name, decoded.stats.coerced_cells, decoded.stats.coerced_timestamps
            ));
        }
        outcome.segments_written.push(segment_name);
        outcome.source_files.push(raw.name.clone());
        written.insert(sequence, raw.name.clone());
    }

    if outcome.segments_written.is_empty() {
        return Err(PipelineError::Processing(format!(
            "none of the {} raw payload files produced a decodable segment",
            raw_files.len()
        )));
    }

    if let (Some(first), Some(last)) = (
        written.keys().next().copied(),
        written.keys().next_back().copied(),
    ) {
        outcome.missing_sequences = (first..=last)
            .filter(|sequence| !written.contains_key(sequence))
            .collect();
    }
    if !outcome.missing_sequences.is_empty() {
        warn!(
            missing = ?outcome.missing_sequences,
            "sequence numbers absent within the observed range"
        );
    }

    Ok(outcome)
}

fn skip(outcome: &mut SplitOutcome, name: &str, reason: &str) {
    let message = format!("skipped {name}: {reason}");
    warn!("{message}");
    outcome.warnings.push(message);
}
