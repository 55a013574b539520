use std::collections::HashSet;

use polars::prelude::*;
use thiserror::Error;
use tracing::warn;

use crate::error::Result;

/// One decoded segment queued for merging.
#[derive(Debug)]
pub struct Segment {
    pub name: String,
    pub sequence: Option<u32>,
    pub dataframe: DataFrame,
}

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("segments {first:?} and {second:?} both claim sequence {sequence}")]
    DuplicateSegment {
        sequence: u32,
        first: String,
        second: String,
    },

    #[error(
        "segment {name:?} does not expose the expected columns; missing {missing:?}, unexpected {unexpected:?}"
    )]
    SchemaMismatch {
        name: String,
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    #[error("no segments to merge")]
    Empty,
}

#[derive(Debug)]
pub struct MergeOutcome {
    pub dataframe: DataFrame,
    pub segments_merged: usize,
    pub warnings: Vec<String>,
}

/// Concatenates segments in ascending sequence order, preserving each
/// segment's internal row order. Unsequenced segments are appended last in
/// discovery order with a warning. Rows are never re-sorted by timestamp or
/// any other field; the output order is the segment order alone.
pub fn merge_segments(mut segments: Vec<Segment>, gap_tolerance: u32) -> Result<MergeOutcome> {
    if segments.is_empty() {
        return Err(MergeError::Empty.into());
    }

    // Stable, so unsequenced segments keep their discovery order at the tail.
    segments.sort_by_key(|segment| match segment.sequence {
        Some(sequence) => (0u8, sequence),
        None => (1u8, 0),
    });

    let mut warnings = Vec::new();

    for pair in segments.windows(2) {
        if let (Some(a), Some(b)) = (pair[0].sequence, pair[1].sequence) {
            if a == b {
                return Err(MergeError::DuplicateSegment {
                    sequence: a,
                    first: pair[0].name.clone(),
                    second: pair[1].name.clone(),
                }
                .into());
            }
            if b - a > 1 + gap_tolerance {
                let message = format!(
                    "sequence gap between {} and {}: {} segment(s) missing",
                    a,
                    b,
                    b - a - 1
                );
                warn!("{message}");
                warnings.push(message);
            }
        }
    }

    for segment in &segments {
        if segment.sequence.is_none() {
            let message = format!(
                "segment {:?} has no sequence number; appended after the sequenced segments",
                segment.name
            );
            warn!("{message}");
            warnings.push(message);
        }
    }

    let reference: Vec<String> = segments[0]
        .dataframe
        .get_column_names_str()
        .into_iter()
        .map(|name| name.to_string())
        .collect();
    let reference_set: HashSet<&str> = reference.iter().map(|name| name.as_str()).collect();

    for segment in &segments[1..] {
        let columns: Vec<String> = segment
            .dataframe
            .get_column_names_str()
            .into_iter()
            .map(|name| name.to_string())
            .collect();
        let column_set: HashSet<&str> = columns.iter().map(|name| name.as_str()).collect();

        let missing: Vec<String> = reference
            .iter()
            .filter(|name| !column_set.contains(name.as_str()))
            .cloned()
            .collect();
        let unexpected: Vec<String> = columns
            .iter()
            .filter(|name| !reference_set.contains(name.as_str()))
            .cloned()
            .collect();

        if !missing.is_empty() || !unexpected.is_empty() {
            return Err(MergeError::SchemaMismatch {
                name: segment.name.clone(),
                missing,
                unexpected,
            }
            .into());
        }
    }

    let mut frames = Vec::with_capacity(segments.len());
    for segment in &segments {
        // Same column set guaranteed above; select fixes the column order.
        frames.push(segment.dataframe.select(reference.iter().cloned())?.lazy());
    }

    let dataframe = concat(
        frames,
        UnionArgs {
            to_supertypes: true,
            ..Default::default()
        },
    )?
    .collect()?;

    Ok(MergeOutcome {
        dataframe,
        segments_merged: segments.len(),
        warnings,
    })
}
