use chrono::NaiveDateTime;
use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{DecodeStats, DecodedPayload};

/// Column carrying the payload wall-clock timestamp.
pub const TIMESTAMP_COLUMN: &str = "PLD_REALTIMECLOCK";

const DELIMITER: u8 = b';';

static TIMESTAMP_FORMATS: &[&str] = &["%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M:%S"];

/// Decodes one raw payload file: a semicolon-delimited header row naming the
/// channels, then one record per line. Rows frequently end with a trailing
/// delimiter and carry empty cells for channels that did not sample.
///
/// The timestamp column parses to microsecond datetimes; every other column
/// decodes as f64. Non-empty cells that fail to parse coerce to missing and
/// are counted in the returned stats. Rows with no surviving cells are
/// dropped.
pub fn parse_payload(content: &str) -> Result<DecodedPayload, ParserError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(DELIMITER)
        .from_reader(content.as_bytes());

    let mut records = reader.records();

    let header = records.next().ok_or_else(|| ParserError::FormatMismatch {
        reason: "file is empty".to_string(),
    })??;

    let mut columns: Vec<String> = header.iter().map(|c| c.trim().to_string()).collect();
    // drop the phantom column produced by a trailing delimiter
    while columns.last().map_or(false, |c| c.is_empty()) {
        columns.pop();
    }

    if columns.is_empty() {
        return Err(ParserError::FormatMismatch {
            reason: "header row has no columns".to_string(),
        });
    }

    let timestamp_idx = columns
        .iter()
        .position(|c| c == TIMESTAMP_COLUMN)
        .ok_or_else(|| ParserError::FormatMismatch {
            reason: format!("header is missing the {TIMESTAMP_COLUMN} column"),
        })?;

    let mut stats = DecodeStats::default();
    let mut timestamps: Vec<Option<i64>> = Vec::new();
    let mut channels: Vec<Vec<Option<f64>>> = vec![Vec::new(); columns.len() - 1];

    for record in records {
        let record = record?;

        let mut row_timestamp: Option<i64> = None;
        let mut row_values: Vec<Option<f64>> = Vec::with_capacity(channels.len());
        let mut any_present = false;

        for idx in 0..columns.len() {
            let value = record.get(idx).unwrap_or("");
            if idx == timestamp_idx {
                let (parsed, coerced) = parse_timestamp_cell(value);
                if coerced {
                    stats.coerced_timestamps += 1;
                }
                any_present |= parsed.is_some();
                row_timestamp = parsed;
            } else {
                let (parsed, coerced) = parse_numeric_cell(value);
                if coerced {
                    stats.coerced_cells += 1;
                }
                any_present |= parsed.is_some();
                row_values.push(parsed);
            }
        }

        if !any_present {
            stats.rows_dropped_empty += 1;
            continue;
        }

        timestamps.push(row_timestamp);
        for (slot, parsed) in channels.iter_mut().zip(row_values) {
            slot.push(parsed);
        }
        stats.rows_decoded += 1;
    }

    if stats.rows_decoded == 0 {
        return Err(ParserError::EmptyData);
    }

    let mut cols: Vec<Column> = Vec::with_capacity(columns.len());
    let mut channel_slot = 0usize;
    for (idx, name) in columns.iter().enumerate() {
        if idx == timestamp_idx {
            let ts = Series::new(name.as_str().into(), std::mem::take(&mut timestamps));
            let ts = ts
                .cast(&DataType::Datetime(TimeUnit::Microseconds, None))
                .map_err(|err| ParserError::Validation {
                    message: format!("failed to cast {TIMESTAMP_COLUMN} column: {err}"),
                })?;
            cols.push(ts.into());
        } else {
            let values = std::mem::take(&mut channels[channel_slot]);
            channel_slot += 1;
            cols.push(Series::new(name.as_str().into(), values).into());
        }
    }

    let dataframe = DataFrame::new(cols).map_err(|err| ParserError::Validation {
        message: format!("failed to build payload dataframe: {err}"),
    })?;

    Ok(DecodedPayload { dataframe, stats })
}

fn parse_numeric_cell(value: &str) -> (Option<f64>, bool) {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("nan") {
        return (None, false);
    }

    match trimmed.parse::<f64>() {
        Ok(parsed) => (Some(parsed), false),
        Err(_) => (None, true),
    }
}

fn parse_timestamp_cell(value: &str) -> (Option<i64>, bool) {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return (None, false);
    }

    for format in TIMESTAMP_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return (Some(parsed.and_utc().timestamp_micros()), false);
        }
    }

    (None, true)
}
