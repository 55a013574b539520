use gliderpipe_core::error::PipelineError;
use gliderpipe_core::rename::{canonical_rename_entries, rename_columns, RenameEntry, RenameError};
use polars::prelude::*;

fn entries(pairs: &[(&str, &str)]) -> Vec<RenameEntry> {
    pairs
        .iter()
        .map(|(from, to)| RenameEntry {
            from: from.to_string(),
            to: to.to_string(),
        })
        .collect()
}

#[test]
fn canonical_names_apply_and_unmapped_columns_survive() {
    let input = df!(
        "PLD_REALTIMECLOCK" => ["18/03/2024 10:15:00.000"],
        "LEGATO_TEMPERATURE" => [13.2],
        "NAV_LATITUDE" => [43.62],
        "source_file" => ["sea064.12.pld1.raw.7"],
    )
    .unwrap();

    let outcome = rename_columns(&input, &canonical_rename_entries()).expect("rename succeeds");

    assert_eq!(
        outcome.dataframe.get_column_names_str(),
        ["TIME", "TEMP", "LATITUDE", "source_file"]
    );
    assert_eq!(outcome.applied.len(), 3);

    let temp = outcome.dataframe.column("TEMP").unwrap().f64().unwrap();
    assert_eq!(temp.get(0), Some(13.2));
}

#[test]
fn two_sources_mapping_to_temp_fail_and_nothing_is_renamed() {
    let input = df!(
        "LEGATO_TEMPERATURE" => [13.2],
        "POTENTIAL_TEMP" => [13.0],
    )
    .unwrap();
    let map = entries(&[("LEGATO_TEMPERATURE", "TEMP"), ("POTENTIAL_TEMP", "TEMP")]);

    let err = rename_columns(&input, &map).expect_err("collision must fail");

    match err {
        PipelineError::Rename(RenameError::Collision { target, sources }) => {
            assert_eq!(target, "TEMP");
            assert_eq!(sources, ["LEGATO_TEMPERATURE", "POTENTIAL_TEMP"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    // All-or-nothing: the input keeps its headers.
    assert_eq!(
        input.get_column_names_str(),
        ["LEGATO_TEMPERATURE", "POTENTIAL_TEMP"]
    );
}

#[test]
fn renaming_onto_an_existing_column_name_is_a_collision() {
    let input = df!(
        "LEGATO_TEMPERATURE" => [13.2],
        "TEMP" => [12.9],
    )
    .unwrap();

    let err =
        rename_columns(&input, &canonical_rename_entries()).expect_err("collision must fail");

    match err {
        PipelineError::Rename(RenameError::Collision { target, sources }) => {
            assert_eq!(target, "TEMP");
            assert_eq!(sources, ["LEGATO_TEMPERATURE", "TEMP"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn chained_renames_are_allowed_when_the_final_headers_are_unique() {
    let input = df!(
        "NAV_DEPTH" => [5.0],
        "DEPTH" => [4.8],
    )
    .unwrap();
    let map = entries(&[("NAV_DEPTH", "DEPTH"), ("DEPTH", "DEPTH_RAW")]);

    let outcome = rename_columns(&input, &map).expect("no collision in the final headers");

    assert_eq!(outcome.dataframe.get_column_names_str(), ["DEPTH", "DEPTH_RAW"]);

    let depth = outcome.dataframe.column("DEPTH").unwrap().f64().unwrap();
    assert_eq!(depth.get(0), Some(5.0));
    let raw = outcome.dataframe.column("DEPTH_RAW").unwrap().f64().unwrap();
    assert_eq!(raw.get(0), Some(4.8));
}

#[test]
fn a_source_column_mapped_twice_to_different_targets_is_rejected() {
    let input = df!("NAV_DEPTH" => [5.0]).unwrap();
    let map = entries(&[("NAV_DEPTH", "DEPTH"), ("NAV_DEPTH", "Z")]);

    let err = rename_columns(&input, &map).expect_err("conflicting map must fail");

    assert!(matches!(
        err,
        PipelineError::Rename(RenameError::DuplicateSource { column }) if column == "NAV_DEPTH"
    ));
}

#[test]
fn a_repeated_identical_map_entry_is_tolerated() {
    let input = df!("NAV_DEPTH" => [5.0]).unwrap();
    let map = entries(&[("NAV_DEPTH", "DEPTH"), ("NAV_DEPTH", "DEPTH")]);

    let outcome = rename_columns(&input, &map).expect("identical duplicate is harmless");

    assert_eq!(outcome.dataframe.get_column_names_str(), ["DEPTH"]);
}

#[test]
fn an_already_canonical_dataset_passes_through_untouched() {
    let input = df!(
        "TIME" => ["18/03/2024 10:15:00.000"],
        "TEMP" => [13.2],
    )
    .unwrap();

    let outcome = rename_columns(&input, &canonical_rename_entries()).expect("rename succeeds");

    assert!(outcome.applied.is_empty());
    assert_eq!(outcome.dataframe.get_column_names_str(), ["TIME", "TEMP"]);
}
