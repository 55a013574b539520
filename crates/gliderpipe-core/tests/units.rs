use gliderpipe_core::units::{canonical_unit_specs, convert_units};
use polars::prelude::*;

fn sensor_frame() -> DataFrame {
    df!(
        "PLD_REALTIMECLOCK" => ["18/03/2024 10:15:00.000", "18/03/2024 10:15:01.000"],
        "NAV_LATITUDE" => [43.6211, 43.6212],
        "NAV_LONGITUDE" => [7.8401, 7.8402],
        "LEGATO_CONDUCTIVITY" => [40.0, 40.0],
        "LEGATO_TEMPERATURE" => [10.0, 10.0],
        "LEGATO_PRESSURE" => [100.0, 100.0],
        "LEGATO_CODA_DO" => [250.0, 250.0],
        "FLBBCD_BB_700_SCALED" => [1.0, 0.002727],
        "FLBBCD_CHL_SCALED" => [0.88, 0.91],
    )
    .unwrap()
}

fn column_values(df: &DataFrame, name: &str) -> Vec<f64> {
    df.column(name)
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect()
}

#[test]
fn conductivity_forty_ms_cm_is_exactly_four_s_m() {
    let outcome = convert_units(&sensor_frame(), &canonical_unit_specs()).expect("conversion");
    assert_eq!(column_values(&outcome.dataframe, "LEGATO_CONDUCTIVITY"), [4.0, 4.0]);
}

#[test]
fn turbidity_scales_from_backscatter_to_ntu() {
    let outcome = convert_units(&sensor_frame(), &canonical_unit_specs()).expect("conversion");

    let ntu = column_values(&outcome.dataframe, "FLBBCD_BB_700_SCALED");
    assert_eq!(ntu[0], 366.70);
    assert!((ntu[1] - 1.0).abs() < 1e-4);
}

#[test]
fn chlorophyll_relabel_passes_values_through_unchanged() {
    let outcome = convert_units(&sensor_frame(), &canonical_unit_specs()).expect("conversion");

    assert_eq!(column_values(&outcome.dataframe, "FLBBCD_CHL_SCALED"), [0.88, 0.91]);
    assert!(outcome
        .converted_columns
        .iter()
        .any(|name| name == "FLBBCD_CHL_SCALED"));
}

#[test]
fn coordinates_are_never_converted() {
    let input = sensor_frame();
    let once = convert_units(&input, &canonical_unit_specs()).expect("first pass");
    let twice = convert_units(&once.dataframe, &canonical_unit_specs()).expect("second pass");

    for column in ["NAV_LATITUDE", "NAV_LONGITUDE"] {
        assert_eq!(column_values(&once.dataframe, column), column_values(&input, column));
        assert_eq!(
            column_values(&twice.dataframe, column),
            column_values(&input, column)
        );
    }
}

#[test]
fn oxygen_converts_against_density_from_the_unconverted_inputs() {
    let outcome = convert_units(&sensor_frame(), &canonical_unit_specs()).expect("conversion");

    // 250 umol/L at SP ~ 37, 10 degC, 100 dbar sits near 243 umol/kg. A
    // conversion that read the already-rescaled conductivity would land
    // near 249.5 instead.
    for value in column_values(&outcome.dataframe, "LEGATO_CODA_DO") {
        assert!(value > 240.0 && value < 246.0, "got {value}");
    }
}

#[test]
fn oxygen_rows_without_density_inputs_become_missing() {
    let mut input = sensor_frame();
    input
        .with_column(Series::new(
            "LEGATO_TEMPERATURE".into(),
            vec![Some(10.0), None::<f64>],
        ))
        .unwrap();

    let outcome = convert_units(&input, &canonical_unit_specs()).expect("conversion");

    let oxygen = outcome.dataframe.column("LEGATO_CODA_DO").unwrap().f64().unwrap();
    assert!(oxygen.get(0).is_some());
    assert!(oxygen.get(1).is_none());
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.contains("oxygen values set to missing")));
}

#[test]
fn oxygen_is_left_alone_when_a_dependency_column_is_absent() {
    let input = sensor_frame().drop("LEGATO_TEMPERATURE").unwrap();

    let outcome = convert_units(&input, &canonical_unit_specs()).expect("conversion");

    assert_eq!(column_values(&outcome.dataframe, "LEGATO_CODA_DO"), [250.0, 250.0]);
    assert!(!outcome
        .converted_columns
        .iter()
        .any(|name| name == "LEGATO_CODA_DO"));
    assert!(outcome
        .warnings
        .iter()
        .any(|warning| warning.contains("dependency column LEGATO_TEMPERATURE is absent")));
}

#[test]
fn malformed_cells_coerce_to_missing_and_are_counted() {
    let input = df!(
        "LEGATO_CONDUCTIVITY" => ["40.0", "garbled", ""],
    )
    .unwrap();

    let outcome = convert_units(&input, &canonical_unit_specs()).expect("conversion");

    let conductivity = outcome
        .dataframe
        .column("LEGATO_CONDUCTIVITY")
        .unwrap()
        .f64()
        .unwrap();
    assert_eq!(conductivity.get(0), Some(4.0));
    assert!(conductivity.get(1).is_none());
    assert!(conductivity.get(2).is_none());
    // The empty cell is ordinary missing data, only "garbled" counts.
    assert_eq!(outcome.coerced_cells, 1);
}

#[test]
fn columns_without_a_spec_pass_through_and_absent_columns_are_skipped() {
    let input = df!(
        "NAV_DEPTH" => [12.5, 13.0],
        "LEGATO_CONDUCTIVITY" => [40.0, 30.0],
    )
    .unwrap();

    let outcome = convert_units(&input, &canonical_unit_specs()).expect("conversion");

    assert_eq!(column_values(&outcome.dataframe, "NAV_DEPTH"), [12.5, 13.0]);
    assert_eq!(outcome.converted_columns, ["LEGATO_CONDUCTIVITY"]);
}
