use std::fs;
use std::path::Path;

use gliderpipe_core::artifact::{read_csv, Stage};
use gliderpipe_core::config::PipelineConfig;
use gliderpipe_core::pipeline::{run_pipeline, run_stage, survey, PipelineState};
use polars::prelude::DataType;
use uuid::Uuid;

const RAW_HEADER: &str = "PLD_REALTIMECLOCK;NAV_LATITUDE;NAV_LONGITUDE;NAV_DEPTH;LEGATO_CONDUCTIVITY;LEGATO_TEMPERATURE;LEGATO_PRESSURE;LEGATO_CODA_DO;FLBBCD_CHL_SCALED;FLBBCD_BB_700_SCALED";

fn raw_row(timestamp: &str, depth: f64) -> String {
    format!("{timestamp};43.6211;7.8401;{depth};40.0;10.0;100.0;250.0;0.88;0.002727;")
}

fn write_raw(dir: &Path, name: &str, rows: &[String]) {
    let mut content = String::from(RAW_HEADER);
    content.push('\n');
    for row in rows {
        content.push_str(row);
        content.push('\n');
    }
    fs::write(dir.join(name), content).expect("write raw file");
}

fn seed_mission(dir: &Path) {
    write_raw(
        dir,
        "sea064.12.pld1.raw.1",
        &[
            raw_row("18/03/2024 10:15:00.000", 1.0),
            raw_row("18/03/2024 10:15:01.000", 2.0),
        ],
    );
    write_raw(
        dir,
        "sea064.12.pld1.raw.2",
        &[raw_row("18/03/2024 10:20:00.000", 3.0)],
    );
    write_raw(
        dir,
        "sea064.12.pld1.raw.3",
        &[raw_row("18/03/2024 10:25:00.000", 4.0)],
    );
}

#[test]
fn full_run_produces_a_canonical_artifact_and_ignores_leftovers() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_mission(dir.path());
    // Sub-sampled duplicate of sequence 2 and a stale final artifact; both
    // must be ignored.
    write_raw(
        dir.path(),
        "sea064.12.pld1.sub.2",
        &[raw_row("18/03/2024 10:20:00.000", 99.0)],
    );
    fs::write(
        dir.path().join("mission_old_renamed.csv"),
        "TIME,TEMP\n2024-01-01T00:00:00,1.0\n",
    )
    .unwrap();

    let config = PipelineConfig::default();
    let report = run_pipeline(dir.path(), &config);

    assert!(report.succeeded(), "run failed: {:?}", report.error);
    assert_eq!(report.stages.len(), 4);
    assert!(report.stages[0]
        .warnings
        .iter()
        .any(|warning| warning.contains("already decoded")));

    let final_artifact = &report.stages[3].artifact;
    let name = final_artifact.file_name().unwrap().to_str().unwrap();
    assert!(name.contains("renamed"));

    let df = read_csv(final_artifact).expect("read final artifact");
    assert_eq!(df.height(), 4);

    let depth: Vec<f64> = df
        .column("DEPTH")
        .unwrap()
        .f64()
        .unwrap()
        .into_no_null_iter()
        .collect();
    assert_eq!(depth, [1.0, 2.0, 3.0, 4.0]);

    let conductivity = df.column("CNDC").unwrap().f64().unwrap();
    assert_eq!(conductivity.get(0), Some(4.0));

    let oxygen = df.column("DOXY").unwrap().f64().unwrap();
    let doxy = oxygen.get(0).expect("oxygen converted");
    assert!(doxy > 240.0 && doxy < 246.0, "got {doxy}");

    assert!(matches!(
        df.column("TIME").unwrap().dtype(),
        DataType::Datetime(_, _)
    ));

    let file_number = df.column("file_number").unwrap().i64().unwrap();
    assert_eq!(file_number.get(0), Some(1));
    assert_eq!(file_number.get(3), Some(3));

    for column in ["TURB", "CHLA", "TEMP", "PRES", "LATITUDE", "LONGITUDE"] {
        assert!(df.column(column).is_ok(), "missing column {column}");
    }

    // The stale artifact was never an input and never modified.
    let leftover = fs::read_to_string(dir.path().join("mission_old_renamed.csv")).unwrap();
    assert!(leftover.starts_with("TIME,TEMP"));
}

#[test]
fn a_duplicate_segment_halts_the_run_at_merge() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_raw(
        dir.path(),
        "sea064.12.pld1.raw.5",
        &[raw_row("18/03/2024 10:15:00.000", 1.0)],
    );
    let segments = dir.path().join("segments");
    fs::create_dir_all(&segments).unwrap();
    fs::write(segments.join("mission_5.csv"), "NAV_DEPTH,file_number\n7.0,5\n").unwrap();

    let config = PipelineConfig::default();
    let report = run_pipeline(dir.path(), &config);

    assert_eq!(report.state, PipelineState::Failed(Stage::Merge));
    assert_eq!(report.stages.len(), 1);
    assert!(report
        .error
        .as_deref()
        .is_some_and(|error| error.contains("both claim sequence 5")));

    // No partial merge was published.
    let merged_exists = fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|entry| entry.ok())
        .any(|entry| {
            entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.contains("complete_merged"))
        });
    assert!(!merged_exists);
}

#[test]
fn stages_run_individually_resolve_their_inputs_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_mission(dir.path());
    let config = PipelineConfig::default();
    let run_id = Uuid::new_v4();

    for stage in Stage::ALL {
        run_stage(run_id, stage, dir.path(), &config).expect("stage succeeds");
    }

    let after = survey(dir.path(), &config).expect("survey");
    assert!(after.renamed.is_some());
    assert_eq!(after.next_stage, None);
}

#[test]
fn survey_tracks_stage_progress() {
    let dir = tempfile::tempdir().expect("tempdir");
    seed_mission(dir.path());
    let config = PipelineConfig::default();

    let before = survey(dir.path(), &config).expect("survey");
    assert_eq!(before.raw_files, 3);
    assert_eq!(before.segments, 0);
    assert!(before.merged.is_none());
    assert_eq!(before.next_stage, Some(Stage::Split));

    let report = run_pipeline(dir.path(), &config);
    assert!(report.succeeded(), "run failed: {:?}", report.error);

    let after = survey(dir.path(), &config).expect("survey");
    assert_eq!(after.segments, 3);
    assert!(after.merged.is_some());
    assert!(after.units_converted.is_some());
    assert!(after.renamed.is_some());
    assert_eq!(after.next_stage, None);
}
