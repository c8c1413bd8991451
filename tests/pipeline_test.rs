use std::{fs, path::Path};

use anyhow::Result;
use tempfile::TempDir;

use sensorflow_quality::{
    demo::{generate_demo_batches, DemoOptions},
    run, Config, PipelineError, QualityFailure, QualityReport, ReferenceTables,
};

const HEADER: &str = "sensor_id,timestamp,reading_type,value,battery_level\n";

fn test_config(root: &Path) -> Config {
    // ---
    Config {
        raw_dir: root.join("raw"),
        processed_dir: root.join("processed"),
        report_path: root.join("data_quality_report.csv"),
        target_tz: chrono_tz::UTC,
        ..Config::default()
    }
}

fn write_batch(cfg: &Config, name: &str, rows: &str) -> Result<()> {
    // ---
    fs::create_dir_all(&cfg.raw_dir)?;
    fs::write(cfg.raw_dir.join(name), format!("{HEADER}{rows}"))?;
    Ok(())
}

#[test]
fn demo_batches_flow_end_to_end() -> Result<()> {
    // ---
    let dir = TempDir::new()?;
    let cfg = test_config(dir.path());
    generate_demo_batches(&cfg.raw_dir, &DemoOptions::default())?;

    let outcome = run(&cfg, &ReferenceTables::default())?;

    assert_eq!(outcome.stats.total_batches, 3);
    assert_eq!(outcome.stats.processed_now, 3);
    assert_eq!(outcome.stats.rows_loaded, 150);
    assert!(outcome.stats.failed_batches.is_empty());
    assert_eq!(outcome.rows_cleaned, 150);

    // 3 dates x 5 sensors
    assert_eq!(outcome.partitions.len(), 15);
    assert!(cfg
        .processed_dir
        .join("date=2025-06-05")
        .join("sensor_id=sensor_1")
        .join("data.csv")
        .exists());

    let report = fs::read_to_string(&cfg.report_path)?;
    for section in ["Type Check:", "Range Check:", "Gaps:", "Profile:"] {
        assert!(report.contains(section), "{section} missing from report");
    }

    let ledger = fs::read_to_string(cfg.ledger_path())?;
    assert_eq!(ledger.lines().count(), 3);

    // Nothing new on the second pass
    let again = run(&cfg, &ReferenceTables::default())?;
    assert_eq!(again.stats.new_batches, 0);
    assert!(again.report.is_no_data());
    assert!(again.partitions.is_empty());
    assert_eq!(fs::read_to_string(cfg.ledger_path())?, ledger);

    Ok(())
}

#[test]
fn schema_failure_is_retried_next_run() -> Result<()> {
    // ---
    let dir = TempDir::new()?;
    let cfg = test_config(dir.path());
    write_batch(&cfg, "a.csv", "s1,2025-06-05T00:00:00Z,temperature,20,90\n")?;
    fs::write(
        cfg.raw_dir.join("b.csv"),
        "sensor_id,timestamp,value\ns1,2025-06-05T01:00:00Z,21\n",
    )?;

    let first = run(&cfg, &ReferenceTables::default())?;
    assert_eq!(first.stats.processed_now, 1);
    assert_eq!(first.stats.failed_batches.len(), 1);
    assert_eq!(first.stats.failed_batches[0].batch, "b.csv");

    // Fix the batch; it is picked up on the next run.
    write_batch(&cfg, "b.csv", "s1,2025-06-05T01:00:00Z,temperature,21,90\n")?;
    let second = run(&cfg, &ReferenceTables::default())?;
    assert_eq!(second.stats.new_batches, 1);
    assert_eq!(second.stats.processed_now, 1);
    assert!(second.stats.failed_batches.is_empty());

    Ok(())
}

#[test]
fn gaps_and_anomalies_in_report() -> Result<()> {
    // ---
    let dir = TempDir::new()?;
    let cfg = test_config(dir.path());
    write_batch(
        &cfg,
        "2025-06-05.csv",
        "s1,2025-06-05T00:00:00Z,temperature,20,90\n\
         s1,2025-06-05T03:00:00Z,humidity,140,90\n\
         s2,2025-06-05T05:30:00Z,temperature,75,80\n",
    )?;

    let outcome = run(&cfg, &ReferenceTables::default())?;
    let QualityReport::Checked(sections) = &outcome.report else {
        panic!("expected a checked report");
    };

    let s1 = sections.gaps.iter().find(|g| g.sensor_id == "s1").unwrap();
    assert_eq!(s1.missing_hours, 2);
    let s2 = sections.gaps.iter().find(|g| g.sensor_id == "s2").unwrap();
    assert_eq!(s2.missing_hours, 0);

    let out_of_range: u64 = sections.range_check.iter().map(|r| r.out_of_range).sum();
    assert_eq!(out_of_range, 2);

    let partition = fs::read_to_string(
        cfg.processed_dir
            .join("date=2025-06-05")
            .join("sensor_id=s2")
            .join("data.csv"),
    )?;
    assert!(partition.lines().nth(1).unwrap().ends_with(",true"));

    Ok(())
}

#[test]
fn fail_fast_stops_before_output_but_keeps_report() -> Result<()> {
    // ---
    let dir = TempDir::new()?;
    let mut cfg = test_config(dir.path());
    write_batch(
        &cfg,
        "2025-06-05.csv",
        "s1,2025-06-05T00:00:00Z,temperature,20,90\n\
         s1,2025-06-05T01:00:00Z,temperature,21,unknown\n",
    )?;
    cfg.fail_fast = true;

    let err = run(&cfg, &ReferenceTables::default()).unwrap_err();
    assert!(matches!(
        err,
        PipelineError::Quality(QualityFailure::InvalidTypes { count: 1, .. })
    ));
    assert!(cfg.report_path.exists());
    assert!(!cfg.processed_dir.join("date=2025-06-05").exists());

    Ok(())
}

#[test]
fn report_only_mode_writes_output() -> Result<()> {
    // ---
    let dir = TempDir::new()?;
    let cfg = test_config(dir.path());
    write_batch(
        &cfg,
        "2025-06-05.csv",
        "s1,2025-06-05T00:00:00Z,temperature,20,90\n\
         s1,2025-06-05T01:00:00Z,temperature,21,unknown\n",
    )?;

    let outcome = run(&cfg, &ReferenceTables::default())?;

    let sections = outcome.report.sections().unwrap();
    assert_eq!(sections.type_check.invalid_battery_level_type, 1);
    assert_eq!(outcome.partitions.len(), 1);
    assert!(fs::read_to_string(&cfg.report_path)?.contains("2,0,1"));

    Ok(())
}
