//! End-to-end tests: CSV in, flaw list out.

use std::fs;
use std::io::Write;

use chrono::NaiveDate;
use flaw_nozzle::core::loaders::{load_drop_csv, read_drop_csv};
use flaw_nozzle::core::writers::{flaw_list_path, write_flaw_list};
use flaw_nozzle::processors::{compute_table_flaws, LabelOutcome};
use flaw_nozzle::{NozzleConfig, OutputConfig};
use tempfile::{tempdir, NamedTempFile};

/// Drops along a tilted nozzle row: nozzle 1 and nozzle `n` plus the given
/// interior nozzles, with an optional along-row offset in steps per drop.
fn tilted_rows(label: &str, n: u32, pitch: f64, tilt_deg: f64, interior: &[(u32, f64)]) -> String {
    let (sin_t, cos_t) = tilt_deg.to_radians().sin_cos();
    let origin = (250.0, 1200.0);
    let mut rows = String::new();

    let mut emit = |pos: f64| {
        let t = (pos - 1.0) * pitch;
        rows.push_str(&format!(
            "{},{:.9},{:.9}\n",
            label,
            origin.0 + t * cos_t,
            origin.1 + t * sin_t
        ));
    };

    emit(1.0);
    for &(nozzle, offset) in interior {
        emit(nozzle as f64 + offset);
    }
    emit(n as f64);

    rows
}

#[test]
fn test_csv_to_flaw_list() {
    let mut data = String::from("Label,X,Y\n");
    data.push_str(&tilted_rows("A.tif", 636, 0.5, 1.3, &[(12, 0.0), (300, 0.1), (301, 0.4)]));
    data.push_str(&tilted_rows("B.tif", 636, 0.52, -0.8, &[(12, -0.05), (77, 0.0), (635, 0.0)]));

    let mut file = NamedTempFile::new().unwrap();
    file.write_all(data.as_bytes()).unwrap();
    file.flush().unwrap();

    let table = load_drop_csv(file.path()).unwrap();
    assert_eq!(table.len(), 2);

    let report = compute_table_flaws(&table, &NozzleConfig::default()).unwrap();

    assert_eq!(report.flaws, vec![12, 77, 300, 635]);
    assert!(report.has_out_of_range());

    let a = report.labels[0].fit().unwrap();
    assert!((a.angle_deg() - 1.3).abs() < 1e-6);
    assert_eq!(a.fit.out_of_range_count(), 1);
}

#[test]
fn test_expected_label_without_rows() {
    let mut data = String::from("Label,X,Y\n");
    data.push_str(&tilted_rows("A.tif", 636, 0.5, 0.4, &[(2, 0.0), (3, 0.0), (4, 0.0)]));

    let table = read_drop_csv(data.as_bytes()).unwrap();
    let config = NozzleConfig {
        labels: vec!["A.tif".to_string(), "T.tif".to_string()],
        ..NozzleConfig::default()
    };

    let report = compute_table_flaws(&table, &config).unwrap();

    assert_eq!(report.flaws, vec![2, 3, 4]);
    assert_eq!(report.labels[1].label, "T.tif");
    assert_eq!(report.labels[1].outcome, LabelOutcome::Missing);
}

#[test]
fn test_single_drop_label_does_not_abort() {
    let mut data = String::from("Label,X,Y\nC.tif,10.0,10.0\nC.tif,10.0,10.0\n");
    data.push_str(&tilted_rows("A.tif", 11, 3.0, 2.0, &[(6, 0.0)]));

    let table = read_drop_csv(data.as_bytes()).unwrap();
    assert_eq!(table.get("C.tif").map(|s| s.len()), Some(1));

    let config = NozzleConfig {
        nozzle_count: 11,
        ..NozzleConfig::default()
    };
    let report = compute_table_flaws(&table, &config).unwrap();

    assert_eq!(report.flaws, vec![6]);
    assert_eq!(report.degenerate_labels().collect::<Vec<_>>(), vec!["C.tif"]);
}

#[test]
fn test_export_file() {
    let data = "Label,X,Y\nA.tif,0,0\nA.tif,1,1\nA.tif,2,2\nA.tif,3,3\nA.tif,4,4\n";
    let table = read_drop_csv(data.as_bytes()).unwrap();
    let config = NozzleConfig {
        nozzle_count: 5,
        ..NozzleConfig::default()
    };
    let report = compute_table_flaws(&table, &config).unwrap();

    let dir = tempdir().unwrap();
    let date = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
    let path = flaw_list_path(dir.path(), date, &OutputConfig::default(), "04");
    write_flaw_list(&path, &report.flaws).unwrap();

    assert!(path.ends_with("flaw_nozzle_20261017_680k_04.txt"));
    assert_eq!(fs::read_to_string(&path).unwrap(), "2\n3\n4\n");
}
