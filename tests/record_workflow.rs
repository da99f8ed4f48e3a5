use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use qrledger::record::MAX_STEM_BYTES;
use qrledger::store::workbook;
use qrledger::{ArtifactStore, FieldLabels, LedgerConfig, QrDecoder, Workflow};

fn config(root: &Path) -> LedgerConfig {
    let mut config = LedgerConfig::rooted_at(root);
    config.fields.keys = vec!["A".into(), "B".into(), "C".into()];
    config
}

fn sheet_rows(path: &Path) -> Vec<Vec<String>> {
    workbook::read_rows(path, "QR Codes").expect("read workbook rows")
}

#[test]
fn submit_appends_one_row_with_trimmed_values() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let outcome = wf.submit(&["  Alice ", "", " 42"]);
    assert!(outcome.ok, "unexpected failure: {}", outcome.message);

    let workbook_path = outcome.workbook_path.expect("workbook path reported");
    let rows = sheet_rows(&workbook_path);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0], ["Field A", "Field B", "Field C", "QR Code Image"]);
    assert_eq!(rows[1][..3], ["Alice", "", "42"]);
    assert_eq!(workbook::image_count(&workbook_path, "QR Codes").unwrap(), 1);

    let image = outcome.image_path.expect("image path reported");
    assert_eq!(image.file_name().unwrap(), "Alice_42.png");
    assert!(image.is_file());
}

#[test]
fn artifact_decodes_back_to_payload() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let outcome = wf.submit(&["Bob Smith", "Ops", ""]);
    assert!(outcome.ok, "{}", outcome.message);

    let decoded = QrDecoder::new()
        .decode_file(&outcome.image_path.unwrap())
        .expect("decode artifact");
    assert_eq!(decoded.as_str(), Some("Bob Smith,Ops"));
}

#[test]
fn blank_submission_leaves_workbook_unchanged() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let first = wf.submit(&["Alice", "", "42"]);
    let workbook_path = first.workbook_path.unwrap();
    let before = fs::read(&workbook_path).unwrap();
    let images_before = fs::read_dir(dir.path().join("qr_code_images")).unwrap().count();

    let outcome = wf.submit(&["", "   ", "\t"]);
    assert!(!outcome.ok);
    assert_eq!(outcome.error, Some("validation"));
    assert!(outcome.image_path.is_none());

    assert_eq!(fs::read(&workbook_path).unwrap(), before);
    assert_eq!(sheet_rows(&workbook_path).len(), 2);
    assert_eq!(
        fs::read_dir(dir.path().join("qr_code_images")).unwrap().count(),
        images_before
    );
}

#[test]
fn blank_first_submission_creates_nothing() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let outcome = wf.submit(&["", "", ""]);
    assert!(!outcome.ok);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn initialize_workbook_twice_keeps_single_header() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::from_config(&config(dir.path()));
    let path = dir.path().join("ledger.xlsx");
    let labels = FieldLabels::new([("A", "Name"), ("B", "Age")]).unwrap();

    assert!(store.initialize_workbook(&path, &labels).unwrap());
    assert!(!store.initialize_workbook(&path, &labels).unwrap());

    assert_eq!(sheet_rows(&path), vec![vec!["Name", "Age", "QR Code Image"]]);
}

#[test]
fn rotation_starts_new_workbook_and_leaves_old_one() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let first = wf.submit(&["Alice", "", "42"]);
    let old_path = first.workbook_path.unwrap();
    assert_eq!(wf.store().record_count(&old_path).unwrap(), 1);

    let mut labels = wf.labels().clone();
    labels.set_label("B", "Department").unwrap();
    let new_path = wf.relabel(labels).unwrap();

    assert_ne!(new_path, old_path);
    assert_eq!(sheet_rows(&new_path), vec![vec![
        "Field A",
        "Department",
        "Field C",
        "QR Code Image"
    ]]);

    let second = wf.submit(&["Bob", "Ops", "7"]);
    assert_eq!(second.workbook_path.as_deref(), Some(new_path.as_path()));
    assert_eq!(wf.store().record_count(&old_path).unwrap(), 1);
    assert_eq!(wf.store().record_count(&new_path).unwrap(), 1);
}

#[test]
fn rotations_within_one_second_get_distinct_paths() {
    let dir = TempDir::new().unwrap();
    let store = ArtifactStore::from_config(&config(dir.path()));
    let labels = FieldLabels::new([("A", "Name")]).unwrap();
    let now = NaiveDate::from_ymd_opt(2026, 10, 19)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();

    let first = store.rotate_workbook_at(&labels, now).unwrap();
    let second = store.rotate_workbook_at(&labels, now).unwrap();
    assert_ne!(first, second);
    assert_eq!(store.config_store().load_workbook_path(), Some(second));
}

#[test]
fn relabel_and_workbook_path_survive_restart() {
    let dir = TempDir::new().unwrap();
    let config = config(dir.path());

    let rotated = {
        let mut wf = Workflow::new(&config).unwrap();
        let labels = FieldLabels::new([("A", "Name"), ("B", "Team"), ("C", "Age")]).unwrap();
        wf.relabel(labels).unwrap()
    };

    let mut restarted = Workflow::new(&config).unwrap();
    assert_eq!(restarted.labels().label("B"), Some("Team"));
    assert_eq!(restarted.workbook_path().unwrap(), rotated);

    let outcome = restarted.submit(&["Carol", "QA", "30"]);
    assert_eq!(outcome.workbook_path, Some(rotated));
}

#[test]
fn colliding_payload_names_do_not_overwrite() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let comma = wf.submit(&["Alice", "42", ""]);
    let space = wf.submit(&["Alice 42", "", ""]);

    let first = comma.image_path.unwrap();
    let second = space.image_path.unwrap();
    assert_ne!(first, second);

    let decoder = QrDecoder::new();
    assert_eq!(decoder.decode_file(&first).unwrap().as_str(), Some("Alice,42"));
    assert_eq!(decoder.decode_file(&second).unwrap().as_str(), Some("Alice 42"));
}

#[test]
fn long_payload_gets_capped_artifact_name() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let long = "x".repeat(300);
    let outcome = wf.submit(&[long.as_str(), "", ""]);
    assert!(outcome.ok, "{}", outcome.message);
    assert_eq!(outcome.error, None);

    let image = outcome.image_path.unwrap();
    let name = image.file_name().unwrap().to_str().unwrap();
    assert!(name.len() <= MAX_STEM_BYTES + 9 + ".png".len(), "{name}");
    assert!(name.starts_with(&"x".repeat(MAX_STEM_BYTES)));
    assert!(image.is_file());

    let rows = sheet_rows(&outcome.workbook_path.unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][0], long);
}

#[test]
fn failed_append_is_retried_against_reloaded_workbook() {
    let dir = TempDir::new().unwrap();
    let mut wf = Workflow::new(&config(dir.path())).unwrap();

    let ledger = dir.path().join("ledger.xlsx");
    fs::write(&ledger, b"not a workbook").unwrap();
    wf.store().config_store().save_workbook_path(&ledger).unwrap();

    let failed = wf.submit(&["Alice", "", "42"]);
    assert!(!failed.ok);
    assert_eq!(failed.error, Some("persistence"));

    fs::remove_file(&ledger).unwrap();
    let labels = wf.labels().clone();
    assert!(wf.store().initialize_workbook(&ledger, &labels).unwrap());

    let retried = wf.submit(&["Alice", "", "42"]);
    assert!(retried.ok, "{}", retried.message);
    assert_eq!(retried.workbook_path.as_deref(), Some(ledger.as_path()));
    assert_eq!(retried.row, Some(2));

    let rows = sheet_rows(&ledger);
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][..3], ["Alice", "", "42"]);
    assert_eq!(wf.store().record_count(&ledger).unwrap(), 1);
}
