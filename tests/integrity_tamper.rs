use std::fs;
use tempfile::tempdir;

use chrono::Utc;
use uuid::Uuid;

use shutterbatch::planner::SortOrder;
use shutterbatch::store::{ProgressRecord, ProgressStore, PROGRESS_FILE};
use shutterbatch::{ExecMode, Organizer};

fn record(total: usize) -> ProgressRecord {
    ProgressRecord {
        operation_id: Uuid::new_v4(),
        started_at: Utc::now(),
        last_updated: Utc::now(),
        source_dir: "/shoot".into(),
        output_dir: "/sorted".into(),
        mode: ExecMode::Move,
        cap: 10,
        prefix: None,
        sort_order: SortOrder::SizeDesc,
        total_files: total,
        processed_files: Vec::new(),
        operations: Vec::new(),
        batches: Vec::new(),
    }
}

#[test]
fn edited_progress_record_is_rejected_and_removed() {
    let td = tempdir().unwrap();
    ProgressStore::new(td.path()).begin(record(4)).unwrap();

    let path = td.path().join(PROGRESS_FILE);
    let text = fs::read_to_string(&path).unwrap();
    // An attacker rewrites the payload to point the run somewhere else.
    fs::write(&path, text.replace("/sorted", "/etc")).unwrap();

    let organizer = Organizer::new(td.path());
    assert!(organizer.check_interrupted().is_none());
    assert!(!path.exists(), "tampered record must be deleted");
}

#[test]
fn record_written_under_a_different_secret_is_rejected() {
    let td = tempdir().unwrap();
    let foreign = tempdir().unwrap();

    // Sealed against another installation's secret.
    ProgressStore::new(foreign.path()).begin(record(2)).unwrap();
    fs::create_dir_all(td.path()).unwrap();
    fs::copy(
        foreign.path().join(PROGRESS_FILE),
        td.path().join(PROGRESS_FILE),
    )
    .unwrap();

    // Force this installation to have its own, different secret first.
    let store = ProgressStore::new(td.path());
    assert!(store.load().is_none());
    assert!(!td.path().join(PROGRESS_FILE).exists());
}

#[test]
fn truncated_record_is_rejected_and_removed() {
    let td = tempdir().unwrap();
    ProgressStore::new(td.path()).begin(record(1)).unwrap();

    let path = td.path().join(PROGRESS_FILE);
    let bytes = fs::read(&path).unwrap();
    fs::write(&path, &bytes[..bytes.len() / 2]).unwrap();

    assert!(ProgressStore::new(td.path()).load().is_none());
    assert!(!path.exists());
}
