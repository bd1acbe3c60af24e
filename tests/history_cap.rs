use tempfile::tempdir;

use chrono::Utc;
use uuid::Uuid;

use shutterbatch::history::{HistoryManager, RollbackManifest, HISTORY_CAP};
use shutterbatch::planner::SortOrder;

fn manifest(n: usize) -> RollbackManifest {
    RollbackManifest {
        operation_id: Uuid::new_v4(),
        recorded_at: Utc::now(),
        source_dir: format!("/shoot/{n}").into(),
        output_dir: "/sorted".into(),
        prefix: None,
        cap: 100,
        sort_order: SortOrder::SizeDesc,
        files: Vec::new(),
        batch_folders: Vec::new(),
        batches: Vec::new(),
    }
}

#[test]
fn history_never_grows_past_the_cap() {
    let td = tempdir().unwrap();
    let mgr = HistoryManager::new(td.path());

    let manifests: Vec<RollbackManifest> = (0..HISTORY_CAP + 2).map(manifest).collect();
    for m in &manifests {
        mgr.record(m).unwrap();
    }

    let entries = mgr.history().unwrap();
    assert_eq!(entries.len(), HISTORY_CAP);

    // Newest first; the two oldest runs were evicted, manifests included.
    assert_eq!(
        entries[0].operation_id,
        manifests.last().unwrap().operation_id
    );
    for m in &manifests[..2] {
        assert!(mgr.load_manifest(m.operation_id).is_err());
    }
    for m in &manifests[2..] {
        assert!(mgr.load_manifest(m.operation_id).is_ok());
    }
}

#[test]
fn rerecording_the_same_operation_does_not_duplicate() {
    let td = tempdir().unwrap();
    let mgr = HistoryManager::new(td.path());
    let m = manifest(0);
    mgr.record(&m).unwrap();
    mgr.record(&m).unwrap();
    assert_eq!(mgr.history().unwrap().len(), 1);
}
