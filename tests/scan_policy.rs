use assert_fs::TempDir;
use std::fs;

use shutterbatch::planner::SortOrder;
use shutterbatch::{EngineError, ExecMode, Organizer, OrganizeRequest};

fn request(
    src: &std::path::Path,
    out: &std::path::Path,
) -> OrganizeRequest {
    OrganizeRequest {
        source_dir: src.to_path_buf(),
        output_dir: out.to_path_buf(),
        mode: ExecMode::Copy,
        cap: 100,
        prefix: None,
        sort_order: SortOrder::NameAsc,
    }
}

#[test]
fn scan_is_shallow_and_filters_non_media() {
    let td = TempDir::new().unwrap();
    let src = td.path().join("shoot");
    let out = td.path().join("sorted");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&out).unwrap();

    fs::write(src.join("a.jpg"), b"x").unwrap();
    fs::write(src.join("b.HEIC"), b"x").unwrap();
    fs::write(src.join("Thumbs.db"), b"x").unwrap();
    fs::write(src.join(".DS_Store"), b"x").unwrap();
    fs::write(src.join("readme.txt"), b"x").unwrap();
    // A nested folder is someone else's organizing job; its contents are
    // never scanned.
    let nested = src.join("already_sorted");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("c.jpg"), b"x").unwrap();

    let organizer = Organizer::new(td.path().join("data"));
    let planned = organizer.plan(&request(&src, &out)).unwrap();
    let names: Vec<&str> = planned
        .operations
        .iter()
        .map(|o| o.file_name.as_str())
        .collect();
    assert_eq!(names, vec!["a.jpg", "b.HEIC"]);
}

#[test]
fn nested_output_folder_is_refused() {
    let td = TempDir::new().unwrap();
    let src = td.path().join("shoot");
    let out = src.join("sorted");
    fs::create_dir_all(&out).unwrap();

    let organizer = Organizer::new(td.path().join("data"));
    let err = organizer.plan(&request(&src, &out)).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::PathNotApproved(_))
    ));
}

#[test]
fn missing_source_folder_is_refused() {
    let td = TempDir::new().unwrap();
    let out = td.path().join("sorted");
    fs::create_dir_all(&out).unwrap();

    let organizer = Organizer::new(td.path().join("data"));
    let err = organizer
        .plan(&request(&td.path().join("nope"), &out))
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::PathNotApproved(_))
    ));
}

#[test]
fn illegal_prefix_is_refused_before_any_io() {
    let td = TempDir::new().unwrap();
    let src = td.path().join("shoot");
    let out = td.path().join("sorted");
    fs::create_dir_all(&src).unwrap();
    fs::create_dir_all(&out).unwrap();

    let organizer = Organizer::new(td.path().join("data"));
    let mut req = request(&src, &out);
    req.prefix = Some("Batch/{count}".into());
    let err = organizer.plan(&req).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::InvalidPattern('/'))
    ));
}
