use shutterbatch::planner::{plan, SortOrder, SourceFile};

fn file(name: &str, size: u64) -> SourceFile {
    SourceFile {
        name: name.to_string(),
        size,
        timestamp: None,
    }
}

fn shoot(pairs: usize) -> Vec<SourceFile> {
    (0..pairs)
        .flat_map(|i| {
            vec![
                file(&format!("IMG_{i:04}.jpg"), 4_000_000),
                file(&format!("IMG_{i:04}.cr2"), 30_000_000),
            ]
        })
        .collect()
}

#[test]
fn every_file_lands_in_exactly_one_batch() {
    let files = shoot(137);
    for order in [
        SortOrder::NameAsc,
        SortOrder::NameDesc,
        SortOrder::DateAsc,
        SortOrder::DateDesc,
        SortOrder::SizeDesc,
    ] {
        let p = plan(&files, 50, order);
        let mut seen: Vec<&str> = p
            .batches
            .iter()
            .flat_map(|b| b.groups.iter())
            .flat_map(|g| g.members.iter())
            .map(String::as_str)
            .collect();
        seen.sort_unstable();
        let mut expected: Vec<&str> = files.iter().map(|f| f.name.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(seen, expected, "order {order} lost or duplicated files");
        assert_eq!(p.total_files, files.len());
    }
}

#[test]
fn siblings_never_split_regardless_of_order() {
    let files = shoot(80);
    for order in [SortOrder::NameAsc, SortOrder::SizeDesc] {
        let p = plan(&files, 7, order);
        for b in &p.batches {
            assert!(b.file_count <= 7, "batch over cap under {order}");
            for g in &b.groups {
                assert_eq!(
                    g.members.len(),
                    2,
                    "jpg/raw pair for {} was split under {order}",
                    g.base_name
                );
            }
        }
    }
}

#[test]
fn oversized_group_gets_its_own_batch_and_is_reported() {
    // A burst of 12 frames sharing the base name "burst" (only the final
    // extension is stripped), with a cap of 10.
    let mut files: Vec<SourceFile> = (0..12)
        .map(|i| file(&format!("burst.ext{i:02}"), 1))
        .collect();
    files.push(file("solo.jpg", 1));

    let p = plan(&files, 10, SortOrder::NameAsc);
    assert_eq!(p.oversized, vec!["burst".to_string()]);

    let big = p
        .batches
        .iter()
        .find(|b| b.file_count == 12)
        .expect("oversized group must still be packed");
    assert_eq!(big.groups.len(), 1, "oversized group must sit alone");

    let total: usize = p.batches.iter().map(|b| b.file_count).sum();
    assert_eq!(total, 13);
}

#[test]
fn batch_indices_are_one_based_and_contiguous() {
    let p = plan(&shoot(30), 8, SortOrder::SizeDesc);
    for (i, b) in p.batches.iter().enumerate() {
        assert_eq!(b.index, i + 1);
    }
}
