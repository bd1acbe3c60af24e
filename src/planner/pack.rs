//! Greedy bin-packing with a bounded backward search window.

use super::{Batch, BatchPlan, FileGroup};

/// How many of the most recently opened batches are scanned for spare
/// capacity before a new batch is opened. Newest batches are checked first
/// since they are statistically likeliest to have room. Bounding the window
/// keeps packing cost linear on datasets with tens of thousands of groups at
/// the price of non-optimal packing.
pub const PACK_WINDOW: usize = 25;

/// Pack ordered groups into batches of at most `cap` files each.
///
/// A group larger than `cap` occupies a batch alone and its base name is
/// reported in `oversized`; it is never split or dropped.
pub fn pack_groups(groups: Vec<FileGroup>, cap: usize) -> BatchPlan {
    let mut open: Vec<(Vec<FileGroup>, usize)> = Vec::new();
    let mut oversized = Vec::new();
    let mut total_files = 0usize;

    for group in groups {
        let size = group.len();
        if size == 0 {
            continue;
        }
        total_files += size;

        if size > cap {
            oversized.push(group.base_name.clone());
            open.push((vec![group], size));
            continue;
        }

        // Scan backward over the newest PACK_WINDOW batches for a first fit.
        let lo = open.len().saturating_sub(PACK_WINDOW);
        let slot = open[lo..]
            .iter()
            .rposition(|(_, count)| count + size <= cap)
            .map(|rel| lo + rel);

        match slot {
            Some(i) => {
                open[i].1 += size;
                open[i].0.push(group);
            }
            None => open.push((vec![group], size)),
        }
    }

    let batches = open
        .into_iter()
        .enumerate()
        .map(|(i, (groups, file_count))| Batch {
            index: i + 1,
            groups,
            file_count,
        })
        .collect();

    BatchPlan {
        batches,
        oversized,
        total_files,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group(base: &str, size: usize) -> FileGroup {
        FileGroup {
            base_name: base.to_string(),
            members: (0..size).map(|i| format!("{base}_{i}.jpg")).collect(),
        }
    }

    #[test]
    fn no_batch_exceeds_cap_except_oversized() {
        let groups: Vec<FileGroup> = (0..100).map(|i| group(&format!("g{i}"), 1 + i % 4)).collect();
        let plan = pack_groups(groups, 7);
        for b in &plan.batches {
            assert!(b.file_count <= 7);
            assert_eq!(b.file_count, b.groups.iter().map(|g| g.len()).sum::<usize>());
        }
        assert!(plan.oversized.is_empty());
    }

    #[test]
    fn every_file_packed_exactly_once() {
        let groups: Vec<FileGroup> = (0..50).map(|i| group(&format!("g{i}"), 3)).collect();
        let plan = pack_groups(groups, 10);
        let packed: usize = plan.batches.iter().map(|b| b.file_count).sum();
        assert_eq!(packed, 150);
        assert_eq!(plan.total_files, 150);
    }

    #[test]
    fn oversized_group_gets_its_own_batch_and_is_reported() {
        let groups = vec![group("small", 2), group("huge", 12), group("tiny", 1)];
        let plan = pack_groups(groups, 5);

        assert_eq!(plan.oversized, vec!["huge".to_string()]);
        let huge_batch = plan
            .batches
            .iter()
            .find(|b| b.groups.iter().any(|g| g.base_name == "huge"))
            .unwrap();
        assert_eq!(huge_batch.groups.len(), 1);
        assert_eq!(huge_batch.file_count, 12);
    }

    #[test]
    fn scans_backward_newest_batch_first() {
        // 4-file group opens batch 1, an 8-file group opens batch 2; the next
        // 3-file group does not fit the newest batch (8 + 3 > 10) and
        // backfills into batch 1.
        let groups = vec![group("a", 4), group("b", 8), group("c", 3)];
        let plan = pack_groups(groups, 10);
        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].file_count, 7);
        assert_eq!(plan.batches[1].file_count, 8);
    }

    #[test]
    fn prefers_the_newest_batch_with_room() {
        let groups = vec![group("a", 4), group("b", 7), group("c", 3)];
        let plan = pack_groups(groups, 10);
        // Both open batches have room for "c"; the newest one wins.
        assert_eq!(plan.batches.len(), 2);
        assert_eq!(plan.batches[0].file_count, 4);
        assert_eq!(plan.batches[1].file_count, 10);
    }

    #[test]
    fn does_not_look_beyond_the_window() {
        // Open PACK_WINDOW + 1 nearly-full batches, then a group that would
        // only fit in the very first one. It must open a new batch instead.
        let mut groups: Vec<FileGroup> = Vec::new();
        groups.push(group("first", 1)); // leaves lots of room in batch 1
        for i in 0..PACK_WINDOW {
            groups.push(group(&format!("full{i}"), 10));
        }
        groups.push(group("late", 5));
        let plan = pack_groups(groups, 10);

        let last = plan.batches.last().unwrap();
        assert!(last.groups.iter().any(|g| g.base_name == "late"));
        assert_eq!(last.groups.len(), 1, "late group must not reach batch 1");
        assert_eq!(plan.batches[0].file_count, 1);
    }

    #[test]
    fn batch_indices_are_one_based_and_sequential() {
        let groups = vec![group("a", 3), group("b", 3), group("c", 3)];
        let plan = pack_groups(groups, 3);
        let idx: Vec<usize> = plan.batches.iter().map(|b| b.index).collect();
        assert_eq!(idx, vec![1, 2, 3]);
    }
}
