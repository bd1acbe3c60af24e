//! Batch planning: grouping by base name, ordering by a sort key, and
//! bin-packing groups into capacity-bounded batches.

mod group;
mod pack;

pub use group::{base_name, group_files, natural_cmp, SourceFile};
pub use pack::{pack_groups, PACK_WINDOW};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Files sharing one base name. A group is atomic: it is never split across
/// batches, even when it alone exceeds the capacity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileGroup {
    pub base_name: String,
    pub members: Vec<String>,
}

impl FileGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// A capacity-bounded collection of groups destined for one output folder.
/// `index` is 1-based. Never mutated after planning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub index: usize,
    pub groups: Vec<FileGroup>,
    pub file_count: usize,
}

/// The planner's output: ordered batches plus the base names of any group
/// that exceeded the capacity on its own (each such group still occupies a
/// batch alone; it is reported, never dropped or split).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchPlan {
    pub batches: Vec<Batch>,
    pub oversized: Vec<String>,
    pub total_files: usize,
}

impl BatchPlan {
    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}

/// Group ordering applied before bin-packing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    NameAsc,
    NameDesc,
    DateAsc,
    DateDesc,
    /// Largest groups first; favors packing quality and is the fallback.
    #[default]
    SizeDesc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "name-asc" | "name" => Some(SortOrder::NameAsc),
            "name-desc" => Some(SortOrder::NameDesc),
            "date-asc" | "date" => Some(SortOrder::DateAsc),
            "date-desc" => Some(SortOrder::DateDesc),
            "size-desc" | "size" => Some(SortOrder::SizeDesc),
            _ => None,
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SortOrder::NameAsc => "name-asc",
            SortOrder::NameDesc => "name-desc",
            SortOrder::DateAsc => "date-asc",
            SortOrder::DateDesc => "date-desc",
            SortOrder::SizeDesc => "size-desc",
        };
        f.write_str(s)
    }
}

impl FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("invalid sort order: '{s}'"))
    }
}

/// Plan batches: group, order, pack. Empty input yields an empty plan.
pub fn plan(files: &[SourceFile], cap: usize, order: SortOrder) -> BatchPlan {
    let groups = group_files(files, order);
    pack_groups(groups, cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f(name: &str) -> SourceFile {
        SourceFile {
            name: name.to_string(),
            size: 1,
            timestamp: None,
        }
    }

    #[test]
    fn empty_input_is_an_empty_plan() {
        let p = plan(&[], 10, SortOrder::SizeDesc);
        assert!(p.is_empty());
        assert!(p.oversized.is_empty());
        assert_eq!(p.total_files, 0);
    }

    #[test]
    fn siblings_always_share_a_batch() {
        let files: Vec<SourceFile> = (0..40)
            .flat_map(|i| vec![f(&format!("img{i:03}.jpg")), f(&format!("img{i:03}.cr2"))])
            .collect();
        let p = plan(&files, 5, SortOrder::NameAsc);

        for batch in &p.batches {
            for g in &batch.groups {
                assert_eq!(g.len(), 2, "jpg/raw pair split apart: {}", g.base_name);
            }
            assert!(batch.file_count <= 5);
        }
        let total: usize = p.batches.iter().map(|b| b.file_count).sum();
        assert_eq!(total, files.len());
    }

    #[test]
    fn sort_order_round_trips() {
        for s in ["name-asc", "name-desc", "date-asc", "date-desc", "size-desc"] {
            assert_eq!(SortOrder::parse(s).unwrap().to_string(), s);
        }
        assert!(SortOrder::parse("biggest-first").is_none());
    }
}
