//! Grouping by base name and group ordering.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::{FileGroup, SortOrder};

/// One eligible source file as seen by the planner. `timestamp` is the
/// capture date supplied by the collaborating provider (None when the
/// provider has nothing, in which case date sorts treat the group as oldest).
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub size: u64,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Base name: the substring before the final extension separator. A name
/// with no separator, or only a leading one, is its own base name.
pub fn base_name(file_name: &str) -> &str {
    match file_name.rfind('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    }
}

/// Case-insensitive, digit-run-aware comparison so "photo2" < "photo10".
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ia = a.chars().peekable();
    let mut ib = b.chars().peekable();

    loop {
        match (ia.peek().copied(), ib.peek().copied()) {
            (None, None) => return a.cmp(b), // total order tie-break
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(ca), Some(cb)) => {
                if ca.is_ascii_digit() && cb.is_ascii_digit() {
                    let na = take_number(&mut ia);
                    let nb = take_number(&mut ib);
                    match na.cmp(&nb) {
                        Ordering::Equal => {}
                        other => return other,
                    }
                } else {
                    let la = ca.to_lowercase();
                    let lb = cb.to_lowercase();
                    match la.cmp(lb) {
                        Ordering::Equal => {
                            ia.next();
                            ib.next();
                        }
                        other => return other,
                    }
                }
            }
        }
    }
}

fn take_number(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> u128 {
    let mut n: u128 = 0;
    while let Some(c) = it.peek().copied() {
        if let Some(d) = c.to_digit(10) {
            n = n.saturating_mul(10).saturating_add(d as u128);
            it.next();
        } else {
            break;
        }
    }
    n
}

/// Group files by base name and order the groups by the requested key.
pub fn group_files(files: &[SourceFile], order: SortOrder) -> Vec<FileGroup> {
    let mut by_base: HashMap<&str, Vec<&SourceFile>> = HashMap::new();
    for file in files {
        by_base.entry(base_name(&file.name)).or_default().push(file);
    }

    let mut groups: Vec<(FileGroup, Option<DateTime<Utc>>, u64)> = by_base
        .into_iter()
        .map(|(base, members)| {
            let earliest = members.iter().filter_map(|m| m.timestamp).min();
            let bytes: u64 = members.iter().map(|m| m.size).sum();
            let mut names: Vec<String> = members.iter().map(|m| m.name.clone()).collect();
            names.sort_by(|a, b| natural_cmp(a, b));
            (
                FileGroup {
                    base_name: base.to_string(),
                    members: names,
                },
                earliest,
                bytes,
            )
        })
        .collect();

    match order {
        SortOrder::NameAsc => {
            groups.sort_by(|(a, ..), (b, ..)| natural_cmp(&a.base_name, &b.base_name));
        }
        SortOrder::NameDesc => {
            groups.sort_by(|(a, ..), (b, ..)| natural_cmp(&b.base_name, &a.base_name));
        }
        SortOrder::DateAsc => {
            groups.sort_by(|(a, ta, _), (b, tb, _)| {
                ta.cmp(tb).then_with(|| natural_cmp(&a.base_name, &b.base_name))
            });
        }
        SortOrder::DateDesc => {
            groups.sort_by(|(a, ta, _), (b, tb, _)| {
                tb.cmp(ta).then_with(|| natural_cmp(&a.base_name, &b.base_name))
            });
        }
        SortOrder::SizeDesc => {
            // Member count first (that is what the cap bounds), combined
            // byte size between equally sized groups.
            groups.sort_by(|(a, _, ba), (b, _, bb)| {
                b.len()
                    .cmp(&a.len())
                    .then_with(|| bb.cmp(ba))
                    .then_with(|| natural_cmp(&a.base_name, &b.base_name))
            });
        }
    }

    groups.into_iter().map(|(g, ..)| g).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn f(name: &str) -> SourceFile {
        SourceFile {
            name: name.into(),
            size: 1,
            timestamp: None,
        }
    }

    fn ft(name: &str, secs: i64) -> SourceFile {
        SourceFile {
            name: name.into(),
            size: 1,
            timestamp: Some(Utc.timestamp_opt(secs, 0).unwrap()),
        }
    }

    #[test]
    fn base_name_edge_cases() {
        assert_eq!(base_name("photo.jpg"), "photo");
        assert_eq!(base_name("archive.tar.gz"), "archive.tar");
        assert_eq!(base_name("noext"), "noext");
        assert_eq!(base_name(".hidden"), ".hidden");
        assert_eq!(base_name("a."), "a");
    }

    #[test]
    fn natural_compare_is_numeric_aware() {
        assert_eq!(natural_cmp("photo2", "photo10"), Ordering::Less);
        assert_eq!(natural_cmp("photo10", "photo2"), Ordering::Greater);
        assert_eq!(natural_cmp("IMG_9", "img_10"), Ordering::Less);
        assert_eq!(natural_cmp("a", "b"), Ordering::Less);
        assert_eq!(natural_cmp("same", "same"), Ordering::Equal);
    }

    #[test]
    fn groups_jpeg_and_raw_siblings() {
        let files = vec![f("IMG_001.jpg"), f("IMG_001.cr2"), f("IMG_002.jpg")];
        let groups = group_files(&files, SortOrder::NameAsc);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].base_name, "IMG_001");
        assert_eq!(groups[0].members, vec!["IMG_001.cr2", "IMG_001.jpg"]);
        assert_eq!(groups[1].base_name, "IMG_002");
    }

    #[test]
    fn date_sort_uses_earliest_member_timestamp() {
        let files = vec![
            ft("b.jpg", 200),
            ft("b.cr2", 50), // earliest of group b
            ft("a.jpg", 100),
        ];
        let groups = group_files(&files, SortOrder::DateAsc);
        assert_eq!(groups[0].base_name, "b");
        assert_eq!(groups[1].base_name, "a");
    }

    #[test]
    fn size_desc_puts_largest_group_first() {
        let files = vec![f("x.jpg"), f("y.jpg"), f("y.cr2"), f("y.xmp")];
        let groups = group_files(&files, SortOrder::SizeDesc);
        assert_eq!(groups[0].base_name, "y");
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn size_desc_breaks_member_count_ties_by_bytes() {
        let sized = |name: &str, size: u64| SourceFile {
            name: name.into(),
            size,
            timestamp: None,
        };
        // Both groups have two members; "video" carries far more bytes.
        let files = vec![
            sized("photo.jpg", 4_000_000),
            sized("photo.cr2", 30_000_000),
            sized("video.mp4", 900_000_000),
            sized("video.xmp", 1_000),
        ];
        let groups = group_files(&files, SortOrder::SizeDesc);
        assert_eq!(groups[0].base_name, "video");
        assert_eq!(groups[1].base_name, "photo");
    }
}
