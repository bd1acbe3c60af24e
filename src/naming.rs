//! Operation builder: deterministic batch-folder naming and expansion of a
//! plan into per-file operations. Pure string/path work, no I/O.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::errors::EngineError;
use crate::planner::BatchPlan;

/// Folder-name pattern used when the caller supplies none.
pub const DEFAULT_PATTERN: &str = "Batch_{count}";

/// One file operation, consumed exactly once by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub file_name: String,
    pub source_path: PathBuf,
    pub destination_path: PathBuf,
    pub batch_index: usize,
}

/// Per-batch summary reported in results and persisted in progress records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub folder: String,
    pub file_count: usize,
}

const ILLEGAL_PATTERN_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reject patterns that cannot become a folder name. Checked before any I/O.
pub fn validate_pattern(pattern: &str) -> Result<(), EngineError> {
    if let Some(c) = pattern.chars().find(|c| ILLEGAL_PATTERN_CHARS.contains(c)) {
        return Err(EngineError::InvalidPattern(c));
    }
    Ok(())
}

/// Folder name for batch `index` (0-based) of `total`.
///
/// `{count}` is zero-padded to `max(3, digits(total))`; `{date}`, `{year}`
/// and `{month}` come from `when`. A pattern without `{count}` gets it
/// appended so folder names stay unique.
pub fn folder_name(
    pattern: Option<&str>,
    index: usize,
    total: usize,
    when: NaiveDate,
) -> Result<String, EngineError> {
    let base = match pattern.map(str::trim) {
        Some(p) if !p.is_empty() => p,
        _ => DEFAULT_PATTERN,
    };
    validate_pattern(base)?;

    let mut expanded = if base.contains("{count}") {
        base.to_string()
    } else {
        format!("{base}_{{count}}")
    };

    let width = digits(total).max(3);
    let count = format!("{:0width$}", index + 1, width = width);
    expanded = expanded.replace("{count}", &count);
    expanded = expanded.replace("{date}", &when.format("%Y-%m-%d").to_string());
    expanded = expanded.replace("{year}", &when.format("%Y").to_string());
    expanded = expanded.replace("{month}", &when.format("%m").to_string());
    Ok(expanded)
}

fn digits(mut n: usize) -> usize {
    let mut d = 1;
    while n >= 10 {
        n /= 10;
        d += 1;
    }
    d
}

/// Expand a plan into concrete operations plus per-batch summaries.
/// Same inputs always produce the same output.
pub fn build_operations(
    plan: &BatchPlan,
    source_dir: &Path,
    output_dir: &Path,
    pattern: Option<&str>,
    when: NaiveDate,
) -> Result<(Vec<Operation>, Vec<BatchSummary>), EngineError> {
    let total = plan.batches.len();
    let mut operations = Vec::with_capacity(plan.total_files);
    let mut summaries = Vec::with_capacity(total);

    for (i, batch) in plan.batches.iter().enumerate() {
        let folder = folder_name(pattern, i, total, when)?;
        let dest_dir = output_dir.join(&folder);
        for group in &batch.groups {
            for member in &group.members {
                operations.push(Operation {
                    file_name: member.clone(),
                    source_path: source_dir.join(member),
                    destination_path: dest_dir.join(member),
                    batch_index: batch.index,
                });
            }
        }
        summaries.push(BatchSummary {
            folder,
            file_count: batch.file_count,
        });
    }

    Ok((operations, summaries))
}
