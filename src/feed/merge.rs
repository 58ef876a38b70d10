// src/feed/merge.rs
use std::collections::HashSet;

use crate::feed::types::ResultItem;

/// Number of items a session keeps.
pub const DEFAULT_CAPACITY: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeStats {
    /// Fetched items that were not held before (now flagged `is_new`).
    pub added: usize,
    /// Fetched items skipped because their id was already held or repeated in the batch.
    pub duplicates: usize,
    /// Items cut off by the capacity bound.
    pub truncated: usize,
}

/// Merge a freshly fetched batch into the held list.
///
/// New unique items go first in fetch order, previously held items follow in
/// their prior order with `is_new` cleared, and the result is cut to `capacity`.
pub fn merge_results(
    held: Vec<ResultItem>,
    fetched: Vec<ResultItem>,
    capacity: usize,
) -> (Vec<ResultItem>, MergeStats) {
    let mut stats = MergeStats::default();

    let held: Vec<ResultItem> = held
        .into_iter()
        .map(|mut r| {
            r.is_new = false;
            r
        })
        .collect();

    let mut seen: HashSet<String> = held.iter().map(|r| r.id.clone()).collect();

    let mut merged = Vec::with_capacity(fetched.len() + held.len());
    for mut item in fetched {
        if !seen.insert(item.id.clone()) {
            stats.duplicates += 1;
            continue;
        }
        item.is_new = true;
        merged.push(item);
    }
    stats.added = merged.len();

    merged.extend(held);
    if merged.len() > capacity {
        stats.truncated = merged.len() - capacity;
        merged.truncate(capacity);
    }

    (merged, stats)
}
