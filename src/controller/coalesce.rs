//! Minimal-cover reduction of changed directory sets.
//!
//! When the backlog holds both a directory and its descendants, hydrating
//! the ancestor covers the children; draining them separately is wasted
//! I/O. The reduction sorts shallow-first and keeps a path only when no
//! ancestor was already kept, giving the smallest set whose hydrations
//! cover every change. O(n log n + n * depth).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub(crate) fn minimal_cover(paths: impl IntoIterator<Item = PathBuf>) -> Vec<PathBuf> {
    let mut candidates: Vec<(usize, PathBuf)> = paths
        .into_iter()
        .map(|path| (path.components().count(), path))
        .collect();
    if candidates.len() <= 1 {
        return candidates.into_iter().map(|(_, path)| path).collect();
    }

    // Shallowest ancestors first; path order breaks ties for determinism.
    candidates.sort_unstable_by(|(depth_a, path_a), (depth_b, path_b)| {
        depth_a.cmp(depth_b).then_with(|| path_a.cmp(path_b))
    });
    candidates.dedup_by(|(_, a), (_, b)| a == b);

    let mut kept = Vec::with_capacity(candidates.len());
    let mut kept_set: HashSet<PathBuf> = HashSet::with_capacity(candidates.len());
    for (_, path) in candidates {
        if has_kept_ancestor(&path, &kept_set) {
            continue;
        }
        kept_set.insert(path.clone());
        kept.push(path);
    }
    kept
}

fn has_kept_ancestor(path: &Path, kept: &HashSet<PathBuf>) -> bool {
    if kept.is_empty() {
        return false;
    }
    let mut ancestor = path.to_path_buf();
    while ancestor.pop() {
        if kept.contains(&ancestor) {
            return true;
        }
    }
    false
}
