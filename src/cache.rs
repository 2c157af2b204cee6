//! Memo of hydrated directory children.
//!
//! Keyed by absolute path and populated by every successful hydration, so a
//! UI re-expanding a previously visited directory never re-lists it. Not an
//! LRU: the map is bounded by the number of directories actually visited and
//! is cleared only on disposal, never evicted behind the caller's back.

use std::path::{Path, PathBuf};

use fnv::FnvHashMap;
use parking_lot::Mutex;

use crate::node::FileNode;

#[derive(Default)]
pub struct DirectoryCache {
    entries: Mutex<FnvHashMap<PathBuf, Vec<FileNode>>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, dir: &Path) -> Option<Vec<FileNode>> {
        self.entries.lock().get(dir).cloned()
    }

    pub fn set(&self, dir: PathBuf, children: Vec<FileNode>) {
        self.entries.lock().insert(dir, children);
    }

    pub fn contains(&self, dir: &Path) -> bool {
        self.entries.lock().contains_key(dir)
    }

    /// Drops one directory's memo, e.g. after its subtree was rescanned.
    pub fn invalidate(&self, dir: &Path) {
        self.entries.lock().remove(dir);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Full clear; only called on disposal or before a fresh root scan.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn node(rel: &str) -> FileNode {
        FileNode::new(PathBuf::from("/ws").join(rel), rel.into(), 1, NodeKind::File)
    }

    #[test]
    fn set_then_get_round_trips() {
        let cache = DirectoryCache::new();
        let dir = PathBuf::from("/ws/src");
        cache.set(dir.clone(), vec![node("src/a.rs")]);

        let children = cache.get(&dir).unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(children[0].rel_path, "src/a.rs");
    }

    #[test]
    fn get_unknown_dir_is_none() {
        let cache = DirectoryCache::new();
        assert!(cache.get(Path::new("/ws/never")).is_none());
    }

    #[test]
    fn invalidate_removes_single_entry() {
        let cache = DirectoryCache::new();
        cache.set(PathBuf::from("/ws/a"), vec![]);
        cache.set(PathBuf::from("/ws/b"), vec![]);

        cache.invalidate(Path::new("/ws/a"));
        assert!(!cache.contains(Path::new("/ws/a")));
        assert!(cache.contains(Path::new("/ws/b")));
    }

    #[test]
    fn clear_empties_everything() {
        let cache = DirectoryCache::new();
        cache.set(PathBuf::from("/ws/a"), vec![]);
        cache.clear();
        assert!(cache.is_empty());
    }
}
