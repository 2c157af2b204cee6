//! Which directories are open in the presentation layer.

use fnv::FnvHashSet;

use crate::node::{FileNode, NodeKind};
use crate::progress::Bus;

/// `expand_all` opens at most this many levels; full-depth expansion of a
/// huge tree is pathological for any renderer.
pub const MAX_EXPAND_DEPTH: usize = 3;

/// Set of expanded directory rel-paths.
pub struct ExpandState {
    expanded: FnvHashSet<String>,
    bus: Bus,
}

impl ExpandState {
    pub fn new(bus: Bus) -> Self {
        Self {
            expanded: FnvHashSet::default(),
            bus,
        }
    }

    pub fn is_expanded(&self, rel_path: &str) -> bool {
        self.expanded.contains(rel_path)
    }

    pub fn toggle(&mut self, rel_path: &str) {
        if !self.expanded.remove(rel_path) {
            self.expanded.insert(rel_path.to_string());
        }
        self.notify();
    }

    pub fn expand(&mut self, rel_path: &str) {
        if self.expanded.insert(rel_path.to_string()) {
            self.notify();
        }
    }

    /// Expands every directory down to [`MAX_EXPAND_DEPTH`].
    pub fn expand_all(&mut self, roots: &[FileNode]) {
        for root in roots {
            root.walk(&mut |node| {
                if matches!(node.kind, NodeKind::Directory | NodeKind::VirtualGroup)
                    && node.depth <= MAX_EXPAND_DEPTH
                {
                    self.expanded.insert(node.rel_path.clone());
                }
            });
        }
        self.notify();
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
        self.notify();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    fn notify(&self) {
        self.bus.tree_changed();
        self.bus.preview_changed();
    }
}
