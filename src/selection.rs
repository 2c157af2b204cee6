//! Selection tracking over the mirrored tree.
//!
//! Files carry a `selected` flag; directories never do. A directory's
//! checkbox is a tri-state derived on demand from its descendant files, so
//! there is no stored state to drift out of sync. The externally visible
//! selection is always the sorted list of selected file rel-paths — sorted
//! ordering is what makes downstream digest output deterministic.

use std::collections::HashSet;

use crate::node::{FileNode, NodeKind, TriState};
use crate::progress::Bus;

/// Case-folded comparison with a raw tie-break: deterministic across
/// platforms, case-insensitive like a file picker.
pub fn compare_rel_paths(a: &str, b: &str) -> std::cmp::Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Single source of truth for which files are selected.
pub struct SelectionManager {
    bus: Bus,
}

impl SelectionManager {
    pub fn new(bus: Bus) -> Self {
        Self { bus }
    }

    /// Flips one file node's flag. No-op for non-file nodes.
    pub fn toggle_selection(&self, node: &mut FileNode) {
        if node.kind != NodeKind::File {
            return;
        }
        node.selected = !node.selected;
        self.notify();
    }

    /// Replaces the entire selection in one tree pass.
    ///
    /// A path in the set selects that file; a directory path implicitly
    /// selects every descendant file (the directory itself is never part of
    /// the stored selection). Idempotent: applying the same set twice yields
    /// identical flags.
    pub fn set_selection_by_rel_paths(&self, roots: &mut [FileNode], paths: &[String]) {
        let membership: HashSet<&str> = paths.iter().map(String::as_str).collect();
        for root in roots.iter_mut() {
            apply_selection(root, &membership, false);
        }
        self.notify();
    }

    pub fn select_all(&self, roots: &mut [FileNode]) {
        for root in roots.iter_mut() {
            root.walk_mut(&mut |node| {
                if node.kind == NodeKind::File {
                    node.selected = true;
                }
            });
        }
        self.notify();
    }

    pub fn clear_selection(&self, roots: &mut [FileNode]) {
        for root in roots.iter_mut() {
            root.walk_mut(&mut |node| node.selected = false);
        }
        self.notify();
    }

    /// Selected file nodes, sorted by rel-path. Files only.
    pub fn selected_files<'a>(&self, roots: &'a [FileNode]) -> Vec<&'a FileNode> {
        let mut files = Vec::new();
        for root in roots {
            collect_selected(root, &mut files);
        }
        files.sort_by(|a, b| compare_rel_paths(&a.rel_path, &b.rel_path));
        files
    }

    /// Sorted selected rel-paths; the digest layer's input.
    pub fn selected_rel_paths(&self, roots: &[FileNode]) -> Vec<String> {
        self.selected_files(roots)
            .into_iter()
            .map(|node| node.rel_path.clone())
            .collect()
    }

    fn notify(&self) {
        self.bus.tree_changed();
        self.bus.preview_changed();
    }
}

/// Derived checkbox state of a directory node.
pub fn tri_state(dir: &FileNode) -> TriState {
    let mut total = 0usize;
    let mut selected = 0usize;
    dir.walk(&mut |node| {
        if node.kind == NodeKind::File {
            total += 1;
            if node.selected {
                selected += 1;
            }
        }
    });
    if total == 0 || selected == 0 {
        TriState::Unchecked
    } else if selected == total {
        TriState::Checked
    } else {
        TriState::Indeterminate
    }
}

fn apply_selection(node: &mut FileNode, membership: &HashSet<&str>, ancestor_selected: bool) {
    let hit = membership.contains(node.rel_path.as_str());
    match node.kind {
        NodeKind::File => {
            node.selected = hit || ancestor_selected;
        }
        _ => {
            node.selected = false;
            let propagate = ancestor_selected || hit;
            for child in &mut node.children {
                apply_selection(child, membership, propagate);
            }
        }
    }
}

fn collect_selected<'a>(node: &'a FileNode, out: &mut Vec<&'a FileNode>) {
    if node.kind == NodeKind::File && node.selected {
        out.push(node);
    }
    for child in &node.children {
        collect_selected(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn file(rel: &str, depth: usize) -> FileNode {
        FileNode::new(PathBuf::from("/ws").join(rel), rel.into(), depth, NodeKind::File)
    }

    fn dir(rel: &str, depth: usize, children: Vec<FileNode>) -> FileNode {
        let mut node = FileNode::new(
            PathBuf::from("/ws").join(rel),
            rel.into(),
            depth,
            NodeKind::Directory,
        );
        node.children = children;
        node
    }

    /// src/{a.rs,b.rs}, docs/readme.md, root.txt
    fn tree() -> Vec<FileNode> {
        vec![
            dir("src", 1, vec![file("src/a.rs", 2), file("src/b.rs", 2)]),
            dir("docs", 1, vec![file("docs/readme.md", 2)]),
            file("root.txt", 1),
        ]
    }

    fn manager() -> SelectionManager {
        SelectionManager::new(Bus::new(8))
    }

    #[test]
    fn toggle_flips_file_only() {
        let manager = manager();
        let mut node = file("a.txt", 1);
        manager.toggle_selection(&mut node);
        assert!(node.selected);
        manager.toggle_selection(&mut node);
        assert!(!node.selected);

        let mut directory = dir("src", 1, vec![]);
        manager.toggle_selection(&mut directory);
        assert!(!directory.selected);
    }

    #[test]
    fn directory_path_selects_descendants_only() {
        let manager = manager();
        let mut roots = tree();
        manager.set_selection_by_rel_paths(&mut roots, &["src".to_string()]);

        let selected = manager.selected_rel_paths(&roots);
        assert_eq!(selected, vec!["src/a.rs".to_string(), "src/b.rs".to_string()]);
    }

    #[test]
    fn set_selection_is_idempotent() {
        let manager = manager();
        let mut roots = tree();
        let paths = vec!["src".to_string(), "root.txt".to_string()];

        manager.set_selection_by_rel_paths(&mut roots, &paths);
        let first = manager.selected_rel_paths(&roots);
        let first_flags: Vec<bool> = roots
            .iter()
            .flat_map(|root| {
                let mut flags = Vec::new();
                root.walk(&mut |node| flags.push(node.selected));
                flags
            })
            .collect();

        manager.set_selection_by_rel_paths(&mut roots, &paths);
        let second = manager.selected_rel_paths(&roots);
        let second_flags: Vec<bool> = roots
            .iter()
            .flat_map(|root| {
                let mut flags = Vec::new();
                root.walk(&mut |node| flags.push(node.selected));
                flags
            })
            .collect();

        assert_eq!(first, second);
        assert_eq!(first_flags, second_flags);
    }

    #[test]
    fn replacing_selection_clears_previous() {
        let manager = manager();
        let mut roots = tree();
        manager.set_selection_by_rel_paths(&mut roots, &["src/a.rs".to_string()]);
        manager.set_selection_by_rel_paths(&mut roots, &["root.txt".to_string()]);

        assert_eq!(manager.selected_rel_paths(&roots), vec!["root.txt".to_string()]);
    }

    #[test]
    fn select_all_and_clear() {
        let manager = manager();
        let mut roots = tree();
        manager.select_all(&mut roots);
        assert_eq!(manager.selected_rel_paths(&roots).len(), 4);

        manager.clear_selection(&mut roots);
        assert!(manager.selected_rel_paths(&roots).is_empty());
    }

    #[test]
    fn selected_files_sorted_case_insensitively() {
        let manager = manager();
        let mut roots = vec![file("Zeta.txt", 1), file("alpha.txt", 1), file("Beta.txt", 1)];
        manager.select_all(&mut roots);

        let selected = manager.selected_rel_paths(&roots);
        assert_eq!(
            selected,
            vec![
                "alpha.txt".to_string(),
                "Beta.txt".to_string(),
                "Zeta.txt".to_string(),
            ]
        );
    }

    #[test]
    fn tri_state_derivation() {
        let mut subtree = dir("src", 1, vec![file("src/a.rs", 2), file("src/b.rs", 2)]);
        assert_eq!(tri_state(&subtree), TriState::Unchecked);

        subtree.children[0].selected = true;
        assert_eq!(tri_state(&subtree), TriState::Indeterminate);

        subtree.children[1].selected = true;
        assert_eq!(tri_state(&subtree), TriState::Checked);
    }

    #[test]
    fn empty_directory_is_unchecked() {
        let subtree = dir("empty", 1, vec![]);
        assert_eq!(tri_state(&subtree), TriState::Unchecked);
    }

    #[test]
    fn sibling_files_untouched_by_directory_selection() {
        let manager = manager();
        let mut roots = tree();
        manager.set_selection_by_rel_paths(&mut roots, &["docs".to_string()]);

        let selected = manager.selected_rel_paths(&roots);
        assert_eq!(selected, vec!["docs/readme.md".to_string()]);
    }
}
