//! The in-memory tree model.
//!
//! A scan produces a forest of [`FileNode`]s rooted at the workspace root
//! (depth 0 is the root itself; its children sit at depth 1). Each node owns
//! its children exclusively, so the tree is a strict hierarchy with no shared
//! ownership and no cycles. `rel_path` is the stable external key: POSIX
//! slash-separated, relative to the scan root, unique within a snapshot.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// What a node is. Closed variant; behavior that branches on node identity
/// matches this exhaustively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    File,
    Directory,
    Symlink,
    /// A synthetic top-level group collecting files matched by a
    /// virtual-folder glob list.
    VirtualGroup,
    Placeholder(PlaceholderKind),
}

/// Structural placeholders handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceholderKind {
    /// Hydration of the parent directory is in flight.
    Loading,
    /// More entries exist beyond the current page.
    LoadMore {
        parent: PathBuf,
        next_index: usize,
        page_size: usize,
    },
    Welcome,
    Scanning,
}

/// Tri-state checkbox of a directory, derived from its descendant files.
/// Never stored on the node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriState {
    Unchecked,
    Checked,
    Indeterminate,
}

/// One filesystem entry in the mirrored tree.
#[derive(Debug, Clone)]
pub struct FileNode {
    /// Absolute location; the node's owning identity on disk.
    pub path: PathBuf,
    /// Root-relative, slash-separated key.
    pub rel_path: String,
    pub name: String,
    /// Root = 0; strictly `parent.depth + 1`.
    pub depth: usize,
    pub size: u64,
    pub mtime: Option<SystemTime>,
    pub kind: NodeKind,
    /// Meaningful only for `NodeKind::File`.
    pub selected: bool,
    /// Present for Directory/VirtualGroup nodes; exclusively owned.
    pub children: Vec<FileNode>,
}

impl FileNode {
    pub fn new(path: PathBuf, rel_path: String, depth: usize, kind: NodeKind) -> Self {
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.to_string_lossy().into_owned());
        Self {
            path,
            rel_path,
            name,
            depth,
            size: 0,
            mtime: None,
            kind,
            selected: false,
            children: Vec::new(),
        }
    }

    /// A placeholder node attached under `parent_rel`.
    pub fn placeholder(parent_rel: &str, depth: usize, kind: PlaceholderKind) -> Self {
        let label = match &kind {
            PlaceholderKind::Loading => "Loading...",
            PlaceholderKind::LoadMore { .. } => "Load more...",
            PlaceholderKind::Welcome => "Welcome",
            PlaceholderKind::Scanning => "Scanning...",
        };
        let rel_path = if parent_rel.is_empty() {
            label.to_string()
        } else {
            format!("{parent_rel}/{label}")
        };
        Self {
            path: PathBuf::new(),
            rel_path,
            name: label.to_string(),
            depth,
            size: 0,
            mtime: None,
            kind: NodeKind::Placeholder(kind),
            selected: false,
            children: Vec::new(),
        }
    }

    #[inline]
    pub fn is_file(&self) -> bool {
        self.kind == NodeKind::File
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        matches!(self.kind, NodeKind::Directory | NodeKind::VirtualGroup)
    }

    /// Depth-first preorder visit over this node and its descendants.
    pub fn walk(&self, visit: &mut impl FnMut(&FileNode)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }

    /// Mutable depth-first preorder visit.
    pub fn walk_mut(&mut self, visit: &mut impl FnMut(&mut FileNode)) {
        visit(self);
        for child in &mut self.children {
            child.walk_mut(visit);
        }
    }
}

/// Joins a parent rel-path and a name into the child's rel-path.
pub fn join_rel(parent_rel: &str, name: &str) -> String {
    if parent_rel.is_empty() {
        name.to_string()
    } else {
        format!("{parent_rel}/{name}")
    }
}

/// Computes a slash-separated rel-path from the root to `abs`, or `None` if
/// `abs` is outside the root.
pub fn rel_path_of(root: &Path, abs: &Path) -> Option<String> {
    let stripped = abs.strip_prefix(root).ok()?;
    let mut rel = String::new();
    for component in stripped.components() {
        if !rel.is_empty() {
            rel.push('/');
        }
        rel.push_str(&component.as_os_str().to_string_lossy());
    }
    Some(rel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rel_path_is_slash_separated() {
        let root = Path::new("/ws");
        let abs = Path::new("/ws/a/b/c.txt");
        assert_eq!(rel_path_of(root, abs).unwrap(), "a/b/c.txt");
    }

    #[test]
    fn rel_path_outside_root_is_none() {
        assert!(rel_path_of(Path::new("/ws"), Path::new("/other/x")).is_none());
    }

    #[test]
    fn join_rel_handles_root_parent() {
        assert_eq!(join_rel("", "a.txt"), "a.txt");
        assert_eq!(join_rel("src", "a.txt"), "src/a.txt");
    }

    #[test]
    fn walk_visits_preorder() {
        let mut root = FileNode::new(PathBuf::from("/ws"), String::new(), 0, NodeKind::Directory);
        let mut dir = FileNode::new(
            PathBuf::from("/ws/src"),
            "src".into(),
            1,
            NodeKind::Directory,
        );
        dir.children.push(FileNode::new(
            PathBuf::from("/ws/src/a.rs"),
            "src/a.rs".into(),
            2,
            NodeKind::File,
        ));
        root.children.push(dir);

        let mut seen = Vec::new();
        root.walk(&mut |node| seen.push(node.rel_path.clone()));
        assert_eq!(seen, vec!["", "src", "src/a.rs"]);
    }
}
