//! Re-admission of ignore-negated paths after the main walk.
//!
//! A negation like `!build/keep.txt` can only re-admit a file the walk
//! actually visited. When the walk pruned `build/` structurally (for example
//! an exclude pattern, or an ignored ancestor with no reaching negation at
//! that level), the negated file never got a chance. This pass re-examines
//! every literal negation, and for targets that exist on disk but are absent
//! from the tree it synthesizes the minimal chain of directory nodes needed
//! to attach them.

use std::collections::HashSet;
use std::fs::Metadata;
use std::path::Path;

use crate::gitignore::NegationPattern;
use crate::node::{join_rel, rel_path_of, FileNode, NodeKind};
use crate::stats::TraversalStats;

pub(crate) async fn readmit_negated_paths(
    root: &Path,
    nodes: &mut Vec<FileNode>,
    negations: &[NegationPattern],
    stats: &mut TraversalStats,
) {
    if negations.is_empty() {
        return;
    }

    let mut present: HashSet<String> = HashSet::new();
    for node in nodes.iter() {
        node.walk(&mut |n| {
            present.insert(n.rel_path.clone());
        });
    }

    for negation in negations {
        let Some(target) = negation.target_path() else {
            continue;
        };
        let Some(rel) = rel_path_of(root, &target) else {
            continue;
        };
        if rel.is_empty() || present.contains(&rel) {
            continue;
        }
        let metadata = match tokio::fs::symlink_metadata(&target).await {
            Ok(metadata) => metadata,
            Err(_) => continue,
        };
        log::debug!("re-admitting negated path {rel}");
        insert_chain(root, nodes, &rel, &metadata, &mut present);
        if metadata.is_file() {
            stats.total_files += 1;
            stats.total_size += metadata.len();
        }
    }
}

/// Walks down from the top level creating any missing directory links, then
/// attaches the target node itself. Children stay name-sorted.
fn insert_chain(
    root: &Path,
    nodes: &mut Vec<FileNode>,
    rel: &str,
    metadata: &Metadata,
    present: &mut HashSet<String>,
) {
    let components: Vec<&str> = rel.split('/').collect();
    let mut children = nodes;
    let mut prefix = String::new();

    for (index, component) in components.iter().enumerate() {
        let child_rel = join_rel(&prefix, component);
        let depth = index + 1;
        let is_last = index == components.len() - 1;

        let position = match children.iter().position(|c| c.rel_path == child_rel) {
            Some(position) => position,
            None => {
                let kind = if is_last && !metadata.is_dir() {
                    NodeKind::File
                } else {
                    NodeKind::Directory
                };
                let abs = root.join(child_rel.replace('/', std::path::MAIN_SEPARATOR_STR));
                let mut node = FileNode::new(abs, child_rel.clone(), depth, kind);
                if is_last {
                    node.size = if metadata.is_file() { metadata.len() } else { 0 };
                    node.mtime = metadata.modified().ok();
                }
                present.insert(child_rel.clone());
                let insert_at = children
                    .iter()
                    .position(|c| c.name.as_str() > *component)
                    .unwrap_or(children.len());
                children.insert(insert_at, node);
                insert_at
            }
        };
        children = &mut children[position].children;
        prefix = child_rel;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, File};
    use std::io::Write;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn negation(scope: &Path, raw: &str) -> NegationPattern {
        NegationPattern {
            scope: scope.to_path_buf(),
            raw: raw.to_string(),
        }
    }

    fn find<'a>(nodes: &'a [FileNode], rel: &str) -> Option<&'a FileNode> {
        for node in nodes {
            if node.rel_path == rel {
                return Some(node);
            }
            if let Some(found) = find(&node.children, rel) {
                return Some(found);
            }
        }
        None
    }

    #[tokio::test]
    async fn synthesizes_chain_for_pruned_negated_file() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("build/nested")).unwrap();
        let mut file = File::create(temp.path().join("build/nested/keep.txt")).unwrap();
        file.write_all(b"keep").unwrap();

        // The walk pruned build/ entirely: the tree starts empty.
        let mut nodes: Vec<FileNode> = Vec::new();
        let mut stats = TraversalStats::new();
        let negations = vec![negation(temp.path(), "!build/nested/keep.txt")];

        readmit_negated_paths(temp.path(), &mut nodes, &negations, &mut stats).await;

        let build = find(&nodes, "build").expect("build dir synthesized");
        assert_eq!(build.kind, NodeKind::Directory);
        assert_eq!(build.depth, 1);
        let keep = find(&nodes, "build/nested/keep.txt").expect("negated file attached");
        assert_eq!(keep.kind, NodeKind::File);
        assert_eq!(keep.depth, 3);
        assert_eq!(keep.size, 4);
        assert_eq!(stats.total_files, 1);
    }

    #[tokio::test]
    async fn existing_paths_left_alone() {
        let temp = TempDir::new().unwrap();
        let mut file = File::create(temp.path().join("keep.txt")).unwrap();
        file.write_all(b"k").unwrap();

        let mut nodes = vec![FileNode::new(
            temp.path().join("keep.txt"),
            "keep.txt".into(),
            1,
            NodeKind::File,
        )];
        let mut stats = TraversalStats::new();
        let negations = vec![negation(temp.path(), "!keep.txt")];

        readmit_negated_paths(temp.path(), &mut nodes, &negations, &mut stats).await;

        assert_eq!(nodes.len(), 1);
        assert_eq!(stats.total_files, 0);
    }

    #[tokio::test]
    async fn missing_target_is_skipped() {
        let temp = TempDir::new().unwrap();
        let mut nodes: Vec<FileNode> = Vec::new();
        let mut stats = TraversalStats::new();
        let negations = vec![negation(temp.path(), "!does/not/exist.txt")];

        readmit_negated_paths(temp.path(), &mut nodes, &negations, &mut stats).await;
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn glob_negations_are_not_readmission_candidates() {
        let temp = TempDir::new().unwrap();
        let mut nodes: Vec<FileNode> = Vec::new();
        let mut stats = TraversalStats::new();
        let negations = vec![negation(temp.path(), "!**/*.md")];

        readmit_negated_paths(temp.path(), &mut nodes, &negations, &mut stats).await;
        assert!(nodes.is_empty());
    }

    #[tokio::test]
    async fn chain_inserted_in_sorted_position() {
        let temp = TempDir::new().unwrap();
        let mut file = File::create(temp.path().join("bbb.txt")).unwrap();
        file.write_all(b"b").unwrap();

        let mut nodes = vec![
            FileNode::new(PathBuf::from("/x/aaa"), "aaa".into(), 1, NodeKind::Directory),
            FileNode::new(PathBuf::from("/x/zzz"), "zzz".into(), 1, NodeKind::Directory),
        ];
        let mut stats = TraversalStats::new();
        let negations = vec![negation(temp.path(), "!bbb.txt")];

        readmit_negated_paths(temp.path(), &mut nodes, &negations, &mut stats).await;

        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["aaa", "bbb.txt", "zzz"]);
    }
}
