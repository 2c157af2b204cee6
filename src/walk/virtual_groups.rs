//! Virtual-folder extraction.
//!
//! A virtual folder is a named glob list ("Docs" -> `**/*.md`). Files
//! matching a group's globs are pulled out of their tree position and
//! re-homed as depth-1 children of a synthetic top-level `VirtualGroup`
//! node. A file lands in at most one group; group order follows the
//! configured map order, and group nodes precede the regular tree.
//!
//! Extracted files keep their original `rel_path` so selection keys stay
//! stable across re-grouping.

use std::collections::BTreeMap;
use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::node::{FileNode, NodeKind};

pub(crate) fn extract_virtual_groups(
    root: &Path,
    nodes: &mut Vec<FileNode>,
    groups: &BTreeMap<String, Vec<String>>,
) {
    if groups.is_empty() {
        return;
    }

    let mut group_nodes = Vec::new();
    for (name, patterns) in groups {
        let Some(set) = compile(patterns) else {
            continue;
        };
        let mut extracted = Vec::new();
        drain_matching(nodes, &set, &mut extracted);
        if extracted.is_empty() {
            continue;
        }
        for file in &mut extracted {
            file.depth = 1;
        }
        let mut group = FileNode::new(root.to_path_buf(), name.clone(), 0, NodeKind::VirtualGroup);
        group.name = name.clone();
        group.rel_path = name.clone();
        group.children = extracted;
        group_nodes.push(group);
    }

    for group in group_nodes.into_iter().rev() {
        nodes.insert(0, group);
    }
}

fn compile(patterns: &[String]) -> Option<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    let mut any = false;
    for pattern in patterns {
        match Glob::new(pattern) {
            Ok(glob) => {
                builder.add(glob);
                any = true;
            }
            Err(error) => log::debug!("dropping malformed virtual-folder glob {pattern:?}: {error}"),
        }
    }
    if !any {
        return None;
    }
    builder.build().ok()
}

/// Removes matching file nodes from the forest, depth-first.
fn drain_matching(nodes: &mut Vec<FileNode>, set: &GlobSet, out: &mut Vec<FileNode>) {
    let mut index = 0;
    while index < nodes.len() {
        if nodes[index].kind == NodeKind::File && set.is_match(&nodes[index].rel_path) {
            out.push(nodes.remove(index));
        } else {
            drain_matching(&mut nodes[index].children, set, out);
            index += 1;
        }
    }
}
