//! File-tree view (§4.10): groups passage ids into a directory trie over
//! `passage.file_path`. Adapted from the teacher's `tree.rs`, which grouped
//! sync state (indexed/modified/new/deleted) per file instead of passage
//! ids — there's no watcher here, so there's no sync state to track.

use serde::Serialize;

use crate::store::{Passage, PassageId};

/// A node in the file tree (either a directory or a file).
#[derive(Debug, Clone, Serialize)]
pub struct FileTreeNode {
    pub name: String,
    pub path: String,
    pub is_dir: bool,
    /// Ids of every passage at or beneath this node, in file/ordinal order.
    pub passage_ids: Vec<PassageId>,
    pub children: Vec<FileTreeNode>,
}

/// Complete file tree with summary counts.
#[derive(Debug, Clone, Serialize)]
pub struct FileTree {
    pub root: FileTreeNode,
    pub total_files: usize,
    pub total_passages: usize,
}

/// Build a hierarchical tree from the corpus's passages, grouping by
/// `file_path` and aggregating passage ids up through directory nodes.
pub fn build_tree(passages: &[Passage]) -> FileTree {
    let mut by_file: std::collections::BTreeMap<&str, Vec<PassageId>> = std::collections::BTreeMap::new();
    for p in passages {
        by_file.entry(p.file_path.as_str()).or_default().push(p.id);
    }
    for ids in by_file.values_mut() {
        ids.sort_unstable();
    }

    let mut root = FileTreeNode {
        name: ".".to_string(),
        path: ".".to_string(),
        is_dir: true,
        passage_ids: Vec::new(),
        children: Vec::new(),
    };

    for (path, ids) in &by_file {
        insert_file(&mut root, path, ids);
    }

    sort_and_aggregate(&mut root);

    FileTree {
        total_files: by_file.len(),
        total_passages: passages.len(),
        root,
    }
}

fn insert_file(root: &mut FileTreeNode, path: &str, ids: &[PassageId]) {
    let parts: Vec<&str> = path.split('/').collect();
    let mut current = root;

    for (i, part) in parts.iter().enumerate() {
        let is_last = i == parts.len() - 1;

        if is_last {
            current.children.push(FileTreeNode {
                name: part.to_string(),
                path: path.to_string(),
                is_dir: false,
                passage_ids: ids.to_vec(),
                children: Vec::new(),
            });
        } else {
            let dir_path = parts[..=i].join("/");
            let pos = current.children.iter().position(|c| c.is_dir && c.name == *part);

            current = if let Some(pos) = pos {
                &mut current.children[pos]
            } else {
                current.children.push(FileTreeNode {
                    name: part.to_string(),
                    path: dir_path,
                    is_dir: true,
                    passage_ids: Vec::new(),
                    children: Vec::new(),
                });
                let last = current.children.len() - 1;
                &mut current.children[last]
            };
        }
    }
}

/// Sort children (directories first, then alphabetical within each group)
/// and fill each directory's `passage_ids` with the union of its children's,
/// sorted ascending. Recurses bottom-up so aggregation sees final children.
fn sort_and_aggregate(node: &mut FileTreeNode) -> Vec<PassageId> {
    node.children.sort_by(|a, b| match (a.is_dir, b.is_dir) {
        (true, false) => std::cmp::Ordering::Less,
        (false, true) => std::cmp::Ordering::Greater,
        _ => a.name.cmp(&b.name),
    });

    if node.is_dir {
        let mut aggregated = Vec::new();
        for child in &mut node.children {
            aggregated.extend(sort_and_aggregate(child));
        }
        aggregated.sort_unstable();
        node.passage_ids = aggregated;
    }

    node.passage_ids.clone()
}
