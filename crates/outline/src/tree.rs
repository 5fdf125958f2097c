use crate::types::PathTreeNode;
use std::collections::BTreeMap;

#[derive(Default)]
struct Trie {
    /// A path ends at this segment
    is_file: bool,
    children: BTreeMap<String, Trie>,
}

/// Build the directory tree implied by a set of `/`-separated paths.
///
/// Empty segments are ignored. Each level lists directories before files,
/// both sorted by name, so the result depends only on the set of paths.
/// A segment that is both a file and a directory prefix yields both nodes.
pub fn build_tree<I, S>(paths: I) -> Vec<PathTreeNode>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut root = Trie::default();
    for path in paths {
        let mut node = &mut root;
        let mut segments = path.as_ref().split('/').filter(|s| !s.is_empty()).peekable();
        while let Some(segment) = segments.next() {
            node = node.children.entry(segment.to_string()).or_default();
            if segments.peek().is_none() {
                node.is_file = true;
            }
        }
    }
    flatten(&root, "")
}

fn flatten(level: &Trie, prefix: &str) -> Vec<PathTreeNode> {
    let mut directories = Vec::new();
    let mut files = Vec::new();
    for (name, node) in &level.children {
        let path = if prefix.is_empty() {
            name.clone()
        } else {
            format!("{prefix}/{name}")
        };
        if !node.children.is_empty() {
            directories.push(PathTreeNode::Directory {
                name: name.clone(),
                path: path.clone(),
                children: flatten(node, &path),
            });
        }
        if node.is_file {
            files.push(PathTreeNode::File {
                name: name.clone(),
                path,
            });
        }
    }
    directories.extend(files);
    directories
}
