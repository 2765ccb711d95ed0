#![forbid(unsafe_code)]

//! Node sets for document-subset canonicalization and transforms.
//!
//! A `NodeSet` identifies a subset of a parsed document's nodes.  The
//! enveloped-signature transform subtracts a Signature subtree from it;
//! the canonicalizers consult it to decide node visibility.

use std::collections::HashSet;

/// A set of document nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<usize>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// All nodes of the document except comments.
    ///
    /// Per the W3C DSig spec, `URI=""` selects the document without
    /// comments.
    pub fn all_without_comments(doc: &roxmltree::Document<'_>) -> Self {
        let nodes = doc
            .descendants()
            .filter(|n| !n.is_comment())
            .map(node_index)
            .collect();
        Self { nodes }
    }

    /// The subtree rooted at `root`, excluding comment nodes.
    pub fn tree_without_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, false);
        Self { nodes }
    }

    /// The subtree rooted at `root`, including comment nodes.
    pub fn tree_with_comments(root: roxmltree::Node<'_, '_>) -> Self {
        let mut nodes = HashSet::new();
        collect_subtree(root, &mut nodes, true);
        Self { nodes }
    }

    /// Check whether a node is in the set.
    pub fn contains(&self, node: &roxmltree::Node<'_, '_>) -> bool {
        self.nodes.contains(&node_index(*node))
    }

    /// Remove a node and all of its descendants.
    pub fn remove_subtree(&mut self, node: roxmltree::Node<'_, '_>) {
        self.nodes.remove(&node_index(node));
        for child in node.children() {
            self.remove_subtree(child);
        }
    }

    /// Number of nodes in the set.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn collect_subtree(
    node: roxmltree::Node<'_, '_>,
    set: &mut HashSet<usize>,
    include_comments: bool,
) {
    if !include_comments && node.is_comment() {
        return;
    }
    set.insert(node_index(node));
    for child in node.children() {
        collect_subtree(child, set, include_comments);
    }
}

/// A stable numeric index for a node.
///
/// `roxmltree::NodeId` keeps its arena index private; its `Debug`
/// representation (`NodeId(N)`) exposes it without unsafe code.
pub fn node_index(node: roxmltree::Node<'_, '_>) -> usize {
    let debug = format!("{:?}", node.id());
    debug
        .strip_prefix("NodeId(")
        .and_then(|s| s.strip_suffix(')'))
        .and_then(|s| s.parse().ok())
        .unwrap_or(0)
}
