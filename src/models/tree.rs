//! Arena-backed BOM tree.
//!
//! Nodes live in a `Vec` and refer to each other by [`NodeId`]. Child lists
//! are kept alongside, in insertion order, so rendering is deterministic.
//! Path queries walk parent links on demand rather than tracking a
//! "products on the current path" set during construction.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{BomNode, NodeId, ProductId};

/// A rooted BOM tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BomTree {
    nodes: Vec<BomNode>,
    children: Vec<Vec<NodeId>>,
    root: NodeId,
}

impl BomTree {
    /// Creates a tree holding only `root`.
    pub fn new(mut root: BomNode) -> Self {
        root.parent = None;
        root.parent_operation_id = None;
        root.depth = 0;
        Self {
            nodes: vec![root],
            children: vec![Vec::new()],
            root: NodeId(0),
        }
    }

    /// Rebuilds a tree from a flat node list without checking it.
    ///
    /// Child lists are derived from the nodes' parent links; parent links
    /// pointing outside the list are ignored. The root is the first node
    /// without a parent (or the first node if every node has one). Run
    /// [`validate_tree`](crate::validation::validate_tree) on the result.
    pub fn from_nodes(nodes: Vec<BomNode>) -> Self {
        let mut children = vec![Vec::new(); nodes.len()];
        for (idx, node) in nodes.iter().enumerate() {
            if let Some(parent) = node.parent {
                if let Some(list) = children.get_mut(parent.0) {
                    list.push(NodeId(idx));
                }
            }
        }
        let root = nodes
            .iter()
            .position(BomNode::is_root)
            .map(NodeId)
            .unwrap_or(NodeId(0));
        Self {
            nodes,
            children,
            root,
        }
    }

    /// Adds `node` as the last child of `parent`.
    ///
    /// # Panics
    /// Panics if `parent` is not a node of this tree.
    pub fn add_child(&mut self, parent: NodeId, mut node: BomNode) -> NodeId {
        let parent_node = &self.nodes[parent.0];
        node.parent = Some(parent);
        node.parent_operation_id = Some(parent_node.operation_id);
        node.depth = parent_node.depth + 1;

        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        self.children.push(Vec::new());
        self.children[parent.0].push(id);
        id
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Returns a node.
    ///
    /// # Panics
    /// Panics if `id` is out of range.
    pub fn node(&self, id: NodeId) -> &BomNode {
        &self.nodes[id.0]
    }

    /// Returns a node, or `None` if `id` is out of range.
    pub fn get(&self, id: NodeId) -> Option<&BomNode> {
        self.nodes.get(id.0)
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes (only possible via [`BomTree::from_nodes`]).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes with their IDs, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &BomNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Children of a node, in insertion order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.children.get(id.0).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of children of a node.
    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    /// Whether a node currently has no children.
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.children(id).is_empty()
    }

    /// Node IDs reachable from the root in pre-order (root first, children in
    /// insertion order). Each node is visited at most once.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            if std::mem::replace(&mut seen[id.0], true) {
                continue;
            }
            order.push(id);
            stack.extend(self.children(id).iter().rev());
        }
        order
    }

    /// Current leaves, in pre-order.
    pub fn leaves(&self) -> Vec<NodeId> {
        self.preorder()
            .into_iter()
            .filter(|&id| self.is_leaf(id))
            .collect()
    }

    /// Walks from `id` up to the root, `id` first.
    ///
    /// Stops after `len()` steps, so a corrupted parent chain cannot loop.
    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.get(id).map(|_| id),
            budget: self.nodes.len(),
        }
    }

    /// Product IDs on the root-to-`id` path, `id` included.
    pub fn path_product_ids(&self, id: NodeId) -> HashSet<ProductId> {
        self.ancestors(id)
            .map(|a| self.nodes[a.0].product_id)
            .collect()
    }

    /// Product IDs on the root-to-`id` path, in root-first order.
    pub fn path_products(&self, id: NodeId) -> Vec<ProductId> {
        let mut path: Vec<ProductId> = self
            .ancestors(id)
            .map(|a| self.nodes[a.0].product_id)
            .collect();
        path.reverse();
        path
    }

    /// Largest node depth.
    pub fn max_depth(&self) -> usize {
        self.nodes.iter().map(|n| n.depth).max().unwrap_or(0)
    }
}

/// Iterator over a node and its ancestors. See [`BomTree::ancestors`].
pub struct Ancestors<'a> {
    tree: &'a BomTree,
    next: Option<NodeId>,
    budget: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        if self.budget == 0 {
            return None;
        }
        let current = self.next?;
        self.budget -= 1;
        self.next = self
            .tree
            .get(current)
            .and_then(|n| n.parent)
            .filter(|p| self.tree.get(*p).is_some());
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;

    fn node(op: u64, pid: ProductId) -> BomNode {
        BomNode::from_product(op, &Product::new(pid, format!("P{pid}")), 1)
    }

    /// root(1) ─┬─ a(2) ── c(4)
    ///          └─ b(3)
    fn sample_tree() -> (BomTree, [NodeId; 4]) {
        let mut tree = BomTree::new(node(0, 1));
        let root = tree.root();
        let a = tree.add_child(root, node(1, 2));
        let b = tree.add_child(root, node(2, 3));
        let c = tree.add_child(a, node(3, 4));
        (tree, [root, a, b, c])
    }

    #[test]
    fn test_add_child_links() {
        let (tree, [root, a, _b, c]) = sample_tree();

        assert_eq!(tree.len(), 4);
        assert_eq!(tree.node(c).parent, Some(a));
        assert_eq!(tree.node(c).parent_operation_id, Some(1));
        assert_eq!(tree.node(c).depth, 2);
        assert_eq!(tree.child_count(root), 2);
        assert_eq!(tree.max_depth(), 2);
    }

    #[test]
    fn test_preorder_and_leaves() {
        let (tree, [root, a, b, c]) = sample_tree();
        assert_eq!(tree.preorder(), vec![root, a, c, b]);
        assert_eq!(tree.leaves(), vec![c, b]);
    }

    #[test]
    fn test_path_products() {
        let (tree, [root, _a, b, c]) = sample_tree();

        assert_eq!(tree.path_products(c), vec![1, 2, 4]);
        assert_eq!(tree.path_products(b), vec![1, 3]);
        assert_eq!(tree.path_product_ids(root), HashSet::from([1]));
    }

    #[test]
    fn test_ancestors_stop_on_cycle() {
        let mut a = node(0, 1);
        let mut b = node(1, 2);
        a.parent = Some(NodeId(1));
        b.parent = Some(NodeId(0));
        let tree = BomTree::from_nodes(vec![a, b]);

        assert_eq!(tree.ancestors(NodeId(0)).count(), 2);
    }

    #[test]
    fn test_from_nodes_rebuilds_children() {
        let (tree, [root, a, b, c]) = sample_tree();
        let nodes: Vec<BomNode> = tree.iter().map(|(_, n)| n.clone()).collect();
        let rebuilt = BomTree::from_nodes(nodes);

        assert_eq!(rebuilt.root(), root);
        assert_eq!(rebuilt.children(root), &[a, b]);
        assert_eq!(rebuilt.children(a), &[c]);
    }
}
