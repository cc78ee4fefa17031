use crate::{
    node::{AnyNode, Node},
    selection::Selection,
    types::TypeInfo,
};

/// Owns every node of one graph, in creation order
///
/// The store is append only. Entry points are narrowed views of registered
/// nodes, collected at registration time so they keep creation order.
pub(crate) struct NodeStore<S: Selection> {
    nodes: Vec<AnyNode>,
    entry_points: Vec<Node<S::Target>>,
}

impl<S: Selection> NodeStore<S> {
    pub(crate) fn new() -> Self {
        NodeStore {
            nodes: Vec::new(),
            entry_points: Vec::new(),
        }
    }

    pub(crate) fn register(&mut self, node: AnyNode) {
        if let Some(entry_point) = S::narrow(&node) {
            self.entry_points.push(entry_point);
        }
        self.nodes.push(node);
    }

    pub(crate) fn entry_points(&self) -> &[Node<S::Target>] {
        &self.entry_points
    }

    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if `node` was registered with this store
    pub(crate) fn owns<T: ?Sized>(&self, node: &Node<T>) -> bool {
        self.nodes.iter().any(|owned| Node::ptr_eq(owned, node))
    }

    pub(crate) fn node_types(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.nodes.iter().map(Node::info)
    }
}

impl<S: Selection> Drop for NodeStore<S> {
    fn drop(&mut self) {
        // Entry points are views, release them before the owners
        self.entry_points.clear();
        while let Some(node) = self.nodes.pop() {
            tracing::trace!("Tearing down {}", Node::info(&node));
            drop(node);
        }
    }
}
