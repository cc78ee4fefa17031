use std::{
    fmt::{self, Debug},
    ops::Deref,
};

use crate::{
    node::Node,
    selection::{Nothing, Select, Selection},
    store::NodeStore,
    types::TypeInfo,
};

/// A finished graph
///
/// Owns every node of the build. Dropping it releases the result and then
/// destroys all nodes in reverse creation order.
pub struct Dag<R: ?Sized, S: Selection = Nothing> {
    // Declared before the store, so the result handle is released first
    result: Node<R>,
    store: NodeStore<S>,
}

impl<R: ?Sized, S: Selection> Dag<R, S> {
    pub(crate) fn new(result: Node<R>, store: NodeStore<S>) -> Self {
        Dag { result, store }
    }

    /// The node returned by the build's initializer
    pub fn result(&self) -> &Node<R> {
        &self.result
    }

    /// Number of nodes in the graph
    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.len() == 0
    }

    /// Concrete types of all nodes, in creation order
    pub fn node_types(&self) -> impl Iterator<Item = TypeInfo> + '_ {
        self.store.node_types()
    }
}

impl<R: ?Sized, S: Select> Dag<R, S> {
    /// Every node of the selection, in creation order
    pub fn entry_points(&self) -> &[Node<S::Target>] {
        self.store.entry_points()
    }
}

impl<R: ?Sized, S: Selection> Deref for Dag<R, S> {
    type Target = R;

    fn deref(&self) -> &R {
        &self.result
    }
}

impl<R: ?Sized, S: Selection> Debug for Dag<R, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let nodes: Vec<&'static str> = self.node_types().map(|info| info.type_name).collect();
        f.debug_struct("Dag")
            .field("result", &Node::info(&self.result).type_name)
            .field("entry_points", &self.store.entry_points().len())
            .field("nodes", &nodes)
            .finish()
    }
}
