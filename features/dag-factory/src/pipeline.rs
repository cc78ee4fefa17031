use std::{
    any::{Any, TypeId},
    cell::{Cell, RefCell},
    collections::HashMap,
    mem,
    panic::Location,
    rc::Rc,
    sync::Arc,
};

use crate::{
    errors::DagError,
    memory::Memory,
    node::{AnyNode, Node},
    selection::Selection,
    store::NodeStore,
    strategies::{Construct, CreateRequest, Creator, Intercepter},
    types::TypeInfo,
};

/// Identifies one blueprint instance within a build
pub(crate) type ScopeId = u64;

/// Slot of the shared node cache
///
/// One slot per blueprint instance, producing closure, call site and produced
/// handle type, so two shared factory methods never collide even if they build
/// the same type. Macro generated methods share a call site, their closures are
/// told apart by the name of the enclosing function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct SlotKey {
    pub(crate) scope: ScopeId,
    pub(crate) site: &'static Location<'static>,
    pub(crate) method: &'static str,
    pub(crate) node: TypeId,
}

/// Selection independent view on a [Pipeline], held by blueprints
pub(crate) trait DynPipeline {
    fn memory(&self) -> &Memory;

    /// Creates, intercepts and registers one node
    fn create(&self, info: TypeInfo, construct: Construct<'_>) -> Result<AnyNode, DagError>;

    fn shared_node(&self, key: &SlotKey) -> Option<Rc<dyn Any>>;

    fn share_node(&self, key: SlotKey, node: Rc<dyn Any>);

    fn open_scope(&self) -> ScopeId;
}

/// Runs every node construction of a single build
///
/// Builds are single threaded and never cross threads, the pipeline is
/// therefore shared between blueprints through an `Rc`.
pub(crate) struct Pipeline<S: Selection> {
    // Declared before the store: cached handles are released before teardown
    shared: RefCell<HashMap<SlotKey, Rc<dyn Any>>>,
    /// None once the build has been sealed
    store: RefCell<Option<NodeStore<S>>>,
    scopes: Cell<ScopeId>,

    memory: Memory,
    creator: Arc<dyn Creator>,
    intercepter: Arc<dyn Intercepter>,
}

impl<S: Selection> Pipeline<S> {
    pub(crate) fn new(
        memory: Memory,
        creator: Arc<dyn Creator>,
        intercepter: Arc<dyn Intercepter>,
    ) -> Self {
        Pipeline {
            shared: RefCell::new(HashMap::new()),
            store: RefCell::new(Some(NodeStore::new())),
            scopes: Cell::new(0),
            memory,
            creator,
            intercepter,
        }
    }

    /// Ends the build and hands out the store
    ///
    /// Any later use of a context bound to this pipeline fails with [DagError::Sealed].
    pub(crate) fn seal(&self) -> Result<NodeStore<S>, DagError> {
        let cache = mem::take(&mut *self.shared.borrow_mut());
        drop(cache);
        self.store.borrow_mut().take().ok_or(DagError::Sealed)
    }

    fn is_sealed(&self) -> bool {
        self.store.borrow().is_none()
    }
}

impl<S: Selection> DynPipeline for Pipeline<S> {
    fn memory(&self) -> &Memory {
        &self.memory
    }

    fn create(&self, info: TypeInfo, construct: Construct<'_>) -> Result<AnyNode, DagError> {
        if self.is_sealed() {
            return Err(DagError::Sealed);
        }

        self.intercepter.before_create(info);
        let node = self
            .creator
            .create(&self.memory, CreateRequest::new(info, construct))?;
        let node = self.intercepter.after_create(&self.memory, node)?;

        let actual = Node::info(&node);
        if actual != info {
            return Err(DagError::NodeReplaced {
                expected: info,
                actual,
            });
        }

        let mut store = self.store.borrow_mut();
        let store = store.as_mut().ok_or(DagError::Sealed)?;
        tracing::trace!("Created node #{} of type {}", store.len(), info);
        store.register(node.clone());
        Ok(node)
    }

    fn shared_node(&self, key: &SlotKey) -> Option<Rc<dyn Any>> {
        self.shared.borrow().get(key).cloned()
    }

    fn share_node(&self, key: SlotKey, node: Rc<dyn Any>) {
        if self.is_sealed() {
            return;
        }
        self.shared.borrow_mut().insert(key, node);
    }

    fn open_scope(&self) -> ScopeId {
        let scope = self.scopes.get();
        self.scopes.set(scope.wrapping_add(1));
        scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::default_memory,
        selection::Exactly,
        strategies::{DefaultCreator, DefaultIntercepter},
    };

    fn pipeline() -> Pipeline<Exactly<u8>> {
        Pipeline::new(
            default_memory(),
            Arc::new(DefaultCreator),
            Arc::new(DefaultIntercepter),
        )
    }

    fn construct(value: u8) -> Construct<'static> {
        Box::new(move |memory: &Memory| -> Result<AnyNode, DagError> {
            Ok(Node::into_any(Node::new_in(value, memory)?))
        })
    }

    #[test]
    fn registers_created_nodes() {
        let pipeline = pipeline();
        pipeline
            .create(TypeInfo::of::<u8>(), construct(1))
            .expect("first");
        pipeline
            .create(TypeInfo::of::<u8>(), construct(2))
            .expect("second");

        let store = pipeline.seal().expect("store");
        assert_eq!(store.len(), 2);
        let values: Vec<u8> = store.entry_points().iter().map(|n| **n).collect();
        assert_eq!(values, vec![1, 2]);
    }

    #[test]
    fn rejects_work_after_seal() {
        let pipeline = pipeline();
        let _store = pipeline.seal().expect("store");

        let created = pipeline.create(TypeInfo::of::<u8>(), construct(1));
        assert!(matches!(created, Err(DagError::Sealed)));
        assert!(matches!(pipeline.seal(), Err(DagError::Sealed)));
    }

    #[test]
    fn scopes_are_unique() {
        let pipeline = pipeline();
        let first = pipeline.open_scope();
        let second = pipeline.open_scope();
        assert_ne!(first, second);
    }

    #[test]
    fn scope_ids_wrap_around() {
        let pipeline = pipeline();
        pipeline.scopes.set(ScopeId::MAX);
        assert_eq!(pipeline.open_scope(), ScopeId::MAX);
        assert_eq!(pipeline.open_scope(), 0);
    }

    #[test]
    fn seal_releases_the_shared_cache() {
        let pipeline = pipeline();
        let node = pipeline
            .create(TypeInfo::of::<u8>(), construct(3))
            .expect("node");
        let key = SlotKey {
            scope: pipeline.open_scope(),
            site: Location::caller(),
            method: "seal_releases_the_shared_cache",
            node: TypeId::of::<AnyNode>(),
        };
        pipeline.share_node(key, Rc::new(node.clone()));
        assert!(pipeline.shared_node(&key).is_some());

        let _store = pipeline.seal().expect("store");
        assert!(pipeline.shared_node(&key).is_none());
    }
}
