//! Blueprints describe how the nodes of a graph are built and wired.
//!
//! A blueprint is a plain struct holding the [DagContext] of the build it is
//! bound to, plus whatever configuration it was bound with. Its factory
//! methods usually live in a trait extending [Blueprint] with default
//! bodies, which makes every factory method overridable:
//!
//! - called through `&dyn Trait`, an override is picked dynamically
//! - called through a generic `B: Trait` or from another default method,
//!   `self` is the concrete blueprint and the override is picked statically
//!
//! ```
//! use dag_factory::{Bind, Blueprint, DagContext, DagError, DagFactory, Node};
//!
//! struct Greeting {
//!     dag: DagContext,
//! }
//! impl Blueprint for Greeting {
//!     fn dag(&self) -> &DagContext {
//!         &self.dag
//!     }
//! }
//! impl Bind for Greeting {
//!     type Args = ();
//!     fn bind(dag: DagContext, _args: ()) -> Self {
//!         Greeting { dag }
//!     }
//! }
//! impl Greeting {
//!     fn name(&self) -> Result<Node<String>, DagError> {
//!         self.dag().shared(|| self.dag().make_node(|| "world".to_string()))
//!     }
//!     fn greeting(&self) -> Result<Node<String>, DagError> {
//!         let name = self.name()?;
//!         self.dag().make_node(|| format!("Hello {}!", *name))
//!     }
//! }
//!
//! let dag = DagFactory::<Greeting>::new().create(|b| b.greeting()).unwrap();
//! assert_eq!(dag.as_str(), "Hello world!");
//! ```

use std::{
    any::{type_name, type_name_of_val, TypeId},
    convert::Infallible,
    panic::Location,
    rc::Rc,
};

use crate::{
    errors::DagError,
    memory::Memory,
    node::Node,
    pipeline::{DynPipeline, ScopeId, SlotKey},
    strategies::Construct,
    types::{DynError, Injectable, TypeInfo},
};

/// A set of factory methods bound to one build
pub trait Blueprint {
    /// The build this blueprint instance is bound to
    fn dag(&self) -> &DagContext;
}

/// Blueprints the factory can instantiate
///
/// A blueprint only ever exists bound to a build: `bind` receives the
/// context together with the blueprint's own arguments.
pub trait Bind: Blueprint + Sized {
    /// Arguments forwarded from [crate::DagFactory::create_with]
    type Args;

    fn bind(dag: DagContext, args: Self::Args) -> Self;
}

/// Connection of a blueprint instance to the build it belongs to
///
/// Every blueprint instance, including nested sub-graph blueprints, gets its
/// own context and therefore its own shared node slots.
pub struct DagContext {
    pipeline: Rc<dyn DynPipeline>,
    scope: ScopeId,
}

impl DagContext {
    pub(crate) fn new(pipeline: Rc<dyn DynPipeline>) -> Self {
        let scope = pipeline.open_scope();
        DagContext { pipeline, scope }
    }

    /// The memory resource of the build
    ///
    /// Nodes owning further storage can allocate it here with [Node::new_in].
    pub fn memory(&self) -> &Memory {
        self.pipeline.memory()
    }

    /// Creates a node
    ///
    /// Dependencies should be resolved before calling this, `construct`
    /// only assembles the value from them.
    pub fn make_node<T: Injectable>(&self, construct: impl FnOnce() -> T) -> Result<Node<T>, DagError> {
        self.try_make_node(|| Ok::<_, Infallible>(construct()))
    }

    /// Creates a node from a fallible constructor
    ///
    /// A failing constructor aborts the build with [DagError::ConstructionFailed].
    pub fn try_make_node<T, E>(&self, construct: impl FnOnce() -> Result<T, E>) -> Result<Node<T>, DagError>
    where
        T: Injectable,
        E: Into<DynError>,
    {
        let info = TypeInfo::of::<T>();
        let construct: Construct<'_> = Box::new(move |memory: &Memory| -> Result<_, DagError> {
            let value = construct().map_err(|error| DagError::ConstructionFailed {
                node: info,
                error: error.into(),
            })?;
            Ok(Node::into_any(Node::new_in(value, memory)?))
        });

        let node = self.pipeline.create(info, construct)?;
        node.downcast::<T>().map_err(|node| DagError::NodeReplaced {
            expected: info,
            actual: Node::info(&node),
        })
    }

    /// Memoizes the node produced by the calling factory method
    ///
    /// The first call runs `produce`, every later call from the same factory
    /// method of the same blueprint instance returns that node again, without
    /// running any constructor or strategy.
    #[track_caller]
    pub fn shared<T: ?Sized + 'static>(
        &self,
        produce: impl FnOnce() -> Result<Node<T>, DagError>,
    ) -> Result<Node<T>, DagError> {
        let key = SlotKey {
            scope: self.scope,
            site: Location::caller(),
            method: type_name_of_val(&produce),
            node: TypeId::of::<Node<T>>(),
        };

        let cached = self
            .pipeline
            .shared_node(&key)
            .and_then(|node| node.downcast_ref::<Node<T>>().cloned());
        if let Some(node) = cached {
            tracing::trace!("Reusing shared {} from {}", type_name::<T>(), key.site);
            return Ok(node);
        }

        let node = produce()?;
        self.pipeline.share_node(key, Rc::new(node.clone()));
        Ok(node)
    }

    /// Builds part of the graph with a nested blueprint
    ///
    /// The nested blueprint shares this build's store, memory and strategies,
    /// so its nodes are torn down and selected like any other. It only lives
    /// for the duration of `build`.
    pub fn subgraph<B: Bind, R>(
        &self,
        args: B::Args,
        build: impl FnOnce(&B) -> Result<R, DagError>,
    ) -> Result<R, DagError> {
        tracing::debug!("Entering sub-graph {}", type_name::<B>());
        let blueprint = B::bind(DagContext::new(self.pipeline.clone()), args);
        build(&blueprint)
    }
}
