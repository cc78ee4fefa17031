use std::{any::type_name, marker::PhantomData, rc::Rc, sync::Arc};

use crate::{
    blueprint::{Bind, DagContext},
    dag::Dag,
    errors::DagError,
    memory::{default_memory, Memory},
    node::Node,
    pipeline::Pipeline,
    selection::{Nothing, Select, Selection},
    strategies::{Creator, DefaultCreator, DefaultIntercepter, Intercepter},
};

/// Builds graphs from the blueprint `B`
///
/// The factory only holds configuration: the memory resource, the creation
/// strategies and the selection of entry points. It can be cloned, sent to
/// other threads and used for any number of independent builds.
///
/// ```ignore
/// let factory = DagFactory::<Garage>::new()
///     .with_memory(Arc::new(MonotonicMemory::default()))
///     .select::<Cars>();
///
/// let dag = factory.create(|garage| garage.car())?;
/// for car in dag.entry_points() {
///     car.drive();
/// }
/// ```
pub struct DagFactory<B: Bind, S: Selection = Nothing> {
    memory: Memory,
    creator: Arc<dyn Creator>,
    intercepter: Arc<dyn Intercepter>,
    _blueprint: PhantomData<fn() -> (B, S)>,
}

impl<B: Bind> Default for DagFactory<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Bind> DagFactory<B> {
    pub fn new() -> Self {
        DagFactory {
            memory: default_memory(),
            creator: Arc::new(DefaultCreator),
            intercepter: Arc::new(DefaultIntercepter),
            _blueprint: PhantomData,
        }
    }
}

impl<B: Bind, S: Selection> Clone for DagFactory<B, S> {
    fn clone(&self) -> Self {
        DagFactory {
            memory: self.memory.clone(),
            creator: self.creator.clone(),
            intercepter: self.intercepter.clone(),
            _blueprint: PhantomData,
        }
    }
}

impl<B: Bind, S: Selection> DagFactory<B, S> {
    /// Allocates every node from `memory`
    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_creator(mut self, creator: impl Creator + 'static) -> Self {
        self.creator = Arc::new(creator);
        self
    }

    pub fn with_intercepter(mut self, intercepter: impl Intercepter + 'static) -> Self {
        self.intercepter = Arc::new(intercepter);
        self
    }

    /// Collects every node belonging to `S2` as an entry point
    pub fn select<S2: Select>(self) -> DagFactory<B, S2> {
        DagFactory {
            memory: self.memory,
            creator: self.creator,
            intercepter: self.intercepter,
            _blueprint: PhantomData,
        }
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    /// Builds a graph with the blueprint's default arguments
    pub fn create<R: ?Sized>(
        &self,
        init: impl FnOnce(&B) -> Result<Node<R>, DagError>,
    ) -> Result<Dag<R, S>, DagError>
    where
        B::Args: Default,
    {
        self.create_with(B::Args::default(), init)
    }

    /// Builds a graph
    ///
    /// The blueprint is bound with `args` and handed to `init`, which returns
    /// the graph's result node. On any error, every node built so far is torn
    /// down in reverse creation order and no graph is returned.
    pub fn create_with<R: ?Sized>(
        &self,
        args: B::Args,
        init: impl FnOnce(&B) -> Result<Node<R>, DagError>,
    ) -> Result<Dag<R, S>, DagError> {
        tracing::debug!(
            "Building graph of {} for {}",
            type_name::<B>(),
            type_name::<R>()
        );

        let pipeline = Rc::new(Pipeline::<S>::new(
            self.memory.clone(),
            self.creator.clone(),
            self.intercepter.clone(),
        ));

        let blueprint = B::bind(DagContext::new(pipeline.clone()), args);
        let result = init(&blueprint);
        drop(blueprint);
        let result = result?;

        let store = pipeline.seal()?;
        if !store.owns(&result) {
            return Err(DagError::ForeignResult(type_name::<R>()));
        }

        tracing::debug!("Built graph of {} with {} nodes", type_name::<B>(), store.len());
        Ok(Dag::new(result, store))
    }
}
