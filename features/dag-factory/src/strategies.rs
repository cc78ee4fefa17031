use crate::{errors::DagError, memory::Memory, node::AnyNode, types::TypeInfo};

/// Type erased constructor of a single node
pub(crate) type Construct<'a> = Box<dyn FnOnce(&Memory) -> Result<AnyNode, DagError> + 'a>;

/// A pending node construction, handed to the [Creator]
///
/// The value's constructor arguments are already evaluated and captured,
/// the request only decides where the node's block is allocated.
pub struct CreateRequest<'a> {
    info: TypeInfo,
    construct: Construct<'a>,
}

impl<'a> CreateRequest<'a> {
    pub(crate) fn new(info: TypeInfo, construct: Construct<'a>) -> Self {
        CreateRequest { info, construct }
    }

    /// Type of the node about to be created
    pub fn info(&self) -> TypeInfo {
        self.info
    }

    /// Runs the constructor and places the node in `memory`
    pub fn construct_in(self, memory: &Memory) -> Result<AnyNode, DagError> {
        (self.construct)(memory)
    }
}

/// Decides how memory for a node is obtained and the node constructed
///
/// Invoked exactly once per node construction. The default places every
/// node in the graph's memory resource.
pub trait Creator: Send + Sync {
    fn create(&self, memory: &Memory, request: CreateRequest<'_>) -> Result<AnyNode, DagError> {
        request.construct_in(memory)
    }
}

/// Places every node in the graph's memory resource
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultCreator;
impl Creator for DefaultCreator {}

/// Hooks around every node construction
///
/// `after_create` owns the fresh node before it is registered: it may inspect
/// it, mutate it through [crate::Node::get_mut] or replace it with another
/// node of the same type.
pub trait Intercepter: Send + Sync {
    /// Called before the node is created, for observation only
    fn before_create(&self, _node: TypeInfo) {}

    fn after_create(&self, _memory: &Memory, node: AnyNode) -> Result<AnyNode, DagError> {
        Ok(node)
    }
}

/// Leaves every node untouched
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultIntercepter;
impl Intercepter for DefaultIntercepter {}
