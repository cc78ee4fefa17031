use std::alloc::Layout;

use thiserror::Error;

use crate::types::{DynError, TypeInfo};

/// Errors while building a graph
///
/// A build never returns a partial graph: on any of these, every node
/// registered so far is torn down in reverse creation order.
#[derive(Error, Debug)]
pub enum DagError {
    /// The constructor of a node failed
    #[error("Constructing '{node}' failed - error: {error}")]
    ConstructionFailed {
        node: TypeInfo,
        #[source]
        error: DynError,
    },
    /// The configured Creator refused to create a node
    #[error("Creator failed for '{node}' - error: {error}")]
    CreatorFailed {
        node: TypeInfo,
        #[source]
        error: DynError,
    },
    /// The configured Intercepter failed after a node was created
    #[error("Intercepter failed for '{node}' - error: {error}")]
    IntercepterFailed {
        node: TypeInfo,
        #[source]
        error: DynError,
    },
    /// A Creator or Intercepter handed back a node of a different type
    #[error("Expected a node of type '{expected}' but the strategies produced a '{actual}'")]
    NodeReplaced {
        expected: TypeInfo,
        actual: TypeInfo,
    },
    /// The memory resource could not provide storage
    #[error(transparent)]
    Alloc(#[from] AllocError),
    /// The initializer returned a node which was not built by this graph
    #[error("The initializer returned a '{0}' node which does not belong to this graph")]
    ForeignResult(&'static str),
    /// The build context was used after its build completed
    #[error("The graph was already sealed, did you keep a blueprint past its build?")]
    Sealed,
}

impl DagError {
    /// Wraps an error raised inside a [crate::Creator]
    pub fn creator(node: TypeInfo, error: impl Into<DynError>) -> Self {
        DagError::CreatorFailed {
            node,
            error: error.into(),
        }
    }

    /// Wraps an error raised inside a [crate::Intercepter]
    pub fn intercepter(node: TypeInfo, error: impl Into<DynError>) -> Self {
        DagError::IntercepterFailed {
            node,
            error: error.into(),
        }
    }
}

/// A memory resource could not satisfy an allocation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Memory resource failed to allocate {size} bytes (align {align})")]
pub struct AllocError {
    pub size: usize,
    pub align: usize,
}

impl From<Layout> for AllocError {
    fn from(layout: Layout) -> Self {
        AllocError {
            size: layout.size(),
            align: layout.align(),
        }
    }
}
