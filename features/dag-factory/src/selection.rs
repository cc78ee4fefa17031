//! Selections decide which nodes of a graph are collected as entry points.
//!
//! There is no runtime subtype test in Rust, so a selection names the
//! concrete node types belonging to it and how each of them is viewed as
//! the selection's target. Every other type is silently skipped.

use std::marker::PhantomData;

use crate::{
    node::{AnyNode, Node},
    types::Injectable,
};

/// Filters and narrows constructed nodes
pub trait Selection: 'static {
    /// The view entry points are exposed as, usually a trait object
    type Target: ?Sized + 'static;

    /// Returns the node as an entry point if it belongs to the selection
    fn narrow(node: &AnyNode) -> Option<Node<Self::Target>>;
}

/// Selections which actually expose their entry points on the finished graph
pub trait Select: Selection {}

/// The empty selection, nothing ever matches
pub enum Nothing {}

impl Selection for Nothing {
    type Target = Nothing;

    fn narrow(_node: &AnyNode) -> Option<Node<Nothing>> {
        None
    }
}

/// Selects every node of the concrete type `T`
pub struct Exactly<T>(PhantomData<fn() -> T>);

impl<T: Injectable> Selection for Exactly<T> {
    type Target = T;

    fn narrow(node: &AnyNode) -> Option<Node<T>> {
        if !node.is::<T>() {
            return None;
        }
        node.clone().downcast::<T>().ok()
    }
}
impl<T: Injectable> Select for Exactly<T> {}

/// Declares a selection over a target view and the node types belonging to it
///
/// ```
/// use dag_factory::selection;
///
/// pub trait Part: Send + Sync {}
/// struct Wheel;
/// impl Part for Wheel {}
/// struct Door;
/// impl Part for Door {}
///
/// selection!(pub Parts => dyn Part { Wheel, Door });
/// ```
#[macro_export]
macro_rules! selection {
    ($(#[$meta:meta])* $vis:vis $name:ident => $target:ty { $($node:ty),* $(,)? }) => {
        $(#[$meta])*
        $vis enum $name {}

        impl $crate::Selection for $name {
            type Target = $target;

            fn narrow(node: &$crate::AnyNode) -> ::core::option::Option<$crate::Node<$target>> {
                $(
                    if node.is::<$node>() {
                        fn view(node: &$node) -> &<$name as $crate::Selection>::Target {
                            node
                        }
                        let typed = ::core::clone::Clone::clone(node).downcast::<$node>().ok()?;
                        return ::core::option::Option::Some($crate::Node::upcast(typed, view));
                    }
                )*
                ::core::option::Option::None
            }
        }

        impl $crate::Select for $name {}
    };
}
