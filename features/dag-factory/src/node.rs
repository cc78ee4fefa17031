//! Handles to nodes living in a graph's memory resource.
//!
//! A node is stored in a single block: a [Header] followed by the value.
//! The header carries the reference count, the concrete type of the value,
//! and everything needed to destroy the value and hand the block back to
//! the memory resource it came from.

use std::{
    alloc::Layout,
    any::Any,
    fmt::{self, Debug},
    marker::PhantomData,
    mem,
    ops::Deref,
    ptr::{self, NonNull},
    sync::atomic::{self, AtomicUsize, Ordering},
};

use crate::{
    errors::AllocError,
    memory::Memory,
    types::{Injectable, TypeInfo},
};

/// A type erased node, as seen by the store and the creation strategies
pub type AnyNode = Node<dyn Any + Send + Sync>;

struct Header {
    refs: AtomicUsize,
    info: TypeInfo,
    layout: Layout,
    drop_value: unsafe fn(NonNull<Header>),
    memory: Memory,
}

#[repr(C)]
struct NodeBox<T> {
    header: Header,
    value: T,
}

/// Drops the value of a `NodeBox<T>` in place, leaving the header untouched
unsafe fn drop_value<T>(header: NonNull<Header>) {
    let boxed = header.cast::<NodeBox<T>>().as_ptr();
    ptr::drop_in_place(ptr::addr_of_mut!((*boxed).value));
}

/// Shared handle to a node of a graph
///
/// Cloning a handle never clones the node. The node is destroyed, and its
/// block returned to the memory resource, once the last handle is dropped.
/// Like `Arc`, the handle's own operations are associated functions
/// (`Node::ptr_eq(&a, &b)`) so they never shadow methods of `T`.
pub struct Node<T: ?Sized> {
    header: NonNull<Header>,
    value: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: the reference count is atomic and the value is only shared immutably,
// exactly like Arc<T>
unsafe impl<T: ?Sized + Send + Sync> Send for Node<T> {}
unsafe impl<T: ?Sized + Send + Sync> Sync for Node<T> {}

impl<T: Injectable> Node<T> {
    /// Moves `value` into a new block allocated from `memory`
    pub fn new_in(value: T, memory: &Memory) -> Result<Self, AllocError> {
        let layout = Layout::new::<NodeBox<T>>();
        let boxed = memory.allocate(layout)?.cast::<NodeBox<T>>();

        // SAFETY: the block is fresh, sized and aligned for NodeBox<T>
        unsafe {
            boxed.as_ptr().write(NodeBox {
                header: Header {
                    refs: AtomicUsize::new(1),
                    info: TypeInfo::of::<T>(),
                    layout,
                    drop_value: drop_value::<T>,
                    memory: memory.clone(),
                },
                value,
            });
        }

        // SAFETY: derived from a non-null pointer to an initialized NodeBox
        let value = unsafe { NonNull::new_unchecked(ptr::addr_of_mut!((*boxed.as_ptr()).value)) };
        Ok(Node {
            header: boxed.cast(),
            value,
            _owns: PhantomData,
        })
    }

    /// Erases the type of the node
    pub fn into_any(this: Self) -> AnyNode {
        Node::upcast(this, erase::<T>)
    }
}

fn erase<T: Injectable>(value: &T) -> &(dyn Any + Send + Sync + 'static) {
    value
}

impl<T: ?Sized> Node<T> {
    fn header(&self) -> &Header {
        // SAFETY: the header lives as long as any handle to the block
        unsafe { self.header.as_ref() }
    }

    /// Changes the view on the node, e.g. to a trait object it implements
    ///
    /// The returned handle refers to the same node.
    pub fn upcast<U: ?Sized>(this: Self, cast: impl FnOnce(&T) -> &U) -> Node<U> {
        let value = NonNull::from(cast(&*this));
        let header = this.header;
        mem::forget(this);
        Node {
            header,
            value,
            _owns: PhantomData,
        }
    }

    /// Concrete type the node was created as
    pub fn info(this: &Self) -> TypeInfo {
        this.header().info
    }

    /// Returns true if both handles refer to the same node
    pub fn ptr_eq<U: ?Sized>(this: &Self, other: &Node<U>) -> bool {
        this.header == other.header
    }

    /// Number of handles currently referring to the node
    pub fn ref_count(this: &Self) -> usize {
        this.header().refs.load(Ordering::Acquire)
    }

    /// Mutable access to the node, if this is the only handle to it
    ///
    /// Views produced by [Node::upcast] that point outside the node's own
    /// block (e.g. into a dependency) are never handed out mutably.
    pub fn get_mut(this: &mut Self) -> Option<&mut T> {
        if this.header().refs.load(Ordering::Acquire) != 1 || !Node::views_own_block(this) {
            return None;
        }
        // SAFETY: no other handle exists and the value lies inside this node's
        // block, so nothing else can observe it
        Some(unsafe { this.value.as_mut() })
    }

    /// Returns true if the viewed value lies entirely inside the node's block
    fn views_own_block(this: &Self) -> bool {
        let start = this.header.as_ptr() as *const u8 as usize;
        let end = start + this.header().layout.size();
        let value = this.value.as_ptr() as *const u8 as usize;
        let size = mem::size_of_val(&**this);
        value >= start && value.checked_add(size).is_some_and(|value_end| value_end <= end)
    }
}

impl Node<dyn Any + Send + Sync> {
    /// Returns true if the node's value is a `T`
    pub fn is<T: Injectable>(&self) -> bool {
        let value: &(dyn Any + Send + Sync) = &**self;
        value.is::<T>()
    }

    /// Attempts to recover the typed handle
    pub fn downcast<T: Injectable>(self) -> Result<Node<T>, AnyNode> {
        if !self.is::<T>() {
            return Err(self);
        }
        let header = self.header;
        let value = self.value.cast::<T>();
        mem::forget(self);
        Ok(Node {
            header,
            value,
            _owns: PhantomData,
        })
    }
}

impl<T: ?Sized> Deref for Node<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the value lives as long as any handle to the block
        unsafe { self.value.as_ref() }
    }
}

impl<T: ?Sized> Clone for Node<T> {
    fn clone(&self) -> Self {
        self.header().refs.fetch_add(1, Ordering::Relaxed);
        Node {
            header: self.header,
            value: self.value,
            _owns: PhantomData,
        }
    }
}

impl<T: ?Sized> Drop for Node<T> {
    fn drop(&mut self) {
        if self.header().refs.fetch_sub(1, Ordering::Release) != 1 {
            return;
        }
        atomic::fence(Ordering::Acquire);

        let header = self.header;
        // SAFETY: this was the last handle, nobody else can reach the block anymore.
        // The value is dropped first, then the header's memory handle is moved out
        // so the resource outlives the deallocation of its own block.
        unsafe {
            let drop_value = (*header.as_ptr()).drop_value;
            let layout = (*header.as_ptr()).layout;
            drop_value(header);
            let memory = ptr::read(ptr::addr_of!((*header.as_ptr()).memory));
            memory.deallocate(header.cast(), layout);
        }
    }
}

impl<T: ?Sized + Debug> Debug for Node<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&**self, f)
    }
}
