//! Memory resources nodes are allocated from.
//!
//! Every node of a graph is stored in one block obtained from the graph's
//! [Memory]. The resource is plain dependency injection: [default_memory]
//! hands out an explicit [SystemMemory] instance, any other resource can be
//! configured on the [crate::DagFactory].

use std::{
    alloc::{self, Layout},
    ptr::NonNull,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use crate::errors::AllocError;

/// Source of storage for nodes
///
/// Implementations are shared between all nodes of a graph (and possibly
/// between graphs built on different threads), so they must be Send + Sync.
pub trait MemoryResource: Send + Sync {
    /// Allocates a block fitting `layout`
    ///
    /// The returned pointer must be aligned to `layout.align()` and valid for
    /// `layout.size()` bytes until passed to [MemoryResource::deallocate].
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError>;

    /// Releases a block
    ///
    /// # Safety
    /// `ptr` must have been returned by `allocate` on this resource with the same `layout`,
    /// and must not be used afterwards.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout);
}

/// Shared handle to a memory resource
pub type Memory = Arc<dyn MemoryResource>;

/// The memory resource used when none is configured
pub fn default_memory() -> Memory {
    Arc::new(SystemMemory)
}

/// Allocates from the global allocator
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryResource for SystemMemory {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        if layout.size() == 0 {
            // Zero sized blocks only need a well aligned address
            return NonNull::new(layout.align() as *mut u8).ok_or(AllocError::from(layout));
        }
        // SAFETY: layout has a non-zero size
        let raw = unsafe { alloc::alloc(layout) };
        NonNull::new(raw).ok_or(AllocError::from(layout))
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        if layout.size() == 0 {
            return;
        }
        alloc::dealloc(ptr.as_ptr(), layout)
    }
}

/// Bump allocator over growing chunks
///
/// Deallocation is a no-op, all chunks are returned to the global allocator
/// once the resource itself is dropped. Since every node keeps its [Memory]
/// alive, this happens after the last node of every graph using it is gone.
pub struct MonotonicMemory {
    chunks: Mutex<Chunks>,
}

struct Chunks {
    /// Every chunk allocated so far, released on drop
    blocks: Vec<(NonNull<u8>, Layout)>,
    /// Next free address in the current chunk
    cursor: usize,
    /// End of the current chunk
    end: usize,
    /// Size of the next chunk to allocate
    next_size: usize,
    /// Bytes handed out to callers
    used: usize,
}

// SAFETY: the chunk pointers are owned exclusively by the resource and only touched under the lock
unsafe impl Send for Chunks {}

const CHUNK_ALIGN: usize = 16;

impl MonotonicMemory {
    /// Creates a resource with a first chunk of `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        MonotonicMemory {
            chunks: Mutex::new(Chunks {
                blocks: Vec::new(),
                cursor: 0,
                end: 0,
                next_size: capacity.max(CHUNK_ALIGN),
                used: 0,
            }),
        }
    }

    /// Bytes handed out so far
    pub fn used(&self) -> usize {
        self.lock().used
    }

    /// Number of chunks obtained from the global allocator
    pub fn chunk_count(&self) -> usize {
        self.lock().blocks.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Chunks> {
        self.chunks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MonotonicMemory {
    fn default() -> Self {
        Self::with_capacity(1024)
    }
}

impl Chunks {
    fn bump(&mut self, layout: Layout) -> Option<NonNull<u8>> {
        let start = self.cursor.checked_add(layout.align() - 1)? & !(layout.align() - 1);
        let next = start.checked_add(layout.size())?;
        if self.end == 0 || next > self.end {
            return None;
        }
        let (base, _) = *self.blocks.last()?;
        self.cursor = next;
        self.used += layout.size();
        // SAFETY: start lies within the current chunk, which begins at base
        NonNull::new(unsafe { base.as_ptr().add(start - base.as_ptr() as usize) })
    }

    fn grow(&mut self, layout: Layout) -> Result<(), AllocError> {
        let size = self
            .next_size
            .max(layout.size().saturating_add(layout.align()));
        let chunk = Layout::from_size_align(size, layout.align().max(CHUNK_ALIGN))
            .map_err(|_| AllocError::from(layout))?;
        // SAFETY: size is never zero
        let raw = NonNull::new(unsafe { alloc::alloc(chunk) }).ok_or(AllocError::from(layout))?;

        tracing::trace!("Monotonic memory grew by a chunk of {} bytes", size);
        self.blocks.push((raw, chunk));
        self.cursor = raw.as_ptr() as usize;
        self.end = self.cursor + size;
        self.next_size = size.saturating_mul(2);
        Ok(())
    }
}

impl MemoryResource for MonotonicMemory {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let mut chunks = self.lock();
        if let Some(ptr) = chunks.bump(layout) {
            return Ok(ptr);
        }
        chunks.grow(layout)?;
        chunks.bump(layout).ok_or(AllocError::from(layout))
    }

    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _layout: Layout) {}
}

impl Drop for MonotonicMemory {
    fn drop(&mut self) {
        let chunks = self.chunks.get_mut().unwrap_or_else(PoisonError::into_inner);
        for (ptr, layout) in chunks.blocks.drain(..) {
            // SAFETY: every block was allocated by `grow` with exactly this layout
            unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
        }
    }
}

/// Counts the traffic going to another memory resource
#[derive(Debug, Default)]
pub struct CountingMemory<M = SystemMemory> {
    upstream: M,
    allocations: AtomicUsize,
    deallocations: AtomicUsize,
    live_bytes: AtomicUsize,
}

impl<M: MemoryResource> CountingMemory<M> {
    pub fn new(upstream: M) -> Self {
        CountingMemory {
            upstream,
            allocations: AtomicUsize::new(0),
            deallocations: AtomicUsize::new(0),
            live_bytes: AtomicUsize::new(0),
        }
    }

    /// Number of successful allocations
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }

    /// Number of deallocations
    pub fn deallocations(&self) -> usize {
        self.deallocations.load(Ordering::Acquire)
    }

    /// Bytes currently allocated and not yet released
    pub fn live_bytes(&self) -> usize {
        self.live_bytes.load(Ordering::Acquire)
    }
}

impl<M: MemoryResource> MemoryResource for CountingMemory<M> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<u8>, AllocError> {
        let ptr = self.upstream.allocate(layout)?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_add(layout.size(), Ordering::AcqRel);
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        self.upstream.deallocate(ptr, layout);
        self.deallocations.fetch_add(1, Ordering::AcqRel);
        self.live_bytes.fetch_sub(layout.size(), Ordering::AcqRel);
    }
}
