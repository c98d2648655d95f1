//! Owning registry for GPU buffers.
//!
//! The registry is the sole owner of the buffers it creates: callers get
//! back a stable [`BufferId`] and borrow through [`BufferRegistry::get`].
//! Removal and teardown are the only paths that destroy a tracked
//! allocation, so destruction order and double-free are controlled in one
//! place.

use rustc_hash::FxHashMap;

use crate::buffer::{BufferDesc, BufferId, GpuBuffer};
use crate::context::GpuContext;
use crate::error::BufferResult;

/// Arena of owned [`GpuBuffer`]s keyed by [`BufferId`].
///
/// Every buffer created here is destroyed exactly once: either by
/// [`BufferRegistry::remove`] or by registry teardown.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    buffers: FxHashMap<BufferId, GpuBuffer>,
}

impl BufferRegistry {
    pub fn new() -> BufferRegistry {
        BufferRegistry::default()
    }

    /// Create a buffer and take ownership of it. On failure the registry
    /// is unchanged, as if the call never happened.
    pub fn create(&mut self, ctx: &GpuContext, desc: &BufferDesc<'_>) -> BufferResult<BufferId> {
        let buffer = GpuBuffer::new(ctx, desc)?;
        let id = buffer.id();
        self.buffers.insert(id, buffer);
        log::debug!("[REGISTRY] Tracking {:?} ({} live)", id, self.buffers.len());
        Ok(id)
    }

    /// Borrow a tracked buffer.
    pub fn get(&self, id: BufferId) -> Option<&GpuBuffer> {
        self.buffers.get(&id)
    }

    /// Destroy a tracked buffer and forget it.
    ///
    /// Removing an id that is not tracked (never created here, or already
    /// removed) is a safe no-op; it is logged as a caller-contract issue.
    pub fn remove(&mut self, id: BufferId) -> bool {
        match self.buffers.remove(&id) {
            Some(buffer) => {
                buffer.destroy();
                log::debug!("[REGISTRY] Removed {:?} ({} live)", id, self.buffers.len());
                true
            }
            None => {
                log::warn!("[REGISTRY] Remove of untracked {:?} ignored", id);
                false
            }
        }
    }

    /// Number of tracked buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Whether `id` is currently tracked.
    pub fn contains(&self, id: BufferId) -> bool {
        self.buffers.contains_key(&id)
    }

    /// Ids of all tracked buffers, in unspecified order.
    pub fn ids(&self) -> impl Iterator<Item = BufferId> + '_ {
        self.buffers.keys().copied()
    }
}

impl Drop for BufferRegistry {
    fn drop(&mut self) {
        let count = self.buffers.len();
        for (_, buffer) in self.buffers.drain() {
            buffer.destroy();
        }
        if count > 0 {
            log::debug!("[REGISTRY] Teardown destroyed {} buffers", count);
        }
    }
}
