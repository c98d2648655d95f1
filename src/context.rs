//! Device context wrapper.
//!
//! Owns the wgpu device/queue pair, the context-wide binding-slot table,
//! and the device-loss latch. Binding slots are shared mutable state
//! across every buffer in the context: the last bind or unbind on a slot
//! wins, and nothing is stacked or refcounted.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::buffer::BufferId;
use crate::error::{BufferError, BufferResult};
use crate::types::BindTarget;

/// A buffer sub-range attached to an indexed binding point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedBinding {
    pub buffer: BufferId,
    pub offset: u64,
    pub size: u64,
}

/// Context-wide binding-slot state. Plain and indexed slots live in
/// independent tables.
#[derive(Debug, Default)]
struct BindingTable {
    plain: FxHashMap<BindTarget, BufferId>,
    indexed: FxHashMap<(BindTarget, u32), IndexedBinding>,
}

/// An execution context for buffer operations.
///
/// Single-threaded, synchronous use is assumed: every operation blocks
/// until the driver has queued or completed the work. Multi-threaded use
/// of one context must be serialized by the caller.
#[derive(Debug)]
pub struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bindings: Mutex<BindingTable>,
    device_lost: Arc<AtomicBool>,
}

impl GpuContext {
    /// Create a headless context (no surface), for tools and tests.
    pub fn headless(label: &str) -> BufferResult<GpuContext> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or(BufferError::AdapterNotFound)?;

        log::info!("[CONTEXT] Using adapter: {}", adapter.get_info().name);

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some(label),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
            },
            None,
        ))
        .map_err(|e| BufferError::DeviceRequestFailed {
            reason: e.to_string(),
        })?;

        Ok(Self::from_parts(device, queue))
    }

    /// Wrap a device/queue pair supplied by a host renderer.
    ///
    /// Installs an uncaptured-error handler that latches out-of-memory
    /// into the device-lost flag, replacing any handler the host had set.
    pub fn from_parts(device: wgpu::Device, queue: wgpu::Queue) -> GpuContext {
        let device_lost = Arc::new(AtomicBool::new(false));
        let lost = device_lost.clone();
        device.on_uncaptured_error(Box::new(move |error| {
            log::error!("[CONTEXT] Uncaptured GPU error: {}", error);
            if let wgpu::Error::OutOfMemory { .. } = error {
                lost.store(true, Ordering::Relaxed);
            }
        }));

        GpuContext {
            device,
            queue,
            bindings: Mutex::new(BindingTable::default()),
            device_lost,
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Whether the device has been lost. Once set, every subsequent
    /// operation through this context fails with `DeviceLost`.
    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Relaxed)
    }

    pub(crate) fn ensure_alive(&self) -> BufferResult<()> {
        if self.is_device_lost() {
            Err(BufferError::DeviceLost)
        } else {
            Ok(())
        }
    }

    /// Allocate a device buffer under an error scope so out-of-memory and
    /// validation failures surface synchronously to the caller.
    pub(crate) fn create_buffer_checked(
        &self,
        label: Option<&str>,
        size: u64,
        usage: wgpu::BufferUsages,
    ) -> BufferResult<wgpu::Buffer> {
        self.ensure_alive()?;

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label,
            size,
            usage,
            mapped_at_creation: false,
        });
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        if let Some(error) = oom.or(validation) {
            buffer.destroy();
            return Err(BufferError::AllocationFailed {
                size,
                reason: error.to_string(),
            });
        }
        Ok(buffer)
    }

    // Binding-table mutation, used by the bind/unbind family on GpuBuffer.

    pub(crate) fn bind_plain(&self, target: BindTarget, id: BufferId) {
        let prev = self.bindings.lock().plain.insert(target, id);
        log::debug!("[BINDINGS] {:?} <- {:?} (was {:?})", target, id, prev);
    }

    pub(crate) fn unbind_plain(&self, target: BindTarget, id: BufferId) {
        let removed = self.bindings.lock().plain.remove(&target);
        match removed {
            Some(bound) if bound != id => {
                log::warn!(
                    "[BINDINGS] unbind of {:?} cleared {:?}, which was bound by {:?}",
                    target,
                    bound,
                    id
                );
            }
            _ => log::debug!("[BINDINGS] {:?} cleared", target),
        }
    }

    pub(crate) fn bind_indexed(&self, target: BindTarget, index: u32, binding: IndexedBinding) {
        let prev = self.bindings.lock().indexed.insert((target, index), binding);
        log::debug!(
            "[BINDINGS] {:?}[{}] <- {:?} (was {:?})",
            target,
            index,
            binding.buffer,
            prev.map(|b| b.buffer)
        );
    }

    /// The buffer currently bound to a plain target slot, if any.
    pub fn bound_buffer(&self, target: BindTarget) -> Option<BufferId> {
        self.bindings.lock().plain.get(&target).copied()
    }

    /// The binding currently attached to an indexed slot, if any.
    pub fn indexed_binding(&self, target: BindTarget, index: u32) -> Option<IndexedBinding> {
        self.bindings.lock().indexed.get(&(target, index)).copied()
    }
}
