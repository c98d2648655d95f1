//! Brazier - GPU buffer lifecycle management on top of wgpu.
//!
//! Wraps raw device buffer allocations in a lifecycle-safe API: checked
//! creation, binding-slot bookkeeping, synchronous data transfer, scoped
//! memory mapping, and an owning registry that guarantees every
//! allocation it created is released exactly once.
//!
//! The crate assumes single-threaded, synchronous use of one device
//! context; multi-threaded access must be serialized by the caller.

pub mod buffer;
pub mod context;
pub mod error;
pub mod mapping;
pub mod registry;
pub mod types;

pub use buffer::{BufferDesc, BufferId, GpuBuffer};
pub use context::{GpuContext, IndexedBinding};
pub use error::{BufferError, BufferResult};
pub use mapping::MappedRange;
pub use registry::BufferRegistry;
pub use types::{BindTarget, FillPattern, MapAccess, UsageHint};

// Re-export wgpu so collaborators can build bind groups against the raw
// handles without pinning their own copy of the version.
pub use wgpu;
