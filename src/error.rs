//! Error types for buffer lifecycle operations.
//!
//! Contract violations (bounds, alignment, mapping misuse) are detected
//! before any device call is issued; device failures (allocation, loss)
//! surface synchronously and are never retried here.

use crate::types::BindTarget;

/// Errors surfaced by buffer creation, transfer, and mapping operations.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("no suitable GPU adapter found")]
    AdapterNotFound,

    #[error("GPU device request failed: {reason}")]
    DeviceRequestFailed { reason: String },

    #[error("GPU device lost")]
    DeviceLost,

    #[error("buffer allocation of {size} bytes failed: {reason}")]
    AllocationFailed { size: u64, reason: String },

    #[error("buffer length must be non-zero")]
    ZeroSize,

    #[error("region {offset}..+{size} exceeds buffer length {len}")]
    OutOfBounds { offset: u64, size: u64, len: u64 },

    #[error("region {offset}..+{size} violates the {align}-byte copy alignment")]
    Misaligned { offset: u64, size: u64, align: u64 },

    #[error("data length {data} does not match buffer length {len}")]
    LengthMismatch { data: usize, len: u64 },

    #[error("buffer is already mapped")]
    AlreadyMapped,

    #[error("mapping was not opened for write access")]
    NotWritable,

    #[error("fill pattern of {texel} bytes does not evenly divide region of {size} bytes")]
    PatternMismatch { texel: usize, size: u64 },

    #[error("target {target:?} does not support indexed binding")]
    NotIndexable { target: BindTarget },

    #[error("buffer mapping failed: {reason}")]
    MapFailed { reason: String },
}

/// Result alias for buffer operations.
pub type BufferResult<T> = Result<T, BufferError>;
