//! Scoped CPU-visible mapping of a buffer region.
//!
//! wgpu cannot map device-local buffers in place without the
//! MAPPABLE_PRIMARY_BUFFERS feature, so a mapping is a staged window:
//! contents shuttle into CPU memory when the window opens and are written
//! back through the queue on flush or release. The guard owns the window
//! bytes, which rules out use-after-unmap by construction.

use std::ops::{Deref, DerefMut};

use crate::buffer::GpuBuffer;
use crate::context::GpuContext;
use crate::error::{BufferError, BufferResult};
use crate::types::MapAccess;

/// An open mapping window into a [`GpuBuffer`].
///
/// Derefs to the window bytes. For writable access modes, dropping the
/// guard (or calling [`MappedRange::unmap`]) writes the whole window back
/// and releases the mapping; read-only windows release without touching
/// the device.
#[derive(Debug)]
pub struct MappedRange<'a> {
    buffer: &'a GpuBuffer,
    ctx: &'a GpuContext,
    access: MapAccess,
    offset: u64,
    bytes: Vec<u8>,
    released: bool,
}

impl<'a> MappedRange<'a> {
    pub(crate) fn new(
        buffer: &'a GpuBuffer,
        ctx: &'a GpuContext,
        access: MapAccess,
        offset: u64,
        bytes: Vec<u8>,
    ) -> MappedRange<'a> {
        MappedRange {
            buffer,
            ctx,
            access,
            offset,
            bytes,
            released: false,
        }
    }

    /// Byte offset of this window within the buffer.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Window length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The access mode the window was opened with.
    pub fn access(&self) -> MapAccess {
        self.access
    }

    /// Make `[rel_offset, rel_offset+size)` of the window visible to the
    /// device immediately, without closing the mapping. Offsets are
    /// relative to the window start; the flushed region must satisfy the
    /// same alignment rules as any other sub-range write.
    pub fn flush_range(&mut self, rel_offset: u64, size: u64) -> BufferResult<()> {
        if !self.access.writable() {
            return Err(BufferError::NotWritable);
        }
        let window_len = self.bytes.len() as u64;
        let end = rel_offset
            .checked_add(size)
            .filter(|&end| end <= window_len)
            .ok_or(BufferError::OutOfBounds {
                offset: rel_offset,
                size,
                len: window_len,
            })?;
        self.buffer.upload_range(
            self.ctx,
            self.offset + rel_offset,
            &self.bytes[rel_offset as usize..end as usize],
        )
    }

    /// Write the window back (for writable access) and release the
    /// mapping. Dropping the guard does the same; this form surfaces the
    /// writeback error.
    pub fn unmap(mut self) -> BufferResult<()> {
        self.release()
    }

    fn release(&mut self) -> BufferResult<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        let result = if self.access.writable() && !self.bytes.is_empty() {
            self.buffer.upload_range(self.ctx, self.offset, &self.bytes)
        } else {
            Ok(())
        };
        self.buffer.finish_mapping(self.access.writable());
        result
    }
}

impl Deref for MappedRange<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl DerefMut for MappedRange<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

impl Drop for MappedRange<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            log::error!("[BUFFER] mapping writeback failed on release: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{BufferDesc, GpuBuffer};
    use crate::error::BufferError;
    use crate::testing;
    use crate::types::MapAccess;

    #[test]
    fn test_map_write_roundtrip() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create");

        let mut mapped = buffer.map(&ctx, MapAccess::Write).expect("map");
        mapped.copy_from_slice(&[0xC3; 64]);
        mapped.unmap().expect("unmap");

        assert_eq!(buffer.download(&ctx).expect("download"), vec![0xC3; 64]);
    }

    #[test]
    fn test_map_read_sees_contents() {
        let Some(ctx) = testing::context() else { return };
        let data: Vec<u8> = (0..64u8).collect();
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(64)
        };
        let buffer = GpuBuffer::new(&ctx, &desc).expect("create");

        let mapped = buffer.map(&ctx, MapAccess::Read).expect("map");
        assert_eq!(&*mapped, &data[..]);
    }

    #[test]
    fn test_double_map_rejected_until_release() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create");

        let first = buffer.map(&ctx, MapAccess::Read).expect("first map");
        assert!(matches!(
            buffer.map(&ctx, MapAccess::Read),
            Err(BufferError::AlreadyMapped)
        ));
        drop(first);
        assert!(buffer.map(&ctx, MapAccess::Read).is_ok());
    }

    #[test]
    fn test_flush_makes_writes_visible_before_unmap() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(128)).expect("create");

        let mut mapped = buffer
            .map_range(&ctx, MapAccess::Write, 0, 128)
            .expect("map");
        mapped[..32].copy_from_slice(&[0x11; 32]);
        mapped.flush_range(0, 32).expect("flush");

        // Mapping still open; the flushed range is already on the device.
        let bytes = buffer.download_range(&ctx, 0, 32).expect("download");
        assert_eq!(bytes, vec![0x11; 32]);
        mapped.unmap().expect("unmap");
    }

    #[test]
    fn test_flush_rejected_on_read_mapping() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create");
        let mut mapped = buffer.map(&ctx, MapAccess::Read).expect("map");
        assert!(matches!(
            mapped.flush_range(0, 4),
            Err(BufferError::NotWritable)
        ));
    }

    #[test]
    fn test_write_map_preserves_untouched_bytes() {
        let Some(ctx) = testing::context() else { return };
        let data = vec![0xFFu8; 64];
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(64)
        };
        let buffer = GpuBuffer::new(&ctx, &desc).expect("create");

        let mut mapped = buffer.map(&ctx, MapAccess::Write).expect("map");
        mapped[..8].copy_from_slice(&[0u8; 8]);
        mapped.unmap().expect("unmap");

        let bytes = buffer.download(&ctx).expect("download");
        assert_eq!(&bytes[..8], &[0x00; 8]);
        assert_eq!(&bytes[8..], &[0xFF; 56]);
    }

    #[test]
    fn test_invalidate_skips_preload_on_write_map() {
        let Some(ctx) = testing::context() else { return };
        let data = vec![0xFFu8; 64];
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(64)
        };
        let buffer = GpuBuffer::new(&ctx, &desc).expect("create");

        buffer.invalidate();
        let mapped = buffer.map(&ctx, MapAccess::Write).expect("map");
        // Discarded region: the window starts zeroed instead of
        // preloading the old contents.
        assert_eq!(&*mapped, &[0u8; 64][..]);
    }
}
