//! GPU-resident buffer wrapper.
//!
//! One `GpuBuffer` owns exactly one device allocation. Transfers go
//! through the queue; downloads and mappings shuttle through a cached
//! MAP_READ staging buffer and block until the driver completes the copy.
//! The physical allocation is padded to the device copy alignment so
//! whole-buffer operations on odd lengths stay legal; padding bytes are
//! never exposed.

use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::context::{GpuContext, IndexedBinding};
use crate::error::{BufferError, BufferResult};
use crate::mapping::MappedRange;
use crate::types::{BindTarget, FillPattern, MapAccess, UsageHint};

/// Upper bound on the CPU-side block used when expanding fill patterns.
const FILL_CHUNK: usize = 64 * 1024;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a buffer, used for registry tracking and
/// binding-slot bookkeeping. Ids are never reused, even after the buffer
/// is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(u64);

/// Creation parameters for a [`GpuBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct BufferDesc<'a> {
    /// Logical length in bytes. Must be non-zero.
    pub byte_len: u64,
    /// Optional initial contents; length must equal `byte_len`. Absent
    /// means the allocation starts zeroed (wgpu zero-initializes).
    pub initial_data: Option<&'a [u8]>,
    /// Binding-target class the allocation is intended for.
    pub target: BindTarget,
    /// Advisory access-pattern hint.
    pub usage: UsageHint,
    /// Debug label for the underlying device object.
    pub label: Option<&'a str>,
}

impl<'a> BufferDesc<'a> {
    /// Descriptor with the given length and all other fields defaulted.
    pub fn new(byte_len: u64) -> BufferDesc<'a> {
        BufferDesc {
            byte_len,
            initial_data: None,
            target: BindTarget::default(),
            usage: UsageHint::default(),
            label: None,
        }
    }
}

/// A buffer object resident on the GPU.
#[derive(Debug)]
pub struct GpuBuffer {
    id: BufferId,
    raw: wgpu::Buffer,
    byte_len: u64,
    padded_len: u64,
    usage_hint: UsageHint,
    /// Lazily created MAP_READ staging buffer, reused across downloads
    /// and mappings.
    read_staging: Mutex<Option<wgpu::Buffer>>,
    /// At most one mapping may be open at a time.
    map_open: AtomicBool,
    /// Regions declared discardable by `invalidate`; cleared by any
    /// write into the buffer.
    discarded: Mutex<Vec<Range<u64>>>,
}

impl GpuBuffer {
    /// Allocate a device buffer.
    ///
    /// Fails without side effects when the device refuses the allocation;
    /// no partially-constructed buffer escapes.
    pub fn new(ctx: &GpuContext, desc: &BufferDesc<'_>) -> BufferResult<GpuBuffer> {
        if desc.byte_len == 0 {
            return Err(BufferError::ZeroSize);
        }
        if let Some(data) = desc.initial_data {
            if data.len() as u64 != desc.byte_len {
                return Err(BufferError::LengthMismatch {
                    data: data.len(),
                    len: desc.byte_len,
                });
            }
        }

        let padded_len = align_up(desc.byte_len, wgpu::COPY_BUFFER_ALIGNMENT);
        let usage = desc.target.usages()
            | wgpu::BufferUsages::COPY_SRC
            | wgpu::BufferUsages::COPY_DST;
        let raw = ctx.create_buffer_checked(desc.label, padded_len, usage)?;

        let id = BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed));
        let buffer = GpuBuffer {
            id,
            raw,
            byte_len: desc.byte_len,
            padded_len,
            usage_hint: desc.usage,
            read_staging: Mutex::new(None),
            map_open: AtomicBool::new(false),
            discarded: Mutex::new(Vec::new()),
        };

        log::debug!(
            "[BUFFER] Created {:?}: {} bytes, target {:?}, usage {:?}",
            id,
            desc.byte_len,
            desc.target,
            desc.usage
        );

        if let Some(data) = desc.initial_data {
            buffer.upload(ctx, data)?;
        }
        Ok(buffer)
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Logical length in bytes, fixed at creation. The default extent for
    /// whole-buffer operations.
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    pub fn usage_hint(&self) -> UsageHint {
        self.usage_hint
    }

    /// The raw device handle, for collaborators that attach this buffer
    /// elsewhere in the pipeline (bind groups, vertex slots, draw calls).
    pub fn raw(&self) -> &wgpu::Buffer {
        &self.raw
    }

    // --- binding ---

    /// Bind to a plain target slot. Slots are context-wide state: the
    /// last bind on a slot wins, and nothing here is stacked or
    /// refcounted.
    pub fn bind(&self, ctx: &GpuContext, target: BindTarget) {
        ctx.bind_plain(target, self.id);
    }

    /// Clear a plain target slot to "no buffer bound".
    pub fn unbind(&self, ctx: &GpuContext, target: BindTarget) {
        ctx.unbind_plain(target, self.id);
    }

    /// Attach the whole buffer to an indexed binding point.
    pub fn bind_base(&self, ctx: &GpuContext, target: BindTarget, index: u32) -> BufferResult<()> {
        self.bind_range(ctx, target, index, 0, self.byte_len)
    }

    /// Attach `[offset, offset+size)` to an indexed binding point.
    /// Indexed slots are independent of the plain binding on the same
    /// target.
    pub fn bind_range(
        &self,
        ctx: &GpuContext,
        target: BindTarget,
        index: u32,
        offset: u64,
        size: u64,
    ) -> BufferResult<()> {
        if !target.supports_indexed() {
            return Err(BufferError::NotIndexable { target });
        }
        self.check_bounds(offset, size)?;
        ctx.bind_indexed(
            target,
            index,
            IndexedBinding {
                buffer: self.id,
                offset,
                size,
            },
        );
        Ok(())
    }

    // --- transfer ---

    /// Replace the entire contents. `data` must be exactly `byte_len`
    /// bytes. Binding slots are not touched.
    pub fn upload(&self, ctx: &GpuContext, data: &[u8]) -> BufferResult<()> {
        if data.len() as u64 != self.byte_len {
            return Err(BufferError::LengthMismatch {
                data: data.len(),
                len: self.byte_len,
            });
        }
        self.upload_range(ctx, 0, data)
    }

    /// Overwrite `[offset, offset + data.len())` without reallocating.
    pub fn upload_range(&self, ctx: &GpuContext, offset: u64, data: &[u8]) -> BufferResult<()> {
        let device_size = self.device_extent(offset, data.len() as u64)?;
        ctx.ensure_alive()?;
        if data.is_empty() {
            return Ok(());
        }
        self.write_device(ctx, offset, data, device_size);
        self.discarded.lock().clear();
        log::trace!(
            "[BUFFER] {:?} upload of {} bytes at offset {}",
            self.id,
            data.len(),
            offset
        );
        Ok(())
    }

    /// Copy the entire contents back to CPU memory.
    pub fn download(&self, ctx: &GpuContext) -> BufferResult<Vec<u8>> {
        self.download_range(ctx, 0, self.byte_len)
    }

    /// Copy `size` bytes starting at `offset` back to CPU memory.
    pub fn download_range(&self, ctx: &GpuContext, offset: u64, size: u64) -> BufferResult<Vec<u8>> {
        let device_size = self.device_extent(offset, size)?;
        ctx.ensure_alive()?;
        if size == 0 {
            return Ok(Vec::new());
        }
        self.read_back(ctx, offset, size, device_size)
    }

    // --- clear / fill ---

    /// Zero the entire buffer without a CPU round-trip.
    pub fn clear(&self, ctx: &GpuContext) -> BufferResult<()> {
        self.clear_range(ctx, 0, self.byte_len)
    }

    /// Zero `[offset, offset+size)`.
    pub fn clear_range(&self, ctx: &GpuContext, offset: u64, size: u64) -> BufferResult<()> {
        let device_size = self.device_extent(offset, size)?;
        ctx.ensure_alive()?;
        if size == 0 {
            return Ok(());
        }
        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("brazier clear"),
            });
        encoder.clear_buffer(&self.raw, offset, Some(device_size));
        ctx.queue().submit(std::iter::once(encoder.finish()));
        self.discarded.lock().clear();
        log::trace!(
            "[BUFFER] {:?} cleared {} bytes at offset {}",
            self.id,
            size,
            offset
        );
        Ok(())
    }

    /// Fill the entire buffer with a repeating texel pattern.
    pub fn fill(&self, ctx: &GpuContext, pattern: &FillPattern) -> BufferResult<()> {
        self.fill_range(ctx, pattern, 0, self.byte_len)
    }

    /// Fill `[offset, offset+size)` with a repeating texel pattern. The
    /// region must hold a whole number of texels.
    pub fn fill_range(
        &self,
        ctx: &GpuContext,
        pattern: &FillPattern,
        offset: u64,
        size: u64,
    ) -> BufferResult<()> {
        self.device_extent(offset, size)?;
        let texel = pattern.texel();
        if size % texel.len() as u64 != 0 {
            return Err(BufferError::PatternMismatch {
                texel: texel.len(),
                size,
            });
        }
        ctx.ensure_alive()?;
        if size == 0 {
            return Ok(());
        }

        // Expand the pattern into a bounded block whose length is a
        // multiple of both the texel size and the copy alignment, so
        // every full-chunk write stays aligned and phase-correct.
        let stride = lcm(texel.len(), wgpu::COPY_BUFFER_ALIGNMENT as usize);
        let chunk_len = stride * (FILL_CHUNK / stride).max(1);
        let block = texel.repeat(chunk_len / texel.len());

        let mut cursor = offset;
        let mut remaining = size;
        while remaining >= chunk_len as u64 {
            ctx.queue().write_buffer(&self.raw, cursor, &block);
            cursor += chunk_len as u64;
            remaining -= chunk_len as u64;
        }
        if remaining > 0 {
            let tail = align_up(remaining, wgpu::COPY_BUFFER_ALIGNMENT);
            self.write_device(ctx, cursor, &block[..remaining as usize], tail);
        }
        self.discarded.lock().clear();
        log::trace!(
            "[BUFFER] {:?} filled {} bytes at offset {} ({}-byte texel)",
            self.id,
            size,
            offset,
            texel.len()
        );
        Ok(())
    }

    // --- mapping ---

    /// Map the whole buffer into CPU-visible memory.
    pub fn map<'a>(&'a self, ctx: &'a GpuContext, access: MapAccess) -> BufferResult<MappedRange<'a>> {
        self.map_range(ctx, access, 0, self.byte_len)
    }

    /// Map `[offset, offset+size)` into CPU-visible memory.
    ///
    /// At most one mapping may be open per buffer; a second map without
    /// an intervening release fails with `AlreadyMapped`. The returned
    /// guard owns the window and releases the mapping on drop.
    pub fn map_range<'a>(
        &'a self,
        ctx: &'a GpuContext,
        access: MapAccess,
        offset: u64,
        size: u64,
    ) -> BufferResult<MappedRange<'a>> {
        let device_size = self.device_extent(offset, size)?;
        ctx.ensure_alive()?;
        if self.map_open.swap(true, Ordering::AcqRel) {
            return Err(BufferError::AlreadyMapped);
        }
        let opened = self.open_window(ctx, access, offset, size, device_size);
        if opened.is_err() {
            self.map_open.store(false, Ordering::Release);
        }
        opened
    }

    fn open_window<'a>(
        &'a self,
        ctx: &'a GpuContext,
        access: MapAccess,
        offset: u64,
        size: u64,
        device_size: u64,
    ) -> BufferResult<MappedRange<'a>> {
        let window = if size == 0 {
            Vec::new()
        } else if access.readable() || !self.is_discarded(offset, size) {
            // Write-only windows still preserve the bytes the caller
            // leaves untouched, unless the region was invalidated.
            self.read_back(ctx, offset, size, device_size)?
        } else {
            log::trace!(
                "[BUFFER] {:?} write map of discarded region, skipping readback",
                self.id
            );
            vec![0u8; size as usize]
        };
        Ok(MappedRange::new(self, ctx, access, offset, window))
    }

    /// Whether `[offset, offset+size)` lies entirely inside a region
    /// previously declared discardable.
    fn is_discarded(&self, offset: u64, size: u64) -> bool {
        let end = offset + size;
        self.discarded
            .lock()
            .iter()
            .any(|r| r.start <= offset && end <= r.end)
    }

    pub(crate) fn finish_mapping(&self, wrote: bool) {
        if wrote {
            self.discarded.lock().clear();
        }
        self.map_open.store(false, Ordering::Release);
    }

    // --- invalidate ---

    /// Declare the entire contents discardable. A scheduling hint: no
    /// data changes, but a later write-only mapping skips the preserving
    /// readback.
    pub fn invalidate(&self) {
        let mut discarded = self.discarded.lock();
        discarded.clear();
        discarded.push(0..self.byte_len);
        log::trace!("[BUFFER] {:?} invalidated", self.id);
    }

    /// Declare `[offset, offset+size)` discardable.
    pub fn invalidate_range(&self, offset: u64, size: u64) -> BufferResult<()> {
        self.check_bounds(offset, size)?;
        if size == 0 {
            return Ok(());
        }
        self.discarded.lock().push(offset..offset + size);
        log::trace!(
            "[BUFFER] {:?} invalidated {} bytes at offset {}",
            self.id,
            size,
            offset
        );
        Ok(())
    }

    // --- copy ---

    /// Copy `min(self.byte_len, src.byte_len)` bytes from the start of
    /// `src` into the start of this buffer, device-to-device. Returns the
    /// number of bytes transferred.
    pub fn copy_from(&self, ctx: &GpuContext, src: &GpuBuffer) -> BufferResult<u64> {
        ctx.ensure_alive()?;
        let count = self.byte_len.min(src.byte_len);
        if src.id == self.id {
            return Ok(count);
        }

        const ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;
        let aligned = count - count % ALIGN;
        if aligned == count || count == self.byte_len {
            // Whole words, or the destination ends at `count`: widening to
            // the copy alignment stays inside the destination's padding.
            self.encoded_copy(ctx, src, align_up(count, ALIGN));
        } else {
            // Ragged tail with live destination bytes past it. Bulk-copy
            // the aligned prefix, then read-modify-write the final word so
            // exactly `count` bytes change.
            let rem = (count - aligned) as usize;
            let src_tail = src.read_back(ctx, aligned, count - aligned, ALIGN)?;
            let mut word = self.read_back(ctx, aligned, ALIGN, ALIGN)?;
            if aligned > 0 {
                self.encoded_copy(ctx, src, aligned);
            }
            word[..rem].copy_from_slice(&src_tail);
            ctx.queue().write_buffer(&self.raw, aligned, &word);
        }
        self.discarded.lock().clear();
        log::debug!(
            "[BUFFER] {:?} <- {:?}: copied {} bytes",
            self.id,
            src.id,
            count
        );
        Ok(count)
    }

    fn encoded_copy(&self, ctx: &GpuContext, src: &GpuBuffer, device_size: u64) {
        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("brazier copy"),
            });
        encoder.copy_buffer_to_buffer(&src.raw, 0, &self.raw, 0, device_size);
        ctx.queue().submit(std::iter::once(encoder.finish()));
    }

    // --- destruction ---

    /// Release the device allocation. Consuming `self` makes a second
    /// destroy unrepresentable.
    pub fn destroy(self) {
        log::debug!("[BUFFER] Destroying {:?} ({} bytes)", self.id, self.byte_len);
        if let Some(staging) = self.read_staging.lock().take() {
            staging.destroy();
        }
        self.raw.destroy();
    }

    // --- internals ---

    fn check_bounds(&self, offset: u64, size: u64) -> BufferResult<()> {
        match offset.checked_add(size) {
            Some(end) if end <= self.byte_len => Ok(()),
            _ => Err(BufferError::OutOfBounds {
                offset,
                size,
                len: self.byte_len,
            }),
        }
    }

    /// Validate a region against the logical length and the device copy
    /// alignment, returning the widened device size. An unaligned size is
    /// accepted only when the region ends at `byte_len`, where it widens
    /// into allocation padding.
    fn device_extent(&self, offset: u64, size: u64) -> BufferResult<u64> {
        self.check_bounds(offset, size)?;
        const ALIGN: u64 = wgpu::COPY_BUFFER_ALIGNMENT;
        if offset % ALIGN != 0 {
            return Err(BufferError::Misaligned {
                offset,
                size,
                align: ALIGN,
            });
        }
        if size % ALIGN != 0 && offset + size != self.byte_len {
            return Err(BufferError::Misaligned {
                offset,
                size,
                align: ALIGN,
            });
        }
        Ok(align_up(size, ALIGN))
    }

    /// Issue the queue write, zero-padding the tail into allocation slack
    /// when the logical size is narrower than the device copy size.
    fn write_device(&self, ctx: &GpuContext, offset: u64, data: &[u8], device_size: u64) {
        if device_size as usize == data.len() {
            ctx.queue().write_buffer(&self.raw, offset, data);
        } else {
            let mut padded = vec![0u8; device_size as usize];
            padded[..data.len()].copy_from_slice(data);
            ctx.queue().write_buffer(&self.raw, offset, &padded);
        }
    }

    /// Staged device-to-CPU readback: copy into the cached staging
    /// buffer, block until mapped, copy the logical bytes out, unmap.
    pub(crate) fn read_back(
        &self,
        ctx: &GpuContext,
        offset: u64,
        size: u64,
        device_size: u64,
    ) -> BufferResult<Vec<u8>> {
        let mut staging_slot = self.read_staging.lock();
        if staging_slot.is_none() {
            let staging = ctx.create_buffer_checked(
                Some("brazier readback staging"),
                self.padded_len,
                wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            )?;
            log::debug!(
                "[BUFFER] {:?} allocated {}-byte readback staging",
                self.id,
                self.padded_len
            );
            *staging_slot = Some(staging);
        }
        let staging = staging_slot.as_ref().ok_or_else(|| BufferError::MapFailed {
            reason: "staging buffer unavailable".to_string(),
        })?;

        let mut encoder = ctx
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("brazier readback"),
            });
        encoder.copy_buffer_to_buffer(&self.raw, offset, staging, 0, device_size);
        ctx.queue().submit(std::iter::once(encoder.finish()));

        let slice = staging.slice(0..device_size);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        ctx.device().poll(wgpu::Maintain::Wait);

        receiver
            .recv()
            .map_err(|_| BufferError::MapFailed {
                reason: "mapping callback dropped".to_string(),
            })?
            .map_err(|e| BufferError::MapFailed {
                reason: e.to_string(),
            })?;

        let mapped = slice.get_mapped_range();
        let mut out = vec![0u8; size as usize];
        out.copy_from_slice(&mapped[..size as usize]);
        drop(mapped);
        staging.unmap();
        Ok(out)
    }
}

fn align_up(value: u64, align: u64) -> u64 {
    (value + align - 1) / align * align
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

fn lcm(a: usize, b: usize) -> usize {
    a / gcd(a, b) * b
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    #[test]
    fn test_align_helpers() {
        assert_eq!(align_up(0, 4), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(4, 4), 4);
        assert_eq!(align_up(6, 4), 8);
        assert_eq!(lcm(3, 4), 12);
        assert_eq!(lcm(4, 4), 4);
        assert_eq!(lcm(8, 4), 8);
    }

    #[test]
    fn test_zero_size_rejected() {
        let Some(ctx) = testing::context() else { return };
        let result = GpuBuffer::new(&ctx, &BufferDesc::new(0));
        assert!(matches!(result, Err(BufferError::ZeroSize)));
    }

    #[test]
    fn test_new_buffer_reads_back_zeroed() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(256)).expect("create");
        let bytes = buffer.download(&ctx).expect("download");
        assert_eq!(bytes, vec![0u8; 256]);
    }

    #[test]
    fn test_initial_data_roundtrip() {
        let Some(ctx) = testing::context() else { return };
        let data: Vec<u8> = (0..128u8).collect();
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(128)
        };
        let buffer = GpuBuffer::new(&ctx, &desc).expect("create");
        assert_eq!(buffer.download(&ctx).expect("download"), data);
    }

    #[test]
    fn test_initial_data_length_mismatch_rejected() {
        let Some(ctx) = testing::context() else { return };
        let data = [0u8; 64];
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(128)
        };
        assert!(matches!(
            GpuBuffer::new(&ctx, &desc),
            Err(BufferError::LengthMismatch { data: 64, len: 128 })
        ));
    }

    #[test]
    fn test_upload_download_roundtrip_subrange() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(256)).expect("create");
        let data = vec![0x5Au8; 64];
        buffer.upload_range(&ctx, 96, &data).expect("upload");
        let back = buffer.download_range(&ctx, 96, 64).expect("download");
        assert_eq!(back, data);
    }

    #[test]
    fn test_staged_uploads_land_in_their_regions() {
        // 256-byte buffer, 64 bytes of 0xAA at 0, 64 bytes of 0xBB at 64;
        // the rest stays at its zero-initialized allocation value.
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(256)).expect("create");
        buffer.upload_range(&ctx, 0, &[0xAA; 64]).expect("upload a");
        buffer.upload_range(&ctx, 64, &[0xBB; 64]).expect("upload b");

        let bytes = buffer.download(&ctx).expect("download");
        assert_eq!(&bytes[..64], &[0xAA; 64]);
        assert_eq!(&bytes[64..128], &[0xBB; 64]);
        assert_eq!(&bytes[128..], &[0x00; 128]);
    }

    #[test]
    fn test_whole_upload_requires_exact_length() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(128)).expect("create");
        assert!(matches!(
            buffer.upload(&ctx, &[0u8; 64]),
            Err(BufferError::LengthMismatch { data: 64, len: 128 })
        ));
    }

    #[test]
    fn test_bounds_rejected_before_device_call() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(128)).expect("create");

        assert!(matches!(
            buffer.upload_range(&ctx, 96, &[0u8; 64]),
            Err(BufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buffer.download_range(&ctx, 128, 4),
            Err(BufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buffer.clear_range(&ctx, 0, 132),
            Err(BufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buffer.map_range(&ctx, MapAccess::Read, 64, 128),
            Err(BufferError::OutOfBounds { .. })
        ));
        assert!(matches!(
            buffer.download_range(&ctx, u64::MAX, 8),
            Err(BufferError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_misaligned_interior_region_rejected() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(128)).expect("create");

        assert!(matches!(
            buffer.download_range(&ctx, 2, 8),
            Err(BufferError::Misaligned { .. })
        ));
        assert!(matches!(
            buffer.upload_range(&ctx, 0, &[0u8; 6]),
            Err(BufferError::Misaligned { .. })
        ));
    }

    #[test]
    fn test_unaligned_tail_is_accepted() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(10)).expect("create");
        let data: Vec<u8> = (1..=10).collect();
        buffer.upload(&ctx, &data).expect("upload odd length");
        assert_eq!(buffer.download(&ctx).expect("download"), data);

        // Tail sub-range: 6 bytes ending exactly at byte_len.
        buffer.upload_range(&ctx, 4, &[0xEE; 6]).expect("tail upload");
        assert_eq!(
            buffer.download_range(&ctx, 4, 6).expect("tail download"),
            vec![0xEE; 6]
        );
    }

    #[test]
    fn test_clear_range_zeroes_only_region() {
        let Some(ctx) = testing::context() else { return };
        let data = vec![0xFFu8; 128];
        let desc = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(128)
        };
        let buffer = GpuBuffer::new(&ctx, &desc).expect("create");
        buffer.clear_range(&ctx, 32, 64).expect("clear");

        let bytes = buffer.download(&ctx).expect("download");
        assert_eq!(&bytes[..32], &[0xFF; 32]);
        assert_eq!(&bytes[32..96], &[0x00; 64]);
        assert_eq!(&bytes[96..], &[0xFF; 32]);
    }

    #[test]
    fn test_fill_repeats_pattern() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create");
        buffer
            .fill(&ctx, &FillPattern::splat_u32(0x0102_0304))
            .expect("fill");

        let bytes = buffer.download(&ctx).expect("download");
        let texel = 0x0102_0304u32.to_ne_bytes();
        assert!(bytes.chunks_exact(4).all(|chunk| chunk == texel));
    }

    #[test]
    fn test_fill_pattern_must_divide_region() {
        let Some(ctx) = testing::context() else { return };
        let buffer = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create");
        let pattern = FillPattern::from_texel(vec![1u8, 2, 3]);
        assert!(matches!(
            buffer.fill(&ctx, &pattern),
            Err(BufferError::PatternMismatch { texel: 3, size: 64 })
        ));
    }

    #[test]
    fn test_copy_transfers_min_of_lengths() {
        // A: 128 bytes of incrementing values, B: 64 zeroed bytes.
        // Copying A into B moves exactly A's first 64 bytes.
        let Some(ctx) = testing::context() else { return };
        let data: Vec<u8> = (0..128u8).collect();
        let desc_a = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(128)
        };
        let a = GpuBuffer::new(&ctx, &desc_a).expect("create a");
        let b = GpuBuffer::new(&ctx, &BufferDesc::new(64)).expect("create b");

        let copied = b.copy_from(&ctx, &a).expect("copy");
        assert_eq!(copied, 64);
        assert_eq!(b.download(&ctx).expect("download"), &data[..64]);
    }

    #[test]
    fn test_copy_ragged_tail_preserves_destination() {
        // 10-byte source into a longer destination: exactly 10 bytes
        // change, including the unaligned tail word.
        let Some(ctx) = testing::context() else { return };
        let data: Vec<u8> = (1..=10).collect();
        let desc_src = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(10)
        };
        let src = GpuBuffer::new(&ctx, &desc_src).expect("create src");
        let fill = vec![0xFFu8; 64];
        let desc_dst = BufferDesc {
            initial_data: Some(&fill),
            ..BufferDesc::new(64)
        };
        let dst = GpuBuffer::new(&ctx, &desc_dst).expect("create dst");

        assert_eq!(dst.copy_from(&ctx, &src).expect("copy"), 10);
        let bytes = dst.download(&ctx).expect("download");
        assert_eq!(&bytes[..10], &data[..]);
        assert_eq!(&bytes[10..], &[0xFF; 54]);
    }

    #[test]
    fn test_copy_into_larger_destination() {
        let Some(ctx) = testing::context() else { return };
        let data = vec![0x77u8; 64];
        let desc_src = BufferDesc {
            initial_data: Some(&data),
            ..BufferDesc::new(64)
        };
        let src = GpuBuffer::new(&ctx, &desc_src).expect("create src");
        let dst = GpuBuffer::new(&ctx, &BufferDesc::new(128)).expect("create dst");

        assert_eq!(dst.copy_from(&ctx, &src).expect("copy"), 64);
        let bytes = dst.download(&ctx).expect("download");
        assert_eq!(&bytes[..64], &data[..]);
        assert_eq!(&bytes[64..], &[0x00; 64]);
    }
}
