//! Capability vocabulary consumed from the device boundary: binding
//! targets, usage hints, map access modes, and fill patterns.

use wgpu::BufferUsages;

/// A named binding-slot class in the device context.
///
/// The target chosen at creation also decides which device usages the
/// allocation carries; transfer usages are always added on top.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BindTarget {
    /// Vertex attribute data.
    #[default]
    Vertex,
    /// Index data for indexed draws.
    Index,
    /// Uniform block data. Supports indexed binding points.
    Uniform,
    /// Shader storage data. Supports indexed binding points.
    Storage,
    /// Indirect draw/dispatch arguments.
    Indirect,
}

impl BindTarget {
    /// Device usages implied by allocating for this target.
    pub(crate) fn usages(self) -> BufferUsages {
        match self {
            BindTarget::Vertex => BufferUsages::VERTEX,
            BindTarget::Index => BufferUsages::INDEX,
            BindTarget::Uniform => BufferUsages::UNIFORM,
            BindTarget::Storage => BufferUsages::STORAGE,
            BindTarget::Indirect => BufferUsages::INDIRECT,
        }
    }

    /// Whether this target exposes indexed binding points.
    pub fn supports_indexed(self) -> bool {
        matches!(self, BindTarget::Uniform | BindTarget::Storage)
    }
}

/// Advisory classification of the expected access pattern.
///
/// Recorded and logged; under wgpu, memory placement is driver-managed,
/// so the hint carries no further operational weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UsageHint {
    /// Written once, read many times.
    #[default]
    Static,
    /// Rewritten occasionally.
    Dynamic,
    /// Rewritten every use.
    Stream,
}

/// Access mode for an open mapping window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapAccess {
    Read,
    Write,
    ReadWrite,
}

impl MapAccess {
    /// Whether the window exposes current buffer contents.
    pub fn readable(self) -> bool {
        matches!(self, MapAccess::Read | MapAccess::ReadWrite)
    }

    /// Whether window contents are written back on flush/release.
    pub fn writable(self) -> bool {
        matches!(self, MapAccess::Write | MapAccess::ReadWrite)
    }
}

/// A repeating texel byte pattern for buffer fills.
///
/// The filled region must hold a whole number of texels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPattern {
    texel: Vec<u8>,
}

impl FillPattern {
    /// Pattern from raw texel bytes. The texel must be non-empty.
    pub fn from_texel(texel: impl Into<Vec<u8>>) -> Self {
        let texel = texel.into();
        assert!(!texel.is_empty(), "fill pattern texel must be non-empty");
        Self { texel }
    }

    /// Pattern repeating a single byte.
    pub fn splat_u8(value: u8) -> Self {
        Self { texel: vec![value] }
    }

    /// Pattern repeating one `u32` in native byte order.
    pub fn splat_u32(value: u32) -> Self {
        Self {
            texel: bytemuck::bytes_of(&value).to_vec(),
        }
    }

    /// Texel size in bytes.
    pub fn texel_len(&self) -> usize {
        self.texel.len()
    }

    pub(crate) fn texel(&self) -> &[u8] {
        &self.texel
    }
}
