/// Wire layout of encoded commands
///
/// Every record starts with a [`CommandHeader`] whose `size` covers the
/// header, the fixed packet and any trailing arrays. All packets are plain
/// little-endian `Pod` structs without padding; readers must not assume any
/// alignment of a record inside the buffer.

use bytemuck::{Pod, Zeroable};

/// Record type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Opcode {
    Draw = 1,
    ClearRenderTarget = 2,
    CopyResource = 3,
}

impl Opcode {
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            1 => Some(Opcode::Draw),
            2 => Some(Opcode::ClearRenderTarget),
            3 => Some(Opcode::CopyResource),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CommandHeader {
    pub opcode: u32,
    /// Total record size in bytes, header included
    pub size: u32,
}

/// `DrawPacket::flags` bit: a depth-stencil view is bound
pub const DRAW_FLAG_DEPTH_STENCIL_BOUND: u32 = 1 << 0;

/// Fixed part of a Draw record: the pipeline snapshot by value
///
/// Followed by `vertex_buffer_count` [`VertexBufferRecord`]s,
/// `render_target_count` [`RenderTargetRecord`]s, `viewport_count`
/// [`ViewportRecord`]s, `sampler_count` [`SamplerRecord`]s and `uav_count`
/// [`UavRecord`]s, in that order.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DrawPacket {
    pub blend_state: u64,
    pub rasterizer_state: u64,
    pub depth_stencil_state: u64,
    pub element_layout: u64,
    /// Shader ids indexed by `ShaderStage::index()`
    pub shaders: [u64; 6],
    pub depth_stencil_allocation: u64,
    /// D3D primitive topology value
    pub topology: u32,
    pub vertex_count: u32,
    pub start_vertex: u32,
    pub vertex_buffer_count: u32,
    pub render_target_count: u32,
    pub viewport_count: u32,
    pub sampler_count: u32,
    pub uav_count: u32,
    pub stencil_ref: u32,
    pub sample_mask: u32,
    pub depth_stencil_subresource: u32,
    pub flags: u32,
    pub blend_factor: [f32; 4],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct VertexBufferRecord {
    pub slot: u32,
    pub stride: u32,
    pub offset: u32,
    pub _pad: u32,
    pub allocation: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct RenderTargetRecord {
    pub slot: u32,
    pub subresource: u32,
    pub allocation: u64,
}

/// Viewports are recorded for slots 0..viewport_count in order
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewportRecord {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct SamplerRecord {
    /// `ShaderStage::index()`
    pub stage: u32,
    pub slot: u32,
    pub sampler: u64,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct UavRecord {
    pub slot: u32,
    pub subresource: u32,
    pub allocation: u64,
    /// Hidden counter start value; `u32::MAX` keeps the current counter
    pub initial_count: u32,
    pub _pad: u32,
}

/// Fill `size` bytes at `offset` of an allocation with one packed color
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ClearPacket {
    pub allocation: u64,
    pub offset: u64,
    pub size: u64,
    /// DXGI format value the color is packed in
    pub format: u32,
    pub subresource: u32,
    pub color: [f32; 4],
}

/// Whole-allocation copy
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct CopyPacket {
    pub source: u64,
    pub destination: u64,
    pub size: u64,
}
