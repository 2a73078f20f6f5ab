/// Resource element formats and format capability flags

use bitflags::bitflags;
use glam::Vec4;

/// Element format of a resource (DXGI numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(non_camel_case_types)]
pub enum Format {
    /// Typeless bytes (buffers)
    UNKNOWN,
    R32G32B32A32_FLOAT,
    R32G32B32_FLOAT,
    R16G16B16A16_FLOAT,
    R32G32_FLOAT,
    R10G10B10A2_UNORM,
    R8G8B8A8_UNORM,
    R8G8B8A8_UNORM_SRGB,
    R16G16_FLOAT,
    D32_FLOAT,
    R32_FLOAT,
    R32_UINT,
    D24_UNORM_S8_UINT,
    R16_UINT,
    R8_UNORM,
    B8G8R8A8_UNORM,
}

impl Format {
    /// DXGI_FORMAT value
    pub fn to_raw(self) -> u32 {
        match self {
            Format::UNKNOWN => 0,
            Format::R32G32B32A32_FLOAT => 2,
            Format::R32G32B32_FLOAT => 6,
            Format::R16G16B16A16_FLOAT => 10,
            Format::R32G32_FLOAT => 16,
            Format::R10G10B10A2_UNORM => 24,
            Format::R8G8B8A8_UNORM => 28,
            Format::R8G8B8A8_UNORM_SRGB => 29,
            Format::R16G16_FLOAT => 34,
            Format::D32_FLOAT => 40,
            Format::R32_FLOAT => 41,
            Format::R32_UINT => 42,
            Format::D24_UNORM_S8_UINT => 45,
            Format::R16_UINT => 57,
            Format::R8_UNORM => 61,
            Format::B8G8R8A8_UNORM => 87,
        }
    }

    /// Format from a DXGI_FORMAT value
    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => Format::UNKNOWN,
            2 => Format::R32G32B32A32_FLOAT,
            6 => Format::R32G32B32_FLOAT,
            10 => Format::R16G16B16A16_FLOAT,
            16 => Format::R32G32_FLOAT,
            24 => Format::R10G10B10A2_UNORM,
            28 => Format::R8G8B8A8_UNORM,
            29 => Format::R8G8B8A8_UNORM_SRGB,
            34 => Format::R16G16_FLOAT,
            40 => Format::D32_FLOAT,
            41 => Format::R32_FLOAT,
            42 => Format::R32_UINT,
            45 => Format::D24_UNORM_S8_UINT,
            57 => Format::R16_UINT,
            61 => Format::R8_UNORM,
            87 => Format::B8G8R8A8_UNORM,
            _ => return None,
        })
    }

    /// Size in bytes of one element (UNKNOWN counts as one byte)
    pub fn bytes_per_element(self) -> u32 {
        match self {
            Format::UNKNOWN | Format::R8_UNORM => 1,
            Format::R16_UINT => 2,
            Format::R10G10B10A2_UNORM
            | Format::R8G8B8A8_UNORM
            | Format::R8G8B8A8_UNORM_SRGB
            | Format::R16G16_FLOAT
            | Format::D32_FLOAT
            | Format::R32_FLOAT
            | Format::R32_UINT
            | Format::D24_UNORM_S8_UINT
            | Format::B8G8R8A8_UNORM => 4,
            Format::R16G16B16A16_FLOAT | Format::R32G32_FLOAT => 8,
            Format::R32G32B32_FLOAT => 12,
            Format::R32G32B32A32_FLOAT => 16,
        }
    }

    /// Whether this is a depth or depth-stencil format
    pub fn is_depth(self) -> bool {
        matches!(self, Format::D32_FLOAT | Format::D24_UNORM_S8_UINT)
    }

    /// Whether a whole-resource copy between the two formats is a plain byte copy
    ///
    /// Formats are copy-compatible when their elements have the same size and
    /// both are (or both are not) depth formats.
    pub fn copy_compatible(self, other: Format) -> bool {
        self.bytes_per_element() == other.bytes_per_element() && self.is_depth() == other.is_depth()
    }

    /// One element holding `color`, or None if the format cannot be cleared as a color
    pub fn pack_color(self, color: Vec4) -> Option<Vec<u8>> {
        let unorm8 = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        match self {
            Format::R8G8B8A8_UNORM | Format::R8G8B8A8_UNORM_SRGB => {
                Some(vec![unorm8(color.x), unorm8(color.y), unorm8(color.z), unorm8(color.w)])
            }
            Format::B8G8R8A8_UNORM => {
                Some(vec![unorm8(color.z), unorm8(color.y), unorm8(color.x), unorm8(color.w)])
            }
            Format::R8_UNORM => Some(vec![unorm8(color.x)]),
            Format::R32_FLOAT => Some(color.x.to_le_bytes().to_vec()),
            Format::R32G32_FLOAT => Some(bytemuck::cast_slice(&[color.x, color.y]).to_vec()),
            Format::R32G32B32_FLOAT => Some(bytemuck::cast_slice(&[color.x, color.y, color.z]).to_vec()),
            Format::R32G32B32A32_FLOAT => Some(bytemuck::cast_slice(&color.to_array()).to_vec()),
            _ => None,
        }
    }
}

bitflags! {
    /// What a format can be used for (D3D10_DDI_FORMAT_SUPPORT_*)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatSupport: u32 {
        const BUFFER = 1 << 0;
        const IA_VERTEX_BUFFER = 1 << 1;
        const IA_INDEX_BUFFER = 1 << 2;
        const TEXTURE1D = 1 << 4;
        const TEXTURE2D = 1 << 5;
        const TEXTURE3D = 1 << 6;
        const TEXTURECUBE = 1 << 7;
        const SHADER_SAMPLE = 1 << 9;
        const RENDER_TARGET = 1 << 14;
        const BLENDABLE = 1 << 15;
        const DEPTH_STENCIL = 1 << 16;
        const CPU_LOCKABLE = 1 << 17;
        const MULTISAMPLE_RENDERTARGET = 1 << 21;
        const DISPLAY = 1 << 19;
    }
}

#[cfg(test)]
#[path = "format_tests.rs"]
mod tests;
