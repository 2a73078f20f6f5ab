/// Input-assembly and rasterizer-stage value types

/// How vertices are assembled into primitives (D3D_PRIMITIVE_TOPOLOGY values)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PrimitiveTopology {
    /// Nothing set yet; draws are rejected
    #[default]
    Undefined,
    PointList,
    LineList,
    LineStrip,
    TriangleList,
    TriangleStrip,
    LineListAdj,
    LineStripAdj,
    TriangleListAdj,
    TriangleStripAdj,
    /// Patch list with 1..=32 control points
    PatchList(u8),
}

impl PrimitiveTopology {
    pub fn to_raw(self) -> u32 {
        match self {
            PrimitiveTopology::Undefined => 0,
            PrimitiveTopology::PointList => 1,
            PrimitiveTopology::LineList => 2,
            PrimitiveTopology::LineStrip => 3,
            PrimitiveTopology::TriangleList => 4,
            PrimitiveTopology::TriangleStrip => 5,
            PrimitiveTopology::LineListAdj => 10,
            PrimitiveTopology::LineStripAdj => 11,
            PrimitiveTopology::TriangleListAdj => 12,
            PrimitiveTopology::TriangleStripAdj => 13,
            PrimitiveTopology::PatchList(points) => 32 + points as u32,
        }
    }

    pub fn from_raw(raw: u32) -> Option<Self> {
        Some(match raw {
            0 => PrimitiveTopology::Undefined,
            1 => PrimitiveTopology::PointList,
            2 => PrimitiveTopology::LineList,
            3 => PrimitiveTopology::LineStrip,
            4 => PrimitiveTopology::TriangleList,
            5 => PrimitiveTopology::TriangleStrip,
            10 => PrimitiveTopology::LineListAdj,
            11 => PrimitiveTopology::LineStripAdj,
            12 => PrimitiveTopology::TriangleListAdj,
            13 => PrimitiveTopology::TriangleStripAdj,
            33..=64 => PrimitiveTopology::PatchList((raw - 32) as u8),
            _ => return None,
        })
    }

    /// Whether the value names a real topology (patch lists need 1..=32 points)
    pub fn is_valid(self) -> bool {
        match self {
            PrimitiveTopology::Undefined => false,
            PrimitiveTopology::PatchList(points) => (1..=32).contains(&points),
            _ => true,
        }
    }
}

/// Viewport rectangle and depth range
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Full-depth viewport covering `width` x `height` from the origin
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width,
            height,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}

#[cfg(test)]
#[path = "input_assembly_tests.rs"]
mod tests;
