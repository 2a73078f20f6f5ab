/// Shader objects and pipeline stages

use std::fmt;
use std::sync::Arc;

use super::state_object::{HasStateId, StateId};

/// Programmable pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Hull,
    Domain,
    Geometry,
    Pixel,
    Compute,
}

impl ShaderStage {
    /// Number of stages
    pub const COUNT: usize = 6;

    /// All stages in pipeline order
    pub const ALL: [ShaderStage; Self::COUNT] = [
        ShaderStage::Vertex,
        ShaderStage::Hull,
        ShaderStage::Domain,
        ShaderStage::Geometry,
        ShaderStage::Pixel,
        ShaderStage::Compute,
    ];

    /// Index into per-stage arrays
    pub fn index(self) -> usize {
        match self {
            ShaderStage::Vertex => 0,
            ShaderStage::Hull => 1,
            ShaderStage::Domain => 2,
            ShaderStage::Geometry => 3,
            ShaderStage::Pixel => 4,
            ShaderStage::Compute => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// Compiled shader bound to exactly one stage
pub struct Shader {
    id: StateId,
    stage: ShaderStage,
    bytecode: Box<[u8]>,
}

impl Shader {
    pub fn new(stage: ShaderStage, bytecode: impl Into<Vec<u8>>) -> Arc<Self> {
        Arc::new(Self {
            id: StateId::next(),
            stage,
            bytecode: bytecode.into().into_boxed_slice(),
        })
    }

    pub fn id(&self) -> StateId {
        self.id
    }

    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }
}

impl HasStateId for Shader {
    fn state_id(&self) -> StateId {
        self.id
    }
}

impl fmt::Debug for Shader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Shader")
            .field("id", &self.id)
            .field("stage", &self.stage)
            .field("bytecode_len", &self.bytecode.len())
            .finish()
    }
}
