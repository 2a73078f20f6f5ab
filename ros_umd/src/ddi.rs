/// DDI function table negotiation
///
/// The runtime opens a device with an interface version and a pipeline
/// level. The pair selects one variant of the device function table, and
/// the variant decides which entry points exist: hull/domain/compute
/// shaders and UAV binding only exist on D3D11-class tables.

use bitflags::bitflags;

use crate::error::Result;
use crate::state::ShaderStage;
use crate::umd_bail;

/// Interface version requested by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum InterfaceVersion {
    D3D10_0,
    D3D10_1,
    D3D11_0,
    D3D11_1,
    /// D3D11.1 interface on a WDDM 1.3 kernel
    Wddm1_3,
    /// D3D11.1 interface on a WDDM 2.0 kernel
    Wddm2_0,
}

/// Hardware pipeline level the device is created at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[allow(non_camel_case_types)]
pub enum PipelineLevel {
    Level10_0,
    Level10_1,
    Level11_0,
    Level11_1,
}

bitflags! {
    /// Optional entry points present in a function table
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DdiFeatures: u32 {
        const HULL_SHADER = 1 << 0;
        const DOMAIN_SHADER = 1 << 1;
        const COMPUTE_SHADER = 1 << 2;
        const UNORDERED_ACCESS = 1 << 3;
    }
}

/// Negotiated device function table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceFunctions {
    /// 10.0 / 10.1 table: vertex, geometry and pixel stages only
    D3D10 {
        version: InterfaceVersion,
        level: PipelineLevel,
    },
    /// 11.x table; optional entry points depend on the pipeline level
    D3D11 {
        version: InterfaceVersion,
        level: PipelineLevel,
    },
}

impl DeviceFunctions {
    /// Select the function table for `version` at `level`
    pub fn negotiate(version: InterfaceVersion, level: PipelineLevel) -> Result<Self> {
        let highest = match version {
            InterfaceVersion::D3D10_0 => PipelineLevel::Level10_0,
            InterfaceVersion::D3D10_1 => PipelineLevel::Level10_1,
            InterfaceVersion::D3D11_0 => PipelineLevel::Level11_0,
            InterfaceVersion::D3D11_1 | InterfaceVersion::Wddm1_3 | InterfaceVersion::Wddm2_0 => {
                PipelineLevel::Level11_1
            }
        };
        if level > highest {
            umd_bail!(InitializationFailed, "rosumd::ddi",
                "interface {:?} cannot express pipeline level {:?}", version, level);
        }

        Ok(match version {
            InterfaceVersion::D3D10_0 | InterfaceVersion::D3D10_1 => DeviceFunctions::D3D10 { version, level },
            _ => DeviceFunctions::D3D11 { version, level },
        })
    }

    pub fn version(&self) -> InterfaceVersion {
        match *self {
            DeviceFunctions::D3D10 { version, .. } | DeviceFunctions::D3D11 { version, .. } => version,
        }
    }

    pub fn level(&self) -> PipelineLevel {
        match *self {
            DeviceFunctions::D3D10 { level, .. } | DeviceFunctions::D3D11 { level, .. } => level,
        }
    }

    /// Optional entry points of this table
    pub fn features(&self) -> DdiFeatures {
        match *self {
            DeviceFunctions::D3D10 { .. } => DdiFeatures::empty(),
            DeviceFunctions::D3D11 { level, .. } if level >= PipelineLevel::Level11_0 => DdiFeatures::all(),
            DeviceFunctions::D3D11 { .. } => DdiFeatures::empty(),
        }
    }

    /// Whether the table has a shader entry point for `stage`
    pub fn exposes_stage(&self, stage: ShaderStage) -> bool {
        let features = self.features();
        match stage {
            ShaderStage::Vertex | ShaderStage::Geometry | ShaderStage::Pixel => true,
            ShaderStage::Hull => features.contains(DdiFeatures::HULL_SHADER),
            ShaderStage::Domain => features.contains(DdiFeatures::DOMAIN_SHADER),
            ShaderStage::Compute => features.contains(DdiFeatures::COMPUTE_SHADER),
        }
    }

    pub fn exposes_uavs(&self) -> bool {
        self.features().contains(DdiFeatures::UNORDERED_ACCESS)
    }
}

#[cfg(test)]
#[path = "ddi_tests.rs"]
mod tests;
