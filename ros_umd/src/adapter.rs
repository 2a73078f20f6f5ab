/// Adapter - device creation contract and capability queries
///
/// The adapter answers the runtime's capability queries from a small table
/// configured in code, creates devices, and destroys them once torn down.

use std::sync::Arc;
use rustc_hash::FxHashMap;

use crate::ddi::PipelineLevel;
use crate::device::{Device, DeviceCreateArgs, DeviceLifecycle};
use crate::error::Result;
use crate::resource::{Format, FormatSupport};
use crate::{umd_bail, umd_info};

/// Performance counter capabilities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterInfo {
    pub last_device_dependent_counter: u32,
    pub num_simultaneous_counters: u32,
    pub num_detectable_parallel_units: u8,
}

/// Capability table of one adapter
#[derive(Debug, Clone)]
pub struct AdapterCaps {
    /// Highest pipeline level a device may be created at
    pub max_level: PipelineLevel,
    pub format_support: FxHashMap<Format, FormatSupport>,
    /// Quality levels per (format, sample count)
    pub multisample_quality_levels: FxHashMap<(Format, u32), u32>,
    pub counter_info: CounterInfo,
}

impl Default for AdapterCaps {
    fn default() -> Self {
        let color_target = FormatSupport::TEXTURE2D
            | FormatSupport::SHADER_SAMPLE
            | FormatSupport::RENDER_TARGET
            | FormatSupport::BLENDABLE
            | FormatSupport::CPU_LOCKABLE
            | FormatSupport::MULTISAMPLE_RENDERTARGET;
        let vertex = FormatSupport::BUFFER | FormatSupport::IA_VERTEX_BUFFER;
        let index = FormatSupport::BUFFER | FormatSupport::IA_INDEX_BUFFER;
        let depth = FormatSupport::TEXTURE2D | FormatSupport::DEPTH_STENCIL;

        let mut format_support = FxHashMap::default();
        format_support.insert(Format::R8G8B8A8_UNORM, color_target | FormatSupport::DISPLAY);
        format_support.insert(Format::B8G8R8A8_UNORM, color_target | FormatSupport::DISPLAY);
        format_support.insert(Format::R8G8B8A8_UNORM_SRGB, color_target);
        format_support.insert(Format::R8_UNORM, color_target);
        format_support.insert(Format::R32_FLOAT, color_target | vertex);
        format_support.insert(Format::R32G32_FLOAT, vertex | FormatSupport::TEXTURE2D);
        format_support.insert(Format::R32G32B32_FLOAT, vertex);
        format_support.insert(Format::R32G32B32A32_FLOAT, vertex | color_target);
        format_support.insert(Format::R16_UINT, index);
        format_support.insert(Format::R32_UINT, index);
        format_support.insert(Format::D32_FLOAT, depth);
        format_support.insert(Format::D24_UNORM_S8_UINT, depth);

        let mut multisample_quality_levels = FxHashMap::default();
        for (format, support) in &format_support {
            if support.contains(FormatSupport::MULTISAMPLE_RENDERTARGET) {
                multisample_quality_levels.insert((*format, 1), 1);
                multisample_quality_levels.insert((*format, 4), 1);
            }
        }

        Self {
            max_level: PipelineLevel::Level11_1,
            format_support,
            multisample_quality_levels,
            counter_info: CounterInfo::default(),
        }
    }
}

impl AdapterCaps {
    pub fn format_support(&self, format: Format) -> FormatSupport {
        self.format_support.get(&format).copied().unwrap_or(FormatSupport::empty())
    }

    /// Quality levels for `sample_count` samples of `format`; 0 means unsupported
    pub fn multisample_quality_levels(&self, format: Format, sample_count: u32) -> u32 {
        self.multisample_quality_levels.get(&(format, sample_count)).copied().unwrap_or(0)
    }
}

pub struct Adapter {
    caps: Arc<AdapterCaps>,
}

impl Adapter {
    pub fn new(caps: AdapterCaps) -> Self {
        Self { caps: Arc::new(caps) }
    }

    pub fn caps(&self) -> &AdapterCaps {
        &self.caps
    }

    /// Create a device; it accepts calls once `standup` succeeds
    pub fn create_device(&self, args: DeviceCreateArgs) -> Result<Device> {
        if args.functions.level() > self.caps.max_level {
            umd_bail!(InitializationFailed, "rosumd::Adapter",
                "pipeline level {:?} above adapter maximum {:?}", args.functions.level(), self.caps.max_level);
        }
        if args.config.command_buffer_size == 0 {
            umd_bail!(InitializationFailed, "rosumd::Adapter", "command buffer size must be non-zero");
        }
        umd_info!("rosumd::Adapter", "creating device '{}'", args.config.debug_name);
        Ok(Device::new(args, Arc::clone(&self.caps)))
    }

    /// Destroy a device that was torn down (or never stood up)
    ///
    /// A device in any other state is dropped without releasing its kernel
    /// objects and `Error::Fatal` is returned.
    pub fn destroy_device(&self, device: Device) -> Result<()> {
        match device.lifecycle() {
            DeviceLifecycle::Created | DeviceLifecycle::TornDown => {
                umd_info!("rosumd::Adapter", "destroyed device '{}'", device.config().debug_name);
                Ok(())
            }
            lifecycle => umd_bail!(Fatal, "rosumd::Adapter",
                "device '{}' destroyed while {:?}; call teardown first", device.config().debug_name, lifecycle),
        }
    }

    pub fn check_format_support(&self, format: Format) -> FormatSupport {
        self.caps.format_support(format)
    }

    pub fn check_counter_info(&self) -> CounterInfo {
        self.caps.counter_info
    }

    pub fn check_multisample_quality_levels(&self, format: Format, sample_count: u32) -> u32 {
        self.caps.multisample_quality_levels(format, sample_count)
    }
}

impl Default for Adapter {
    fn default() -> Self {
        Self::new(AdapterCaps::default())
    }
}

#[cfg(test)]
#[path = "adapter_tests.rs"]
mod tests;
