/*!
# RosUmd

Device core of a render-only user-mode graphics driver.

This crate tracks the pipeline binding state of a logical GPU context, owns
its resources, and turns draw/clear/copy calls into a batched command stream
that is submitted through a host-provided kernel callback table.

## Architecture

- **Adapter**: creates devices and answers capability queries
- **Device**: binding state, draw dispatch, resource lifecycle, submission
- **Resource**: buffers and textures with subresource layouts and map state
- **CommandBuffer**: bounded batch of encoded records flushed to the kernel
- **KernelCallbacks / RuntimeCallbacks**: the host side, reached through
  swappable `CallbackTable`s

Hosts (a kernel-mode driver bridge, or the software kernel used in tests)
implement the callback traits.
*/

// Internal modules
mod error;
mod driver;
mod adapter;
mod ddi;
pub mod log;
pub mod callbacks;
pub mod command;
pub mod device;
pub mod resource;
pub mod state;
pub mod utils;

// Main rosumd namespace module
pub mod rosumd {
    // Error types
    pub use crate::error::{Error, ErrorCode, Result};

    // Process-wide services (logging)
    pub use crate::driver::Driver;

    // Creation contract
    pub use crate::adapter::{Adapter, AdapterCaps, CounterInfo};
    pub use crate::ddi::{DdiFeatures, DeviceFunctions, InterfaceVersion, PipelineLevel};
    pub use crate::device::{
        Device, DeviceConfig, DeviceCreateArgs, DeviceLifecycle, DeviceStats, OutputMergerBindings,
    };

    // Logging sub-module (types only; the umd_* macros stay at the crate root)
    pub mod log {
        pub use crate::log::{Logger, LogEntry, LogSeverity, DefaultLogger, NullLogger};
    }

    // Host callback tables
    pub mod callbacks {
        pub use crate::callbacks::*;
    }

    // Command stream layout and decoder
    pub mod command {
        pub use crate::command::*;
    }

    // Binding snapshot and slot capacities
    pub mod pipeline {
        pub use crate::device::pipeline_state::*;
    }

    // Resource sub-module
    pub mod resource {
        pub use crate::resource::*;
    }

    // Pipeline state objects and views
    pub mod state {
        pub use crate::state::*;
    }
}

// Re-export math library at crate root
pub use glam;
