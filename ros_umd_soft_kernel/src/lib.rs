/*!
# RosUmd Soft Kernel

Software implementation of the RosUmd kernel callback table.

Allocations live in system memory, locks hand out pointers into them, and
submitted command buffers are decoded and executed on the CPU: copies and
clears change allocation contents, draws are validated and counted. The
kernel also records every submission and can be told to fail the next call
of a given callback, which makes it the host for end-to-end device tests.

Enable the `trace-commands` feature to trace every executed record through
the driver logger.
*/

use std::sync::Arc;
use ros_umd::rosumd::callbacks::{CallbackTable, KernelCallbacks, RuntimeCallbacks, RuntimeDeviceHandle};
use ros_umd::rosumd::{DeviceConfig, DeviceCreateArgs, DeviceFunctions};

mod soft_kernel;
mod executor;
mod recording_runtime;

pub use soft_kernel::{SoftKernel, SoftKernelConfig, Submission};
pub use executor::ExecutionStats;
pub use recording_runtime::RecordingRuntime;

/// Wire a device to a soft kernel and a recording runtime
///
/// Returns the creation arguments together with the kernel callback slot,
/// so tests can install a different table later.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use ros_umd::rosumd::{Adapter, DeviceConfig, DeviceFunctions, InterfaceVersion, PipelineLevel};
/// use ros_umd_soft_kernel::{device_args, RecordingRuntime, SoftKernel};
///
/// let kernel = Arc::new(SoftKernel::default());
/// let runtime = Arc::new(RecordingRuntime::default());
/// let functions = DeviceFunctions::negotiate(InterfaceVersion::Wddm2_0, PipelineLevel::Level11_0)?;
/// let (args, _slot) = device_args(&kernel, &runtime, functions, DeviceConfig::default());
/// let mut device = Adapter::default().create_device(args)?;
/// device.standup()?;
/// # Ok::<(), ros_umd::rosumd::Error>(())
/// ```
pub fn device_args(
    kernel: &Arc<SoftKernel>,
    runtime: &Arc<RecordingRuntime>,
    functions: DeviceFunctions,
    config: DeviceConfig,
) -> (DeviceCreateArgs, CallbackTable<dyn KernelCallbacks>) {
    let kernel: Arc<dyn KernelCallbacks> = kernel.clone();
    let runtime: Arc<dyn RuntimeCallbacks> = runtime.clone();
    let kernel_table = CallbackTable::new(kernel);
    let args = DeviceCreateArgs {
        functions,
        kernel: kernel_table.clone(),
        runtime: CallbackTable::new(runtime),
        runtime_handle: RuntimeDeviceHandle(1),
        node_ordinal: 0,
        config,
    };
    (args, kernel_table)
}
