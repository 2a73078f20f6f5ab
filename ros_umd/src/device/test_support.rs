/// Device fixtures for unit tests (mock kernel and runtime)

use std::sync::Arc;

use crate::adapter::AdapterCaps;
use crate::callbacks::mock_callbacks::{MockKernel, MockRuntime};
use crate::callbacks::{CallbackTable, KernelCallbacks, RuntimeCallbacks, RuntimeDeviceHandle};
use crate::ddi::{DeviceFunctions, InterfaceVersion, PipelineLevel};
use crate::resource::{Format, ResourceDesc, ResourceKey};
use crate::state::{ElementLayout, InputElement, PrimitiveTopology};
use super::device::{Device, DeviceConfig, DeviceCreateArgs};

pub const RUNTIME_HANDLE: RuntimeDeviceHandle = RuntimeDeviceHandle(0xD0);

pub struct TestDevice {
    pub device: Device,
    pub kernel: Arc<MockKernel>,
    pub runtime: Arc<MockRuntime>,
    pub kernel_table: CallbackTable<dyn KernelCallbacks>,
}

/// Device that has not been stood up
pub fn created_device(functions: DeviceFunctions, config: DeviceConfig, kernel: MockKernel) -> TestDevice {
    let kernel = Arc::new(kernel);
    let runtime = Arc::new(MockRuntime::new());
    let kernel_callbacks: Arc<dyn KernelCallbacks> = kernel.clone();
    let runtime_callbacks: Arc<dyn RuntimeCallbacks> = runtime.clone();
    let kernel_table = CallbackTable::new(kernel_callbacks);
    let runtime_table = CallbackTable::new(runtime_callbacks);
    let device = Device::new(
        DeviceCreateArgs {
            functions,
            kernel: kernel_table.clone(),
            runtime: runtime_table,
            runtime_handle: RUNTIME_HANDLE,
            node_ordinal: 0,
            config,
        },
        Arc::new(AdapterCaps::default()),
    );
    TestDevice { device, kernel, runtime, kernel_table }
}

pub fn d3d11_functions() -> DeviceFunctions {
    DeviceFunctions::negotiate(InterfaceVersion::Wddm2_0, PipelineLevel::Level11_0).unwrap()
}

pub fn test_config() -> DeviceConfig {
    DeviceConfig {
        validate_draws: true,
        debug_name: "unit test device".to_string(),
        ..DeviceConfig::default()
    }
}

/// Stood-up D3D11 device on a fresh mock kernel
pub fn active_device() -> TestDevice {
    active_device_on(MockKernel::new())
}

pub fn active_device_on(kernel: MockKernel) -> TestDevice {
    let mut test = created_device(d3d11_functions(), test_config(), kernel);
    test.device.standup().unwrap();
    test
}

pub fn active_device_with_config(config: DeviceConfig) -> TestDevice {
    let mut test = created_device(d3d11_functions(), config, MockKernel::new());
    test.device.standup().unwrap();
    test
}

/// Bind a 64-byte vertex buffer (stride 12) at slot 0, a position-only
/// layout and a triangle list
pub fn bind_triangle_input(device: &mut Device) -> ResourceKey {
    let buffer = device.create_resource(ResourceDesc::vertex_buffer(64), None).unwrap();
    device.set_vertex_buffers(0, &[Some(buffer)], &[12], &[0]).unwrap();
    device.set_element_layout(Some(ElementLayout::new(vec![InputElement {
        input_slot: 0,
        format: Format::R32G32B32_FLOAT,
        aligned_byte_offset: 0,
    }]))).unwrap();
    device.set_topology(PrimitiveTopology::TriangleList).unwrap();
    buffer
}
