//! Unit tests for adapter.rs

use std::sync::Arc;

use crate::callbacks::mock_callbacks::{MockKernel, MockRuntime};
use crate::callbacks::{CallbackTable, KernelCallbacks, RuntimeCallbacks, RuntimeDeviceHandle};
use crate::ddi::{DeviceFunctions, InterfaceVersion, PipelineLevel};
use crate::device::{DeviceConfig, DeviceCreateArgs, DeviceLifecycle};
use crate::error::Error;
use crate::resource::{Format, FormatSupport};
use super::*;

fn create_args(functions: DeviceFunctions, config: DeviceConfig) -> DeviceCreateArgs {
    let kernel: Arc<dyn KernelCallbacks> = Arc::new(MockKernel::new());
    let runtime: Arc<dyn RuntimeCallbacks> = Arc::new(MockRuntime::new());
    DeviceCreateArgs {
        functions,
        kernel: CallbackTable::new(kernel),
        runtime: CallbackTable::new(runtime),
        runtime_handle: RuntimeDeviceHandle(1),
        node_ordinal: 0,
        config,
    }
}

fn d3d11_1() -> DeviceFunctions {
    DeviceFunctions::negotiate(InterfaceVersion::D3D11_1, PipelineLevel::Level11_1).unwrap()
}

// ============================================================================
// DEVICE CREATION TESTS
// ============================================================================

#[test]
fn test_create_device_starts_created() {
    let adapter = Adapter::default();
    let device = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default())).unwrap();
    assert_eq!(device.lifecycle(), DeviceLifecycle::Created);
    assert_eq!(device.functions().level(), PipelineLevel::Level11_1);
}

#[test]
fn test_create_device_above_adapter_level() {
    let adapter = Adapter::new(AdapterCaps { max_level: PipelineLevel::Level10_1, ..AdapterCaps::default() });
    let result = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default()));
    assert!(matches!(result, Err(Error::InitializationFailed(_))));

    let functions = DeviceFunctions::negotiate(InterfaceVersion::D3D10_1, PipelineLevel::Level10_1).unwrap();
    adapter.create_device(create_args(functions, DeviceConfig::default())).unwrap();
}

#[test]
fn test_create_device_zero_command_buffer() {
    let adapter = Adapter::default();
    let config = DeviceConfig { command_buffer_size: 0, ..DeviceConfig::default() };
    let result = adapter.create_device(create_args(d3d11_1(), config));
    assert!(matches!(result, Err(Error::InitializationFailed(_))));
}

#[test]
fn test_destroy_device_rules() {
    let adapter = Adapter::default();

    let created = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default())).unwrap();
    adapter.destroy_device(created).unwrap();

    let mut active = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default())).unwrap();
    active.standup().unwrap();
    let mut torn_down = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default())).unwrap();
    torn_down.standup().unwrap();
    torn_down.teardown().unwrap();

    assert!(matches!(adapter.destroy_device(active), Err(Error::Fatal(_))));
    adapter.destroy_device(torn_down).unwrap();
}

// ============================================================================
// CAPABILITY TESTS
// ============================================================================

#[test]
fn test_format_support_queries() {
    let adapter = Adapter::default();
    assert!(adapter.check_format_support(Format::R8G8B8A8_UNORM).contains(FormatSupport::RENDER_TARGET));
    assert!(adapter.check_format_support(Format::D32_FLOAT).contains(FormatSupport::DEPTH_STENCIL));
    assert!(!adapter.check_format_support(Format::D32_FLOAT).contains(FormatSupport::RENDER_TARGET));
    assert!(adapter.check_format_support(Format::UNKNOWN).is_empty());
}

#[test]
fn test_multisample_quality_levels() {
    let adapter = Adapter::default();
    assert_eq!(adapter.check_multisample_quality_levels(Format::R8G8B8A8_UNORM, 4), 1);
    assert_eq!(adapter.check_multisample_quality_levels(Format::R8G8B8A8_UNORM, 8), 0);
    assert_eq!(adapter.check_multisample_quality_levels(Format::D32_FLOAT, 4), 0);
}

#[test]
fn test_device_forwards_capability_queries() {
    let mut caps = AdapterCaps::default();
    caps.counter_info = CounterInfo { num_simultaneous_counters: 2, ..CounterInfo::default() };
    let adapter = Adapter::new(caps);
    let device = adapter.create_device(create_args(d3d11_1(), DeviceConfig::default())).unwrap();

    assert_eq!(device.check_counter_info(), adapter.check_counter_info());
    assert_eq!(device.check_counter_info().num_simultaneous_counters, 2);
    assert_eq!(device.check_format_support(Format::R16_UINT), adapter.check_format_support(Format::R16_UINT));
    assert_eq!(device.check_multisample_quality_levels(Format::B8G8R8A8_UNORM, 1), 1);
}
