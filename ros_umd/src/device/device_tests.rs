//! Unit tests for device.rs
//!
//! Lifecycle window, sticky error boundary, flushing and the kernel
//! callback bridge.

use std::sync::Arc;

use crate::callbacks::mock_callbacks::MockKernel;
use crate::callbacks::{KernelCallbackKind, KernelCallbacks, KernelStatus};
use crate::command::{Command, CommandReader};
use crate::error::{Error, ErrorCode};
use crate::resource::{MapFlags, MapType, ResourceDesc};
use crate::state::PrimitiveTopology;
use super::*;
use crate::device::test_support::*;

/// Size of one encoded whole-resource copy record
const COPY_RECORD: usize = 32;

// ============================================================================
// CONFIG TESTS
// ============================================================================

#[test]
fn test_default_config() {
    let config = DeviceConfig::default();
    assert_eq!(config.command_buffer_size, 4 * PAGE_SIZE);
}

#[test]
fn test_command_buffer_size_rounds_to_pages() {
    let config = DeviceConfig { command_buffer_size: 5000, ..DeviceConfig::default() };
    assert_eq!(config.effective_command_buffer_size(usize::MAX).unwrap(), 2 * PAGE_SIZE);
}

#[test]
fn test_command_buffer_size_capped_by_kernel() {
    let config = DeviceConfig::default();
    assert_eq!(config.effective_command_buffer_size(1000).unwrap(), 1000);
    assert!(matches!(config.effective_command_buffer_size(0), Err(Error::InitializationFailed(_))));
}

// ============================================================================
// LIFECYCLE TESTS
// ============================================================================

#[test]
fn test_standup_creates_context() {
    let test = active_device();
    assert_eq!(test.device.lifecycle(), DeviceLifecycle::Active);
    assert!(test.device.context().is_some());
    assert_eq!(test.device.command_buffer_capacity(), 4 * PAGE_SIZE);
    assert_eq!(test.kernel.calls(), vec![KernelCallbackKind::CreateContext]);
}

#[test]
fn test_calls_before_standup_rejected() {
    let mut test = created_device(d3d11_functions(), test_config(), MockKernel::new());
    let device = &mut test.device;

    assert!(matches!(device.set_topology(PrimitiveTopology::TriangleList), Err(Error::Fatal(_))));
    assert!(matches!(device.draw(3, 0), Err(Error::Fatal(_))));
    assert!(matches!(device.create_resource(ResourceDesc::vertex_buffer(16), None), Err(Error::Fatal(_))));
    assert!(matches!(device.teardown(), Err(Error::Fatal(_))));

    // Rejections change nothing and never reach the host
    assert_eq!(device.lifecycle(), DeviceLifecycle::Created);
    assert!(device.error().is_none());
    assert!(test.kernel.calls().is_empty());
    assert!(test.runtime.errors().is_empty());
}

#[test]
fn test_standup_twice_rejected() {
    let mut test = active_device();
    assert!(matches!(test.device.standup(), Err(Error::Fatal(_))));
    assert_eq!(test.kernel.call_count(KernelCallbackKind::CreateContext), 1);
    assert_eq!(test.device.lifecycle(), DeviceLifecycle::Active);
}

#[test]
fn test_failed_standup_leaves_device_created() {
    let kernel = MockKernel::new();
    kernel.fail_next(KernelCallbackKind::CreateContext, KernelStatus::OutOfMemory);
    let mut test = created_device(d3d11_functions(), test_config(), kernel);

    assert!(matches!(test.device.standup(), Err(Error::KernelRejected { .. })));
    assert_eq!(test.device.lifecycle(), DeviceLifecycle::Created);
    test.device.standup().unwrap();
}

#[test]
fn test_calls_after_teardown_rejected() {
    let mut test = active_device();
    test.device.teardown().unwrap();
    assert_eq!(test.device.lifecycle(), DeviceLifecycle::TornDown);

    let calls_before = test.kernel.calls().len();
    assert!(matches!(test.device.draw(3, 0), Err(Error::Fatal(_))));
    assert!(matches!(test.device.flush(), Err(Error::Fatal(_))));
    assert!(matches!(test.device.teardown(), Err(Error::Fatal(_))));
    assert_eq!(test.kernel.calls().len(), calls_before);
}

#[test]
fn test_teardown_flushes_and_releases() {
    let mut test = active_device();
    let device = &mut test.device;
    bind_triangle_input(device);
    device.draw(3, 0).unwrap();
    assert!(device.pending_command_bytes() > 0);

    device.teardown().unwrap();
    assert_eq!(test.kernel.submissions().len(), 1);
    assert_eq!(test.kernel.live_allocations(), 0);
    assert_eq!(test.kernel.destroyed_contexts().len(), 1);
    assert_eq!(device.resource_count(), 0);
    assert_eq!(
        test.kernel.calls().last(),
        Some(&KernelCallbackKind::DestroyContext)
    );
}

#[test]
fn test_teardown_releases_outstanding_maps() {
    let mut test = active_device_with_config(DeviceConfig { validate_draws: false, ..test_config() });
    let device = &mut test.device;

    // Drawing from a staging buffer makes it GPU-bound, so its map takes a kernel lock
    let staging = device.create_resource(ResourceDesc::staging_buffer(64), None).unwrap();
    device.set_vertex_buffers(0, &[Some(staging)], &[12], &[0]).unwrap();
    device.set_topology(PrimitiveTopology::TriangleList).unwrap();
    device.draw(3, 0).unwrap();
    device.staging_resource_map(staging, 0, MapType::Read, MapFlags::empty()).unwrap();
    assert!(test.kernel.call_count(KernelCallbackKind::Lock) > test.kernel.call_count(KernelCallbackKind::Unlock));

    device.teardown().unwrap();
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Lock), test.kernel.call_count(KernelCallbackKind::Unlock));
}

// ============================================================================
// STICKY ERROR TESTS
// ============================================================================

#[test]
fn test_kernel_rejection_reported_once() {
    let mut test = active_device();
    let device = &mut test.device;
    bind_triangle_input(device);
    device.draw(3, 0).unwrap();

    test.kernel.fail_next(KernelCallbackKind::Render, KernelStatus::OutOfMemory);
    let expected = Error::KernelRejected { callback: KernelCallbackKind::Render, status: KernelStatus::OutOfMemory };
    assert_eq!(device.flush(), Err(expected.clone()));
    assert_eq!(device.error(), Some(&expected));

    // Further calls bounce off the pending error without re-reporting it
    assert!(matches!(device.draw(3, 0), Err(Error::InvalidState(_))));
    assert!(matches!(device.set_topology(PrimitiveTopology::PointList), Err(Error::InvalidState(_))));
    assert_eq!(device.pipeline_state().topology, PrimitiveTopology::TriangleList);
    assert_eq!(test.runtime.errors(), vec![(RUNTIME_HANDLE, ErrorCode::OutOfMemory)]);

    device.clear_error();
    device.draw(3, 0).unwrap();
    device.flush().unwrap();
    assert_eq!(test.runtime.errors().len(), 1);
    assert_eq!(device.lifecycle(), DeviceLifecycle::Active);
}

#[test]
fn test_validation_error_reported_as_invalid_arg() {
    let mut test = active_device();
    assert!(matches!(test.device.draw(3, 0), Err(Error::InvalidState(_))));
    assert_eq!(test.runtime.errors(), vec![(RUNTIME_HANDLE, ErrorCode::InvalidArg)]);
}

#[test]
fn test_fatal_error_loses_device() {
    let mut test = active_device();
    let device = &mut test.device;
    let staging = device.create_resource(ResourceDesc::staging_buffer(16), None).unwrap();
    device.staging_resource_map(staging, 0, MapType::Write, MapFlags::empty()).unwrap();

    assert!(matches!(device.destroy_resource(staging), Err(Error::Fatal(_))));
    assert_eq!(device.lifecycle(), DeviceLifecycle::Lost);
    assert_eq!(test.runtime.errors(), vec![(RUNTIME_HANDLE, ErrorCode::DeviceRemoved)]);

    device.clear_error();
    assert!(matches!(device.flush(), Err(Error::Fatal(_))));
    device.teardown().unwrap();
}

#[test]
fn test_device_removed_status_loses_device() {
    let mut test = active_device();
    let device = &mut test.device;
    test.kernel.fail_next(KernelCallbackKind::Allocate, KernelStatus::DeviceRemoved);
    bind_triangle_input(device);

    assert!(device.draw(3, 0).is_err());
    assert_eq!(device.lifecycle(), DeviceLifecycle::Lost);
}

// ============================================================================
// SUBMISSION TESTS
// ============================================================================

/// Two GPU-bound buffers, so every copy between them is encoded
fn gpu_pair(device: &mut Device) -> (crate::resource::ResourceKey, crate::resource::ResourceKey) {
    let a = device.create_resource(ResourceDesc::vertex_buffer(64), None).unwrap();
    let b = device.create_resource(ResourceDesc::vertex_buffer(64), None).unwrap();
    device.resource_copy(a, b).unwrap();
    (a, b)
}

#[test]
fn test_flush_empty_is_silent() {
    let mut test = active_device();
    test.device.flush().unwrap();
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 0);
    assert_eq!(test.device.stats().flushes, 0);
}

#[test]
fn test_full_buffer_flushes_exactly_once() {
    let mut test = active_device_on(MockKernel::with_max_command_buffer_size(2 * COPY_RECORD + COPY_RECORD / 2));
    let device = &mut test.device;
    let (a, b) = gpu_pair(device);
    device.resource_copy(b, a).unwrap();
    assert_eq!(device.pending_command_bytes(), 2 * COPY_RECORD);
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 0);

    device.resource_copy(a, b).unwrap();
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 1);
    assert_eq!(test.kernel.submissions()[0].command_count, 2);
    assert_eq!(device.pending_command_bytes(), COPY_RECORD);
    assert_eq!(device.stats().flushes, 1);
    assert_eq!(device.stats().submitted_bytes, 2 * COPY_RECORD as u64);
}

#[test]
fn test_record_that_never_fits() {
    let mut test = active_device_on(MockKernel::with_max_command_buffer_size(100));
    let device = &mut test.device;
    bind_triangle_input(device);

    assert!(matches!(device.draw(3, 0), Err(Error::CapacityExceeded(_))));
    assert_eq!(device.lifecycle(), DeviceLifecycle::Active);
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 0);

    device.clear_error();
    gpu_pair(device);
    device.flush().unwrap();
    assert_eq!(test.kernel.submissions().len(), 1);
}

#[test]
fn test_callback_table_replacement_redirects_submission() {
    let mut test = active_device();
    let device = &mut test.device;
    let (a, b) = gpu_pair(device);
    device.flush().unwrap();

    let replacement = Arc::new(MockKernel::new());
    test.kernel_table.replace(replacement.clone() as Arc<dyn KernelCallbacks>).unwrap();
    device.resource_copy(b, a).unwrap();
    device.flush().unwrap();

    assert_eq!(test.kernel.submissions().len(), 1);
    assert_eq!(replacement.submissions().len(), 1);
    let commands = CommandReader::read_all(&replacement.submissions()[0].commands).unwrap();
    assert!(matches!(commands[0], Command::CopyResource(_)));
}

// ============================================================================
// DESTROY CONTEXT TESTS
// ============================================================================

#[test]
fn test_destroy_context_releases_everything() {
    let mut test = active_device();
    let device = &mut test.device;
    gpu_pair(device);
    assert_eq!(test.kernel.live_allocations(), 2);
    assert!(device.pending_command_bytes() > 0);

    device.destroy_context().unwrap();
    assert_eq!(device.lifecycle(), DeviceLifecycle::ContextDestroyed);
    assert_eq!(test.kernel.live_allocations(), 0);
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 0);
    assert_eq!(test.kernel.destroyed_contexts().len(), 1);

    assert!(matches!(device.draw(3, 0), Err(Error::InvalidState(_))));
    assert!(matches!(device.flush(), Err(Error::InvalidState(_))));

    let calls_before = test.kernel.calls().len();
    device.teardown().unwrap();
    assert_eq!(test.kernel.calls().len(), calls_before);
}

#[test]
fn test_destroy_context_while_mapped_is_fatal() {
    let mut test = active_device();
    let device = &mut test.device;
    let staging = device.create_resource(ResourceDesc::staging_buffer(16), None).unwrap();
    device.staging_resource_map(staging, 0, MapType::Read, MapFlags::empty()).unwrap();

    assert!(matches!(device.destroy_context(), Err(Error::Fatal(_))));
    assert!(test.kernel.destroyed_contexts().is_empty());
    assert_eq!(device.lifecycle(), DeviceLifecycle::Lost);
}

#[test]
fn test_destroy_context_with_error_pending() {
    let mut test = active_device();
    let device = &mut test.device;
    gpu_pair(device);
    assert!(device.draw(3, 0).is_err());
    assert!(device.error().is_some());

    device.destroy_context().unwrap();
    assert_eq!(device.lifecycle(), DeviceLifecycle::ContextDestroyed);
    assert_eq!(test.kernel.live_allocations(), 0);
    assert_eq!(test.kernel.destroyed_contexts().len(), 1);
    assert_eq!(test.kernel.call_count(KernelCallbackKind::Render), 0);
    assert_eq!(test.runtime.errors().len(), 1);
    device.teardown().unwrap();
}

#[test]
fn test_destroy_context_on_lost_device() {
    let mut test = active_device();
    let device = &mut test.device;
    gpu_pair(device);
    test.kernel.fail_next(KernelCallbackKind::Render, KernelStatus::DeviceRemoved);
    assert!(device.flush().is_err());
    assert_eq!(device.lifecycle(), DeviceLifecycle::Lost);

    device.destroy_context().unwrap();
    assert_eq!(device.lifecycle(), DeviceLifecycle::ContextDestroyed);
    assert_eq!(test.kernel.live_allocations(), 0);
    assert_eq!(test.kernel.destroyed_contexts().len(), 1);

    let calls_before = test.kernel.calls().len();
    device.teardown().unwrap();
    assert_eq!(test.kernel.calls().len(), calls_before);
}

#[test]
fn test_destroy_context_kernel_failure_still_destroys() {
    let mut test = active_device();
    let device = &mut test.device;
    gpu_pair(device);
    test.kernel.fail_next(KernelCallbackKind::Deallocate, KernelStatus::InvalidParameter);

    assert!(matches!(device.destroy_context(), Err(Error::KernelRejected { .. })));
    assert_eq!(device.lifecycle(), DeviceLifecycle::ContextDestroyed);
    assert_eq!(test.kernel.destroyed_contexts().len(), 1);
    assert_eq!(test.runtime.errors().len(), 1);
    assert!(matches!(device.destroy_context(), Err(Error::InvalidState(_))));
}
