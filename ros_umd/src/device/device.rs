/// Device - the orchestrator of one logical GPU context
///
/// A Device owns its pipeline binding snapshot, its resources and its
/// command buffer, and is the only component that talks to the host
/// callback tables. Every public operation runs through an error boundary
/// that records the first failure as the sticky error and reports it to
/// the runtime once.

use std::sync::Arc;
use slotmap::SlotMap;

use crate::adapter::{AdapterCaps, CounterInfo};

use crate::callbacks::{
    AllocateRequest, AllocationHandle, CallbackTable, ContextHandle, CreateContextRequest,
    DeallocateRequest, DestroyContextRequest, KernelCallbackKind, KernelCallbacks, KernelStatus,
    LockFlags, LockRequest, LockedAllocation, RuntimeCallbacks, RuntimeDeviceHandle, UnlockRequest,
};
use crate::command::{Command, CommandBuffer};
use crate::ddi::DeviceFunctions;
use crate::error::{Error, Result};
use crate::resource::{Format, FormatSupport, MapState, Resource, ResourceKey};
use crate::{umd_bail, umd_debug, umd_error, umd_info, umd_warn};
use super::pipeline_state::PipelineState;

/// Size of one command buffer page
pub const PAGE_SIZE: usize = 4096;

/// Alignment requested for every kernel allocation
pub(crate) const ALLOCATION_ALIGNMENT: u64 = 256;

// ===== CONFIGURATION =====

/// Device configuration
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Command buffer capacity in bytes (rounded up to whole pages, capped by the kernel)
    pub command_buffer_size: usize,
    /// Also check that resources referenced by a draw carry the matching bind flags
    pub validate_draws: bool,
    /// Name used in log messages
    pub debug_name: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            command_buffer_size: 4 * PAGE_SIZE,
            validate_draws: cfg!(debug_assertions),
            debug_name: "RosUmd Device".to_string(),
        }
    }
}

impl DeviceConfig {
    /// Command buffer capacity for a kernel accepting at most `kernel_max` bytes per submission
    pub fn effective_command_buffer_size(&self, kernel_max: usize) -> Result<usize> {
        let pages = self.command_buffer_size.div_ceil(PAGE_SIZE).max(1);
        let size = pages.saturating_mul(PAGE_SIZE).min(kernel_max);
        if size == 0 {
            umd_bail!(InitializationFailed, "rosumd::Device",
                "kernel accepts no command buffer bytes");
        }
        Ok(size)
    }
}

/// Everything the adapter hands to a new device
pub struct DeviceCreateArgs {
    pub functions: DeviceFunctions,
    pub kernel: CallbackTable<dyn KernelCallbacks>,
    pub runtime: CallbackTable<dyn RuntimeCallbacks>,
    /// Handle passed back on runtime upcalls
    pub runtime_handle: RuntimeDeviceHandle,
    /// GPU engine the context is created on
    pub node_ordinal: u32,
    pub config: DeviceConfig,
}

// ===== LIFECYCLE / STATS =====

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceLifecycle {
    /// Created by the adapter, `standup` not called yet
    Created,
    /// Accepting calls
    Active,
    /// A fatal error occurred; only `teardown` is accepted
    Lost,
    /// `destroy_context` ran; only `teardown` is accepted
    ContextDestroyed,
    /// `teardown` ran; the adapter may destroy the device
    TornDown,
}

/// Device statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Draw records encoded
    pub draws: u64,
    /// Clear records encoded
    pub clears: u64,
    /// Resource copies (GPU records and CPU copies)
    pub copies: u64,
    /// Non-empty command buffers submitted
    pub flushes: u64,
    /// Bytes submitted through `render`
    pub submitted_bytes: u64,
}

// ===== DEVICE =====

pub struct Device {
    caps: Arc<AdapterCaps>,
    pub(super) config: DeviceConfig,
    pub(super) functions: DeviceFunctions,
    kernel: CallbackTable<dyn KernelCallbacks>,
    runtime: CallbackTable<dyn RuntimeCallbacks>,
    runtime_handle: RuntimeDeviceHandle,
    node_ordinal: u32,
    context: Option<ContextHandle>,
    lifecycle: DeviceLifecycle,
    sticky_error: Option<Error>,
    pub(super) command_buffer: CommandBuffer,
    pub(super) resources: SlotMap<ResourceKey, Resource>,
    pub(super) state: PipelineState,
    pub(super) stats: DeviceStats,
}

impl Device {
    pub(crate) fn new(args: DeviceCreateArgs, caps: Arc<AdapterCaps>) -> Self {
        umd_debug!("rosumd::Device", "created '{}' ({:?} at {:?})",
            args.config.debug_name, args.functions.version(), args.functions.level());
        Self {
            caps,
            config: args.config,
            functions: args.functions,
            kernel: args.kernel,
            runtime: args.runtime,
            runtime_handle: args.runtime_handle,
            node_ordinal: args.node_ordinal,
            context: None,
            lifecycle: DeviceLifecycle::Created,
            sticky_error: None,
            command_buffer: CommandBuffer::new(0),
            resources: SlotMap::with_key(),
            state: PipelineState::default(),
            stats: DeviceStats::default(),
        }
    }

    // ===== ACCESSORS =====

    pub fn lifecycle(&self) -> DeviceLifecycle {
        self.lifecycle
    }

    pub fn functions(&self) -> DeviceFunctions {
        self.functions
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Kernel context, once stood up
    pub fn context(&self) -> Option<ContextHandle> {
        self.context
    }

    pub fn runtime_handle(&self) -> RuntimeDeviceHandle {
        self.runtime_handle
    }

    /// Pending sticky error
    pub fn error(&self) -> Option<&Error> {
        self.sticky_error.as_ref()
    }

    /// Clear the sticky error so calls are accepted again
    ///
    /// A lost device stays lost.
    pub fn clear_error(&mut self) {
        self.sticky_error = None;
    }

    pub fn pipeline_state(&self) -> &PipelineState {
        &self.state
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }

    pub fn resource(&self, key: ResourceKey) -> Option<&Resource> {
        self.resources.get(key)
    }

    pub fn resource_count(&self) -> usize {
        self.resources.len()
    }

    /// Bytes waiting in the command buffer
    pub fn pending_command_bytes(&self) -> usize {
        self.command_buffer.len()
    }

    pub fn command_buffer_capacity(&self) -> usize {
        self.command_buffer.capacity()
    }

    // ===== CAPABILITIES =====

    pub fn check_format_support(&self, format: Format) -> FormatSupport {
        self.caps.format_support(format)
    }

    pub fn check_counter_info(&self) -> CounterInfo {
        self.caps.counter_info
    }

    pub fn check_multisample_quality_levels(&self, format: Format, sample_count: u32) -> u32 {
        self.caps.multisample_quality_levels(format, sample_count)
    }

    // ===== LIFECYCLE =====

    /// Create the kernel context; must be called exactly once before any other operation
    pub fn standup(&mut self) -> Result<()> {
        if self.lifecycle != DeviceLifecycle::Created {
            umd_bail!(Fatal, "rosumd::Device", "standup called on a {:?} device", self.lifecycle);
        }

        let kernel = self.kernel.resolve()?;
        let info = kernel
            .create_context(&CreateContextRequest { node_ordinal: self.node_ordinal })
            .map_err(kernel_error(KernelCallbackKind::CreateContext))?;
        let size = self.config.effective_command_buffer_size(info.max_command_buffer_size)?;

        self.command_buffer = CommandBuffer::new(size);
        self.context = Some(info.context);
        self.lifecycle = DeviceLifecycle::Active;
        umd_info!("rosumd::Device", "'{}' stood up on context {:#x} ({} byte command buffer)",
            self.config.debug_name, info.context.0, size);
        Ok(())
    }

    /// Submit pending work, release every allocation and the context
    ///
    /// Accepted in any state between `standup` and a previous `teardown`,
    /// including after a fatal error. Outstanding maps are released. Returns
    /// the first kernel failure, after finishing the teardown regardless.
    pub fn teardown(&mut self) -> Result<()> {
        match self.lifecycle {
            DeviceLifecycle::Created | DeviceLifecycle::TornDown => {
                umd_bail!(Fatal, "rosumd::Device", "teardown called on a {:?} device", self.lifecycle);
            }
            _ => {}
        }

        let mut first_error: Option<Error> = None;
        let mut keep = |result: Result<()>| {
            if let Err(err) = result {
                first_error.get_or_insert(err);
            }
        };

        if self.lifecycle == DeviceLifecycle::Active {
            keep(self.flush_commands());
        } else {
            self.command_buffer.discard();
        }

        if self.context.is_some() {
            keep(self.release_mappings());
            keep(self.deallocate_all());
            keep(self.kernel_destroy_context());
        }

        self.resources.clear();
        self.state = PipelineState::default();
        self.context = None;
        self.lifecycle = DeviceLifecycle::TornDown;
        umd_info!("rosumd::Device", "'{}' torn down", self.config.debug_name);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Discard pending work and release the kernel context
    ///
    /// Accepted on an active or lost device, with or without a pending error.
    /// Fatal if any subresource is still mapped. Kernel failures are recorded
    /// but the context counts as destroyed either way; afterwards only
    /// `teardown` is accepted.
    pub fn destroy_context(&mut self) -> Result<()> {
        match self.lifecycle {
            DeviceLifecycle::Active | DeviceLifecycle::Lost => {}
            DeviceLifecycle::Created | DeviceLifecycle::TornDown => {
                return Err(Error::Fatal(format!(
                    "destroy_context called on a {:?} device", self.lifecycle)));
            }
            DeviceLifecycle::ContextDestroyed => {
                return Err(Error::InvalidState("context already destroyed".to_string()));
            }
        }
        self.release_context().inspect_err(|err| self.record_error(err))
    }

    fn release_context(&mut self) -> Result<()> {
        if let Some((key, _)) = self.resources.iter().find(|(_, resource)| resource.any_mapped()) {
            umd_bail!(Fatal, "rosumd::Device", "destroy_context with resource {:?} still mapped", key);
        }

        let discarded = self.command_buffer.command_count();
        self.command_buffer.discard();
        let released = self.deallocate_all();
        let destroyed = self.kernel_destroy_context();
        self.context = None;
        self.lifecycle = DeviceLifecycle::ContextDestroyed;
        umd_info!("rosumd::Device", "'{}' context destroyed ({} pending commands discarded)",
            self.config.debug_name, discarded);
        released.and(destroyed)
    }

    /// Submit pending commands to the kernel
    pub fn flush(&mut self) -> Result<()> {
        self.guarded("flush", |device| device.flush_commands())
    }

    // ===== ERROR BOUNDARY =====

    /// Run a public operation: reject it if the device cannot take calls,
    /// otherwise run `op` and record its failure
    pub(super) fn guarded<T>(&mut self, name: &str, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.check_callable(name)?;
        op(self).inspect_err(|err| self.record_error(err))
    }

    fn check_callable(&self, name: &str) -> Result<()> {
        match self.lifecycle {
            DeviceLifecycle::Active => {}
            DeviceLifecycle::Created | DeviceLifecycle::TornDown => {
                return Err(Error::Fatal(format!(
                    "{} called on a {:?} device (outside standup/teardown)", name, self.lifecycle)));
            }
            DeviceLifecycle::Lost => {
                return Err(Error::Fatal(format!("{} called on a lost device", name)));
            }
            DeviceLifecycle::ContextDestroyed => {
                return Err(Error::InvalidState(format!("{} called after destroy_context", name)));
            }
        }
        if let Some(pending) = &self.sticky_error {
            umd_warn!("rosumd::Device", "{} rejected: error pending ({})", name, pending);
            return Err(Error::InvalidState(format!("{} rejected: error pending ({})", name, pending)));
        }
        Ok(())
    }

    fn record_error(&mut self, err: &Error) {
        let lost = err.is_fatal()
            || matches!(err, Error::KernelRejected { status: KernelStatus::DeviceRemoved, .. });
        if lost {
            self.lifecycle = DeviceLifecycle::Lost;
        }
        if self.sticky_error.is_some() {
            return;
        }

        umd_error!("rosumd::Device", "'{}' error: {} (reported as {:?})",
            self.config.debug_name, err, err.code());
        self.sticky_error = Some(err.clone());
        match self.runtime.resolve() {
            Ok(runtime) => runtime.set_error(self.runtime_handle, err.code()),
            Err(resolve_err) => umd_error!("rosumd::Device", "cannot report error: {}", resolve_err),
        }
    }

    // ===== COMMAND SUBMISSION =====

    pub(super) fn flush_commands(&mut self) -> Result<()> {
        if self.command_buffer.is_empty() {
            return Ok(());
        }
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        let submitted = self.command_buffer.flush(kernel.as_ref(), context)?;
        self.stats.flushes += 1;
        self.stats.submitted_bytes += submitted as u64;
        Ok(())
    }

    /// Append a record, flushing once and retrying if the buffer is full
    pub(super) fn submit(&mut self, command: Command) -> Result<()> {
        match self.command_buffer.append(&command) {
            Err(Error::CapacityExceeded(_)) => {
                umd_debug!("rosumd::Device", "command buffer full ({} bytes), flushing",
                    self.command_buffer.len());
                self.flush_commands()?;
                self.command_buffer.append(&command).map_err(|err| {
                    umd_error!("rosumd::Device", "{:?} record never fits: {}", command.opcode(), err);
                    err
                })
            }
            other => other,
        }
    }

    // ===== KERNEL WRAPPERS =====

    fn require_context(&self) -> Result<ContextHandle> {
        self.context.ok_or_else(|| Error::Fatal("no kernel context".to_string()))
    }

    pub(super) fn kernel_allocate(&self, size: u64, cpu_visible: bool) -> Result<AllocationHandle> {
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        let allocation = kernel
            .allocate(&AllocateRequest { context, size, alignment: ALLOCATION_ALIGNMENT, cpu_visible })
            .map_err(kernel_error(KernelCallbackKind::Allocate))?;
        umd_debug!("rosumd::Device", "allocated {:?} ({} bytes)", allocation, size);
        Ok(allocation)
    }

    pub(super) fn kernel_deallocate(&self, allocations: &[AllocationHandle]) -> Result<()> {
        if allocations.is_empty() {
            return Ok(());
        }
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        kernel
            .deallocate(&DeallocateRequest { context, allocations })
            .map_err(kernel_error(KernelCallbackKind::Deallocate))
    }

    pub(super) fn kernel_lock(&self, allocation: AllocationHandle, flags: LockFlags) -> Result<LockedAllocation> {
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        kernel
            .lock(&LockRequest { context, allocation, flags })
            .map_err(kernel_error(KernelCallbackKind::Lock))
    }

    pub(super) fn kernel_unlock(&self, allocation: AllocationHandle) -> Result<()> {
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        kernel
            .unlock(&UnlockRequest { context, allocations: &[allocation] })
            .map_err(kernel_error(KernelCallbackKind::Unlock))
    }

    fn kernel_destroy_context(&mut self) -> Result<()> {
        let context = self.require_context()?;
        let kernel = self.kernel.resolve()?;
        kernel
            .destroy_context(&DestroyContextRequest { context })
            .map_err(kernel_error(KernelCallbackKind::DestroyContext))
    }

    /// Release every kernel allocation in one call
    fn deallocate_all(&mut self) -> Result<()> {
        let allocations: Vec<AllocationHandle> = self
            .resources
            .values_mut()
            .filter_map(|resource| resource.release_allocation())
            .collect();
        self.kernel_deallocate(&allocations)
    }

    /// Drop every outstanding map, unlocking kernel-locked ones
    fn release_mappings(&mut self) -> Result<()> {
        let mut locked = Vec::new();
        for (key, resource) in self.resources.iter_mut() {
            for subresource in 0..resource.subresource_count() {
                if !resource.is_mapped(subresource) {
                    continue;
                }
                umd_warn!("rosumd::Device", "releasing map of {:?} subresource {}", key, subresource);
                if let MapState::Mapped { locked: true, .. } = resource.end_map(subresource)? {
                    if let Some(allocation) = resource.allocation() {
                        locked.push(allocation);
                    }
                }
            }
        }
        locked.into_iter().try_for_each(|allocation| self.kernel_unlock(allocation))
    }
}

/// Map a kernel status to `Error::KernelRejected`, logging it
pub(super) fn kernel_error(callback: KernelCallbackKind) -> impl FnOnce(KernelStatus) -> Error {
    move |status| {
        umd_error!("rosumd::Device", "kernel {:?} callback failed: {:?}", callback, status);
        Error::KernelRejected { callback, status }
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
