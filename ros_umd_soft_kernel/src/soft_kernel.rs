/// SoftKernel - KernelCallbacks implemented in system memory
///
/// Every callback takes the state lock for its whole duration, so callbacks
/// from several devices serialize. Allocation contents are boxed slices whose
/// heap storage never moves, which keeps locked pointers valid while the
/// slot map around them grows.

use std::ptr::NonNull;
use std::sync::{Mutex, MutexGuard};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, Key, KeyData, SlotMap};

use ros_umd::rosumd::callbacks::{
    AllocateRequest, AllocationHandle, ContextHandle, ContextInfo, CreateContextRequest,
    DeallocateRequest, DestroyContextRequest, KernelCallbackKind, KernelCallbacks, KernelResult,
    KernelStatus, LockFlags, LockRequest, LockedAllocation, RenderRequest, UnlockRequest,
};
use ros_umd::rosumd::command::{Command, CommandReader};
use ros_umd::{umd_debug, umd_warn};

use crate::executor::{execute, ExecutionStats};

new_key_type! {
    pub(crate) struct HeapKey;
}

pub(crate) fn handle_of(key: HeapKey) -> AllocationHandle {
    AllocationHandle(key.data().as_ffi())
}

pub(crate) fn key_of(handle: AllocationHandle) -> HeapKey {
    HeapKey::from(KeyData::from_ffi(handle.0))
}

// ===== CONFIGURATION =====

#[derive(Debug, Clone)]
pub struct SoftKernelConfig {
    /// Largest command buffer accepted by one `render` call
    pub max_command_buffer_size: usize,
    /// Total bytes all live allocations may occupy
    pub memory_budget: u64,
}

impl Default for SoftKernelConfig {
    fn default() -> Self {
        Self {
            max_command_buffer_size: 64 * 1024,
            memory_budget: 64 * 1024 * 1024,
        }
    }
}

// ===== STATE =====

pub(crate) struct Allocation {
    pub(crate) context: ContextHandle,
    pub(crate) bytes: Box<[u8]>,
    pub(crate) cpu_visible: bool,
    pub(crate) lock_count: u32,
}

/// One accepted command buffer, decoded
#[derive(Debug, Clone)]
pub struct Submission {
    pub context: ContextHandle,
    pub bytes: usize,
    pub commands: Vec<Command>,
    pub allocations: Vec<AllocationHandle>,
}

#[derive(Default)]
pub(crate) struct KernelState {
    pub(crate) heap: SlotMap<HeapKey, Allocation>,
    used_bytes: u64,
    next_context: u64,
    live_contexts: Vec<ContextHandle>,
    submissions: Vec<Submission>,
    lock_requests: Vec<LockRequest>,
    call_counts: FxHashMap<KernelCallbackKind, usize>,
    pending_failures: FxHashMap<KernelCallbackKind, KernelStatus>,
    pub(crate) stats: ExecutionStats,
}

// ===== SOFT KERNEL =====

pub struct SoftKernel {
    config: SoftKernelConfig,
    state: Mutex<KernelState>,
}

impl Default for SoftKernel {
    fn default() -> Self {
        Self::new(SoftKernelConfig::default())
    }
}

impl SoftKernel {
    pub fn new(config: SoftKernelConfig) -> Self {
        Self {
            config,
            state: Mutex::new(KernelState {
                next_context: 1,
                ..Default::default()
            }),
        }
    }

    pub fn config(&self) -> &SoftKernelConfig {
        &self.config
    }

    /// Make the next call of `kind` fail with `status`
    pub fn fail_next(&self, kind: KernelCallbackKind, status: KernelStatus) {
        if let Ok(mut state) = self.state.lock() {
            state.pending_failures.insert(kind, status);
        }
    }

    /// Every command buffer accepted so far
    pub fn submissions(&self) -> Vec<Submission> {
        self.read(|state| state.submissions.clone())
    }

    pub fn call_count(&self, kind: KernelCallbackKind) -> usize {
        self.read(|state| state.call_counts.get(&kind).copied().unwrap_or(0))
    }

    pub fn live_allocations(&self) -> usize {
        self.read(|state| state.heap.len())
    }

    pub fn live_contexts(&self) -> Vec<ContextHandle> {
        self.read(|state| state.live_contexts.clone())
    }

    /// Copy of an allocation's current contents
    pub fn allocation_contents(&self, allocation: AllocationHandle) -> Option<Vec<u8>> {
        self.read(|state| state.heap.get(key_of(allocation)).map(|entry| entry.bytes.to_vec()))
    }

    /// Whether the allocation was requested as CPU-visible
    pub fn is_cpu_visible(&self, allocation: AllocationHandle) -> bool {
        self.read(|state| state.heap.get(key_of(allocation)).is_some_and(|entry| entry.cpu_visible))
    }

    pub fn lock_count(&self, allocation: AllocationHandle) -> u32 {
        self.read(|state| state.heap.get(key_of(allocation)).map_or(0, |entry| entry.lock_count))
    }

    /// Every successful lock request, in order
    pub fn lock_requests(&self) -> Vec<LockRequest> {
        self.read(|state| state.lock_requests.clone())
    }

    pub fn stats(&self) -> ExecutionStats {
        self.read(|state| state.stats)
    }

    fn read<T: Default>(&self, f: impl FnOnce(&KernelState) -> T) -> T {
        self.state.lock().map(|state| f(&state)).unwrap_or_default()
    }

    /// Lock the state, count the call and apply any injected failure
    fn enter(&self, kind: KernelCallbackKind) -> KernelResult<MutexGuard<'_, KernelState>> {
        let mut state = self.state.lock().map_err(|_| KernelStatus::DeviceRemoved)?;
        *state.call_counts.entry(kind).or_insert(0) += 1;
        match state.pending_failures.remove(&kind) {
            Some(status) => {
                umd_warn!("rosumd::SoftKernel", "injected {:?} failure: {:?}", kind, status);
                Err(status)
            }
            None => Ok(state),
        }
    }
}

impl KernelState {
    fn require_context(&self, context: ContextHandle) -> KernelResult<()> {
        if self.live_contexts.contains(&context) {
            Ok(())
        } else {
            Err(KernelStatus::InvalidParameter)
        }
    }

    fn owned_allocation(&mut self, context: ContextHandle, allocation: AllocationHandle) -> KernelResult<&mut Allocation> {
        match self.heap.get_mut(key_of(allocation)) {
            Some(entry) if entry.context == context => Ok(entry),
            _ => Err(KernelStatus::InvalidParameter),
        }
    }
}

// SAFETY: `lock` returns a pointer into a boxed slice owned by the heap
// entry. The entry is only removed by `deallocate`, which refuses locked
// allocations, so the memory stays valid until the matching `unlock`.
unsafe impl KernelCallbacks for SoftKernel {
    fn create_context(&self, request: &CreateContextRequest) -> KernelResult<ContextInfo> {
        let mut state = self.enter(KernelCallbackKind::CreateContext)?;
        let context = ContextHandle(state.next_context);
        state.next_context += 1;
        state.live_contexts.push(context);
        umd_debug!("rosumd::SoftKernel", "created context {:?} on node {}", context, request.node_ordinal);
        Ok(ContextInfo {
            context,
            max_command_buffer_size: self.config.max_command_buffer_size,
        })
    }

    fn allocate(&self, request: &AllocateRequest) -> KernelResult<AllocationHandle> {
        let mut state = self.enter(KernelCallbackKind::Allocate)?;
        state.require_context(request.context)?;
        if request.size == 0 || !request.alignment.is_power_of_two() {
            return Err(KernelStatus::InvalidParameter);
        }
        if state.used_bytes + request.size > self.config.memory_budget {
            return Err(KernelStatus::OutOfMemory);
        }

        state.used_bytes += request.size;
        let key = state.heap.insert(Allocation {
            context: request.context,
            bytes: vec![0u8; request.size as usize].into_boxed_slice(),
            cpu_visible: request.cpu_visible,
            lock_count: 0,
        });
        Ok(handle_of(key))
    }

    fn deallocate(&self, request: &DeallocateRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Deallocate)?;
        state.require_context(request.context)?;
        for allocation in request.allocations {
            if state.owned_allocation(request.context, *allocation)?.lock_count > 0 {
                return Err(KernelStatus::InvalidParameter);
            }
        }
        for allocation in request.allocations {
            if let Some(entry) = state.heap.remove(key_of(*allocation)) {
                state.used_bytes -= entry.bytes.len() as u64;
            }
        }
        Ok(())
    }

    fn lock(&self, request: &LockRequest) -> KernelResult<LockedAllocation> {
        let mut state = self.enter(KernelCallbackKind::Lock)?;
        state.require_context(request.context)?;
        if request.flags.contains(LockFlags::READ_ONLY | LockFlags::WRITE_ONLY) {
            return Err(KernelStatus::InvalidParameter);
        }
        let entry = state.owned_allocation(request.context, request.allocation)?;
        let data = NonNull::new(entry.bytes.as_mut_ptr()).ok_or(KernelStatus::InvalidParameter)?;
        let size = entry.bytes.len();
        entry.lock_count += 1;
        state.lock_requests.push(*request);
        Ok(LockedAllocation { data, size })
    }

    fn unlock(&self, request: &UnlockRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Unlock)?;
        state.require_context(request.context)?;
        for allocation in request.allocations {
            let entry = state.owned_allocation(request.context, *allocation)?;
            entry.lock_count = entry.lock_count.checked_sub(1).ok_or(KernelStatus::InvalidParameter)?;
        }
        Ok(())
    }

    fn render(&self, request: &RenderRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Render)?;
        state.require_context(request.context)?;
        if request.commands.len() > self.config.max_command_buffer_size {
            return Err(KernelStatus::InvalidParameter);
        }

        let commands = CommandReader::read_all(request.commands).map_err(|err| {
            umd_warn!("rosumd::SoftKernel", "rejected command buffer: {}", err);
            KernelStatus::InvalidParameter
        })?;
        if commands.len() != request.command_count as usize {
            return Err(KernelStatus::InvalidParameter);
        }
        // Every referenced allocation must be listed and owned by the context
        for command in &commands {
            for allocation in command.allocations() {
                if !request.allocations.contains(&allocation) {
                    return Err(KernelStatus::InvalidParameter);
                }
            }
        }
        for allocation in request.allocations {
            state.owned_allocation(request.context, *allocation)?;
        }

        for command in &commands {
            execute(&mut state, command)?;
        }
        state.submissions.push(Submission {
            context: request.context,
            bytes: request.commands.len(),
            commands,
            allocations: request.allocations.to_vec(),
        });
        Ok(())
    }

    fn destroy_context(&self, request: &DestroyContextRequest) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::DestroyContext)?;
        state.require_context(request.context)?;
        state.live_contexts.retain(|context| *context != request.context);

        // Allocations the device did not release go with the context
        let orphaned: Vec<HeapKey> = state.heap.iter()
            .filter(|(_, entry)| entry.context == request.context)
            .map(|(key, _)| key)
            .collect();
        if !orphaned.is_empty() {
            umd_warn!("rosumd::SoftKernel", "context {:?} destroyed with {} live allocations",
                request.context, orphaned.len());
        }
        for key in orphaned {
            if let Some(entry) = state.heap.remove(key) {
                state.used_bytes -= entry.bytes.len() as u64;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "soft_kernel_tests.rs"]
mod tests;
