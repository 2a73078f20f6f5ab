/// Mock kernel and runtime callbacks for unit tests (no kernel required)
///
/// The mock kernel keeps allocations in boxed byte slices, records every
/// callback invocation in order, keeps a copy of every submitted command
/// buffer, and can be told to fail the next call of a given kind.

use std::ptr::NonNull;
use std::sync::Mutex;
use rustc_hash::FxHashMap;

use crate::callbacks::{
    AllocateRequest, AllocationHandle, ContextHandle, ContextInfo, CreateContextRequest,
    DeallocateRequest, DestroyContextRequest, KernelCallbackKind, KernelCallbacks,
    KernelResult, KernelStatus, LockRequest, LockedAllocation, RenderRequest,
    RuntimeCallbacks, RuntimeDeviceHandle, UnlockRequest,
};
use crate::error::ErrorCode;

// ============================================================================
// Mock Kernel
// ============================================================================

/// One submitted command buffer
#[derive(Debug, Clone)]
pub struct MockSubmission {
    pub context: ContextHandle,
    pub commands: Vec<u8>,
    pub command_count: u32,
    pub allocations: Vec<AllocationHandle>,
}

#[derive(Default)]
struct MockKernelState {
    calls: Vec<KernelCallbackKind>,
    memory: FxHashMap<AllocationHandle, Box<[u8]>>,
    lock_counts: FxHashMap<AllocationHandle, u32>,
    lock_requests: Vec<LockRequest>,
    submissions: Vec<MockSubmission>,
    fail_next: FxHashMap<KernelCallbackKind, KernelStatus>,
    next_allocation: u64,
    destroyed_contexts: Vec<ContextHandle>,
}

pub struct MockKernel {
    state: Mutex<MockKernelState>,
    max_command_buffer_size: usize,
}

impl MockKernel {
    pub fn new() -> Self {
        Self::with_max_command_buffer_size(usize::MAX)
    }

    pub fn with_max_command_buffer_size(max_command_buffer_size: usize) -> Self {
        Self {
            state: Mutex::new(MockKernelState {
                next_allocation: 1,
                ..Default::default()
            }),
            max_command_buffer_size,
        }
    }

    /// Make the next call of `kind` fail with `status`
    pub fn fail_next(&self, kind: KernelCallbackKind, status: KernelStatus) {
        self.state.lock().unwrap().fail_next.insert(kind, status);
    }

    /// Every callback invoked so far, in order
    pub fn calls(&self) -> Vec<KernelCallbackKind> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of invocations of `kind`
    pub fn call_count(&self, kind: KernelCallbackKind) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|call| **call == kind).count()
    }

    pub fn submissions(&self) -> Vec<MockSubmission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn live_allocations(&self) -> usize {
        self.state.lock().unwrap().memory.len()
    }

    pub fn lock_count(&self, allocation: AllocationHandle) -> u32 {
        self.state.lock().unwrap().lock_counts.get(&allocation).copied().unwrap_or(0)
    }

    /// Every successful lock request, in order
    pub fn lock_requests(&self) -> Vec<LockRequest> {
        self.state.lock().unwrap().lock_requests.clone()
    }

    /// Copy of an allocation's current contents
    pub fn read_allocation(&self, allocation: AllocationHandle) -> Option<Vec<u8>> {
        self.state.lock().unwrap().memory.get(&allocation).map(|bytes| bytes.to_vec())
    }

    pub fn destroyed_contexts(&self) -> Vec<ContextHandle> {
        self.state.lock().unwrap().destroyed_contexts.clone()
    }

    fn enter(&self, kind: KernelCallbackKind) -> KernelResult<std::sync::MutexGuard<'_, MockKernelState>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(kind);
        match state.fail_next.remove(&kind) {
            Some(status) => Err(status),
            None => Ok(state),
        }
    }
}

unsafe impl KernelCallbacks for MockKernel {
    fn create_context(&self, _request: &CreateContextRequest) -> KernelResult<ContextInfo> {
        let _state = self.enter(KernelCallbackKind::CreateContext)?;
        Ok(ContextInfo {
            context: ContextHandle(0xC0),
            max_command_buffer_size: self.max_command_buffer_size,
        })
    }

    fn allocate(&self, request: &AllocateRequest) -> KernelResult<AllocationHandle> {
        let mut state = self.enter(KernelCallbackKind::Allocate)?;
        let handle = AllocationHandle(state.next_allocation);
        state.next_allocation += 1;
        state.memory.insert(handle, vec![0u8; request.size as usize].into_boxed_slice());
        Ok(handle)
    }

    fn deallocate(&self, request: &DeallocateRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Deallocate)?;
        for allocation in request.allocations {
            state.memory.remove(allocation);
            state.lock_counts.remove(allocation);
        }
        Ok(())
    }

    fn lock(&self, request: &LockRequest) -> KernelResult<LockedAllocation> {
        let mut state = self.enter(KernelCallbackKind::Lock)?;
        let (data, size) = {
            let bytes = state.memory.get_mut(&request.allocation).ok_or(KernelStatus::InvalidParameter)?;
            (NonNull::new(bytes.as_mut_ptr()).ok_or(KernelStatus::InvalidParameter)?, bytes.len())
        };
        *state.lock_counts.entry(request.allocation).or_insert(0) += 1;
        state.lock_requests.push(*request);
        Ok(LockedAllocation { data, size })
    }

    fn unlock(&self, request: &UnlockRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Unlock)?;
        for allocation in request.allocations {
            let count = state.lock_counts.get_mut(allocation).ok_or(KernelStatus::InvalidParameter)?;
            *count = count.checked_sub(1).ok_or(KernelStatus::InvalidParameter)?;
        }
        Ok(())
    }

    fn render(&self, request: &RenderRequest<'_>) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::Render)?;
        state.submissions.push(MockSubmission {
            context: request.context,
            commands: request.commands.to_vec(),
            command_count: request.command_count,
            allocations: request.allocations.to_vec(),
        });
        Ok(())
    }

    fn destroy_context(&self, request: &DestroyContextRequest) -> KernelResult<()> {
        let mut state = self.enter(KernelCallbackKind::DestroyContext)?;
        state.destroyed_contexts.push(request.context);
        Ok(())
    }
}

// ============================================================================
// Mock Runtime
// ============================================================================

#[derive(Default)]
pub struct MockRuntime {
    errors: Mutex<Vec<(RuntimeDeviceHandle, ErrorCode)>>,
}

impl MockRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn errors(&self) -> Vec<(RuntimeDeviceHandle, ErrorCode)> {
        self.errors.lock().unwrap().clone()
    }
}

impl RuntimeCallbacks for MockRuntime {
    fn set_error(&self, device: RuntimeDeviceHandle, code: ErrorCode) {
        self.errors.lock().unwrap().push((device, code));
    }
}
