/// Kernel callback table - privileged operations the device core asks the host for
///
/// The host (the kernel-mode half of the driver stack, or the software kernel
/// in tests) implements [`KernelCallbacks`]. The device never caches a resolved
/// table across calls; see [`CallbackTable`](super::CallbackTable).

use std::ptr::NonNull;
use bitflags::bitflags;

// ===== HANDLES =====

/// Kernel context handle (one per device)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextHandle(pub u64);

/// Kernel allocation handle (backing memory of one resource)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AllocationHandle(pub u64);

// ===== STATUS =====

/// Failure reported by a kernel callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KernelStatus {
    /// No memory left for the allocation or command buffer
    OutOfMemory,
    /// The request was malformed
    InvalidParameter,
    /// DONOT_WAIT lock on an allocation the GPU still uses
    WasStillDrawing,
    /// The GPU or context is gone
    DeviceRemoved,
    /// Any other NTSTATUS
    Unsuccessful(i32),
}

/// Result type for kernel callbacks
pub type KernelResult<T> = std::result::Result<T, KernelStatus>;

/// Which callback produced a status (for error reporting)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KernelCallbackKind {
    CreateContext,
    Allocate,
    Deallocate,
    Lock,
    Unlock,
    Render,
    DestroyContext,
}

// ===== REQUESTS =====

/// Arguments of `create_context`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CreateContextRequest {
    /// GPU engine the context submits to
    pub node_ordinal: u32,
}

/// Result of `create_context`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextInfo {
    pub context: ContextHandle,
    /// Largest command buffer the kernel accepts in one `render` call
    pub max_command_buffer_size: usize,
}

/// Arguments of `allocate`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocateRequest {
    pub context: ContextHandle,
    /// Size in bytes
    pub size: u64,
    /// Required alignment in bytes
    pub alignment: u64,
    /// Whether the allocation must be lockable by the CPU
    pub cpu_visible: bool,
}

/// Arguments of `deallocate`
#[derive(Debug, Clone, Copy)]
pub struct DeallocateRequest<'a> {
    pub context: ContextHandle,
    pub allocations: &'a [AllocationHandle],
}

bitflags! {
    /// Lock behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct LockFlags: u32 {
        /// The CPU only reads the locked memory
        const READ_ONLY = 1 << 0;
        /// The CPU only writes the locked memory
        const WRITE_ONLY = 1 << 1;
        /// Fail with WasStillDrawing instead of waiting for the GPU
        const DONOT_WAIT = 1 << 2;
    }
}

/// Arguments of `lock`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockRequest {
    pub context: ContextHandle,
    pub allocation: AllocationHandle,
    pub flags: LockFlags,
}

/// CPU view of a locked allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockedAllocation {
    /// Start of the allocation in CPU address space
    pub data: NonNull<u8>,
    /// Size of the mapping in bytes
    pub size: usize,
}

/// Arguments of `unlock`
#[derive(Debug, Clone, Copy)]
pub struct UnlockRequest<'a> {
    pub context: ContextHandle,
    pub allocations: &'a [AllocationHandle],
}

/// Arguments of `render`: one flushed command buffer
#[derive(Debug, Clone, Copy)]
pub struct RenderRequest<'a> {
    pub context: ContextHandle,
    /// Encoded command records (see [`crate::command::CommandReader`])
    pub commands: &'a [u8],
    /// Number of records in `commands`
    pub command_count: u32,
    /// Allocations referenced by the records
    pub allocations: &'a [AllocationHandle],
}

/// Arguments of `destroy_context`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyContextRequest {
    pub context: ContextHandle,
}

// ===== CALLBACK TABLE =====

/// Host-provided kernel callbacks
///
/// Every callback is synchronous: `render` returns once the buffer has been
/// executed (or rejected).
///
/// # Safety
///
/// `lock` must return memory that is valid for reads and writes of `size`
/// bytes, and that stays valid and unaliased by other CPU mappings until the
/// matching `unlock` (or `deallocate`) of the same allocation.
pub unsafe trait KernelCallbacks: Send + Sync {
    /// Create the GPU context used by one device
    fn create_context(&self, request: &CreateContextRequest) -> KernelResult<ContextInfo>;

    /// Create the backing allocation of a resource
    fn allocate(&self, request: &AllocateRequest) -> KernelResult<AllocationHandle>;

    /// Release allocations
    fn deallocate(&self, request: &DeallocateRequest<'_>) -> KernelResult<()>;

    /// Map an allocation for CPU access
    fn lock(&self, request: &LockRequest) -> KernelResult<LockedAllocation>;

    /// Release CPU access to allocations
    fn unlock(&self, request: &UnlockRequest<'_>) -> KernelResult<()>;

    /// Execute one command buffer
    fn render(&self, request: &RenderRequest<'_>) -> KernelResult<()>;

    /// Destroy the device's context
    fn destroy_context(&self, request: &DestroyContextRequest) -> KernelResult<()>;
}
