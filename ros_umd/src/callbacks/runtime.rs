/// Runtime upcall table - how the device reports back to the graphics runtime

use crate::error::ErrorCode;

/// Handle the runtime uses to identify its side of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RuntimeDeviceHandle(pub u64);

/// Host-provided runtime upcalls
///
/// The device calls these but never inspects the implementation.
pub trait RuntimeCallbacks: Send + Sync {
    /// Report a failed device operation to the runtime
    fn set_error(&self, device: RuntimeDeviceHandle, code: ErrorCode);
}
