/// RecordingRuntime - RuntimeCallbacks that remembers every reported error

use std::sync::Mutex;

use ros_umd::rosumd::callbacks::{RuntimeCallbacks, RuntimeDeviceHandle};
use ros_umd::rosumd::ErrorCode;

#[derive(Default)]
pub struct RecordingRuntime {
    errors: Mutex<Vec<(RuntimeDeviceHandle, ErrorCode)>>,
}

impl RecordingRuntime {
    /// Errors reported so far, oldest first
    pub fn errors(&self) -> Vec<(RuntimeDeviceHandle, ErrorCode)> {
        self.errors.lock().map(|errors| errors.clone()).unwrap_or_default()
    }
}

impl RuntimeCallbacks for RecordingRuntime {
    fn set_error(&self, device: RuntimeDeviceHandle, code: ErrorCode) {
        if let Ok(mut errors) = self.errors.lock() {
            errors.push((device, code));
        }
    }
}
