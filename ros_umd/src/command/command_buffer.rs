/// Command buffer - bounded, append-only batch of encoded commands
///
/// Records are appended in submission order. `flush` hands the bytes, the
/// record count and the de-duplicated allocation list to the kernel
/// `render` callback and leaves the buffer empty whatever the outcome.

use rustc_hash::FxHashSet;

use crate::callbacks::{AllocationHandle, ContextHandle, KernelCallbackKind, KernelCallbacks, RenderRequest};
use crate::error::{Error, Result};
use crate::{umd_debug, umd_trace};
use super::command::Command;

pub struct CommandBuffer {
    bytes: Vec<u8>,
    capacity: usize,
    command_count: u32,
    allocations: Vec<AllocationHandle>,
    referenced: FxHashSet<AllocationHandle>,
}

impl CommandBuffer {
    /// Create an empty buffer holding at most `capacity` bytes
    pub fn new(capacity: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(capacity),
            capacity,
            command_count: 0,
            allocations: Vec::new(),
            referenced: FxHashSet::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes pending submission
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    /// Pending encoded records
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Allocations referenced by the pending records, in first-use order
    pub fn allocations(&self) -> &[AllocationHandle] {
        &self.allocations
    }

    /// Append one record
    ///
    /// Fails with `CapacityExceeded` and writes nothing if the record does
    /// not fit in the remaining space.
    pub fn append(&mut self, command: &Command) -> Result<()> {
        let size = command.encoded_size();
        if size > self.capacity - self.bytes.len() {
            return Err(Error::CapacityExceeded(format!(
                "{:?} record of {} bytes, {} of {} bytes free",
                command.opcode(), size, self.capacity - self.bytes.len(), self.capacity)));
        }

        command.encode_into(&mut self.bytes);
        self.command_count += 1;
        for allocation in command.allocations() {
            if self.referenced.insert(allocation) {
                self.allocations.push(allocation);
            }
        }
        umd_trace!("rosumd::CommandBuffer", "appended {:?} ({} bytes, {} pending)",
            command.opcode(), size, self.bytes.len());
        Ok(())
    }

    /// Submit pending records through `render`
    ///
    /// Returns the number of bytes submitted; an empty buffer makes no
    /// kernel call and returns 0. On failure the pending records are lost.
    pub fn flush(&mut self, kernel: &dyn KernelCallbacks, context: ContextHandle) -> Result<usize> {
        if self.is_empty() {
            return Ok(0);
        }

        let submitted = self.bytes.len();
        let result = kernel.render(&RenderRequest {
            context,
            commands: &self.bytes,
            command_count: self.command_count,
            allocations: &self.allocations,
        });
        let count = self.command_count;
        self.discard();

        match result {
            Ok(()) => {
                umd_debug!("rosumd::CommandBuffer", "flushed {} commands ({} bytes)", count, submitted);
                Ok(submitted)
            }
            Err(status) => Err(Error::KernelRejected {
                callback: KernelCallbackKind::Render,
                status,
            }),
        }
    }

    /// Drop pending records without submitting them
    pub fn discard(&mut self) {
        self.bytes.clear();
        self.command_count = 0;
        self.allocations.clear();
        self.referenced.clear();
    }
}

#[cfg(test)]
#[path = "command_buffer_tests.rs"]
mod tests;
