/// Command executor - applies decoded records to the soft kernel's heap
///
/// Copies and clears change allocation contents. Draws are checked for
/// sane bindings and counted; nothing is rasterized.

use glam::Vec4;

use ros_umd::rosumd::callbacks::{AllocationHandle, KernelResult, KernelStatus};
use ros_umd::rosumd::command::{ClearPacket, Command, CopyPacket, DrawCommand};
use ros_umd::rosumd::resource::Format;
use ros_umd::rosumd::state::PrimitiveTopology;
#[cfg(feature = "trace-commands")]
use ros_umd::umd_trace;

use crate::soft_kernel::{key_of, KernelState};

/// Records executed so far, by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionStats {
    pub draws: u64,
    pub vertices: u64,
    pub clears: u64,
    pub copies: u64,
    pub copied_bytes: u64,
}

pub(crate) fn execute(state: &mut KernelState, command: &Command) -> KernelResult<()> {
    #[cfg(feature = "trace-commands")]
    umd_trace!("rosumd::SoftKernel", "execute {:?}", command);

    match command {
        Command::Draw(draw) => execute_draw(state, draw),
        Command::ClearRenderTarget(clear) => execute_clear(state, clear),
        Command::CopyResource(copy) => execute_copy(state, copy),
    }
}

// ===== DRAW =====

fn execute_draw(state: &mut KernelState, draw: &DrawCommand) -> KernelResult<()> {
    let topology = PrimitiveTopology::from_raw(draw.packet.topology).ok_or(KernelStatus::InvalidParameter)?;
    if !topology.is_valid() {
        return Err(KernelStatus::InvalidParameter);
    }
    for record in &draw.vertex_buffers {
        let buffer = bytes(state, record.allocation)?;
        if record.offset as usize > buffer.len() {
            return Err(KernelStatus::InvalidParameter);
        }
    }
    for record in &draw.render_targets {
        bytes(state, record.allocation)?;
    }
    state.stats.draws += 1;
    state.stats.vertices += draw.packet.vertex_count as u64;
    Ok(())
}

// ===== CLEAR =====

fn execute_clear(state: &mut KernelState, clear: &ClearPacket) -> KernelResult<()> {
    let texel = Format::from_raw(clear.format)
        .and_then(|format| format.pack_color(Vec4::from_array(clear.color)))
        .ok_or(KernelStatus::InvalidParameter)?;
    let target = bytes_mut(state, clear.allocation)?;
    let region = range(clear.offset, clear.size, target.len())?;
    for element in target[region].chunks_mut(texel.len()) {
        element.copy_from_slice(&texel[..element.len()]);
    }
    state.stats.clears += 1;
    Ok(())
}

// ===== COPY =====

fn execute_copy(state: &mut KernelState, copy: &CopyPacket) -> KernelResult<()> {
    let source = bytes(state, copy.source)?;
    let source = source[range(0, copy.size, source.len())?].to_vec();
    let destination = bytes_mut(state, copy.destination)?;
    let region = range(0, copy.size, destination.len())?;
    destination[region].copy_from_slice(&source);
    state.stats.copies += 1;
    state.stats.copied_bytes += copy.size;
    Ok(())
}

// ===== HELPERS =====

fn bytes(state: &KernelState, raw: u64) -> KernelResult<&[u8]> {
    state.heap.get(key_of(AllocationHandle(raw)))
        .map(|entry| &entry.bytes[..])
        .ok_or(KernelStatus::InvalidParameter)
}

fn bytes_mut(state: &mut KernelState, raw: u64) -> KernelResult<&mut [u8]> {
    state.heap.get_mut(key_of(AllocationHandle(raw)))
        .map(|entry| &mut entry.bytes[..])
        .ok_or(KernelStatus::InvalidParameter)
}

fn range(offset: u64, size: u64, len: usize) -> KernelResult<std::ops::Range<usize>> {
    let end = offset.checked_add(size).ok_or(KernelStatus::InvalidParameter)?;
    if end > len as u64 {
        return Err(KernelStatus::InvalidParameter);
    }
    Ok(offset as usize..end as usize)
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
