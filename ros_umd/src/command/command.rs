/// Command records: encoding for the command buffer and decoding for hosts

use std::mem::size_of;
use bytemuck::Pod;

use crate::callbacks::AllocationHandle;
use crate::error::{Error, Result};
use super::packet::*;

/// Draw record with its variable-length binding arrays
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCommand {
    pub packet: DrawPacket,
    pub vertex_buffers: Vec<VertexBufferRecord>,
    pub render_targets: Vec<RenderTargetRecord>,
    pub viewports: Vec<ViewportRecord>,
    pub samplers: Vec<SamplerRecord>,
    pub uavs: Vec<UavRecord>,
}

/// One decoded (or to-be-encoded) command record
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Draw(DrawCommand),
    ClearRenderTarget(ClearPacket),
    CopyResource(CopyPacket),
}

impl Command {
    pub fn opcode(&self) -> Opcode {
        match self {
            Command::Draw(_) => Opcode::Draw,
            Command::ClearRenderTarget(_) => Opcode::ClearRenderTarget,
            Command::CopyResource(_) => Opcode::CopyResource,
        }
    }

    /// Encoded size in bytes, header included
    pub fn encoded_size(&self) -> usize {
        let body = match self {
            Command::Draw(draw) => {
                size_of::<DrawPacket>()
                    + draw.vertex_buffers.len() * size_of::<VertexBufferRecord>()
                    + draw.render_targets.len() * size_of::<RenderTargetRecord>()
                    + draw.viewports.len() * size_of::<ViewportRecord>()
                    + draw.samplers.len() * size_of::<SamplerRecord>()
                    + draw.uavs.len() * size_of::<UavRecord>()
            }
            Command::ClearRenderTarget(_) => size_of::<ClearPacket>(),
            Command::CopyResource(_) => size_of::<CopyPacket>(),
        };
        size_of::<CommandHeader>() + body
    }

    /// Append the encoded record to `out`
    ///
    /// Draw counts are taken from the arrays, not from the packet.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let header = CommandHeader {
            opcode: self.opcode() as u32,
            size: self.encoded_size() as u32,
        };
        out.extend_from_slice(bytemuck::bytes_of(&header));
        match self {
            Command::Draw(draw) => {
                let mut packet = draw.packet;
                packet.vertex_buffer_count = draw.vertex_buffers.len() as u32;
                packet.render_target_count = draw.render_targets.len() as u32;
                packet.viewport_count = draw.viewports.len() as u32;
                packet.sampler_count = draw.samplers.len() as u32;
                packet.uav_count = draw.uavs.len() as u32;
                out.extend_from_slice(bytemuck::bytes_of(&packet));
                out.extend_from_slice(bytemuck::cast_slice(&draw.vertex_buffers));
                out.extend_from_slice(bytemuck::cast_slice(&draw.render_targets));
                out.extend_from_slice(bytemuck::cast_slice(&draw.viewports));
                out.extend_from_slice(bytemuck::cast_slice(&draw.samplers));
                out.extend_from_slice(bytemuck::cast_slice(&draw.uavs));
            }
            Command::ClearRenderTarget(clear) => out.extend_from_slice(bytemuck::bytes_of(clear)),
            Command::CopyResource(copy) => out.extend_from_slice(bytemuck::bytes_of(copy)),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_size());
        self.encode_into(&mut out);
        out
    }

    /// Kernel allocations the record references (zero handles excluded)
    pub fn allocations(&self) -> Vec<AllocationHandle> {
        let raw: Vec<u64> = match self {
            Command::Draw(draw) => {
                let mut raw = Vec::new();
                raw.extend(draw.vertex_buffers.iter().map(|record| record.allocation));
                raw.extend(draw.render_targets.iter().map(|record| record.allocation));
                raw.extend(draw.uavs.iter().map(|record| record.allocation));
                raw.push(draw.packet.depth_stencil_allocation);
                raw
            }
            Command::ClearRenderTarget(clear) => vec![clear.allocation],
            Command::CopyResource(copy) => vec![copy.source, copy.destination],
        };
        raw.into_iter().filter(|handle| *handle != 0).map(AllocationHandle).collect()
    }
}

// ===== DECODING =====

/// Iterator over the records of an encoded command stream
///
/// Yields `Error::MalformedCommand` once and then stops if the stream is
/// truncated or carries an unknown opcode.
pub struct CommandReader<'a> {
    bytes: &'a [u8],
    cursor: usize,
    failed: bool,
}

impl<'a> CommandReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, cursor: 0, failed: false }
    }

    /// Decode the whole stream
    pub fn read_all(bytes: &'a [u8]) -> Result<Vec<Command>> {
        CommandReader::new(bytes).collect()
    }

    fn read_command(&mut self) -> Result<Command> {
        let start = self.cursor;
        let header: CommandHeader = read_pod(self.bytes, &mut self.cursor)?;
        let end = start.checked_add(header.size as usize)
            .filter(|end| *end <= self.bytes.len() && header.size as usize >= size_of::<CommandHeader>())
            .ok_or_else(|| Error::MalformedCommand(format!(
                "record at {} claims {} bytes, {} available", start, header.size, self.bytes.len() - start)))?;
        let record = &self.bytes[..end];

        let command = match Opcode::from_raw(header.opcode) {
            Some(Opcode::Draw) => {
                let packet: DrawPacket = read_pod(record, &mut self.cursor)?;
                let vertex_buffers = read_array(record, &mut self.cursor, packet.vertex_buffer_count)?;
                let render_targets = read_array(record, &mut self.cursor, packet.render_target_count)?;
                let viewports = read_array(record, &mut self.cursor, packet.viewport_count)?;
                let samplers = read_array(record, &mut self.cursor, packet.sampler_count)?;
                let uavs = read_array(record, &mut self.cursor, packet.uav_count)?;
                Command::Draw(DrawCommand { packet, vertex_buffers, render_targets, viewports, samplers, uavs })
            }
            Some(Opcode::ClearRenderTarget) => Command::ClearRenderTarget(read_pod(record, &mut self.cursor)?),
            Some(Opcode::CopyResource) => Command::CopyResource(read_pod(record, &mut self.cursor)?),
            None => {
                return Err(Error::MalformedCommand(format!(
                    "unknown opcode {} at offset {}", header.opcode, start)));
            }
        };

        if self.cursor != end {
            return Err(Error::MalformedCommand(format!(
                "record at {} declares {} bytes but decodes {}", start, header.size, self.cursor - start)));
        }
        Ok(command)
    }
}

impl Iterator for CommandReader<'_> {
    type Item = Result<Command>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor >= self.bytes.len() {
            return None;
        }
        let result = self.read_command();
        self.failed = result.is_err();
        Some(result)
    }
}

fn read_pod<T: Pod>(bytes: &[u8], cursor: &mut usize) -> Result<T> {
    let end = *cursor + size_of::<T>();
    let slice = bytes.get(*cursor..end).ok_or_else(|| Error::MalformedCommand(format!(
        "truncated {} at offset {}", std::any::type_name::<T>(), *cursor)))?;
    *cursor = end;
    Ok(bytemuck::pod_read_unaligned(slice))
}

fn read_array<T: Pod>(bytes: &[u8], cursor: &mut usize, count: u32) -> Result<Vec<T>> {
    (0..count).map(|_| read_pod(bytes, cursor)).collect()
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;
