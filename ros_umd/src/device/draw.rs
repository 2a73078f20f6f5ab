/// Draw and clear: turning the current binding state into command records

use glam::Vec4;

use crate::command::{
    ClearPacket, Command, DrawCommand, DrawPacket, RenderTargetRecord, SamplerRecord, UavRecord,
    VertexBufferRecord, ViewportRecord, DRAW_FLAG_DEPTH_STENCIL_BOUND,
};
use crate::error::Result;
use crate::resource::{BindFlags, ResourceKey};
use crate::state::{RenderTargetView, ShaderStage, StateId};
use crate::{umd_bail, umd_trace};
use super::device::Device;

impl Device {
    /// Draw `vertex_count` vertices starting at `start_vertex`
    ///
    /// Requires a primitive topology and a vertex buffer in every slot the
    /// bound element layout reads. Referenced resources become GPU-bound.
    /// A zero vertex count is validated and then ignored.
    pub fn draw(&mut self, vertex_count: u32, start_vertex: u32) -> Result<()> {
        self.guarded("draw", |device| {
            device.validate_draw()?;
            if vertex_count == 0 {
                umd_trace!("rosumd::Device", "empty draw ignored");
                return Ok(());
            }

            let command = device.build_draw(vertex_count, start_vertex)?;
            device.submit(Command::Draw(command))?;
            device.stats.draws += 1;
            Ok(())
        })
    }

    /// Fill a render target subresource with `color`
    ///
    /// Needs no pipeline state beyond the view itself.
    pub fn clear_render_target_view(&mut self, view: RenderTargetView, color: Vec4) -> Result<()> {
        self.guarded("clear_render_target_view", |device| {
            let resource = device.live(view.resource)?;
            let layout = *resource.layout(view.subresource)?;
            let format = resource.desc().format;
            if device.config.validate_draws && !resource.desc().bind_flags.contains(BindFlags::RENDER_TARGET) {
                umd_bail!(InvalidState, "rosumd::Device", "resource {:?} is not a render target", view.resource);
            }
            if format.pack_color(color).is_none() {
                umd_bail!(InvalidState, "rosumd::Device", "{:?} cannot be cleared as a color", format);
            }

            let allocation = device.ensure_allocated(view.resource)?;
            device.submit(Command::ClearRenderTarget(ClearPacket {
                allocation: allocation.0,
                offset: layout.offset,
                size: layout.size,
                format: format.to_raw(),
                subresource: view.subresource,
                color: color.to_array(),
            }))?;
            device.stats.clears += 1;
            Ok(())
        })
    }

    fn validate_draw(&self) -> Result<()> {
        let state = &self.state;
        if !state.topology.is_valid() {
            umd_bail!(InvalidState, "rosumd::Device", "draw without a primitive topology");
        }
        if let Some(layout) = &state.element_layout {
            for slot in layout.required_slots() {
                if !state.vertex_buffers.is_bound(slot as usize) {
                    umd_bail!(InvalidState, "rosumd::Device",
                        "element layout reads vertex buffer slot {} but nothing is bound", slot);
                }
            }
        }

        let referenced = state.vertex_buffers.iter_bound().map(|(_, binding)| (binding.resource, BindFlags::VERTEX_BUFFER))
            .chain(state.render_targets.iter_bound().map(|(_, view)| (view.resource, BindFlags::RENDER_TARGET)))
            .chain(state.uavs.iter_bound().map(|(_, binding)| (binding.view.resource, BindFlags::UNORDERED_ACCESS)))
            .chain(state.depth_stencil_view.map(|view| (view.resource, BindFlags::DEPTH_STENCIL)));
        for (key, bind_flag) in referenced {
            let resource = self.live(key)?;
            if self.config.validate_draws && !resource.desc().bind_flags.contains(bind_flag) {
                umd_bail!(InvalidState, "rosumd::Device",
                    "resource {:?} bound as {:?} without that bind flag", key, bind_flag);
            }
        }
        Ok(())
    }

    /// Snapshot the binding state into a Draw record
    fn build_draw(&mut self, vertex_count: u32, start_vertex: u32) -> Result<DrawCommand> {
        let vertex_bindings: Vec<_> = self.state.vertex_buffers.iter_bound().map(|(slot, binding)| (slot, *binding)).collect();
        let render_targets: Vec<_> = self.state.render_targets.iter_bound().map(|(slot, view)| (slot, *view)).collect();
        let uav_bindings: Vec<_> = self.state.uavs.iter_bound().map(|(slot, binding)| (slot, *binding)).collect();
        let depth_stencil_view = self.state.depth_stencil_view;

        let mut vertex_buffers = Vec::with_capacity(vertex_bindings.len());
        for (slot, binding) in vertex_bindings {
            vertex_buffers.push(VertexBufferRecord {
                slot: slot as u32,
                stride: binding.stride,
                offset: binding.offset,
                _pad: 0,
                allocation: self.allocation_of(binding.resource)?,
            });
        }
        let mut render_target_records = Vec::with_capacity(render_targets.len());
        for (slot, view) in render_targets {
            render_target_records.push(RenderTargetRecord {
                slot: slot as u32,
                subresource: view.subresource,
                allocation: self.allocation_of(view.resource)?,
            });
        }
        let mut uavs = Vec::with_capacity(uav_bindings.len());
        for (slot, binding) in uav_bindings {
            uavs.push(UavRecord {
                slot: slot as u32,
                subresource: binding.view.subresource,
                allocation: self.allocation_of(binding.view.resource)?,
                initial_count: binding.initial_count,
                _pad: 0,
            });
        }
        let (depth_stencil_allocation, depth_stencil_subresource, flags) = match depth_stencil_view {
            Some(view) => (self.allocation_of(view.resource)?, view.subresource, DRAW_FLAG_DEPTH_STENCIL_BOUND),
            None => (0, 0, 0),
        };

        let state = &self.state;
        let viewports = (0..state.viewport_count())
            .filter_map(|slot| state.viewports.get(slot))
            .map(|viewport| ViewportRecord {
                x: viewport.x,
                y: viewport.y,
                width: viewport.width,
                height: viewport.height,
                min_depth: viewport.min_depth,
                max_depth: viewport.max_depth,
            })
            .collect();
        let samplers = ShaderStage::ALL
            .iter()
            .flat_map(|stage| {
                state.stage(*stage).samplers.iter_bound().map(move |(slot, sampler)| SamplerRecord {
                    stage: stage.index() as u32,
                    slot: slot as u32,
                    sampler: sampler.id().raw(),
                })
            })
            .collect();

        let packet = DrawPacket {
            blend_state: StateId::of(state.blend_state.as_ref()).raw(),
            rasterizer_state: StateId::of(state.rasterizer_state.as_ref()).raw(),
            depth_stencil_state: StateId::of(state.depth_stencil_state.as_ref()).raw(),
            element_layout: StateId::of(state.element_layout.as_ref()).raw(),
            shaders: std::array::from_fn(|index| StateId::of(state.stages[index].shader.as_ref()).raw()),
            depth_stencil_allocation,
            topology: state.topology.to_raw(),
            vertex_count,
            start_vertex,
            // Counts are filled in from the arrays when encoded
            vertex_buffer_count: 0,
            render_target_count: 0,
            viewport_count: 0,
            sampler_count: 0,
            uav_count: 0,
            stencil_ref: state.stencil_ref,
            sample_mask: state.sample_mask,
            depth_stencil_subresource,
            flags,
            blend_factor: state.blend_factor.to_array(),
        };

        Ok(DrawCommand {
            packet,
            vertex_buffers,
            render_targets: render_target_records,
            viewports,
            samplers,
            uavs,
        })
    }

    fn allocation_of(&mut self, key: ResourceKey) -> Result<u64> {
        self.ensure_allocated(key).map(|allocation| allocation.0)
    }
}

#[cfg(test)]
#[path = "draw_tests.rs"]
mod tests;
