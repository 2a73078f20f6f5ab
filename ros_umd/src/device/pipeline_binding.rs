/// Pipeline-state setters
///
/// Each setter replaces the named slot(s) atomically: it validates the whole
/// request first and only then writes, so a rejected call leaves the
/// binding snapshot untouched. No setter produces GPU work.

use std::sync::Arc;
use glam::Vec4;

use crate::error::Result;
use crate::resource::ResourceKey;
use crate::state::{
    BlendState, DepthStencilState, DepthStencilView, ElementLayout, PrimitiveTopology,
    RasterizerState, RenderTargetView, SamplerState, Shader, ShaderStage, UnorderedAccessView,
    Viewport,
};
use crate::{umd_bail, umd_err, umd_trace, umd_warn};
use super::device::Device;
use super::pipeline_state::{
    UavBinding, VertexBufferBinding, MAX_RENDER_TARGETS, MAX_UAVS, MAX_VIEWPORTS, UAV_KEEP_COUNTER,
};

/// Arguments of the combined render-target / UAV binding call
///
/// Render targets are bound to slots `0..render_targets.len()` and slots
/// `render_targets.len()..render_targets.len() + render_targets_to_unbind`
/// are emptied; both ranges are clamped to the slot count.
///
/// UAV slots are only touched inside the update window
/// `uav_first_to_set..uav_first_to_set + uav_update_count` (clamped). Every
/// slot in the window is first emptied, then the slots of the window that
/// fall inside `uav_start..uav_start + uavs.len()` are bound to
/// `uavs[slot - uav_start]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputMergerBindings<'a> {
    pub render_targets: &'a [Option<RenderTargetView>],
    pub render_targets_to_unbind: u32,
    pub depth_stencil: Option<DepthStencilView>,
    pub uavs: &'a [Option<UnorderedAccessView>],
    /// Hidden counter start values, parallel to `uavs`; empty keeps every counter
    pub uav_initial_counts: &'a [u32],
    pub uav_start: u32,
    pub uav_first_to_set: u32,
    pub uav_update_count: u32,
}

impl Device {
    // ===== SHADERS =====

    /// Bind (or unbind with `None`) the shader of `stage`
    pub fn set_shader(&mut self, stage: ShaderStage, shader: Option<Arc<Shader>>) -> Result<()> {
        self.guarded("set_shader", |device| {
            device.require_stage(stage)?;
            if let Some(shader) = &shader {
                if shader.stage() != stage {
                    umd_bail!(InvalidState, "rosumd::Device",
                        "{:?} shader bound to the {:?} stage", shader.stage(), stage);
                }
            }
            device.state.stage_mut(stage).shader = shader;
            Ok(())
        })
    }

    pub fn set_vertex_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Vertex, shader)
    }

    pub fn set_hull_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Hull, shader)
    }

    pub fn set_domain_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Domain, shader)
    }

    pub fn set_geometry_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Geometry, shader)
    }

    pub fn set_pixel_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Pixel, shader)
    }

    pub fn set_compute_shader(&mut self, shader: Option<Arc<Shader>>) -> Result<()> {
        self.set_shader(ShaderStage::Compute, shader)
    }

    // ===== SAMPLERS =====

    /// Replace samplers `offset..offset + samplers.len()` of `stage`
    ///
    /// Ranges past the last slot are rejected with `CapacityExceeded`.
    pub fn set_samplers(&mut self, stage: ShaderStage, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.guarded("set_samplers", |device| {
            device.require_stage(stage)?;
            device.state.stage_mut(stage).samplers.set_range(offset as usize, samplers)
                .map_err(|err| umd_err!(CapacityExceeded, "rosumd::Device", "{:?} samplers: {}", stage, err))
        })
    }

    pub fn set_vertex_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Vertex, offset, samplers)
    }

    pub fn set_hull_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Hull, offset, samplers)
    }

    pub fn set_domain_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Domain, offset, samplers)
    }

    pub fn set_geometry_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Geometry, offset, samplers)
    }

    pub fn set_pixel_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Pixel, offset, samplers)
    }

    pub fn set_compute_samplers(&mut self, offset: u32, samplers: &[Option<Arc<SamplerState>>]) -> Result<()> {
        self.set_samplers(ShaderStage::Compute, offset, samplers)
    }

    // ===== INPUT ASSEMBLER =====

    /// Replace vertex buffer slots `start_slot..start_slot + buffers.len()`
    ///
    /// `strides` and `offsets` are parallel to `buffers`.
    pub fn set_vertex_buffers(
        &mut self,
        start_slot: u32,
        buffers: &[Option<ResourceKey>],
        strides: &[u32],
        offsets: &[u32],
    ) -> Result<()> {
        self.guarded("set_vertex_buffers", |device| {
            if strides.len() != buffers.len() || offsets.len() != buffers.len() {
                umd_bail!(InvalidState, "rosumd::Device",
                    "{} vertex buffers with {} strides and {} offsets",
                    buffers.len(), strides.len(), offsets.len());
            }

            let mut bindings = Vec::with_capacity(buffers.len());
            for ((buffer, &stride), &offset) in buffers.iter().zip(strides).zip(offsets) {
                bindings.push(match buffer {
                    Some(resource) => {
                        device.require_live(*resource)?;
                        Some(VertexBufferBinding { resource: *resource, stride, offset })
                    }
                    None => None,
                });
            }

            device.state.vertex_buffers.set_range(start_slot as usize, &bindings)
                .map_err(|err| umd_err!(CapacityExceeded, "rosumd::Device", "vertex buffers: {}", err))
        })
    }

    pub fn set_topology(&mut self, topology: PrimitiveTopology) -> Result<()> {
        self.guarded("set_topology", |device| {
            if let PrimitiveTopology::PatchList(points) = topology {
                if !topology.is_valid() {
                    umd_bail!(InvalidState, "rosumd::Device", "patch list with {} control points", points);
                }
            }
            device.state.topology = topology;
            Ok(())
        })
    }

    pub fn set_element_layout(&mut self, layout: Option<Arc<ElementLayout>>) -> Result<()> {
        self.guarded("set_element_layout", |device| {
            device.state.element_layout = layout;
            Ok(())
        })
    }

    // ===== RASTERIZER =====

    /// Bind `viewports` to slots `0..num` and empty slots `num..num + clear`
    ///
    /// `num + clear` may not exceed the viewport slot count.
    pub fn set_viewports(&mut self, num: u32, clear: u32, viewports: &[Viewport]) -> Result<()> {
        self.guarded("set_viewports", |device| {
            if viewports.len() != num as usize {
                umd_bail!(InvalidState, "rosumd::Device", "{} viewports passed for num = {}", viewports.len(), num);
            }
            let total = num as usize + clear as usize;
            if total > MAX_VIEWPORTS {
                umd_bail!(CapacityExceeded, "rosumd::Device",
                    "{} viewports set + {} cleared exceeds {} slots", num, clear, MAX_VIEWPORTS);
            }

            let values: Vec<Option<Viewport>> = viewports.iter().copied().map(Some).collect();
            device.state.viewports.set_range(0, &values)?;
            device.state.viewports.clear_range_clamped(num as usize, clear as usize);
            Ok(())
        })
    }

    pub fn set_rasterizer_state(&mut self, state: Option<Arc<RasterizerState>>) -> Result<()> {
        self.guarded("set_rasterizer_state", |device| {
            device.state.rasterizer_state = state;
            Ok(())
        })
    }

    // ===== OUTPUT MERGER =====

    /// Combined render-target / depth-stencil / UAV binding
    ///
    /// Render target ranges are clamped silently. Within the UAV update
    /// window, unbinding is applied before binding. See
    /// [`OutputMergerBindings`].
    pub fn set_render_targets(&mut self, bindings: &OutputMergerBindings<'_>) -> Result<()> {
        self.guarded("set_render_targets", |device| {
            // ========== VALIDATE ==========
            let rt_bound = bindings.render_targets.len().min(MAX_RENDER_TARGETS);
            if rt_bound < bindings.render_targets.len() {
                umd_warn!("rosumd::Device", "{} render targets clamped to {}",
                    bindings.render_targets.len(), MAX_RENDER_TARGETS);
            }
            for view in bindings.render_targets[..rt_bound].iter().flatten() {
                device.require_subresource(view.resource, view.subresource)?;
            }
            if let Some(view) = &bindings.depth_stencil {
                device.require_subresource(view.resource, view.subresource)?;
            }

            let window_start = (bindings.uav_first_to_set as usize).min(MAX_UAVS);
            let window_end = window_start.saturating_add(bindings.uav_update_count as usize).min(MAX_UAVS);
            let touches_uavs = window_end > window_start || !bindings.uavs.is_empty();
            if touches_uavs && !device.functions.exposes_uavs() {
                umd_bail!(InvalidState, "rosumd::Device",
                    "UAV binding is not exposed by the {:?} function table", device.functions.version());
            }
            if !bindings.uav_initial_counts.is_empty() && bindings.uav_initial_counts.len() != bindings.uavs.len() {
                umd_bail!(InvalidState, "rosumd::Device",
                    "{} UAVs with {} initial counts", bindings.uavs.len(), bindings.uav_initial_counts.len());
            }

            let uav_start = bindings.uav_start as usize;
            let mut uav_updates: Vec<(usize, Option<UavBinding>)> = Vec::new();
            for slot in window_start..window_end {
                let source = slot.checked_sub(uav_start).filter(|index| *index < bindings.uavs.len());
                let binding = match source.and_then(|index| bindings.uavs[index].map(|view| (index, view))) {
                    Some((index, view)) => {
                        device.require_subresource(view.resource, view.subresource)?;
                        let initial_count = bindings.uav_initial_counts.get(index).copied().unwrap_or(UAV_KEEP_COUNTER);
                        Some(UavBinding { view, initial_count })
                    }
                    None => None,
                };
                uav_updates.push((slot, binding));
            }

            // ========== APPLY ==========
            let rt_values: Vec<Option<RenderTargetView>> = bindings.render_targets[..rt_bound].to_vec();
            device.state.render_targets.set_range(0, &rt_values)?;
            device.state.render_targets.clear_range_clamped(rt_bound, bindings.render_targets_to_unbind as usize);
            device.state.depth_stencil_view = bindings.depth_stencil;

            device.state.uavs.clear_range_clamped(window_start, window_end - window_start);
            for (slot, binding) in uav_updates.into_iter().filter(|(_, binding)| binding.is_some()) {
                device.state.uavs.set(slot, binding)?;
            }

            umd_trace!("rosumd::Device", "output merger: {} render targets, UAV window {}..{}",
                device.state.render_targets.bound_count(), window_start, window_end);
            Ok(())
        })
    }

    pub fn set_blend_state(&mut self, state: Option<Arc<BlendState>>, blend_factor: Vec4, sample_mask: u32) -> Result<()> {
        self.guarded("set_blend_state", |device| {
            device.state.blend_state = state;
            device.state.blend_factor = blend_factor;
            device.state.sample_mask = sample_mask;
            Ok(())
        })
    }

    pub fn set_depth_stencil_state(&mut self, state: Option<Arc<DepthStencilState>>, stencil_ref: u32) -> Result<()> {
        self.guarded("set_depth_stencil_state", |device| {
            device.state.depth_stencil_state = state;
            device.state.stencil_ref = stencil_ref;
            Ok(())
        })
    }

    // ===== HELPERS =====

    fn require_stage(&self, stage: ShaderStage) -> Result<()> {
        if !self.functions.exposes_stage(stage) {
            umd_bail!(InvalidState, "rosumd::Device",
                "{:?} stage is not exposed by the {:?} function table", stage, self.functions.version());
        }
        Ok(())
    }

    pub(super) fn require_live(&self, key: ResourceKey) -> Result<()> {
        if !self.resources.contains_key(key) {
            umd_bail!(InvalidResource, "rosumd::Device", "resource {:?} does not exist", key);
        }
        Ok(())
    }

    fn require_subresource(&self, key: ResourceKey, subresource: u32) -> Result<()> {
        match self.resources.get(key) {
            Some(resource) => resource.layout(subresource).map(|_| ()),
            None => umd_bail!(InvalidResource, "rosumd::Device", "resource {:?} does not exist", key),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_binding_tests.rs"]
mod tests;
