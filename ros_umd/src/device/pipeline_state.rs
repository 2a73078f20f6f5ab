/// Pipeline binding snapshot - every "current X" slot of a device
///
/// State objects are held by `Arc`, so anything bound here stays alive
/// while bound. Resources are named by `ResourceKey`; destroying a resource
/// goes through [`PipelineState::unbind_resource`] so no slot can name a
/// dead resource.

use std::sync::Arc;
use glam::Vec4;

use crate::resource::ResourceKey;
use crate::state::{
    BlendState, DepthStencilState, DepthStencilView, ElementLayout, PrimitiveTopology,
    RasterizerState, RenderTargetView, SamplerState, Shader, ShaderStage, UnorderedAccessView,
    Viewport,
};
use crate::utils::SlotArray;

pub const MAX_VERTEX_BUFFERS: usize = 32;
pub const MAX_VIEWPORTS: usize = 16;
pub const MAX_RENDER_TARGETS: usize = 8;
pub const MAX_SAMPLERS: usize = 16;
pub const MAX_UAVS: usize = 8;

/// `UavBinding::initial_count` value that keeps the current hidden counter
pub const UAV_KEEP_COUNTER: u32 = u32::MAX;

/// One bound vertex buffer slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexBufferBinding {
    pub resource: ResourceKey,
    pub stride: u32,
    pub offset: u32,
}

/// One bound UAV slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UavBinding {
    pub view: UnorderedAccessView,
    pub initial_count: u32,
}

/// Shader and sampler slots of one programmable stage
#[derive(Debug, Clone, Default)]
pub struct StageState {
    pub shader: Option<Arc<Shader>>,
    pub samplers: SlotArray<Arc<SamplerState>, MAX_SAMPLERS>,
}

#[derive(Debug, Clone)]
pub struct PipelineState {
    // ===== INPUT ASSEMBLER =====
    pub vertex_buffers: SlotArray<VertexBufferBinding, MAX_VERTEX_BUFFERS>,
    pub topology: PrimitiveTopology,
    pub element_layout: Option<Arc<ElementLayout>>,

    // ===== SHADER STAGES =====
    pub stages: [StageState; ShaderStage::COUNT],

    // ===== RASTERIZER =====
    pub viewports: SlotArray<Viewport, MAX_VIEWPORTS>,
    pub rasterizer_state: Option<Arc<RasterizerState>>,

    // ===== OUTPUT MERGER =====
    pub render_targets: SlotArray<RenderTargetView, MAX_RENDER_TARGETS>,
    pub depth_stencil_view: Option<DepthStencilView>,
    pub uavs: SlotArray<UavBinding, MAX_UAVS>,
    pub blend_state: Option<Arc<BlendState>>,
    pub blend_factor: Vec4,
    pub sample_mask: u32,
    pub depth_stencil_state: Option<Arc<DepthStencilState>>,
    pub stencil_ref: u32,
}

impl Default for PipelineState {
    fn default() -> Self {
        Self {
            vertex_buffers: SlotArray::new(),
            topology: PrimitiveTopology::Undefined,
            element_layout: None,
            stages: std::array::from_fn(|_| StageState::default()),
            viewports: SlotArray::new(),
            rasterizer_state: None,
            render_targets: SlotArray::new(),
            depth_stencil_view: None,
            uavs: SlotArray::new(),
            blend_state: None,
            blend_factor: Vec4::ONE,
            sample_mask: u32::MAX,
            depth_stencil_state: None,
            stencil_ref: 0,
        }
    }
}

impl PipelineState {
    pub fn stage(&self, stage: ShaderStage) -> &StageState {
        &self.stages[stage.index()]
    }

    pub fn stage_mut(&mut self, stage: ShaderStage) -> &mut StageState {
        &mut self.stages[stage.index()]
    }

    /// Number of consecutive viewports bound from slot 0
    pub fn viewport_count(&self) -> usize {
        (0..MAX_VIEWPORTS).take_while(|slot| self.viewports.is_bound(*slot)).count()
    }

    /// Whether any slot names `resource`
    pub fn references(&self, resource: ResourceKey) -> bool {
        self.vertex_buffers.iter_bound().any(|(_, binding)| binding.resource == resource)
            || self.render_targets.iter_bound().any(|(_, view)| view.resource == resource)
            || self.uavs.iter_bound().any(|(_, binding)| binding.view.resource == resource)
            || self.depth_stencil_view.is_some_and(|view| view.resource == resource)
    }

    /// Empty every slot that names `resource`, returning how many were cleared
    pub fn unbind_resource(&mut self, resource: ResourceKey) -> usize {
        let mut cleared = self.vertex_buffers.clear_matching(|binding| binding.resource == resource)
            + self.render_targets.clear_matching(|view| view.resource == resource)
            + self.uavs.clear_matching(|binding| binding.view.resource == resource);
        if self.depth_stencil_view.is_some_and(|view| view.resource == resource) {
            self.depth_stencil_view = None;
            cleared += 1;
        }
        cleared
    }
}

#[cfg(test)]
#[path = "pipeline_state_tests.rs"]
mod tests;
