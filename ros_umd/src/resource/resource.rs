/// Resource - one GPU-addressable memory object and its subresources
///
/// A Resource owns its descriptor, the linear layout of its subresources,
/// the CPU map state of every subresource, and (once GPU-bound) the handle
/// of its kernel allocation. Staging resources start with a system-memory
/// shadow that serves CPU maps until the resource becomes GPU-bound.

use std::ptr::NonNull;
use bitflags::bitflags;
use slotmap::new_key_type;

use crate::callbacks::AllocationHandle;
use crate::error::Result;
use crate::{umd_bail, umd_err};
use super::format::Format;

new_key_type! {
    /// Stable handle of a resource owned by a Device
    pub struct ResourceKey;
}

// ===== LIMITS =====

/// Largest width/height of 1D, 2D and cube textures
pub const MAX_TEXTURE_DIMENSION: u32 = 16384;

/// Largest extent of a 3D texture along any axis
pub const MAX_TEXTURE_3D_DIMENSION: u32 = 2048;

/// Largest array size (faces, for cube textures)
pub const MAX_TEXTURE_ARRAY_SIZE: u32 = 2048;

/// Largest total byte size of one resource
pub const MAX_RESOURCE_BYTES: u64 = 1 << 31;

// ===== DESCRIPTOR TYPES =====

/// Resource dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
    /// Cube texture; `array_size` counts faces (a multiple of 6)
    TextureCube,
}

/// How the CPU and GPU share the resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceUsage {
    /// GPU read/write, no CPU access
    Default,
    /// GPU read-only, contents fixed at creation
    Immutable,
    /// GPU read, CPU write
    Dynamic,
    /// CPU-accessible transfer resource
    Staging,
}

bitflags! {
    /// Pipeline stages the resource can be bound to
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BindFlags: u32 {
        const VERTEX_BUFFER = 1 << 0;
        const INDEX_BUFFER = 1 << 1;
        const CONSTANT_BUFFER = 1 << 2;
        const SHADER_RESOURCE = 1 << 3;
        const STREAM_OUTPUT = 1 << 4;
        const RENDER_TARGET = 1 << 5;
        const DEPTH_STENCIL = 1 << 6;
        const UNORDERED_ACCESS = 1 << 7;
    }
}

bitflags! {
    /// CPU access rights
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CpuAccessFlags: u32 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
    }
}

/// Descriptor for creating a resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    /// Width in elements (bytes for buffers)
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Mip levels; 0 means the full chain
    pub mip_levels: u32,
    pub array_size: u32,
    pub format: Format,
    pub usage: ResourceUsage,
    pub bind_flags: BindFlags,
    pub cpu_access: CpuAccessFlags,
}

impl ResourceDesc {
    /// Buffer of `size` bytes
    pub fn buffer(size: u32, usage: ResourceUsage, bind_flags: BindFlags, cpu_access: CpuAccessFlags) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            width: size,
            height: 1,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format: Format::UNKNOWN,
            usage,
            bind_flags,
            cpu_access,
        }
    }

    /// GPU vertex buffer of `size` bytes
    pub fn vertex_buffer(size: u32) -> Self {
        Self::buffer(size, ResourceUsage::Default, BindFlags::VERTEX_BUFFER, CpuAccessFlags::empty())
    }

    /// Read/write staging buffer of `size` bytes
    pub fn staging_buffer(size: u32) -> Self {
        Self::buffer(
            size,
            ResourceUsage::Staging,
            BindFlags::empty(),
            CpuAccessFlags::READ | CpuAccessFlags::WRITE,
        )
    }

    /// Single-mip 2D texture
    pub fn texture_2d(width: u32, height: u32, format: Format, usage: ResourceUsage, bind_flags: BindFlags) -> Self {
        let cpu_access = match usage {
            ResourceUsage::Staging => CpuAccessFlags::READ | CpuAccessFlags::WRITE,
            ResourceUsage::Dynamic => CpuAccessFlags::WRITE,
            _ => CpuAccessFlags::empty(),
        };
        Self {
            dimension: ResourceDimension::Texture2D,
            width,
            height,
            depth: 1,
            mip_levels: 1,
            array_size: 1,
            format,
            usage,
            bind_flags,
            cpu_access,
        }
    }
}

// ===== LAYOUT =====

/// Placement of one subresource inside the resource's linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceLayout {
    /// Offset in bytes from the start of the resource
    pub offset: u64,
    pub row_pitch: u32,
    pub depth_pitch: u32,
    pub size: u64,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

// ===== MAPPING =====

/// How a subresource is mapped for CPU access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    Read,
    /// Write-only; previous contents may be discarded
    Write,
    ReadWrite,
}

impl MapType {
    pub fn allows_read(self) -> bool {
        matches!(self, MapType::Read | MapType::ReadWrite)
    }

    pub fn allows_write(self) -> bool {
        matches!(self, MapType::Write | MapType::ReadWrite)
    }
}

bitflags! {
    /// Map behaviour flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MapFlags: u32 {
        /// Fail instead of waiting for the GPU
        const DO_NOT_WAIT = 1 << 0;
    }
}

/// CPU view of a mapped subresource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedSubresource {
    pub data: NonNull<u8>,
    pub len: usize,
    pub row_pitch: u32,
    pub depth_pitch: u32,
}

/// Map state of one subresource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapState {
    Unmapped,
    Mapped {
        map_type: MapType,
        /// Whether the mapping holds a kernel lock on the allocation
        locked: bool,
        region: MappedRegion,
    },
}

/// Memory behind a mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRegion {
    pub data: NonNull<u8>,
    pub len: usize,
}

// The region points into the resource's own shadow or into a kernel-locked
// allocation; neither is tied to the thread that created the mapping.
unsafe impl Send for MappedRegion {}

// ===== RESOURCE =====

pub struct Resource {
    desc: ResourceDesc,
    layouts: Vec<SubresourceLayout>,
    size: u64,
    map_states: Vec<MapState>,
    allocation: Option<AllocationHandle>,
    /// Allocated, but the shadow upload has not succeeded yet
    unfilled_allocation: Option<AllocationHandle>,
    shadow: Option<Box<[u8]>>,
}

impl Resource {
    /// Validate `desc` and build the resource record (no kernel interaction)
    pub fn new(mut desc: ResourceDesc) -> Result<Self> {
        Self::validate(&mut desc)?;

        let bytes_per_element = desc.format.bytes_per_element() as u64;
        let slices = desc.array_size;
        let count = desc.mip_levels.checked_mul(slices)
            .ok_or_else(|| umd_err!(InvalidResource, "rosumd::Resource",
                "{} mips x {} slices overflows", desc.mip_levels, slices))?;
        let mut layouts = Vec::with_capacity(count as usize);
        let mut offset = 0u64;
        for _slice in 0..slices {
            for mip in 0..desc.mip_levels {
                let width = (desc.width >> mip).max(1);
                let height = (desc.height >> mip).max(1);
                let depth = (desc.depth >> mip).max(1);
                let row_pitch = width as u64 * bytes_per_element;
                let depth_pitch = row_pitch * height as u64;
                if row_pitch > u32::MAX as u64 || depth_pitch > u32::MAX as u64 {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "subresource pitch overflows: {}x{} elements", width, height);
                }
                let size = depth_pitch * depth as u64;
                layouts.push(SubresourceLayout {
                    offset,
                    row_pitch: row_pitch as u32,
                    depth_pitch: depth_pitch as u32,
                    size,
                    width,
                    height,
                    depth,
                });
                offset = offset.checked_add(size)
                    .filter(|total| *total <= MAX_RESOURCE_BYTES)
                    .ok_or_else(|| umd_err!(InvalidResource, "rosumd::Resource",
                        "resource exceeds {} bytes", MAX_RESOURCE_BYTES))?;
            }
        }

        let shadow = match desc.usage {
            ResourceUsage::Staging => Some(vec![0u8; offset as usize].into_boxed_slice()),
            _ => None,
        };

        Ok(Self {
            map_states: vec![MapState::Unmapped; layouts.len()],
            layouts,
            size: offset,
            desc,
            allocation: None,
            unfilled_allocation: None,
            shadow,
        })
    }

    fn validate(desc: &mut ResourceDesc) -> Result<()> {
        // ========== EXTENTS ==========
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.array_size == 0 {
            umd_bail!(InvalidResource, "rosumd::Resource",
                "extents must be non-zero ({}x{}x{}, array {})",
                desc.width, desc.height, desc.depth, desc.array_size);
        }

        match desc.dimension {
            ResourceDimension::Buffer => {
                if desc.height != 1 || desc.depth != 1 || desc.array_size != 1 || desc.mip_levels > 1 {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "buffers are one-dimensional with a single subresource");
                }
                desc.mip_levels = 1;
            }
            ResourceDimension::Texture1D => {
                if desc.height != 1 || desc.depth != 1 {
                    umd_bail!(InvalidResource, "rosumd::Resource", "1D textures have height and depth 1");
                }
            }
            ResourceDimension::Texture2D => {
                if desc.depth != 1 {
                    umd_bail!(InvalidResource, "rosumd::Resource", "2D textures have depth 1");
                }
            }
            ResourceDimension::TextureCube => {
                if desc.depth != 1 || desc.width != desc.height || desc.array_size % 6 != 0 {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "cube textures are square with a multiple of 6 faces");
                }
            }
            ResourceDimension::Texture3D => {
                if desc.array_size != 1 {
                    umd_bail!(InvalidResource, "rosumd::Resource", "3D textures cannot be arrays");
                }
            }
        }

        // ========== LIMITS ==========
        let max_extent = match desc.dimension {
            ResourceDimension::Buffer => u32::MAX,
            ResourceDimension::Texture3D => MAX_TEXTURE_3D_DIMENSION,
            _ => MAX_TEXTURE_DIMENSION,
        };
        if desc.width.max(desc.height).max(desc.depth) > max_extent {
            umd_bail!(InvalidResource, "rosumd::Resource",
                "{:?} extent {}x{}x{} exceeds {}", desc.dimension, desc.width, desc.height, desc.depth, max_extent);
        }
        if desc.array_size > MAX_TEXTURE_ARRAY_SIZE {
            umd_bail!(InvalidResource, "rosumd::Resource",
                "array size {} exceeds {}", desc.array_size, MAX_TEXTURE_ARRAY_SIZE);
        }

        // ========== MIP CHAIN ==========
        let largest = desc.width.max(desc.height).max(desc.depth);
        let full_chain = 32 - largest.leading_zeros();
        if desc.mip_levels == 0 {
            desc.mip_levels = full_chain;
        } else if desc.mip_levels > full_chain {
            umd_bail!(InvalidResource, "rosumd::Resource",
                "{} mip levels requested, at most {} fit", desc.mip_levels, full_chain);
        }

        // ========== USAGE ==========
        match desc.usage {
            ResourceUsage::Staging => {
                if desc.cpu_access.is_empty() || !desc.bind_flags.is_empty() {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "staging resources need CPU access and no bind flags");
                }
            }
            ResourceUsage::Dynamic => {
                if desc.cpu_access != CpuAccessFlags::WRITE {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "dynamic resources are CPU write-only");
                }
            }
            ResourceUsage::Default | ResourceUsage::Immutable => {
                if !desc.cpu_access.is_empty() {
                    umd_bail!(InvalidResource, "rosumd::Resource",
                        "{:?} resources have no CPU access", desc.usage);
                }
            }
        }

        if desc.bind_flags.contains(BindFlags::DEPTH_STENCIL) && !desc.format.is_depth() {
            umd_bail!(InvalidResource, "rosumd::Resource",
                "depth-stencil binding needs a depth format, got {:?}", desc.format);
        }

        Ok(())
    }

    // ===== ACCESSORS =====

    pub fn desc(&self) -> &ResourceDesc {
        &self.desc
    }

    /// Total byte extent
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn subresource_count(&self) -> u32 {
        self.layouts.len() as u32
    }

    pub fn layout(&self, subresource: u32) -> Result<&SubresourceLayout> {
        match self.layouts.get(subresource as usize) {
            Some(layout) => Ok(layout),
            None => umd_bail!(InvalidState, "rosumd::Resource",
                "subresource {} out of range ({} subresources)", subresource, self.layouts.len()),
        }
    }

    pub fn is_staging(&self) -> bool {
        self.desc.usage == ResourceUsage::Staging
    }

    /// Kernel allocation, if the resource is GPU-bound
    pub fn allocation(&self) -> Option<AllocationHandle> {
        self.allocation
    }

    pub fn is_gpu_bound(&self) -> bool {
        self.allocation.is_some()
    }

    pub(crate) fn set_allocation(&mut self, allocation: Option<AllocationHandle>) {
        self.allocation = allocation;
    }

    pub(crate) fn unfilled_allocation(&self) -> Option<AllocationHandle> {
        self.unfilled_allocation
    }

    pub(crate) fn set_unfilled_allocation(&mut self, allocation: Option<AllocationHandle>) {
        self.unfilled_allocation = allocation;
    }

    /// Kernel allocation held by the resource, filled or not
    pub(crate) fn owned_allocation(&self) -> Option<AllocationHandle> {
        self.allocation.or(self.unfilled_allocation)
    }

    /// Forget the kernel allocation, returning it for deallocation
    pub(crate) fn release_allocation(&mut self) -> Option<AllocationHandle> {
        self.allocation.take().or(self.unfilled_allocation.take())
    }

    /// System-memory contents of a resource that is not GPU-bound yet
    ///
    /// Staging resources always start with a zeroed shadow; other resources
    /// only have one while their initial data waits for upload.
    pub fn shadow(&self) -> Option<&[u8]> {
        self.shadow.as_deref()
    }

    pub(crate) fn shadow_mut(&mut self) -> Option<&mut [u8]> {
        self.shadow.as_deref_mut()
    }

    pub(crate) fn take_shadow(&mut self) -> Option<Box<[u8]>> {
        self.shadow.take()
    }

    /// Contents to upload when the resource becomes GPU-bound
    pub(crate) fn set_shadow(&mut self, shadow: Box<[u8]>) {
        self.shadow = Some(shadow);
    }

    // ===== MAP STATE =====

    pub fn map_state(&self, subresource: u32) -> Result<MapState> {
        self.layout(subresource)?;
        Ok(self.map_states[subresource as usize])
    }

    pub fn is_mapped(&self, subresource: u32) -> bool {
        matches!(self.map_states.get(subresource as usize), Some(MapState::Mapped { .. }))
    }

    pub fn any_mapped(&self) -> bool {
        self.map_states.iter().any(|state| matches!(state, MapState::Mapped { .. }))
    }

    pub fn any_mapped_for_write(&self) -> bool {
        self.map_states.iter().any(|state| {
            matches!(state, MapState::Mapped { map_type, .. } if map_type.allows_write())
        })
    }

    pub(crate) fn begin_map(&mut self, subresource: u32, map_type: MapType, locked: bool, region: MappedRegion) -> Result<()> {
        if self.is_mapped(subresource) {
            umd_bail!(InvalidState, "rosumd::Resource", "subresource {} is already mapped", subresource);
        }
        self.layout(subresource)?;
        self.map_states[subresource as usize] = MapState::Mapped { map_type, locked, region };
        Ok(())
    }

    /// Clear the map state, returning the state it replaced
    pub(crate) fn end_map(&mut self, subresource: u32) -> Result<MapState> {
        let state = self.map_state(subresource)?;
        if state == MapState::Unmapped {
            umd_bail!(InvalidState, "rosumd::Resource", "subresource {} is not mapped", subresource);
        }
        self.map_states[subresource as usize] = MapState::Unmapped;
        Ok(state)
    }

    /// Check that `source` can be copied into `self` as a plain byte copy
    pub fn check_copy_compatible(&self, source: &Resource) -> Result<()> {
        let (dst, src) = (&self.desc, &source.desc);
        let same_shape = dst.dimension == src.dimension
            && dst.width == src.width
            && dst.height == src.height
            && dst.depth == src.depth
            && dst.mip_levels == src.mip_levels
            && dst.array_size == src.array_size;
        if !same_shape {
            umd_bail!(InvalidState, "rosumd::Resource",
                "copy extent mismatch: {:?} {}x{}x{} (mips {}, array {}) vs {:?} {}x{}x{} (mips {}, array {})",
                dst.dimension, dst.width, dst.height, dst.depth, dst.mip_levels, dst.array_size,
                src.dimension, src.width, src.height, src.depth, src.mip_levels, src.array_size);
        }
        if !dst.format.copy_compatible(src.format) {
            umd_bail!(InvalidState, "rosumd::Resource",
                "copy format class mismatch: {:?} vs {:?}", dst.format, src.format);
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "resource_tests.rs"]
mod tests;
