/// Resource lifecycle, CPU map/unmap and copies
///
/// Allocation is lazy: a resource gets its kernel allocation on first
/// GPU-visible use (`ensure_allocated`). Until then a staging resource (or
/// one created with initial data) lives in a system-memory shadow.

use std::ptr::NonNull;

use crate::callbacks::{AllocationHandle, LockFlags, LockedAllocation};
use crate::command::{Command, CopyPacket};
use crate::error::{Error, Result};
use crate::resource::{
    CpuAccessFlags, MapFlags, MapState, MapType, MappedRegion, MappedSubresource, Resource,
    ResourceDesc, ResourceKey, ResourceUsage,
};
use crate::{umd_bail, umd_debug, umd_err, umd_trace};
use super::device::Device;

impl Device {
    // ===== CREATE / DESTROY =====

    /// Create a resource, optionally filled with `initial_data` (required for immutable resources)
    pub fn create_resource(&mut self, desc: ResourceDesc, initial_data: Option<&[u8]>) -> Result<ResourceKey> {
        self.guarded("create_resource", |device| {
            let mut resource = Resource::new(desc)?;
            match initial_data {
                Some(data) => {
                    if data.len() as u64 != resource.size() {
                        umd_bail!(InvalidResource, "rosumd::Device",
                            "{} bytes of initial data for a {} byte resource", data.len(), resource.size());
                    }
                    resource.set_shadow(data.to_vec().into_boxed_slice());
                }
                None if resource.desc().usage == ResourceUsage::Immutable => {
                    umd_bail!(InvalidResource, "rosumd::Device", "immutable resources need initial data");
                }
                None => {}
            }

            let size = resource.size();
            let key = device.resources.insert(resource);
            umd_debug!("rosumd::Device", "created resource {:?} ({} bytes)", key, size);
            Ok(key)
        })
    }

    /// Destroy a resource, unbinding it from every slot
    ///
    /// Fatal if any subresource is still mapped.
    pub fn destroy_resource(&mut self, key: ResourceKey) -> Result<()> {
        self.guarded("destroy_resource", |device| {
            let resource = device.live(key)?;
            if resource.any_mapped() {
                umd_bail!(Fatal, "rosumd::Device", "resource {:?} destroyed while mapped", key);
            }

            // Pending records may still name the allocation
            let allocation = resource.owned_allocation();
            if let Some(allocation) = allocation {
                if device.command_buffer.allocations().contains(&allocation) {
                    device.flush_commands()?;
                }
                // On failure the resource keeps its handle for teardown
                device.kernel_deallocate(&[allocation])?;
            }

            let unbound = device.state.unbind_resource(key);
            device.resources.remove(key);
            umd_debug!("rosumd::Device", "destroyed resource {:?} ({} slots unbound)", key, unbound);
            Ok(())
        })
    }

    // ===== COPY =====

    /// Copy the whole of `src` into `dst`
    ///
    /// Everything is validated before any kernel call. Non-staging resources
    /// are made GPU-bound first. When both sides are GPU-bound a Copy record
    /// is encoded; otherwise (a staging side still in its shadow) the copy
    /// happens on the CPU immediately, after flushing work that touches the
    /// GPU-bound side.
    pub fn resource_copy(&mut self, dst: ResourceKey, src: ResourceKey) -> Result<()> {
        self.guarded("resource_copy", |device| {
            // ========== VALIDATE ==========
            if dst == src {
                umd_bail!(InvalidState, "rosumd::Device", "copy of resource {:?} onto itself", dst);
            }
            let (destination, source) = (device.live(dst)?, device.live(src)?);
            destination.check_copy_compatible(source)?;
            if destination.any_mapped() {
                umd_bail!(Fatal, "rosumd::Device", "copy into mapped resource {:?}", dst);
            }
            if source.any_mapped_for_write() {
                umd_bail!(Fatal, "rosumd::Device", "copy from write-mapped resource {:?}", src);
            }

            // Only staging resources may stay in system memory
            for key in [dst, src] {
                if !device.live(key)?.is_staging() {
                    device.ensure_allocated(key)?;
                }
            }

            let (destination, source) = (device.live(dst)?, device.live(src)?);
            match (destination.allocation(), source.allocation()) {
                (Some(destination_allocation), Some(source_allocation)) => {
                    let size = destination.size();
                    device.submit(Command::CopyResource(CopyPacket {
                        source: source_allocation.0,
                        destination: destination_allocation.0,
                        size,
                    }))?;
                    umd_trace!("rosumd::Device", "encoded copy {:?} -> {:?} ({} bytes)", src, dst, size);
                }
                _ => {
                    let bytes = device.read_contents(src)?;
                    device.write_contents(dst, &bytes)?;
                    umd_trace!("rosumd::Device", "CPU copy {:?} -> {:?} ({} bytes)", src, dst, bytes.len());
                }
            }
            device.stats.copies += 1;
            Ok(())
        })
    }

    // ===== MAP / UNMAP =====

    /// Map one subresource of a staging resource for CPU access
    ///
    /// A resource that is not GPU-bound maps its shadow directly. A GPU-bound
    /// one flushes pending commands and locks its allocation;
    /// `MapFlags::DO_NOT_WAIT` is forwarded to the lock.
    pub fn staging_resource_map(
        &mut self,
        key: ResourceKey,
        subresource: u32,
        map_type: MapType,
        flags: MapFlags,
    ) -> Result<MappedSubresource> {
        self.guarded("staging_resource_map", |device| {
            let resource = device.live(key)?;
            if !resource.is_staging() {
                umd_bail!(InvalidState, "rosumd::Device",
                    "only staging resources can be mapped ({:?} is {:?})", key, resource.desc().usage);
            }
            let layout = *resource.layout(subresource)?;
            if resource.is_mapped(subresource) {
                umd_bail!(InvalidState, "rosumd::Device", "subresource {} of {:?} is already mapped", subresource, key);
            }
            let access = resource.desc().cpu_access;
            if (map_type.allows_read() && !access.contains(CpuAccessFlags::READ))
                || (map_type.allows_write() && !access.contains(CpuAccessFlags::WRITE))
            {
                umd_bail!(InvalidState, "rosumd::Device",
                    "{:?} map of {:?} not permitted by CPU access {:?}", map_type, key, access);
            }

            let offset = layout.offset as usize;
            let len = layout.size as usize;
            let (region, locked) = match resource.allocation() {
                None => {
                    let resource = device.live_mut(key)?;
                    let shadow = resource.shadow_mut()
                        .ok_or_else(|| umd_err!(Fatal, "rosumd::Device", "staging resource {:?} has no memory", key))?;
                    let data = NonNull::from(&mut shadow[offset..offset + len]).cast::<u8>();
                    (MappedRegion { data, len }, false)
                }
                Some(allocation) => {
                    device.flush_commands()?;
                    let mut lock_flags = match map_type {
                        MapType::Read => LockFlags::READ_ONLY,
                        MapType::Write => LockFlags::WRITE_ONLY,
                        MapType::ReadWrite => LockFlags::empty(),
                    };
                    if flags.contains(MapFlags::DO_NOT_WAIT) {
                        lock_flags |= LockFlags::DONOT_WAIT;
                    }
                    let locked = device.kernel_lock(allocation, lock_flags)?;
                    match locked_region(&locked, offset, len) {
                        Ok(region) => (region, true),
                        Err(err) => {
                            device.kernel_unlock(allocation)?;
                            return Err(err);
                        }
                    }
                }
            };

            device.live_mut(key)?.begin_map(subresource, map_type, locked, region)?;
            umd_trace!("rosumd::Device", "mapped {:?} subresource {} ({:?}, locked: {})", key, subresource, map_type, locked);
            Ok(MappedSubresource {
                data: region.data,
                len: region.len,
                row_pitch: layout.row_pitch,
                depth_pitch: layout.depth_pitch,
            })
        })
    }

    /// Release the CPU mapping of one subresource
    pub fn staging_resource_unmap(&mut self, key: ResourceKey, subresource: u32) -> Result<()> {
        self.guarded("staging_resource_unmap", |device| {
            let resource = device.live_mut(key)?;
            let previous = resource.end_map(subresource)?;
            let allocation = resource.allocation();
            if let (MapState::Mapped { locked: true, .. }, Some(allocation)) = (previous, allocation) {
                device.kernel_unlock(allocation)?;
            }
            umd_trace!("rosumd::Device", "unmapped {:?} subresource {}", key, subresource);
            Ok(())
        })
    }

    /// Bytes of a subresource mapped for reading
    pub fn mapped_data(&self, key: ResourceKey, subresource: u32) -> Result<&[u8]> {
        match self.live(key)?.map_state(subresource)? {
            MapState::Mapped { map_type, region, .. } if map_type.allows_read() => {
                // SAFETY: the region stays valid until unmap, which needs `&mut self`
                Ok(unsafe { std::slice::from_raw_parts(region.data.as_ptr(), region.len) })
            }
            MapState::Mapped { map_type, .. } => Err(Error::InvalidState(format!(
                "subresource {} of {:?} is mapped {:?}, not readable", subresource, key, map_type))),
            MapState::Unmapped => Err(Error::InvalidState(format!(
                "subresource {} of {:?} is not mapped", subresource, key))),
        }
    }

    /// Writable bytes of a subresource mapped for writing
    pub fn mapped_data_mut(&mut self, key: ResourceKey, subresource: u32) -> Result<&mut [u8]> {
        match self.live(key)?.map_state(subresource)? {
            MapState::Mapped { map_type, region, .. } if map_type.allows_write() => {
                // SAFETY: as in `mapped_data`; `&mut self` makes the slice unique
                Ok(unsafe { std::slice::from_raw_parts_mut(region.data.as_ptr(), region.len) })
            }
            MapState::Mapped { map_type, .. } => Err(Error::InvalidState(format!(
                "subresource {} of {:?} is mapped {:?}, not writable", subresource, key, map_type))),
            MapState::Unmapped => Err(Error::InvalidState(format!(
                "subresource {} of {:?} is not mapped", subresource, key))),
        }
    }

    // ===== ALLOCATION =====

    /// Give `key` its kernel allocation, uploading any shadow contents
    ///
    /// Allocates at most once per resource, even when the upload fails.
    /// Fatal while any subresource is mapped.
    pub(super) fn ensure_allocated(&mut self, key: ResourceKey) -> Result<AllocationHandle> {
        let resource = self.live(key)?;
        if let Some(allocation) = resource.allocation() {
            return Ok(allocation);
        }
        if resource.any_mapped() {
            umd_bail!(Fatal, "rosumd::Device", "resource {:?} needs GPU memory while mapped", key);
        }
        let size = resource.size();
        let cpu_visible = matches!(resource.desc().usage, ResourceUsage::Staging | ResourceUsage::Dynamic);

        let allocation = match resource.unfilled_allocation() {
            Some(allocation) => allocation,
            None => self.kernel_allocate(size, cpu_visible)?,
        };
        let shadow = self.live_mut(key)?.take_shadow();
        if let Some(shadow) = shadow {
            if let Err(err) = self.upload(allocation, &shadow) {
                // Keep the allocation; the next use retries only the upload
                let resource = self.live_mut(key)?;
                resource.set_shadow(shadow);
                resource.set_unfilled_allocation(Some(allocation));
                return Err(err);
            }
        }
        let resource = self.live_mut(key)?;
        resource.set_unfilled_allocation(None);
        resource.set_allocation(Some(allocation));
        Ok(allocation)
    }

    /// Write `data` to the start of a fresh allocation
    fn upload(&self, allocation: AllocationHandle, data: &[u8]) -> Result<()> {
        let locked = self.kernel_lock(allocation, LockFlags::WRITE_ONLY)?;
        let copied = locked_region(&locked, 0, data.len()).map(|region| {
            // SAFETY: the kernel keeps the lock valid for `locked.size` bytes until unlock
            unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), region.data.as_ptr(), data.len()) }
        });
        self.kernel_unlock(allocation)?;
        copied
    }

    /// Current contents of a resource (shadow, or its allocation after flushing)
    fn read_contents(&mut self, key: ResourceKey) -> Result<Vec<u8>> {
        let resource = self.live(key)?;
        if let Some(shadow) = resource.shadow() {
            return Ok(shadow.to_vec());
        }
        let size = resource.size() as usize;
        let allocation = self.ensure_allocated(key)?;
        self.flush_commands()?;

        let locked = self.kernel_lock(allocation, LockFlags::READ_ONLY)?;
        let contents = locked_region(&locked, 0, size).map(|region| {
            // SAFETY: see `upload`
            unsafe { std::slice::from_raw_parts(region.data.as_ptr(), size) }.to_vec()
        });
        self.kernel_unlock(allocation)?;
        contents
    }

    /// Overwrite the contents of a resource (shadow, or its allocation after flushing)
    fn write_contents(&mut self, key: ResourceKey, data: &[u8]) -> Result<()> {
        let resource = self.live_mut(key)?;
        if let Some(shadow) = resource.shadow_mut() {
            shadow.copy_from_slice(data);
            return Ok(());
        }
        let allocation = self.ensure_allocated(key)?;
        self.flush_commands()?;
        self.upload(allocation, data)
    }

    // ===== LOOKUP =====

    pub(super) fn live(&self, key: ResourceKey) -> Result<&Resource> {
        match self.resources.get(key) {
            Some(resource) => Ok(resource),
            None => umd_bail!(InvalidResource, "rosumd::Device", "resource {:?} does not exist", key),
        }
    }

    fn live_mut(&mut self, key: ResourceKey) -> Result<&mut Resource> {
        match self.resources.get_mut(key) {
            Some(resource) => Ok(resource),
            None => umd_bail!(InvalidResource, "rosumd::Device", "resource {:?} does not exist", key),
        }
    }
}

/// `len` bytes at `offset` of a locked allocation
fn locked_region(locked: &LockedAllocation, offset: usize, len: usize) -> Result<MappedRegion> {
    if offset.checked_add(len).map_or(true, |end| end > locked.size) {
        umd_bail!(Fatal, "rosumd::Device",
            "kernel locked {} bytes, {} needed at offset {}", locked.size, len, offset);
    }
    // SAFETY: offset + len is within the locked range checked above
    let data = unsafe { NonNull::new_unchecked(locked.data.as_ptr().add(offset)) };
    Ok(MappedRegion { data, len })
}

#[cfg(test)]
#[path = "resource_ops_tests.rs"]
mod tests;
