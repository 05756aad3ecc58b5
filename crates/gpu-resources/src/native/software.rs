//! A [`NativeDevice`] that keeps every allocation in host memory.
//!
//! It simulates both memory architectures: with `unified_memory` default-heap
//! buffers are mappable and textures accept direct subresource writes,
//! without it the only way into default-heap memory is a command list. The
//! queue rules of a real device are enforced so that wrong barrier or queue
//! choices fail loudly in tests.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, error, trace};

use super::{
    AdapterInfo, Command, CommandList, DeviceLimits, Footprint, HeapType, NativeDevice,
    NativeHandle, Region, ResourceDesc, ResourceDimension, TextureCopyLocation, ViewKind,
};
use crate::descriptors::DescriptorSlot;
use crate::error::{GpuError, Result};
use crate::format::TexelFormat;
use crate::resource::ResourceKind;
use crate::state::{CommandListType, ResourceState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareDeviceConfig {
    pub name: String,
    pub unified_memory: bool,
    pub cache_coherent: bool,
    pub limits: DeviceLimits,
    pub double_precision: bool,
    /// Format and resource kind pairs the device refuses.
    pub unsupported_formats: Vec<(TexelFormat, ResourceKind)>,
}

impl Default for SoftwareDeviceConfig {
    fn default() -> Self {
        Self {
            name: "Software Adapter (discrete)".to_string(),
            unified_memory: false,
            cache_coherent: false,
            limits: DeviceLimits::D3D12,
            double_precision: true,
            unsupported_formats: Vec::new(),
        }
    }
}

impl SoftwareDeviceConfig {
    /// A discrete adapter: default-heap memory is reachable only through
    /// staging copies.
    pub fn discrete() -> Self {
        Self::default()
    }

    /// A cache-coherent unified memory adapter.
    pub fn unified() -> Self {
        Self {
            name: "Software Adapter (unified)".to_string(),
            unified_memory: true,
            cache_coherent: true,
            ..Self::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_limits(mut self, limits: DeviceLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_cache_coherence(mut self, coherent: bool) -> Self {
        self.cache_coherent = coherent;
        self
    }

    pub fn without_double_precision(mut self) -> Self {
        self.double_precision = false;
        self
    }

    pub fn without_format(mut self, format: TexelFormat, kind: ResourceKind) -> Self {
        self.unsupported_formats.push((format, kind));
        self
    }
}

/// Counters of native work, for asserting which path a copy took.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct SoftwareDeviceStats {
    pub resources_created: usize,
    pub resources_destroyed: usize,
    pub views_created: usize,
    pub maps: usize,
    pub subresource_writes: usize,
    pub subresource_reads: usize,
    pub copy_lists_executed: usize,
    pub compute_lists_executed: usize,
    pub barriers: usize,
}

impl SoftwareDeviceStats {
    pub fn command_lists_executed(&self) -> usize {
        self.copy_lists_executed + self.compute_lists_executed
    }
}

#[derive(Debug)]
struct Allocation {
    desc: ResourceDesc,
    state: ResourceState,
    bytes: Vec<u8>,
}

impl Allocation {
    fn texel_size(&self) -> u64 {
        self.desc
            .format
            .map_or(1, |format| u64::from(format.bytes_per_texel()))
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    next_handle: u64,
    allocations: HashMap<NativeHandle, Allocation>,
    stats: SoftwareDeviceStats,
    removed: Option<String>,
}

impl DeviceState {
    fn get(&self, call: &'static str, handle: NativeHandle) -> Result<&Allocation> {
        self.allocations
            .get(&handle)
            .ok_or_else(|| GpuError::native(call, format!("unknown resource {handle:?}")))
    }

    fn get_mut(&mut self, call: &'static str, handle: NativeHandle) -> Result<&mut Allocation> {
        self.allocations
            .get_mut(&handle)
            .ok_or_else(|| GpuError::native(call, format!("unknown resource {handle:?}")))
    }

    fn ensure_present(&self, call: &'static str) -> Result<()> {
        match &self.removed {
            Some(reason) => Err(GpuError::native(call, format!("device removed: {reason}"))),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum CopyRole {
    Source,
    Destination,
}

/// Texel addressing of one side of a texture copy.
#[derive(Debug, Copy, Clone)]
struct Layout {
    base: u64,
    row_pitch: u64,
    slice_pitch: u64,
    width: u32,
    height: u32,
    depth: u32,
    texel: u64,
}

impl Layout {
    fn offset(&self, x: u32, y: u32, z: u32) -> usize {
        (self.base
            + u64::from(z) * self.slice_pitch
            + u64::from(y) * self.row_pitch
            + u64::from(x) * self.texel) as usize
    }
}

pub struct SoftwareDevice {
    adapter: AdapterInfo,
    double_precision: bool,
    unsupported_formats: Vec<(TexelFormat, ResourceKind)>,
    state: Mutex<DeviceState>,
}

impl SoftwareDevice {
    pub fn new(config: SoftwareDeviceConfig) -> Self {
        debug!(
            name = %config.name,
            unified_memory = config.unified_memory,
            cache_coherent = config.cache_coherent,
            "software device created"
        );
        Self {
            adapter: AdapterInfo {
                name: config.name,
                unified_memory: config.unified_memory,
                cache_coherent: config.cache_coherent,
                limits: config.limits,
            },
            double_precision: config.double_precision,
            unsupported_formats: config.unsupported_formats,
            state: Mutex::new(DeviceState {
                next_handle: 1,
                ..DeviceState::default()
            }),
        }
    }

    pub fn stats(&self) -> SoftwareDeviceStats {
        self.lock().stats
    }

    pub fn live_resources(&self) -> usize {
        self.lock().allocations.len()
    }

    pub fn resource_state(&self, handle: NativeHandle) -> Option<ResourceState> {
        self.lock().allocations.get(&handle).map(|a| a.state)
    }

    /// Simulate device removal; every later call except destruction fails.
    pub fn remove_device(&self, reason: impl Into<String>) {
        let reason = reason.into();
        error!(name = %self.adapter.name, %reason, "device removed");
        self.lock().removed = Some(reason);
    }

    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn is_cpu_visible(&self, desc: &ResourceDesc) -> bool {
        match desc.heap {
            HeapType::Upload | HeapType::ReadBack => true,
            HeapType::Default => {
                desc.dimension == ResourceDimension::Buffer
                    && self.adapter.unified_memory
                    && self.adapter.cache_coherent
            }
        }
    }

    fn allocation_size(desc: &ResourceDesc) -> Result<u64> {
        const CALL: &str = "CreateCommittedResource";
        if desc.width == 0 || desc.height == 0 || desc.depth == 0 {
            return Err(GpuError::native(CALL, format!("empty resource {desc:?}")));
        }
        match (desc.dimension, desc.format) {
            (ResourceDimension::Buffer, None) => Ok(desc.width),
            (ResourceDimension::Buffer, Some(_)) => {
                Err(GpuError::native(CALL, "buffers are typeless"))
            }
            (_, None) => Err(GpuError::native(CALL, "textures need a format")),
            (_, Some(format)) => Ok(desc.width
                * u64::from(desc.height)
                * u64::from(desc.depth)
                * u64::from(format.bytes_per_texel())),
        }
    }

    fn check_heap(desc: &ResourceDesc) -> Result<()> {
        const CALL: &str = "CreateCommittedResource";
        let expected = match desc.heap {
            HeapType::Upload => Some(ResourceState::GenericRead),
            HeapType::ReadBack => Some(ResourceState::CopyDest),
            HeapType::Default => None,
        };
        if let Some(expected) = expected {
            if desc.initial_state != expected {
                return Err(GpuError::native(
                    CALL,
                    format!("{:?} heap resources must start in {expected:?}", desc.heap),
                ));
            }
            if desc.dimension.is_texture() {
                return Err(GpuError::native(CALL, "textures must live in the default heap"));
            }
        }
        Ok(())
    }

    fn check_copy_access(
        kind: CommandListType,
        handle: NativeHandle,
        allocation: &Allocation,
        role: CopyRole,
    ) -> Result<()> {
        const CALL: &str = "ExecuteCommandLists";
        let state = allocation.state;
        if kind == CommandListType::Copy && state == ResourceState::UnorderedAccess {
            return Err(GpuError::native(
                CALL,
                format!("copy queue cannot access {handle:?} in UnorderedAccess"),
            ));
        }
        let allowed = match role {
            CopyRole::Source => matches!(
                state,
                ResourceState::Common | ResourceState::CopySource | ResourceState::GenericRead
            ),
            CopyRole::Destination => {
                matches!(state, ResourceState::Common | ResourceState::CopyDest)
            }
        };
        if allowed {
            Ok(())
        } else {
            Err(GpuError::native(
                CALL,
                format!("{handle:?} in {state:?} cannot be a copy {role:?}"),
            ))
        }
    }

    fn layout(
        state: &DeviceState,
        location: &TextureCopyLocation,
        kind: CommandListType,
        role: CopyRole,
    ) -> Result<(Layout, TexelFormat)> {
        const CALL: &str = "CopyTextureRegion";
        let handle = location.resource();
        let allocation = state.get(CALL, handle)?;
        Self::check_copy_access(kind, handle, allocation, role)?;
        match *location {
            TextureCopyLocation::Subresource(_) => {
                let desc = &allocation.desc;
                let format = desc
                    .format
                    .filter(|_| desc.dimension.is_texture())
                    .ok_or_else(|| GpuError::native(CALL, "subresource location on a buffer"))?;
                let texel = allocation.texel_size();
                let row_pitch = desc.width * texel;
                Ok((
                    Layout {
                        base: 0,
                        row_pitch,
                        slice_pitch: row_pitch * u64::from(desc.height),
                        width: desc.width as u32,
                        height: desc.height,
                        depth: desc.depth,
                        texel,
                    },
                    format,
                ))
            }
            TextureCopyLocation::Placed {
                offset, footprint, ..
            } => {
                if allocation.desc.dimension.is_texture() {
                    return Err(GpuError::native(CALL, "placed footprint on a texture"));
                }
                let end = offset.checked_add(footprint.total_bytes);
                if end.map_or(true, |end| end > allocation.bytes.len() as u64) {
                    return Err(GpuError::native(
                        CALL,
                        format!("footprint overruns {handle:?}"),
                    ));
                }
                Ok((
                    Layout {
                        base: offset,
                        row_pitch: footprint.row_pitch,
                        slice_pitch: footprint.slice_pitch(),
                        width: footprint.width,
                        height: footprint.height,
                        depth: footprint.depth,
                        texel: u64::from(footprint.format.bytes_per_texel()),
                    },
                    footprint.format,
                ))
            }
        }
    }

    /// The resource whose state or contents `command` changes.
    fn modified_resource(command: &Command) -> NativeHandle {
        match command {
            Command::Barrier { resource, .. } => *resource,
            Command::CopyBufferRegion { dst, .. } => *dst,
            Command::CopyTextureRegion { dst, .. } => dst.resource(),
        }
    }

    fn run(state: &mut DeviceState, kind: CommandListType, command: &Command) -> Result<()> {
        match *command {
            Command::Barrier {
                resource,
                before,
                after,
            } => {
                const CALL: &str = "ResourceBarrier";
                if kind == CommandListType::Copy
                    && (before == ResourceState::UnorderedAccess
                        || after == ResourceState::UnorderedAccess)
                {
                    return Err(GpuError::native(
                        CALL,
                        "copy queue cannot transition UnorderedAccess",
                    ));
                }
                let allocation = state.get_mut(CALL, resource)?;
                if allocation.state != before {
                    return Err(GpuError::native(
                        CALL,
                        format!(
                            "{resource:?} is in {:?}, barrier expected {before:?}",
                            allocation.state
                        ),
                    ));
                }
                allocation.state = after;
                state.stats.barriers += 1;
                Ok(())
            }
            Command::CopyBufferRegion {
                dst,
                dst_offset,
                src,
                src_offset,
                bytes,
            } => {
                const CALL: &str = "CopyBufferRegion";
                let source = state.get(CALL, src)?;
                Self::check_copy_access(kind, src, source, CopyRole::Source)?;
                let data = slice_range(&source.bytes, src_offset, bytes)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| GpuError::native(CALL, "source range out of bounds"))?;
                let destination = state.get_mut(CALL, dst)?;
                Self::check_copy_access(kind, dst, destination, CopyRole::Destination)?;
                let target = slice_range_mut(&mut destination.bytes, dst_offset, bytes)
                    .ok_or_else(|| GpuError::native(CALL, "destination range out of bounds"))?;
                target.copy_from_slice(&data);
                Ok(())
            }
            Command::CopyTextureRegion {
                dst,
                dst_x,
                dst_y,
                dst_z,
                src,
                src_region,
            } => {
                const CALL: &str = "CopyTextureRegion";
                let (src_layout, src_format) = Self::layout(state, &src, kind, CopyRole::Source)?;
                let (dst_layout, dst_format) =
                    Self::layout(state, &dst, kind, CopyRole::Destination)?;
                if src_format.bytes_per_texel() != dst_format.bytes_per_texel() {
                    return Err(GpuError::native(
                        CALL,
                        format!("{src_format:?} and {dst_format:?} are not copy compatible"),
                    ));
                }
                let dst_region = Region::new(
                    dst_x,
                    dst_y,
                    dst_z,
                    src_region.width,
                    src_region.height,
                    src_region.depth,
                );
                if !src_region.fits_within(src_layout.width, src_layout.height, src_layout.depth)
                    || !dst_region.fits_within(
                        dst_layout.width,
                        dst_layout.height,
                        dst_layout.depth,
                    )
                {
                    return Err(GpuError::native(CALL, "copy box out of bounds"));
                }

                let row = (u64::from(src_region.width) * src_layout.texel) as usize;
                let source = &state.get(CALL, src.resource())?.bytes;
                let mut rows = Vec::with_capacity(
                    row * src_region.height as usize * src_region.depth as usize,
                );
                for z in 0..src_region.depth {
                    for y in 0..src_region.height {
                        let at =
                            src_layout.offset(src_region.x, src_region.y + y, src_region.z + z);
                        rows.extend_from_slice(&source[at..at + row]);
                    }
                }

                let target = &mut state.get_mut(CALL, dst.resource())?.bytes;
                let mut chunks = rows.chunks_exact(row);
                for z in 0..src_region.depth {
                    for y in 0..src_region.height {
                        let at = dst_layout.offset(dst_x, dst_y + y, dst_z + z);
                        if let Some(chunk) = chunks.next() {
                            target[at..at + row].copy_from_slice(chunk);
                        }
                    }
                }
                Ok(())
            }
        }
    }

    fn check_subresource_access(
        &self,
        call: &'static str,
        allocation: &Allocation,
        region: &Region,
    ) -> Result<()> {
        let desc = &allocation.desc;
        if !desc.dimension.is_texture() || desc.heap != HeapType::Default {
            return Err(GpuError::native(call, "not a default-heap texture"));
        }
        if !self.adapter.unified_memory {
            return Err(GpuError::native(call, "texture memory is not CPU visible"));
        }
        if region.is_empty() || !region.fits_within(desc.width as u32, desc.height, desc.depth) {
            return Err(GpuError::native(call, format!("region {region:?} out of bounds")));
        }
        Ok(())
    }
}

fn slice_range(bytes: &[u8], offset: u64, len: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(len).ok()?)?;
    bytes.get(start..end)
}

fn slice_range_mut(bytes: &mut [u8], offset: u64, len: u64) -> Option<&mut [u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(len).ok()?)?;
    bytes.get_mut(start..end)
}

/// Byte offset of texel row `y` in slice `z` of a caller-side linear buffer.
fn linear_offset(
    region: &Region,
    texel: u64,
    row_pitch: u64,
    slice_pitch: u64,
    y: u32,
    z: u32,
) -> Option<(usize, usize)> {
    let row = u64::from(region.width) * texel;
    let start = u64::from(z) * slice_pitch + u64::from(y) * row_pitch;
    Some((usize::try_from(start).ok()?, usize::try_from(row).ok()?))
}

impl NativeDevice for SoftwareDevice {
    fn adapter(&self) -> &AdapterInfo {
        &self.adapter
    }

    fn removed_reason(&self) -> Option<String> {
        self.lock().removed.clone()
    }

    fn supports_format(&self, format: TexelFormat, kind: ResourceKind) -> bool {
        !self.unsupported_formats.contains(&(format, kind))
    }

    fn supports_double_precision(&self) -> bool {
        self.double_precision
    }

    fn create_resource(&self, desc: &ResourceDesc) -> Result<NativeHandle> {
        let size = Self::allocation_size(desc)?;
        Self::check_heap(desc)?;
        if size > self.adapter.limits.max_buffer_bytes {
            return Err(GpuError::native(
                "CreateCommittedResource",
                format!("{size} bytes exceeds the device maximum"),
            ));
        }
        let len = usize::try_from(size)
            .map_err(|_| GpuError::native("CreateCommittedResource", "allocation too large"))?;

        let mut state = self.lock();
        state.ensure_present("CreateCommittedResource")?;
        let handle = NativeHandle(state.next_handle);
        state.next_handle += 1;
        state.allocations.insert(
            handle,
            Allocation {
                desc: *desc,
                state: desc.initial_state,
                bytes: vec![0; len],
            },
        );
        state.stats.resources_created += 1;
        trace!(?handle, ?desc, "native resource created");
        Ok(handle)
    }

    fn destroy_resource(&self, handle: NativeHandle) {
        let mut state = self.lock();
        if state.allocations.remove(&handle).is_some() {
            state.stats.resources_destroyed += 1;
            trace!(?handle, "native resource destroyed");
        } else {
            error!(?handle, "destroying an unknown native resource");
        }
    }

    fn create_view(
        &self,
        handle: NativeHandle,
        view: ViewKind,
        slot: DescriptorSlot,
    ) -> Result<()> {
        const CALL: &str = "CreateView";
        let mut state = self.lock();
        state.ensure_present(CALL)?;
        let allocation = state.get(CALL, handle)?;
        match view {
            ViewKind::UnorderedAccess if !allocation.desc.allow_unordered_access => {
                return Err(GpuError::native(CALL, "resource does not allow unordered access"));
            }
            ViewKind::ConstantBuffer if allocation.desc.dimension.is_texture() => {
                return Err(GpuError::native(CALL, "constant buffer view on a texture"));
            }
            _ => {}
        }
        state.stats.views_created += 1;
        trace!(?handle, ?view, ?slot, "view created");
        Ok(())
    }

    fn map(&self, handle: NativeHandle, access: &mut dyn FnMut(&mut [u8])) -> Result<()> {
        const CALL: &str = "Map";
        let mut state = self.lock();
        state.ensure_present(CALL)?;
        let allocation = state.get_mut(CALL, handle)?;
        if !self.is_cpu_visible(&allocation.desc) {
            return Err(GpuError::native(CALL, format!("{handle:?} is not CPU visible")));
        }
        access(&mut allocation.bytes);
        state.stats.maps += 1;
        Ok(())
    }

    fn write_subresource(
        &self,
        handle: NativeHandle,
        region: &Region,
        data: &[u8],
        row_pitch: u64,
        slice_pitch: u64,
    ) -> Result<()> {
        const CALL: &str = "WriteToSubresource";
        let mut state = self.lock();
        state.ensure_present(CALL)?;
        let allocation = state.get(CALL, handle)?;
        self.check_subresource_access(CALL, allocation, region)?;
        let texel = allocation.texel_size();
        let width = allocation.desc.width;
        let height = u64::from(allocation.desc.height);

        let allocation = state.get_mut(CALL, handle)?;
        for z in 0..region.depth {
            for y in 0..region.height {
                let (from, row) = linear_offset(region, texel, row_pitch, slice_pitch, y, z)
                    .ok_or_else(|| GpuError::native(CALL, "pitch overflow"))?;
                let source = data
                    .get(from..from + row)
                    .ok_or_else(|| GpuError::native(CALL, "source data too short"))?;
                let to = ((u64::from(region.z + z) * height + u64::from(region.y + y)) * width
                    + u64::from(region.x))
                    * texel;
                let to = to as usize;
                allocation.bytes[to..to + row].copy_from_slice(source);
            }
        }
        state.stats.subresource_writes += 1;
        Ok(())
    }

    fn read_subresource(
        &self,
        handle: NativeHandle,
        region: &Region,
        data: &mut [u8],
        row_pitch: u64,
        slice_pitch: u64,
    ) -> Result<()> {
        const CALL: &str = "ReadFromSubresource";
        let mut state = self.lock();
        state.ensure_present(CALL)?;
        let allocation = state.get(CALL, handle)?;
        self.check_subresource_access(CALL, allocation, region)?;
        let texel = allocation.texel_size();
        let width = allocation.desc.width;
        let height = u64::from(allocation.desc.height);

        for z in 0..region.depth {
            for y in 0..region.height {
                let (to, row) = linear_offset(region, texel, row_pitch, slice_pitch, y, z)
                    .ok_or_else(|| GpuError::native(CALL, "pitch overflow"))?;
                let target = data
                    .get_mut(to..to + row)
                    .ok_or_else(|| GpuError::native(CALL, "destination too short"))?;
                let from = ((u64::from(region.z + z) * height + u64::from(region.y + y)) * width
                    + u64::from(region.x))
                    * texel;
                let from = from as usize;
                target.copy_from_slice(&allocation.bytes[from..from + row]);
            }
        }
        state.stats.subresource_reads += 1;
        Ok(())
    }

    fn copyable_footprint(&self, desc: &ResourceDesc, region: &Region) -> Result<Footprint> {
        let format = desc.format.ok_or_else(|| {
            GpuError::native("GetCopyableFootprints", "footprints need a texture format")
        })?;
        Ok(Footprint::aligned(
            format,
            region.width,
            region.height,
            region.depth,
        ))
    }

    fn execute(&self, list: &CommandList) -> Result<()> {
        let mut state = self.lock();
        state.ensure_present("ExecuteCommandLists")?;

        // A failing list leaves every resource as it found it.
        let stats = state.stats;
        let mut saved: HashMap<NativeHandle, (ResourceState, Vec<u8>)> = HashMap::new();
        for command in list.commands() {
            let target = Self::modified_resource(command);
            if let Some(allocation) = state.allocations.get(&target) {
                saved
                    .entry(target)
                    .or_insert_with(|| (allocation.state, allocation.bytes.clone()));
            }
            if let Err(err) = Self::run(&mut state, list.kind(), command) {
                error!(?command, %err, "command list execution failed");
                for (handle, (resource_state, bytes)) in saved {
                    if let Some(allocation) = state.allocations.get_mut(&handle) {
                        allocation.state = resource_state;
                        allocation.bytes = bytes;
                    }
                }
                state.stats = stats;
                return Err(err);
            }
        }
        match list.kind() {
            CommandListType::Copy => state.stats.copy_lists_executed += 1,
            CommandListType::Compute => state.stats.compute_lists_executed += 1,
        }
        trace!(kind = ?list.kind(), commands = list.commands().len(), "command list executed");
        Ok(())
    }
}
