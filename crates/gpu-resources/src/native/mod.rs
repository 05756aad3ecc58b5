//! The seam between the resource layer and an actual graphics device.
//!
//! [`NativeDevice`] is deliberately narrow: allocation, views, CPU mapping,
//! footprint queries and synchronous command-list execution. Everything
//! about lifetimes, validation and queue selection lives above it.

mod software;

pub use software::{SoftwareDevice, SoftwareDeviceConfig, SoftwareDeviceStats};

use crate::descriptors::DescriptorSlot;
use crate::error::Result;
use crate::format::TexelFormat;
use crate::resource::ResourceKind;
use crate::state::{CommandListType, ResourceState};

/// Row pitch alignment for linear texture data in buffers.
pub const TEXTURE_DATA_PITCH_ALIGNMENT: u64 = 256;

pub(crate) fn align_up(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Opaque id of a native allocation.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct NativeHandle(pub u64);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DeviceLimits {
    pub max_buffer_bytes: u64,
    pub max_texture_1d_width: u32,
    pub max_texture_2d_dimension: u32,
    pub max_texture_3d_dimension: u32,
    /// Capacity of each descriptor pool.
    pub descriptor_heap_capacity: u32,
}

impl DeviceLimits {
    pub const D3D12: Self = Self {
        max_buffer_bytes: i32::MAX as u64,
        max_texture_1d_width: 16_384,
        max_texture_2d_dimension: 16_384,
        max_texture_3d_dimension: 2_048,
        descriptor_heap_capacity: 4_096,
    };
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self::D3D12
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterInfo {
    pub name: String,
    pub unified_memory: bool,
    /// Only meaningful with `unified_memory`.
    pub cache_coherent: bool,
    pub limits: DeviceLimits,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum HeapType {
    Default,
    Upload,
    ReadBack,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ResourceDimension {
    Buffer,
    Texture1D,
    Texture2D,
    Texture3D,
}

impl ResourceDimension {
    pub fn is_texture(self) -> bool {
        self != Self::Buffer
    }
}

/// Description handed to [`NativeDevice::create_resource`].
///
/// For buffers `width` is a byte count and `format` is `None`; for textures
/// it is a texel count.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceDesc {
    pub dimension: ResourceDimension,
    pub heap: HeapType,
    pub format: Option<TexelFormat>,
    pub width: u64,
    pub height: u32,
    pub depth: u32,
    pub initial_state: ResourceState,
    pub allow_unordered_access: bool,
}

impl ResourceDesc {
    pub fn buffer(heap: HeapType, bytes: u64, initial_state: ResourceState) -> Self {
        Self {
            dimension: ResourceDimension::Buffer,
            heap,
            format: None,
            width: bytes,
            height: 1,
            depth: 1,
            initial_state,
            allow_unordered_access: false,
        }
    }

    pub fn texture(
        dimension: ResourceDimension,
        format: TexelFormat,
        width: u32,
        height: u32,
        depth: u32,
        initial_state: ResourceState,
    ) -> Self {
        Self {
            dimension,
            heap: HeapType::Default,
            format: Some(format),
            width: u64::from(width),
            height,
            depth,
            initial_state,
            allow_unordered_access: false,
        }
    }

    pub fn with_unordered_access(mut self, allow: bool) -> Self {
        self.allow_unordered_access = allow;
        self
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ViewKind {
    ConstantBuffer,
    ShaderResource,
    UnorderedAccess,
}

/// A box inside a texture, in texels.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub z: u32,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl Region {
    pub const fn new(x: u32, y: u32, z: u32, width: u32, height: u32, depth: u32) -> Self {
        Self {
            x,
            y,
            z,
            width,
            height,
            depth,
        }
    }

    pub const fn line(x: u32, width: u32) -> Self {
        Self::new(x, 0, 0, width, 1, 1)
    }

    pub const fn rect(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self::new(x, y, 0, width, height, 1)
    }

    pub const fn full(width: u32, height: u32, depth: u32) -> Self {
        Self::new(0, 0, 0, width, height, depth)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.depth == 0
    }

    pub fn texel_count(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * u64::from(self.depth)
    }

    /// Whether the box lies inside a `width x height x depth` extent.
    pub fn fits_within(&self, width: u32, height: u32, depth: u32) -> bool {
        let inside = |origin: u32, size: u32, extent: u32| {
            origin.checked_add(size).is_some_and(|end| end <= extent)
        };
        inside(self.x, self.width, width)
            && inside(self.y, self.height, height)
            && inside(self.z, self.depth, depth)
    }
}

/// Linear layout of a texture region placed in a buffer.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Footprint {
    pub format: TexelFormat,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub row_pitch: u64,
    pub total_bytes: u64,
}

impl Footprint {
    /// Bytes of texel data in one row, without padding.
    pub fn row_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.format.bytes_per_texel())
    }

    pub fn slice_pitch(&self) -> u64 {
        self.row_pitch * u64::from(self.height)
    }

    /// Byte offset of the first texel of row `y` in slice `z`.
    pub fn row_offset(&self, y: u32, z: u32) -> u64 {
        u64::from(z) * self.slice_pitch() + u64::from(y) * self.row_pitch
    }

    /// The layout every device uses for a `width x height x depth` block:
    /// rows aligned to [`TEXTURE_DATA_PITCH_ALIGNMENT`], last row unpadded.
    pub fn aligned(format: TexelFormat, width: u32, height: u32, depth: u32) -> Self {
        let row_size = u64::from(width) * u64::from(format.bytes_per_texel());
        let row_pitch = align_up(row_size, TEXTURE_DATA_PITCH_ALIGNMENT);
        let rows = u64::from(height) * u64::from(depth);
        let total_bytes = if rows == 0 {
            0
        } else {
            row_pitch * (rows - 1) + row_size
        };
        Self {
            format,
            width,
            height,
            depth,
            row_pitch,
            total_bytes,
        }
    }
}

/// One side of a texture copy.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TextureCopyLocation {
    /// The texture itself.
    Subresource(NativeHandle),
    /// A buffer holding texels laid out as `footprint`, starting at `offset`.
    Placed {
        resource: NativeHandle,
        offset: u64,
        footprint: Footprint,
    },
}

impl TextureCopyLocation {
    pub fn resource(&self) -> NativeHandle {
        match *self {
            Self::Subresource(handle) => handle,
            Self::Placed { resource, .. } => resource,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Command {
    Barrier {
        resource: NativeHandle,
        before: ResourceState,
        after: ResourceState,
    },
    CopyBufferRegion {
        dst: NativeHandle,
        dst_offset: u64,
        src: NativeHandle,
        src_offset: u64,
        bytes: u64,
    },
    CopyTextureRegion {
        dst: TextureCopyLocation,
        dst_x: u32,
        dst_y: u32,
        dst_z: u32,
        src: TextureCopyLocation,
        src_region: Region,
    },
}

/// Commands recorded for one synchronous submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandList {
    kind: CommandListType,
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new(kind: CommandListType) -> Self {
        Self {
            kind,
            commands: Vec::new(),
        }
    }

    pub fn kind(&self) -> CommandListType {
        self.kind
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn barrier(&mut self, resource: NativeHandle, before: ResourceState, after: ResourceState) {
        if before != after {
            self.push(Command::Barrier {
                resource,
                before,
                after,
            });
        }
    }
}

/// A graphics device able to back the resource family.
///
/// Implementations must be usable from any thread; callers serialize work
/// per resource but not per device.
pub trait NativeDevice: Send + Sync {
    fn adapter(&self) -> &AdapterInfo;

    /// `Some(reason)` once the device has been removed.
    fn removed_reason(&self) -> Option<String>;

    fn supports_format(&self, format: TexelFormat, kind: ResourceKind) -> bool;

    fn supports_double_precision(&self) -> bool;

    fn create_resource(&self, desc: &ResourceDesc) -> Result<NativeHandle>;

    fn destroy_resource(&self, handle: NativeHandle);

    fn create_view(&self, handle: NativeHandle, view: ViewKind, slot: DescriptorSlot) -> Result<()>;

    /// Map a CPU-visible buffer and run `access` over its bytes.
    fn map(&self, handle: NativeHandle, access: &mut dyn FnMut(&mut [u8])) -> Result<()>;

    /// Write tightly packed texels into a texture on unified memory.
    fn write_subresource(
        &self,
        handle: NativeHandle,
        region: &Region,
        data: &[u8],
        row_pitch: u64,
        slice_pitch: u64,
    ) -> Result<()>;

    /// Read a texture region on unified memory into tightly packed texels.
    fn read_subresource(
        &self,
        handle: NativeHandle,
        region: &Region,
        data: &mut [u8],
        row_pitch: u64,
        slice_pitch: u64,
    ) -> Result<()>;

    /// Buffer layout for copying `region` of a texture described by `desc`.
    fn copyable_footprint(&self, desc: &ResourceDesc, region: &Region) -> Result<Footprint>;

    /// Execute a command list and block until the device has finished it.
    fn execute(&self, list: &CommandList) -> Result<()>;
}
