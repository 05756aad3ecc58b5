//! Typed GPU resources with explicit lifetimes.
//!
//! A [`GraphicsDevice`] wraps a [`NativeDevice`](native::NativeDevice) and
//! owns the descriptor pools. Buffers and textures lease themselves and
//! their device for every operation, so disposal from another owner can
//! never tear a resource down mid-copy. CPU copies take the direct mapping
//! path on cache-coherent unified memory and a staging buffer plus a
//! blocking command list everywhere else.

pub mod buffer;
mod copy;
pub mod descriptors;
pub mod device;
pub mod error;
pub mod format;
pub mod native;
pub mod reference_tracking;
pub mod resource;
pub mod state;
pub mod texture;
pub mod transfer_buffer;
pub mod transfer_texture;

pub use buffer::Buffer;
pub use descriptors::{DescriptorAllocator, DescriptorHeapKind, DescriptorSlot};
pub use device::GraphicsDevice;
pub use error::{GpuError, Result};
pub use format::{Bgra8, Texel, TexelFormat};
pub use native::{DeviceLimits, Footprint, Region, SoftwareDevice, SoftwareDeviceConfig};
pub use reference_tracking::{Lease, ReferenceTracker};
pub use resource::ResourceKind;
pub use state::{CommandListType, ResourceState};
pub use texture::{Texture, Texture1D, Texture2D, Texture3D};
pub use transfer_buffer::TransferBuffer;
pub use transfer_texture::{
    TransferTexture, TransferTexture1D, TransferTexture2D, TransferTexture3D,
};
