//! Typed 1D, 2D and 3D textures.

use std::fmt;
use std::marker::PhantomData;

use tracing::trace;

use crate::copy;
use crate::descriptors::DescriptorSlot;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::format::{texel_size_matches, Texel};
use crate::native::{
    Command, DeviceLimits, NativeHandle, Region, ResourceDesc, ResourceDimension,
    TextureCopyLocation,
};
use crate::resource::{ResourceCore, ResourceKind};
use crate::transfer_texture::TransferTexture;

mod sealed {
    pub trait Sealed {}
}

/// Marker for the number of texture dimensions.
pub trait Dimensionality: sealed::Sealed + 'static {
    const DIMENSION: ResourceDimension;
    const NAME: &'static str;
    const TRANSFER_NAME: &'static str;

    fn max_extent(limits: &DeviceLimits) -> u32;
}

#[derive(Debug)]
pub enum D1 {}
#[derive(Debug)]
pub enum D2 {}
#[derive(Debug)]
pub enum D3 {}

impl sealed::Sealed for D1 {}
impl sealed::Sealed for D2 {}
impl sealed::Sealed for D3 {}

impl Dimensionality for D1 {
    const DIMENSION: ResourceDimension = ResourceDimension::Texture1D;
    const NAME: &'static str = "Texture1D";
    const TRANSFER_NAME: &'static str = "TransferTexture1D";

    fn max_extent(limits: &DeviceLimits) -> u32 {
        limits.max_texture_1d_width
    }
}

impl Dimensionality for D2 {
    const DIMENSION: ResourceDimension = ResourceDimension::Texture2D;
    const NAME: &'static str = "Texture2D";
    const TRANSFER_NAME: &'static str = "TransferTexture2D";

    fn max_extent(limits: &DeviceLimits) -> u32 {
        limits.max_texture_2d_dimension
    }
}

impl Dimensionality for D3 {
    const DIMENSION: ResourceDimension = ResourceDimension::Texture3D;
    const NAME: &'static str = "Texture3D";
    const TRANSFER_NAME: &'static str = "TransferTexture3D";

    fn max_extent(limits: &DeviceLimits) -> u32 {
        limits.max_texture_3d_dimension
    }
}

/// Check every axis against the device maximum for `D`.
pub(crate) fn validate_extent<D: Dimensionality>(
    device: &GraphicsDevice,
    width: u32,
    height: u32,
    depth: u32,
) -> Result<()> {
    let max = D::max_extent(&device.limits());
    for (name, value) in [("width", width), ("height", height), ("depth", depth)] {
        if value == 0 || value > max {
            return Err(GpuError::out_of_range(
                name,
                format!("{value} is outside 1..={max} for {}", D::NAME),
            ));
        }
    }
    Ok(())
}

pub(crate) fn validate_texel<T: Texel>(kind: ResourceKind) -> Result<()> {
    if texel_size_matches::<T>() {
        Ok(())
    } else {
        Err(GpuError::UnsupportedTextureType {
            format: T::FORMAT,
            kind,
        })
    }
}

pub type Texture1D<T> = Texture<T, D1>;
pub type Texture2D<T> = Texture<T, D2>;
pub type Texture3D<T> = Texture<T, D3>;

/// A texture of `T` texels in device memory.
pub struct Texture<T: Texel, D: Dimensionality> {
    core: ResourceCore,
    width: u32,
    height: u32,
    depth: u32,
    _marker: PhantomData<fn() -> (T, D)>,
}

impl<T: Texel> Texture<T, D1> {
    pub fn new(device: &GraphicsDevice, kind: ResourceKind, width: u32) -> Result<Self> {
        Self::create(device, kind, width, 1, 1)
    }
}

impl<T: Texel> Texture<T, D2> {
    pub fn new(
        device: &GraphicsDevice,
        kind: ResourceKind,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Self::create(device, kind, width, height, 1)
    }
}

impl<T: Texel> Texture<T, D3> {
    pub fn new(
        device: &GraphicsDevice,
        kind: ResourceKind,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<Self> {
        Self::create(device, kind, width, height, depth)
    }
}

impl<T: Texel, D: Dimensionality> Texture<T, D> {
    fn create(
        device: &GraphicsDevice,
        kind: ResourceKind,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<Self> {
        let _lease = device.lease()?;
        if !matches!(kind, ResourceKind::ReadOnly | ResourceKind::ReadWrite) {
            return Err(GpuError::out_of_range(
                "kind",
                format!("textures cannot be {kind:?}"),
            ));
        }
        validate_extent::<D>(device, width, height, depth)?;
        validate_texel::<T>(kind)?;
        if !device.native().supports_format(T::FORMAT, kind) {
            return Err(GpuError::UnsupportedTextureType {
                format: T::FORMAT,
                kind,
            });
        }

        let bytes = u64::from(width)
            * u64::from(height)
            * u64::from(depth)
            * u64::from(T::FORMAT.bytes_per_texel());
        let desc = ResourceDesc::texture(
            D::DIMENSION,
            T::FORMAT,
            width,
            height,
            depth,
            kind.initial_state(),
        );
        let core = ResourceCore::new(device, D::NAME, kind, desc, bytes)?;
        Ok(Self {
            core,
            width,
            height,
            depth,
            _marker: PhantomData,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// The whole texture as a copy region.
    pub fn full_region(&self) -> Region {
        Region::full(self.width, self.height, self.depth)
    }

    pub fn kind(&self) -> ResourceKind {
        self.core.kind()
    }

    pub fn device(&self) -> &GraphicsDevice {
        self.core.device()
    }

    pub fn descriptor_slots(&self) -> &[DescriptorSlot] {
        self.core.descriptors()
    }

    pub fn native_handle(&self) -> NativeHandle {
        self.core.handle()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    fn check_region(&self, name: &'static str, region: &Region) -> Result<()> {
        if region.is_empty() || !region.fits_within(self.width, self.height, self.depth) {
            return Err(GpuError::out_of_range(
                name,
                format!(
                    "{region:?} is empty or outside {}x{}x{}",
                    self.width, self.height, self.depth
                ),
            ));
        }
        Ok(())
    }

    fn check_capacity(name: &'static str, available: usize, region: &Region) -> Result<usize> {
        let needed = region.texel_count() as usize;
        if available < needed {
            return Err(GpuError::out_of_range(
                name,
                format!("{available} texels supplied, region needs {needed}"),
            ));
        }
        Ok(needed)
    }

    pub fn copy_from(&self, data: &[T]) -> Result<()> {
        self.copy_from_region(data, self.full_region())
    }

    /// Write tightly packed texels into `region`.
    pub fn copy_from_region(&self, data: &[T], region: Region) -> Result<()> {
        let _lease = self.core.lease()?;
        self.check_region("region", &region)?;
        let count = Self::check_capacity("data", data.len(), &region)?;
        let bytes: &[u8] = bytemuck::cast_slice(&data[..count]);
        let device = self.device();
        let native = device.native();

        if device.is_cache_coherent_uma() {
            let row_pitch = u64::from(region.width) * u64::from(T::FORMAT.bytes_per_texel());
            let slice_pitch = row_pitch * u64::from(region.height);
            native.write_subresource(self.core.handle(), &region, bytes, row_pitch, slice_pitch)?;
        } else {
            let footprint = native.copyable_footprint(self.core.desc(), &region)?;
            let staging = copy::staging(device, ResourceKind::Upload, footprint.total_bytes)?;
            copy::with_mapped(&staging, |mapped| copy::write_rows(mapped, bytes, &footprint))?;
            copy::submit(
                &self.core,
                &staging,
                Command::CopyTextureRegion {
                    dst: TextureCopyLocation::Subresource(self.core.handle()),
                    dst_x: region.x,
                    dst_y: region.y,
                    dst_z: region.z,
                    src: TextureCopyLocation::Placed {
                        resource: staging.handle(),
                        offset: 0,
                        footprint,
                    },
                    src_region: Region::full(region.width, region.height, region.depth),
                },
            )?;
        }
        trace!(handle = ?self.core.handle(), ?region, "texture written");
        Ok(())
    }

    pub fn copy_to(&self, dst: &mut [T]) -> Result<()> {
        self.copy_to_region(dst, self.full_region())
    }

    /// Read `region` into tightly packed texels.
    pub fn copy_to_region(&self, dst: &mut [T], region: Region) -> Result<()> {
        let _lease = self.core.lease()?;
        self.check_region("region", &region)?;
        let count = Self::check_capacity("dst", dst.len(), &region)?;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut dst[..count]);
        let device = self.device();
        let native = device.native();

        if device.is_cache_coherent_uma() {
            let row_pitch = u64::from(region.width) * u64::from(T::FORMAT.bytes_per_texel());
            let slice_pitch = row_pitch * u64::from(region.height);
            native.read_subresource(self.core.handle(), &region, bytes, row_pitch, slice_pitch)?;
        } else {
            let footprint = native.copyable_footprint(self.core.desc(), &region)?;
            let staging = copy::staging(device, ResourceKind::ReadBack, footprint.total_bytes)?;
            copy::submit(
                &staging,
                &self.core,
                Command::CopyTextureRegion {
                    dst: TextureCopyLocation::Placed {
                        resource: staging.handle(),
                        offset: 0,
                        footprint,
                    },
                    dst_x: 0,
                    dst_y: 0,
                    dst_z: 0,
                    src: TextureCopyLocation::Subresource(self.core.handle()),
                    src_region: region,
                },
            )?;
            copy::with_mapped(&staging, |mapped| copy::read_rows(mapped, bytes, &footprint))?;
        }
        trace!(handle = ?self.core.handle(), ?region, "texture read");
        Ok(())
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut data = vec![T::zeroed(); self.full_region().texel_count() as usize];
        self.copy_to(&mut data)?;
        Ok(data)
    }

    /// Copy `src_region` of this texture into `dst` at `dst_origin`.
    pub fn copy_to_texture(
        &self,
        dst: &Texture<T, D>,
        src_region: Region,
        dst_origin: [u32; 3],
    ) -> Result<()> {
        let _src = self.core.lease()?;
        let _dst = dst.core.lease()?;
        self.device().ensure_same(dst.device())?;
        if self.core.handle() == dst.core.handle() {
            return Err(GpuError::out_of_range(
                "dst",
                "source and destination are the same texture",
            ));
        }
        self.check_region("src_region", &src_region)?;
        let [x, y, z] = dst_origin;
        let dst_region = Region::new(
            x,
            y,
            z,
            src_region.width,
            src_region.height,
            src_region.depth,
        );
        dst.check_region("dst_origin", &dst_region)?;

        copy::submit(
            &dst.core,
            &self.core,
            Command::CopyTextureRegion {
                dst: TextureCopyLocation::Subresource(dst.core.handle()),
                dst_x: x,
                dst_y: y,
                dst_z: z,
                src: TextureCopyLocation::Subresource(self.core.handle()),
                src_region,
            },
        )
    }

    /// Fill `region` from the start of an upload texture.
    pub fn copy_from_transfer(&self, src: &TransferTexture<T, D>, region: Region) -> Result<()> {
        let _dst = self.core.lease()?;
        let _src = src.core().lease()?;
        self.device().ensure_same(src.device())?;
        if src.kind() != ResourceKind::Upload {
            return Err(GpuError::out_of_range("src", "source must be an upload texture"));
        }
        self.check_region("region", &region)?;
        if !Region::full(region.width, region.height, region.depth).fits_within(
            src.width(),
            src.height(),
            src.depth(),
        ) {
            return Err(GpuError::out_of_range(
                "region",
                "region is larger than the transfer texture",
            ));
        }

        copy::submit(
            &self.core,
            src.core(),
            Command::CopyTextureRegion {
                dst: TextureCopyLocation::Subresource(self.core.handle()),
                dst_x: region.x,
                dst_y: region.y,
                dst_z: region.z,
                src: TextureCopyLocation::Placed {
                    resource: src.core().handle(),
                    offset: 0,
                    footprint: src.footprint(),
                },
                src_region: Region::full(region.width, region.height, region.depth),
            },
        )
    }

    /// Copy `region` to the start of a read-back texture.
    pub fn copy_to_transfer(&self, dst: &TransferTexture<T, D>, region: Region) -> Result<()> {
        let _src = self.core.lease()?;
        let _dst = dst.core().lease()?;
        self.device().ensure_same(dst.device())?;
        if dst.kind() != ResourceKind::ReadBack {
            return Err(GpuError::out_of_range(
                "dst",
                "destination must be a read-back texture",
            ));
        }
        self.check_region("region", &region)?;
        if !Region::full(region.width, region.height, region.depth).fits_within(
            dst.width(),
            dst.height(),
            dst.depth(),
        ) {
            return Err(GpuError::out_of_range(
                "region",
                "region is larger than the transfer texture",
            ));
        }

        copy::submit(
            dst.core(),
            &self.core,
            Command::CopyTextureRegion {
                dst: TextureCopyLocation::Placed {
                    resource: dst.core().handle(),
                    offset: 0,
                    footprint: dst.footprint(),
                },
                dst_x: 0,
                dst_y: 0,
                dst_z: 0,
                src: TextureCopyLocation::Subresource(self.core.handle()),
                src_region: region,
            },
        )
    }
}

impl<T: Texel, D: Dimensionality> fmt::Debug for Texture<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(D::NAME)
            .field("format", &T::FORMAT)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("depth", &self.depth)
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TexelFormat;
    use crate::native::SoftwareDeviceConfig;

    #[test]
    fn extents_are_checked_per_dimension() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        assert!(Texture1D::<f32>::new(&device, ResourceKind::ReadOnly, 16_384).is_ok());
        assert!(matches!(
            Texture1D::<f32>::new(&device, ResourceKind::ReadOnly, 16_385),
            Err(GpuError::ArgumentOutOfRange { name: "width", .. })
        ));
        assert!(matches!(
            Texture3D::<f32>::new(&device, ResourceKind::ReadOnly, 4, 4, 2_049),
            Err(GpuError::ArgumentOutOfRange { name: "depth", .. })
        ));
    }

    #[test]
    fn unsupported_formats_are_rejected_per_kind() {
        let device = GraphicsDevice::software(
            SoftwareDeviceConfig::discrete()
                .without_format(TexelFormat::Rgba32Float, ResourceKind::ReadWrite),
        );
        assert!(Texture2D::<[f32; 4]>::new(&device, ResourceKind::ReadOnly, 4, 4).is_ok());
        assert_eq!(
            Texture2D::<[f32; 4]>::new(&device, ResourceKind::ReadWrite, 4, 4).unwrap_err(),
            GpuError::UnsupportedTextureType {
                format: TexelFormat::Rgba32Float,
                kind: ResourceKind::ReadWrite
            }
        );
    }

    #[test]
    fn textures_are_counted_until_torn_down() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let texture = Texture2D::<u32>::new(&device, ResourceKind::ReadWrite, 8, 8).unwrap();
        assert_eq!(device.allocated_textures(), 1);
        texture.dispose();
        assert_eq!(device.allocated_textures(), 0);
        drop(texture);
        assert_eq!(device.allocated_textures(), 0);
    }
}
