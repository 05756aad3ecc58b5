//! Upload and read-back memory laid out like a texture.

use std::fmt;
use std::marker::PhantomData;

use crate::copy;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::format::Texel;
use crate::native::{Footprint, Region, ResourceDesc};
use crate::resource::{ResourceCore, ResourceKind};
use crate::texture::{validate_extent, validate_texel, Dimensionality, D1, D2, D3};

pub type TransferTexture1D<T> = TransferTexture<T, D1>;
pub type TransferTexture2D<T> = TransferTexture<T, D2>;
pub type TransferTexture3D<T> = TransferTexture<T, D3>;

/// A CPU-visible buffer whose rows follow the device footprint for a
/// `width x height x depth` texture, so it can be copied to and from a
/// [`Texture`](crate::Texture) in one command.
pub struct TransferTexture<T: Texel, D: Dimensionality> {
    core: ResourceCore,
    width: u32,
    height: u32,
    depth: u32,
    footprint: Footprint,
    _marker: PhantomData<fn() -> (T, D)>,
}

impl<T: Texel> TransferTexture<T, D1> {
    pub fn new(device: &GraphicsDevice, kind: ResourceKind, width: u32) -> Result<Self> {
        Self::create(device, kind, width, 1, 1)
    }
}

impl<T: Texel> TransferTexture<T, D2> {
    pub fn new(
        device: &GraphicsDevice,
        kind: ResourceKind,
        width: u32,
        height: u32,
    ) -> Result<Self> {
        Self::create(device, kind, width, height, 1)
    }
}

impl<T: Texel> TransferTexture<T, D3> {
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

impl<T: Texel, D: Dimensionality> TransferTexture<T, D> {
    fn create(
        device: &GraphicsDevice,
        kind: ResourceKind,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Result<Self> {
        let _lease = device.lease()?;
        if !kind.is_transfer() {
            return Err(GpuError::out_of_range(
                "kind",
                format!("{kind:?} memory belongs in a Texture"),
            ));
        }
        validate_extent::<D>(device, width, height, depth)?;
        validate_texel::<T>(kind)?;

        let texture = ResourceDesc::texture(
            D::DIMENSION,
            T::FORMAT,
            width,
            height,
            depth,
            kind.initial_state(),
        );
        let footprint = device
            .native()
            .copyable_footprint(&texture, &Region::full(width, height, depth))?;
        let desc = ResourceDesc::buffer(kind.heap(), footprint.total_bytes, kind.initial_state());
        let core = ResourceCore::new(device, D::TRANSFER_NAME, kind, desc, footprint.total_bytes)?;
        Ok(Self {
            core,
            width,
            height,
            depth,
            footprint,
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

    pub fn kind(&self) -> ResourceKind {
        self.core.kind()
    }

    pub fn device(&self) -> &GraphicsDevice {
        self.core.device()
    }

    pub fn footprint(&self) -> Footprint {
        self.footprint
    }

    /// Bytes between the starts of consecutive rows.
    pub fn row_pitch(&self) -> u64 {
        self.footprint.row_pitch
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.core.size_in_bytes()
    }

    pub fn is_disposed(&self) -> bool {
        self.core.is_disposed()
    }

    pub fn dispose(&self) {
        self.core.dispose();
    }

    pub(crate) fn core(&self) -> &ResourceCore {
        &self.core
    }

    fn texel_count(&self) -> usize {
        Region::full(self.width, self.height, self.depth).texel_count() as usize
    }

    fn check_len(&self, name: &'static str, len: usize) -> Result<()> {
        let expected = self.texel_count();
        if len == expected {
            Ok(())
        } else {
            Err(GpuError::out_of_range(
                name,
                format!("{len} texels supplied, transfer texture holds {expected}"),
            ))
        }
    }

    /// Write a full set of tightly packed texels.
    pub fn write(&self, data: &[T]) -> Result<()> {
        let _lease = self.core.lease()?;
        self.check_len("data", data.len())?;
        let footprint = self.footprint;
        copy::with_mapped(&self.core, |mapped| {
            copy::write_rows(mapped, bytemuck::cast_slice(data), &footprint)
        })
    }

    pub fn read(&self, out: &mut [T]) -> Result<()> {
        let _lease = self.core.lease()?;
        self.check_len("out", out.len())?;
        let footprint = self.footprint;
        copy::with_mapped(&self.core, |mapped| {
            copy::read_rows(mapped, bytemuck::cast_slice_mut(out), &footprint)
        })
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut data = vec![T::zeroed(); self.texel_count()];
        self.read(&mut data)?;
        Ok(data)
    }

    /// Run `access` over the raw mapped bytes, padding included.
    pub fn with_mapped<R>(&self, access: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let _lease = self.core.lease()?;
        copy::with_mapped(&self.core, access)
    }
}

impl<T: Texel, D: Dimensionality> fmt::Debug for TransferTexture<T, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(D::TRANSFER_NAME)
            .field("format", &T::FORMAT)
            .field("footprint", &self.footprint)
            .field("core", &self.core)
            .finish()
    }
}
