//! CPU-visible upload and read-back buffers.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;

use crate::buffer::{check_range, checked_buffer_size};
use crate::copy;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::native::ResourceDesc;
use crate::resource::{ResourceCore, ResourceKind};

/// Tightly packed `T` elements in upload or read-back memory.
///
/// Access is always a direct map; the device copies between these and
/// [`Buffer`](crate::Buffer)s on its own queues.
pub struct TransferBuffer<T: Pod> {
    core: ResourceCore,
    length: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod> TransferBuffer<T> {
    pub fn new(device: &GraphicsDevice, length: usize, kind: ResourceKind) -> Result<Self> {
        let _lease = device.lease()?;
        if !kind.is_transfer() {
            return Err(GpuError::out_of_range(
                "kind",
                format!("{kind:?} memory belongs in a Buffer"),
            ));
        }
        let bytes = checked_buffer_size(device, length, std::mem::size_of::<T>())?;
        let desc = ResourceDesc::buffer(kind.heap(), bytes, kind.initial_state());
        let core = ResourceCore::new(device, "TransferBuffer", kind, desc, bytes)?;
        Ok(Self {
            core,
            length,
            _marker: PhantomData,
        })
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn kind(&self) -> ResourceKind {
        self.core.kind()
    }

    pub fn device(&self) -> &GraphicsDevice {
        self.core.device()
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

    pub fn write(&self, data: &[T], offset: usize) -> Result<()> {
        let _lease = self.core.lease()?;
        check_range("offset", offset, data.len(), self.length)?;
        let start = offset * std::mem::size_of::<T>();
        copy::with_mapped(&self.core, |bytes| {
            copy::write_elements(&mut bytes[start..], data, std::mem::size_of::<T>())
        })
    }

    pub fn read(&self, out: &mut [T], offset: usize) -> Result<()> {
        let _lease = self.core.lease()?;
        check_range("offset", offset, out.len(), self.length)?;
        let start = offset * std::mem::size_of::<T>();
        copy::with_mapped(&self.core, |bytes| {
            copy::read_elements(&bytes[start..], out, std::mem::size_of::<T>())
        })
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut data = vec![T::zeroed(); self.length];
        self.read(&mut data, 0)?;
        Ok(data)
    }

    /// Run `access` over the raw mapped bytes.
    pub fn with_mapped<R>(&self, access: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let _lease = self.core.lease()?;
        copy::with_mapped(&self.core, access)
    }
}

impl<T: Pod> fmt::Debug for TransferBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransferBuffer")
            .field("element", &std::any::type_name::<T>())
            .field("length", &self.length)
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::SoftwareDeviceConfig;

    #[test]
    fn writes_are_visible_through_the_map() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let upload = TransferBuffer::<u16>::new(&device, 4, ResourceKind::Upload).unwrap();
        upload.write(&[7, 8], 1).unwrap();
        assert_eq!(upload.to_vec().unwrap(), vec![0, 7, 8, 0]);
        let first = upload.with_mapped(|bytes| bytes[2]).unwrap();
        assert_eq!(first, 7u16.to_ne_bytes()[0]);
    }

    #[test]
    fn reads_past_the_end_fail() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let readback = TransferBuffer::<u32>::new(&device, 2, ResourceKind::ReadBack).unwrap();
        let mut out = [0u32; 2];
        assert!(matches!(
            readback.read(&mut out, 1),
            Err(GpuError::ArgumentOutOfRange { name: "offset", .. })
        ));
    }
}
