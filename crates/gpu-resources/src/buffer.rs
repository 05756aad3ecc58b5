//! Typed device buffers.

use std::fmt;
use std::marker::PhantomData;

use bytemuck::Pod;
use tracing::trace;

use crate::copy;
use crate::descriptors::DescriptorSlot;
use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::native::{Command, NativeHandle, ResourceDesc};
use crate::resource::{ResourceCore, ResourceKind};
use crate::transfer_buffer::TransferBuffer;

/// Constant buffer elements are padded to this many bytes.
pub const CONSTANT_BUFFER_ELEMENT_ALIGNMENT: usize = 16;

/// Distance in bytes between consecutive elements of a `kind` buffer.
pub fn element_stride<T>(kind: ResourceKind) -> usize {
    let size = std::mem::size_of::<T>();
    match kind {
        ResourceKind::Constant => size.next_multiple_of(CONSTANT_BUFFER_ELEMENT_ALIGNMENT),
        _ => size,
    }
}

pub(crate) fn check_range(
    name: &'static str,
    offset: usize,
    count: usize,
    length: usize,
) -> Result<()> {
    match offset.checked_add(count) {
        Some(end) if end <= length => Ok(()),
        _ => Err(GpuError::out_of_range(
            name,
            format!("{count} elements at offset {offset} exceed length {length}"),
        )),
    }
}

/// Byte size of `length` elements, checked against the device limit.
pub(crate) fn checked_buffer_size(
    device: &GraphicsDevice,
    length: usize,
    stride: usize,
) -> Result<u64> {
    if stride == 0 {
        return Err(GpuError::out_of_range("T", "zero-sized element type"));
    }
    if length == 0 {
        return Err(GpuError::out_of_range("length", "must be at least 1"));
    }
    let max = device.limits().max_buffer_bytes;
    length
        .checked_mul(stride)
        .map(|bytes| bytes as u64)
        .filter(|&bytes| bytes <= max)
        .ok_or_else(|| {
            GpuError::out_of_range(
                "length",
                format!("{length} elements of {stride} bytes exceed {max} bytes"),
            )
        })
}

/// A buffer of `T` in device memory, usable as a constant, read-only or
/// read-write shader resource.
pub struct Buffer<T: Pod> {
    core: ResourceCore,
    length: usize,
    stride: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Pod> Buffer<T> {
    pub fn new(device: &GraphicsDevice, length: usize, kind: ResourceKind) -> Result<Self> {
        let _lease = device.lease()?;
        if kind.is_transfer() {
            return Err(GpuError::out_of_range(
                "kind",
                format!("{kind:?} memory belongs in a TransferBuffer"),
            ));
        }
        let stride = element_stride::<T>(kind);
        let bytes = checked_buffer_size(device, length, stride)?;
        let desc = ResourceDesc::buffer(kind.heap(), bytes, kind.initial_state());
        let core = ResourceCore::new(device, "Buffer", kind, desc, bytes)?;
        Ok(Self {
            core,
            length,
            stride,
            _marker: PhantomData,
        })
    }

    /// Allocate a buffer sized to `data` and upload it.
    pub fn from_slice(device: &GraphicsDevice, data: &[T], kind: ResourceKind) -> Result<Self> {
        let buffer = Self::new(device, data.len(), kind)?;
        buffer.copy_from(data, 0)?;
        Ok(buffer)
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

    /// Bytes between consecutive elements in device memory.
    pub fn element_stride(&self) -> usize {
        self.stride
    }

    pub fn size_in_bytes(&self) -> u64 {
        self.core.size_in_bytes()
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

    /// Write `src` into the buffer starting at element `dst_offset`.
    pub fn copy_from(&self, src: &[T], dst_offset: usize) -> Result<()> {
        let _lease = self.core.lease()?;
        check_range("dst_offset", dst_offset, src.len(), self.length)?;
        if src.is_empty() {
            return Ok(());
        }

        let offset = dst_offset * self.stride;
        let bytes = (src.len() * self.stride) as u64;
        if self.device().is_cache_coherent_uma() {
            copy::with_mapped(&self.core, |mapped| {
                copy::write_elements(&mut mapped[offset..], src, self.stride)
            })?;
        } else {
            let staging = copy::staging(self.device(), ResourceKind::Upload, bytes)?;
            copy::with_mapped(&staging, |mapped| {
                copy::write_elements(mapped, src, self.stride)
            })?;
            copy::submit(
                &self.core,
                &staging,
                Command::CopyBufferRegion {
                    dst: self.core.handle(),
                    dst_offset: offset as u64,
                    src: staging.handle(),
                    src_offset: 0,
                    bytes,
                },
            )?;
        }
        trace!(handle = ?self.core.handle(), elements = src.len(), dst_offset, "buffer written");
        Ok(())
    }

    /// Read `dst.len()` elements starting at element `src_offset`.
    pub fn copy_to(&self, dst: &mut [T], src_offset: usize) -> Result<()> {
        let _lease = self.core.lease()?;
        check_range("src_offset", src_offset, dst.len(), self.length)?;
        if dst.is_empty() {
            return Ok(());
        }

        let count = dst.len();
        let offset = src_offset * self.stride;
        let bytes = (count * self.stride) as u64;
        if self.device().is_cache_coherent_uma() {
            copy::with_mapped(&self.core, |mapped| {
                copy::read_elements(&mapped[offset..], dst, self.stride)
            })?;
        } else {
            let staging = copy::staging(self.device(), ResourceKind::ReadBack, bytes)?;
            copy::submit(
                &staging,
                &self.core,
                Command::CopyBufferRegion {
                    dst: staging.handle(),
                    dst_offset: 0,
                    src: self.core.handle(),
                    src_offset: offset as u64,
                    bytes,
                },
            )?;
            copy::with_mapped(&staging, |mapped| {
                copy::read_elements(mapped, dst, self.stride)
            })?;
        }
        trace!(handle = ?self.core.handle(), elements = count, src_offset, "buffer read");
        Ok(())
    }

    pub fn to_vec(&self) -> Result<Vec<T>> {
        let mut data = vec![T::zeroed(); self.length];
        self.copy_to(&mut data, 0)?;
        Ok(data)
    }

    /// Copy `count` elements into another buffer on the same device.
    pub fn copy_to_buffer(
        &self,
        dst: &Buffer<T>,
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> Result<()> {
        let _src = self.core.lease()?;
        let _dst = dst.core.lease()?;
        self.device().ensure_same(dst.device())?;
        if self.core.handle() == dst.core.handle() {
            return Err(GpuError::out_of_range(
                "dst",
                "source and destination are the same buffer",
            ));
        }
        check_range("src_offset", src_offset, count, self.length)?;
        check_range("dst_offset", dst_offset, count, dst.length)?;
        if count == 0 {
            return Ok(());
        }

        if self.stride == dst.stride {
            copy::submit(
                &dst.core,
                &self.core,
                Command::CopyBufferRegion {
                    dst: dst.core.handle(),
                    dst_offset: (dst_offset * self.stride) as u64,
                    src: self.core.handle(),
                    src_offset: (src_offset * self.stride) as u64,
                    bytes: (count * self.stride) as u64,
                },
            )
        } else {
            // Element pitches differ (constant vs structured), repack on the CPU.
            let mut staged = vec![T::zeroed(); count];
            self.copy_to(&mut staged, src_offset)?;
            dst.copy_from(&staged, dst_offset)
        }
    }

    /// Copy `count` elements out of an upload buffer.
    pub fn copy_from_transfer(
        &self,
        src: &TransferBuffer<T>,
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> Result<()> {
        let _dst = self.core.lease()?;
        let _src = src.core().lease()?;
        self.device().ensure_same(src.device())?;
        if src.kind() != ResourceKind::Upload {
            return Err(GpuError::out_of_range("src", "source must be an upload buffer"));
        }
        check_range("src_offset", src_offset, count, src.length())?;
        check_range("dst_offset", dst_offset, count, self.length)?;
        if count == 0 {
            return Ok(());
        }

        let size = std::mem::size_of::<T>();
        if self.stride == size {
            copy::submit(
                &self.core,
                src.core(),
                Command::CopyBufferRegion {
                    dst: self.core.handle(),
                    dst_offset: (dst_offset * size) as u64,
                    src: src.core().handle(),
                    src_offset: (src_offset * size) as u64,
                    bytes: (count * size) as u64,
                },
            )
        } else {
            let mut staged = vec![T::zeroed(); count];
            src.read(&mut staged, src_offset)?;
            self.copy_from(&staged, dst_offset)
        }
    }

    /// Copy `count` elements into a read-back buffer.
    pub fn copy_to_transfer(
        &self,
        dst: &TransferBuffer<T>,
        src_offset: usize,
        dst_offset: usize,
        count: usize,
    ) -> Result<()> {
        let _src = self.core.lease()?;
        let _dst = dst.core().lease()?;
        self.device().ensure_same(dst.device())?;
        if dst.kind() != ResourceKind::ReadBack {
            return Err(GpuError::out_of_range("dst", "destination must be a read-back buffer"));
        }
        check_range("src_offset", src_offset, count, self.length)?;
        check_range("dst_offset", dst_offset, count, dst.length())?;
        if count == 0 {
            return Ok(());
        }

        let size = std::mem::size_of::<T>();
        if self.stride == size {
            copy::submit(
                dst.core(),
                &self.core,
                Command::CopyBufferRegion {
                    dst: dst.core().handle(),
                    dst_offset: (dst_offset * size) as u64,
                    src: self.core.handle(),
                    src_offset: (src_offset * size) as u64,
                    bytes: (count * size) as u64,
                },
            )
        } else {
            let mut staged = vec![T::zeroed(); count];
            self.copy_to(&mut staged, src_offset)?;
            dst.write(&staged, dst_offset)
        }
    }
}

impl<T: Pod> fmt::Debug for Buffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Buffer")
            .field("element", &std::any::type_name::<T>())
            .field("length", &self.length)
            .field("stride", &self.stride)
            .field("core", &self.core)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::SoftwareDeviceConfig;

    #[test]
    fn constant_elements_are_padded() {
        assert_eq!(element_stride::<f32>(ResourceKind::Constant), 16);
        assert_eq!(element_stride::<[f32; 5]>(ResourceKind::Constant), 32);
        assert_eq!(element_stride::<f32>(ResourceKind::ReadOnly), 4);
    }

    #[test]
    fn zero_length_is_out_of_range() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let err = Buffer::<u32>::new(&device, 0, ResourceKind::ReadWrite).unwrap_err();
        assert!(matches!(err, GpuError::ArgumentOutOfRange { name: "length", .. }));
    }

    #[test]
    fn transfer_kinds_are_rejected() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let err = Buffer::<u32>::new(&device, 4, ResourceKind::Upload).unwrap_err();
        assert!(matches!(err, GpuError::ArgumentOutOfRange { name: "kind", .. }));
    }

    #[test]
    fn read_write_buffers_rent_two_descriptors() {
        let device = GraphicsDevice::software(SoftwareDeviceConfig::discrete());
        let buffer = Buffer::<u32>::new(&device, 4, ResourceKind::ReadWrite).unwrap();
        assert_eq!(buffer.descriptor_slots().len(), 2);
        let constant = Buffer::<u32>::new(&device, 4, ResourceKind::Constant).unwrap();
        assert_eq!(constant.descriptor_slots().len(), 1);
        assert_eq!(constant.size_in_bytes(), 64);
    }
}
