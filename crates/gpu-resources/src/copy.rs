//! Command-list recording and the CPU-side packing used by every copy.
//!
//! All submissions are synchronous: [`submit`] returns once the device has
//! finished the list.

use bytemuck::Pod;
use tracing::trace;

use crate::device::GraphicsDevice;
use crate::error::{GpuError, Result};
use crate::native::{Command, CommandList, Footprint, ResourceDesc};
use crate::resource::{ResourceCore, ResourceKind};
use crate::state::{CommandListType, ResourceState};

/// Record `command` between `dst` and `src` and execute it.
///
/// Copy lists rely on implicit promotion from `Common`. Compute lists move
/// each non-transfer side into its copy state first and restore the resting
/// state afterwards.
pub(crate) fn submit(dst: &ResourceCore, src: &ResourceCore, command: Command) -> Result<()> {
    let kind = dst.list_type().combine(src.list_type());
    let sides = [
        (dst, ResourceState::CopyDest),
        (src, ResourceState::CopySource),
    ];

    let mut list = CommandList::new(kind);
    if kind == CommandListType::Compute {
        for (core, target) in sides {
            if !core.kind().is_transfer() {
                list.barrier(core.handle(), core.state(), target);
            }
        }
    }
    list.push(command);
    if kind == CommandListType::Compute {
        for (core, target) in sides.into_iter().rev() {
            if !core.kind().is_transfer() {
                list.barrier(core.handle(), target, core.state());
            }
        }
    }

    trace!(?kind, commands = list.commands().len(), "submitting copy");
    dst.device().native().execute(&list)
}

/// A transfer allocation of exactly `bytes`, dropped after the copy.
pub(crate) fn staging(
    device: &GraphicsDevice,
    kind: ResourceKind,
    bytes: u64,
) -> Result<ResourceCore> {
    debug_assert!(kind.is_transfer());
    let desc = ResourceDesc::buffer(kind.heap(), bytes, kind.initial_state());
    ResourceCore::new(device, "staging buffer", kind, desc, bytes)
}

/// Map a CPU-visible resource for the duration of `access`.
pub(crate) fn with_mapped<R>(
    core: &ResourceCore,
    access: impl FnOnce(&mut [u8]) -> R,
) -> Result<R> {
    let mut access = Some(access);
    let mut result = None;
    core.device()
        .native()
        .map(core.handle(), &mut |bytes: &mut [u8]| {
            if let Some(access) = access.take() {
                result = Some(access(bytes));
            }
        })?;
    result.ok_or_else(|| GpuError::native("Map", "mapping callback was not invoked"))
}

/// Write `src` into `dst`, one element every `stride` bytes.
pub(crate) fn write_elements<T: Pod>(dst: &mut [u8], src: &[T], stride: usize) {
    let size = std::mem::size_of::<T>();
    if stride == size {
        dst[..std::mem::size_of_val(src)].copy_from_slice(bytemuck::cast_slice(src));
        return;
    }
    for (chunk, element) in dst.chunks_mut(stride).zip(src) {
        chunk[..size].copy_from_slice(bytemuck::bytes_of(element));
    }
}

/// Read elements spaced `stride` bytes apart from `src` into `dst`.
pub(crate) fn read_elements<T: Pod>(src: &[u8], dst: &mut [T], stride: usize) {
    let size = std::mem::size_of::<T>();
    if stride == size {
        let len = std::mem::size_of_val(dst);
        bytemuck::cast_slice_mut::<T, u8>(dst).copy_from_slice(&src[..len]);
        return;
    }
    for (element, chunk) in dst.iter_mut().zip(src.chunks(stride)) {
        bytemuck::bytes_of_mut(element).copy_from_slice(&chunk[..size]);
    }
}

/// Copy tightly packed texels into buffer memory laid out as `footprint`.
pub(crate) fn write_rows(dst: &mut [u8], src: &[u8], footprint: &Footprint) {
    let row = footprint.row_size() as usize;
    for ((y, z), texels) in row_coordinates(footprint).zip(src.chunks_exact(row)) {
        let at = footprint.row_offset(y, z) as usize;
        dst[at..at + row].copy_from_slice(texels);
    }
}

/// Gather rows laid out as `footprint` into tightly packed texels.
pub(crate) fn read_rows(src: &[u8], dst: &mut [u8], footprint: &Footprint) {
    let row = footprint.row_size() as usize;
    for ((y, z), texels) in row_coordinates(footprint).zip(dst.chunks_exact_mut(row)) {
        let at = footprint.row_offset(y, z) as usize;
        texels.copy_from_slice(&src[at..at + row]);
    }
}

/// `(row, slice)` of every row in `footprint`, slice-major.
fn row_coordinates(footprint: &Footprint) -> impl Iterator<Item = (u32, u32)> {
    let height = footprint.height;
    (0..footprint.depth).flat_map(move |z| (0..height).map(move |y| (y, z)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::TexelFormat;

    #[test]
    fn strided_elements_leave_padding_untouched() {
        let mut bytes = [0xAAu8; 32];
        write_elements(&mut bytes, &[1u32, 2], 16);
        assert_eq!(&bytes[..4], &1u32.to_ne_bytes());
        assert_eq!(&bytes[4..16], &[0xAA; 12]);
        assert_eq!(&bytes[16..20], &2u32.to_ne_bytes());

        let mut back = [0u32; 2];
        read_elements(&bytes, &mut back, 16);
        assert_eq!(back, [1, 2]);
    }

    #[test]
    fn rows_follow_the_footprint_pitch() {
        let footprint = Footprint::aligned(TexelFormat::R8Unorm, 3, 2, 1);
        let mut linear = vec![0u8; footprint.total_bytes as usize];
        write_rows(&mut linear, &[1, 2, 3, 4, 5, 6], &footprint);
        assert_eq!(&linear[..3], &[1, 2, 3]);
        assert_eq!(&linear[256..259], &[4, 5, 6]);

        let mut packed = [0u8; 6];
        read_rows(&linear, &mut packed, &footprint);
        assert_eq!(packed, [1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn volume_rows_start_each_slice_on_the_slice_pitch() {
        let footprint = Footprint::aligned(TexelFormat::R8Unorm, 2, 2, 2);
        let mut linear = vec![0u8; footprint.total_bytes as usize];
        write_rows(&mut linear, &[1, 2, 3, 4, 5, 6, 7, 8], &footprint);
        assert_eq!(&linear[512..514], &[5, 6]);
        assert_eq!(&linear[768..770], &[7, 8]);

        let mut packed = [0u8; 8];
        read_rows(&linear, &mut packed, &footprint);
        assert_eq!(packed, [1, 2, 3, 4, 5, 6, 7, 8]);
    }
}
