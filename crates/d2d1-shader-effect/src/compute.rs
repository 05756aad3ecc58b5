//! Effects wrapping a compute shader: `ID2D1EffectImpl` +
//! `ID2D1ComputeTransform`.
//!
//! Rectangles are negotiated exactly as for pixel effects. The extra slot,
//! `CalculateThreadgroups`, covers the output rectangle with thread groups
//! of the shader's declared `numthreads` size.

use std::ffi::c_void;

use d2d1_abi::guid::IID_ID2D1ComputeTransform;
use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::*;
use d2d1_abi::{ComPtr, Guid, HResult, IntoHResult, Rect, RenderInfo};
use once_cell::sync::Lazy;
use tracing::{debug, trace, warn};

use crate::descriptor::{ComputeShader, ShaderDescriptor};
use crate::shell::{check_double_precision, lifecycle_vtbl, Effect, ShellKind};
use crate::transform::{set_render_info, transform_vtbl};

/// Six lifecycle slots followed by nine compute-transform slots.
#[repr(C)]
pub(crate) struct ComputeShaderVtable {
    lifecycle: ID2D1EffectImplVtbl,
    transform: ID2D1ComputeTransformVtbl,
}

static VTABLE: Lazy<ComputeShaderVtable> = Lazy::new(|| ComputeShaderVtable {
    lifecycle: lifecycle_vtbl::<Compute>(),
    transform: ID2D1ComputeTransformVtbl {
        base: transform_vtbl::<Compute>(),
        SetComputeInfo: set_render_info::<Compute>,
        CalculateThreadgroups: calculate_threadgroups,
    },
});

pub(crate) enum Compute {}

pub(crate) type ComputeShaderEffect = Effect<Compute>;

const _: () = assert!(
    std::mem::offset_of!(ComputeShaderEffect, transform) == std::mem::size_of::<*const c_void>()
);

impl ShellKind for Compute {
    type Info = ID2D1ComputeInfo;

    const NAME: &'static str = "compute";
    const TRANSFORM_IID: Guid = IID_ID2D1ComputeTransform;

    fn vtables() -> (*const ID2D1EffectImplVtbl, *const c_void) {
        let vtable = &*VTABLE;
        (
            &vtable.lifecycle as *const ID2D1EffectImplVtbl,
            &vtable.transform as *const ID2D1ComputeTransformVtbl as *const c_void,
        )
    }

    fn check_support(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        if !context.supports_compute_shaders()? {
            debug!("device lacks compute shader support");
            return Err(D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES);
        }
        check_double_precision(context, descriptor)
    }

    fn load_shader(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        context.load_compute_shader(&descriptor.id, descriptor.bytecode)
    }

    fn bind_shader(
        info: &ComPtr<ID2D1ComputeInfo>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        info.set_compute_shader(&descriptor.id)
    }

    fn render_info(info: &ComPtr<ID2D1ComputeInfo>) -> &dyn RenderInfo {
        info
    }

    fn push_constant_buffer(info: &ComPtr<ID2D1ComputeInfo>, data: &[u8]) -> Result<(), HResult> {
        info.set_compute_shader_constant_buffer(data)
    }

    fn set_resource_texture(
        info: &ComPtr<ID2D1ComputeInfo>,
        index: u32,
        texture: &ComPtr<ID2D1ResourceTexture>,
    ) -> Result<(), HResult> {
        info.set_resource_texture(index, texture)
    }
}

/// Thread groups needed to cover `output` with groups of `group` threads.
///
/// An empty rectangle needs no groups. The infinite rectangle, a group
/// size with an empty axis, and counts that overflow `u32` are rejected.
pub fn thread_group_count(output: &Rect, group: [u32; 3]) -> Result<[u32; 3], HResult> {
    if output.is_infinite() || group[0] == 0 || group[1] == 0 {
        return Err(E_INVALIDARG);
    }
    if output.is_empty() {
        return Ok([0, 0, 1]);
    }
    // Non-empty, so both extents are positive.
    let x = (output.width() as u64).div_ceil(u64::from(group[0]));
    let y = (output.height() as u64).div_ceil(u64::from(group[1]));
    let x = u32::try_from(x).map_err(|_| E_INVALIDARG)?;
    let y = u32::try_from(y).map_err(|_| E_INVALIDARG)?;
    Ok([x, y, 1])
}

impl ComputeShaderEffect {
    fn calculate_threadgroups(&self, output: &Rect) -> Result<[u32; 3], HResult> {
        let groups = thread_group_count(output, self.descriptor.thread_group_size).inspect_err(|_| {
            warn!(?output, group = ?self.descriptor.thread_group_size, "cannot dispatch over rect");
        })?;
        trace!(?output, ?groups, "thread groups");
        Ok(groups)
    }
}

unsafe extern "system" fn calculate_threadgroups(
    this: *mut c_void,
    output_rect: *const Rect,
    dimension_x: *mut u32,
    dimension_y: *mut u32,
    dimension_z: *mut u32,
) -> HResult {
    let effect = unsafe { ComputeShaderEffect::from_transform(this) };
    let result = (|| {
        let output = unsafe { output_rect.as_ref() }.ok_or(E_POINTER)?;
        if dimension_x.is_null() || dimension_y.is_null() || dimension_z.is_null() {
            return Err(E_POINTER);
        }
        let [x, y, z] = effect.calculate_threadgroups(output)?;
        unsafe {
            *dimension_x = x;
            *dimension_y = y;
            *dimension_z = z;
        }
        Ok(())
    })();
    result.into_hresult()
}

/// Effect factory for the compute shader `S`. See
/// [`create_pixel_effect`](crate::create_pixel_effect).
///
/// # Safety
///
/// `effect_impl` must be null or valid for a pointer-sized write.
pub unsafe extern "system" fn create_compute_effect<S: ComputeShader>(
    effect_impl: *mut *mut c_void,
) -> HResult {
    ComputeShaderEffect::create(S::descriptor(), effect_impl)
}
