//! Effects wrapping a pixel shader: `ID2D1EffectImpl` + `ID2D1DrawTransform`.

use std::ffi::c_void;

use d2d1_abi::guid::IID_ID2D1DrawTransform;
use d2d1_abi::interfaces::*;
use d2d1_abi::types::to_raw;
use d2d1_abi::{ComPtr, Guid, HResult, RenderInfo};
use once_cell::sync::Lazy;

use crate::descriptor::{PixelShader, ShaderDescriptor};
use crate::shell::{check_double_precision, lifecycle_vtbl, Effect, ShellKind};
use crate::transform::{set_render_info, transform_vtbl};

/// Both interface tables of a pixel effect, back to back: six lifecycle
/// slots followed by eight draw-transform slots.
#[repr(C)]
pub(crate) struct PixelShaderVtable {
    lifecycle: ID2D1EffectImplVtbl,
    transform: ID2D1DrawTransformVtbl,
}

static VTABLE: Lazy<PixelShaderVtable> = Lazy::new(|| PixelShaderVtable {
    lifecycle: lifecycle_vtbl::<Pixel>(),
    transform: ID2D1DrawTransformVtbl {
        base: transform_vtbl::<Pixel>(),
        SetDrawInfo: set_render_info::<Pixel>,
    },
});

pub(crate) enum Pixel {}

pub(crate) type PixelShaderEffect = Effect<Pixel>;

const _: () = assert!(
    std::mem::offset_of!(PixelShaderEffect, transform) == std::mem::size_of::<*const c_void>()
);

impl ShellKind for Pixel {
    type Info = ID2D1DrawInfo;

    const NAME: &'static str = "pixel";
    const TRANSFORM_IID: Guid = IID_ID2D1DrawTransform;

    fn vtables() -> (*const ID2D1EffectImplVtbl, *const c_void) {
        let vtable = &*VTABLE;
        (
            &vtable.lifecycle as *const ID2D1EffectImplVtbl,
            &vtable.transform as *const ID2D1DrawTransformVtbl as *const c_void,
        )
    }

    fn check_support(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        check_double_precision(context, descriptor)
    }

    fn load_shader(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        context.load_pixel_shader(&descriptor.id, descriptor.bytecode)
    }

    fn bind_shader(
        info: &ComPtr<ID2D1DrawInfo>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult> {
        info.set_pixel_shader(&descriptor.id, to_raw(descriptor.pixel_options))
    }

    fn render_info(info: &ComPtr<ID2D1DrawInfo>) -> &dyn RenderInfo {
        info
    }

    fn push_constant_buffer(info: &ComPtr<ID2D1DrawInfo>, data: &[u8]) -> Result<(), HResult> {
        info.set_pixel_shader_constant_buffer(data)
    }

    fn set_resource_texture(
        info: &ComPtr<ID2D1DrawInfo>,
        index: u32,
        texture: &ComPtr<ID2D1ResourceTexture>,
    ) -> Result<(), HResult> {
        info.set_resource_texture(index, texture)
    }
}

/// Effect factory for `S`, in the shape `RegisterEffectFromString` expects.
///
/// Writes a new effect with one reference to `effect_impl`, or null and
/// `E_OUTOFMEMORY` if it cannot be allocated.
///
/// # Safety
///
/// `effect_impl` must be null or valid for a pointer-sized write.
pub unsafe extern "system" fn create_pixel_effect<S: PixelShader>(
    effect_impl: *mut *mut c_void,
) -> HResult {
    PixelShaderEffect::create(S::descriptor(), effect_impl)
}
