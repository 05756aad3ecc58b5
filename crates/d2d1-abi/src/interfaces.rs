//! `#[repr(C)]` virtual-dispatch layouts for every interface the shell
//! implements or calls.
//!
//! Slot order follows the SDK headers exactly. Slots this crate never calls
//! are declared as [`Unused`] so the offsets of later slots stay correct.

#![allow(non_snake_case)]
#![allow(non_camel_case_types)]

use std::ffi::c_void;

use crate::ffi::{
    BOOL, D2D1_INPUT_DESCRIPTION, D2D1_PROPERTY_BINDING, D2D1_RESOURCE_TEXTURE_PROPERTIES,
    PD2D1_EFFECT_FACTORY,
};
use crate::guid::*;
use crate::hresult::HResult;
use crate::rect::Rect;

/// Placeholder for a vtable slot that is never called from Rust. Same size
/// as a function pointer and nullable, so mocks can leave it empty.
pub type Unused = Option<unsafe extern "system" fn()>;

/// A COM interface: a pointer to a struct whose first field is its vtable.
///
/// # Safety
///
/// `Vtbl` must start with an [`IUnknownVtbl`] (directly or through nested
/// base vtables) and `Self` must be `#[repr(C)]` with the vtable pointer as
/// its only leading field.
pub unsafe trait Interface {
    const IID: Guid;
    type Vtbl;
}

macro_rules! com_interface {
    ($(#[$meta:meta])* $name:ident, $vtbl:ident, $iid:expr) => {
        $(#[$meta])*
        #[repr(C)]
        pub struct $name {
            pub lpVtbl: *const $vtbl,
        }

        unsafe impl Interface for $name {
            const IID: Guid = $iid;
            type Vtbl = $vtbl;
        }
    };
}

// =====================================================================
// IUnknown
// =====================================================================

#[repr(C)]
pub struct IUnknownVtbl {
    pub QueryInterface: unsafe extern "system" fn(
        this: *mut c_void,
        riid: *const Guid,
        ppv_object: *mut *mut c_void,
    ) -> HResult,
    pub AddRef: unsafe extern "system" fn(this: *mut c_void) -> u32,
    pub Release: unsafe extern "system" fn(this: *mut c_void) -> u32,
}

com_interface!(IUnknown, IUnknownVtbl, IID_IUnknown);

// =====================================================================
// Lifecycle interface (implemented by the shell)
// =====================================================================

#[repr(C)]
pub struct ID2D1EffectImplVtbl {
    pub base: IUnknownVtbl,
    pub Initialize: unsafe extern "system" fn(
        this: *mut c_void,
        effect_context: *mut c_void,
        transform_graph: *mut c_void,
    ) -> HResult,
    pub PrepareForRender: unsafe extern "system" fn(this: *mut c_void, change_type: u32) -> HResult,
    pub SetGraph: unsafe extern "system" fn(
        this: *mut c_void,
        transform_graph: *mut c_void,
    ) -> HResult,
}

com_interface!(ID2D1EffectImpl, ID2D1EffectImplVtbl, IID_ID2D1EffectImpl);

// =====================================================================
// Transform family (implemented by the shell)
// =====================================================================

#[repr(C)]
pub struct ID2D1TransformNodeVtbl {
    pub base: IUnknownVtbl,
    pub GetInputCount: unsafe extern "system" fn(this: *mut c_void) -> u32,
}

#[repr(C)]
pub struct ID2D1TransformVtbl {
    pub base: ID2D1TransformNodeVtbl,
    pub MapOutputRectToInputRects: unsafe extern "system" fn(
        this: *mut c_void,
        output_rect: *const Rect,
        input_rects: *mut Rect,
        input_rects_count: u32,
    ) -> HResult,
    pub MapInputRectsToOutputRect: unsafe extern "system" fn(
        this: *mut c_void,
        input_rects: *const Rect,
        input_opaque_sub_rects: *const Rect,
        input_rect_count: u32,
        output_rect: *mut Rect,
        output_opaque_sub_rect: *mut Rect,
    ) -> HResult,
    pub MapInvalidRect: unsafe extern "system" fn(
        this: *mut c_void,
        input_index: u32,
        invalid_input_rect: Rect,
        invalid_output_rect: *mut Rect,
    ) -> HResult,
}

#[repr(C)]
pub struct ID2D1DrawTransformVtbl {
    pub base: ID2D1TransformVtbl,
    pub SetDrawInfo: unsafe extern "system" fn(
        this: *mut c_void,
        draw_info: *mut c_void,
    ) -> HResult,
}

#[repr(C)]
pub struct ID2D1ComputeTransformVtbl {
    pub base: ID2D1TransformVtbl,
    pub SetComputeInfo:
        unsafe extern "system" fn(this: *mut c_void, compute_info: *mut c_void) -> HResult,
    pub CalculateThreadgroups: unsafe extern "system" fn(
        this: *mut c_void,
        output_rect: *const Rect,
        dimension_x: *mut u32,
        dimension_y: *mut u32,
        dimension_z: *mut u32,
    ) -> HResult,
}

com_interface!(ID2D1TransformNode, ID2D1TransformNodeVtbl, IID_ID2D1TransformNode);
com_interface!(ID2D1DrawTransform, ID2D1DrawTransformVtbl, IID_ID2D1DrawTransform);
com_interface!(ID2D1ComputeTransform, ID2D1ComputeTransformVtbl, IID_ID2D1ComputeTransform);

// =====================================================================
// Host-side interfaces (called by the shell)
// =====================================================================

#[repr(C)]
pub struct ID2D1EffectContextVtbl {
    pub base: IUnknownVtbl,
    pub GetDpi: unsafe extern "system" fn(this: *mut c_void, dpi_x: *mut f32, dpi_y: *mut f32),
    pub CreateEffect: Unused,
    pub GetMaximumSupportedFeatureLevel: unsafe extern "system" fn(
        this: *mut c_void,
        feature_levels: *const u32,
        feature_levels_count: u32,
        maximum_supported_feature_level: *mut u32,
    ) -> HResult,
    pub CreateTransformNodeFromEffect: Unused,
    pub CreateBlendTransform: Unused,
    pub CreateBorderTransform: Unused,
    pub CreateOffsetTransform: Unused,
    pub CreateBoundsAdjustmentTransform: Unused,
    pub LoadPixelShader: unsafe extern "system" fn(
        this: *mut c_void,
        shader_id: *const Guid,
        shader_buffer: *const u8,
        shader_buffer_count: u32,
    ) -> HResult,
    pub LoadVertexShader: Unused,
    pub LoadComputeShader: unsafe extern "system" fn(
        this: *mut c_void,
        resource_id: *const Guid,
        shader_buffer: *const u8,
        shader_buffer_count: u32,
    ) -> HResult,
    pub IsShaderLoaded: unsafe extern "system" fn(
        this: *mut c_void,
        shader_id: *const Guid,
    ) -> BOOL,
    pub CreateResourceTexture: unsafe extern "system" fn(
        this: *mut c_void,
        resource_id: *const Guid,
        resource_texture_properties: *const D2D1_RESOURCE_TEXTURE_PROPERTIES,
        data: *const u8,
        strides: *const u32,
        data_size: u32,
        resource_texture: *mut *mut c_void,
    ) -> HResult,
    pub FindResourceTexture: unsafe extern "system" fn(
        this: *mut c_void,
        resource_id: *const Guid,
        resource_texture: *mut *mut c_void,
    ) -> HResult,
    pub CreateVertexBuffer: Unused,
    pub FindVertexBuffer: Unused,
    pub CreateColorContext: Unused,
    pub CreateColorContextFromFilename: Unused,
    pub CreateColorContextFromWicColorContext: Unused,
    pub CheckFeatureSupport: unsafe extern "system" fn(
        this: *mut c_void,
        feature: u32,
        feature_support_data: *mut c_void,
        feature_support_data_size: u32,
    ) -> HResult,
    pub IsBufferPrecisionSupported:
        unsafe extern "system" fn(this: *mut c_void, buffer_precision: u32) -> BOOL,
}

#[repr(C)]
pub struct ID2D1TransformGraphVtbl {
    pub base: IUnknownVtbl,
    pub GetInputCount: unsafe extern "system" fn(this: *mut c_void) -> u32,
    pub SetSingleTransformNode:
        unsafe extern "system" fn(this: *mut c_void, node: *mut c_void) -> HResult,
    pub AddNode: Unused,
    pub RemoveNode: Unused,
    pub SetOutputNode: Unused,
    pub ConnectNode: Unused,
    pub ConnectToEffectInput: Unused,
    pub Clear: Unused,
    pub SetPassthroughGraph: Unused,
}

#[repr(C)]
pub struct ID2D1RenderInfoVtbl {
    pub base: IUnknownVtbl,
    pub SetInputDescription: unsafe extern "system" fn(
        this: *mut c_void,
        input_index: u32,
        input_description: D2D1_INPUT_DESCRIPTION,
    ) -> HResult,
    pub SetOutputBuffer: unsafe extern "system" fn(
        this: *mut c_void,
        buffer_precision: u32,
        channel_depth: u32,
    ) -> HResult,
    pub SetCached: unsafe extern "system" fn(this: *mut c_void, is_cached: BOOL),
    pub SetInstructionCountHint: unsafe extern "system" fn(this: *mut c_void, count: u32),
}

#[repr(C)]
pub struct ID2D1DrawInfoVtbl {
    pub base: ID2D1RenderInfoVtbl,
    pub SetPixelShaderConstantBuffer: unsafe extern "system" fn(
        this: *mut c_void,
        buffer: *const u8,
        buffer_count: u32,
    ) -> HResult,
    pub SetResourceTexture: unsafe extern "system" fn(
        this: *mut c_void,
        texture_index: u32,
        resource_texture: *mut c_void,
    ) -> HResult,
    pub SetVertexShaderConstantBuffer: Unused,
    pub SetPixelShader: unsafe extern "system" fn(
        this: *mut c_void,
        shader_id: *const Guid,
        pixel_options: u32,
    ) -> HResult,
    pub SetVertexProcessing: Unused,
}

#[repr(C)]
pub struct ID2D1ComputeInfoVtbl {
    pub base: ID2D1RenderInfoVtbl,
    pub SetComputeShaderConstantBuffer: unsafe extern "system" fn(
        this: *mut c_void,
        buffer: *const u8,
        buffer_count: u32,
    ) -> HResult,
    pub SetComputeShader:
        unsafe extern "system" fn(this: *mut c_void, shader_id: *const Guid) -> HResult,
    pub SetResourceTexture: unsafe extern "system" fn(
        this: *mut c_void,
        texture_index: u32,
        resource_texture: *mut c_void,
    ) -> HResult,
}

#[repr(C)]
pub struct ID2D1ResourceTextureVtbl {
    pub base: IUnknownVtbl,
    pub Update: Unused,
}

#[repr(C)]
pub struct ID2D1Factory1Vtbl {
    pub base: IUnknownVtbl,
    /// `ID2D1Factory` methods, `ReloadSystemMetrics` through `CreateDCRenderTarget`.
    pub factory: [Unused; 14],
    pub CreateDevice: Unused,
    pub CreateStrokeStyle1: Unused,
    pub CreatePathGeometry1: Unused,
    pub CreateDrawingStateBlock1: Unused,
    pub CreateGdiMetafile: Unused,
    pub RegisterEffectFromStream: Unused,
    pub RegisterEffectFromString: unsafe extern "system" fn(
        this: *mut c_void,
        class_id: *const Guid,
        property_xml: *const u16,
        bindings: *const D2D1_PROPERTY_BINDING,
        bindings_count: u32,
        effect_factory: PD2D1_EFFECT_FACTORY,
    ) -> HResult,
    pub UnregisterEffect: unsafe extern "system" fn(
        this: *mut c_void,
        class_id: *const Guid,
    ) -> HResult,
    pub GetRegisteredEffects: Unused,
    pub GetEffectProperties: Unused,
}

com_interface!(ID2D1EffectContext, ID2D1EffectContextVtbl, IID_ID2D1EffectContext);
com_interface!(ID2D1TransformGraph, ID2D1TransformGraphVtbl, IID_ID2D1TransformGraph);
com_interface!(ID2D1RenderInfo, ID2D1RenderInfoVtbl, IID_ID2D1RenderInfo);
com_interface!(ID2D1DrawInfo, ID2D1DrawInfoVtbl, IID_ID2D1DrawInfo);
com_interface!(ID2D1ComputeInfo, ID2D1ComputeInfoVtbl, IID_ID2D1ComputeInfo);
com_interface!(ID2D1ResourceTexture, ID2D1ResourceTextureVtbl, IID_ID2D1ResourceTexture);
com_interface!(ID2D1Factory1, ID2D1Factory1Vtbl, IID_ID2D1Factory1);

// =====================================================================
// Extension interfaces shared with the managed side of the library
// =====================================================================

/// Custom rectangle-mapping policy attached to an effect.
#[repr(C)]
pub struct ID2D1TransformMapperVtbl {
    pub base: IUnknownVtbl,
    pub MapInputsToOutput: unsafe extern "system" fn(
        this: *mut c_void,
        update_context: *mut c_void,
        input_rects: *const Rect,
        input_opaque_sub_rects: *const Rect,
        input_rect_count: u32,
        output_rect: *mut Rect,
        output_opaque_sub_rect: *mut Rect,
    ) -> HResult,
    pub MapOutputToInputs: unsafe extern "system" fn(
        this: *mut c_void,
        output_rect: *const Rect,
        input_rects: *mut Rect,
        input_rects_count: u32,
    ) -> HResult,
    pub MapInvalidOutput: unsafe extern "system" fn(
        this: *mut c_void,
        input_index: u32,
        invalid_input_rect: Rect,
        invalid_output_rect: *mut Rect,
    ) -> HResult,
}

/// Scoped handle a transform mapper may use to update the constant buffer
/// while rectangles are being negotiated.
#[repr(C)]
pub struct ID2D1DrawInfoUpdateContextVtbl {
    pub base: IUnknownVtbl,
    pub GetConstantBufferSize: unsafe extern "system" fn(
        this: *mut c_void,
        size: *mut u32,
    ) -> HResult,
    pub GetConstantBuffer:
        unsafe extern "system" fn(this: *mut c_void, buffer: *mut u8, buffer_count: u32) -> HResult,
    pub SetConstantBuffer: unsafe extern "system" fn(
        this: *mut c_void,
        buffer: *const u8,
        buffer_count: u32,
    ) -> HResult,
}

/// Public face of a resource texture manager (populated by the host app).
#[repr(C)]
pub struct ID2D1ResourceTextureManagerVtbl {
    pub base: IUnknownVtbl,
    pub Initialize: Unused,
    pub Update: Unused,
}

/// Side of a resource texture manager the shell talks to while rendering.
#[repr(C)]
pub struct ID2D1ResourceTextureManagerInternalVtbl {
    pub base: IUnknownVtbl,
    pub Initialize: unsafe extern "system" fn(
        this: *mut c_void,
        effect_context: *mut c_void,
        dimensions: u32,
    ) -> HResult,
    pub GetResourceTexture:
        unsafe extern "system" fn(this: *mut c_void, resource_texture: *mut *mut c_void) -> HResult,
}

com_interface!(ID2D1TransformMapper, ID2D1TransformMapperVtbl, IID_ID2D1TransformMapper);
com_interface!(
    ID2D1DrawInfoUpdateContext,
    ID2D1DrawInfoUpdateContextVtbl,
    IID_ID2D1DrawInfoUpdateContext
);
com_interface!(
    ID2D1ResourceTextureManager,
    ID2D1ResourceTextureManagerVtbl,
    IID_ID2D1ResourceTextureManager
);
com_interface!(
    ID2D1ResourceTextureManagerInternal,
    ID2D1ResourceTextureManagerInternalVtbl,
    IID_ID2D1ResourceTextureManagerInternal
);

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    const PTR: usize = size_of::<*const c_void>();

    #[test]
    fn lifecycle_table_has_six_slots() {
        assert_eq!(size_of::<ID2D1EffectImplVtbl>(), 6 * PTR);
        assert_eq!(offset_of!(ID2D1EffectImplVtbl, Initialize), 3 * PTR);
    }

    #[test]
    fn transform_tables_have_expected_slot_counts() {
        assert_eq!(size_of::<ID2D1DrawTransformVtbl>(), 8 * PTR);
        assert_eq!(size_of::<ID2D1ComputeTransformVtbl>(), 9 * PTR);
        assert_eq!(offset_of!(ID2D1ComputeTransformVtbl, CalculateThreadgroups), 8 * PTR);
    }

    #[test]
    fn host_slots_keep_sdk_offsets() {
        assert_eq!(offset_of!(ID2D1EffectContextVtbl, LoadPixelShader), 11 * PTR);
        assert_eq!(offset_of!(ID2D1EffectContextVtbl, LoadComputeShader), 13 * PTR);
        assert_eq!(offset_of!(ID2D1EffectContextVtbl, CheckFeatureSupport), 22 * PTR);
        assert_eq!(offset_of!(ID2D1DrawInfoVtbl, SetPixelShader), 10 * PTR);
        assert_eq!(offset_of!(ID2D1Factory1Vtbl, RegisterEffectFromString), 23 * PTR);
    }
}
