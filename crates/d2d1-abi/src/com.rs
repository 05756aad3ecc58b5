//! Reference-counted smart handle over foreign COM objects, plus typed
//! wrappers for the host calls the shell makes.

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};

use crate::ffi::*;
use crate::guid::Guid;
use crate::hresult::{HResult, E_NOINTERFACE, E_POINTER};
use crate::interfaces::*;
use crate::rect::Rect;

/// An owned reference to a COM object.
///
/// Cloning calls `AddRef`, dropping calls `Release`. Every host pointer the
/// shell keeps beyond a single call is held through one of these, so release
/// ordering lives in the owner's `Drop` instead of at each call site.
pub struct ComPtr<T: Interface> {
    ptr: NonNull<T>,
    _marker: PhantomData<T>,
}

impl<T: Interface> ComPtr<T> {
    /// Take ownership of one reference the caller already holds.
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live object implementing `T`.
    pub unsafe fn from_raw(ptr: *mut c_void) -> Option<Self> {
        NonNull::new(ptr as *mut T).map(|ptr| Self {
            ptr,
            _marker: PhantomData,
        })
    }

    /// Retain a borrowed pointer (calls `AddRef`).
    ///
    /// # Safety
    ///
    /// `ptr` must be null or a live object implementing `T`.
    pub unsafe fn from_borrowed(ptr: *mut c_void) -> Option<Self> {
        let this = unsafe { Self::from_raw(ptr) }?;
        this.add_ref();
        Some(this)
    }

    pub fn as_raw(&self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    /// Give the reference back to the caller without releasing it.
    pub fn into_raw(self) -> *mut c_void {
        let raw = self.as_raw();
        std::mem::forget(self);
        raw
    }

    pub fn vtbl(&self) -> &T::Vtbl {
        // SAFETY: construction guarantees a live object whose first field is
        // its vtable pointer.
        unsafe { &*(*(self.ptr.as_ptr() as *const *const T::Vtbl)) }
    }

    fn unknown(&self) -> &IUnknownVtbl {
        // SAFETY: every `Interface::Vtbl` starts with `IUnknownVtbl`.
        unsafe { &*(*(self.ptr.as_ptr() as *const *const IUnknownVtbl)) }
    }

    fn add_ref(&self) -> u32 {
        unsafe { (self.unknown().AddRef)(self.as_raw()) }
    }

    /// `QueryInterface` for another interface on the same object.
    pub fn cast<U: Interface>(&self) -> Result<ComPtr<U>, HResult> {
        let mut out = ptr::null_mut();
        unsafe { (self.unknown().QueryInterface)(self.as_raw(), &U::IID, &mut out) }.ok()?;
        unsafe { ComPtr::from_raw(out) }.ok_or(E_NOINTERFACE)
    }

    /// Hand out a new reference through an out pointer, as getters do.
    ///
    /// # Safety
    ///
    /// `out` must be null or valid for a pointer-sized write.
    pub unsafe fn copy_to(&self, out: *mut *mut c_void) -> Result<(), HResult> {
        if out.is_null() {
            return Err(E_POINTER);
        }
        unsafe { *out = self.clone().into_raw() };
        Ok(())
    }
}

impl<T: Interface> Clone for ComPtr<T> {
    fn clone(&self) -> Self {
        self.add_ref();
        Self {
            ptr: self.ptr,
            _marker: PhantomData,
        }
    }
}

impl<T: Interface> Drop for ComPtr<T> {
    fn drop(&mut self) {
        unsafe { (self.unknown().Release)(self.as_raw()) };
    }
}

impl<T: Interface> PartialEq for ComPtr<T> {
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: Interface> fmt::Debug for ComPtr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComPtr({:?}, {:p})", T::IID, self.ptr)
    }
}

// =====================================================================
// Host call wrappers
// =====================================================================

impl ComPtr<ID2D1EffectContext> {
    pub fn load_pixel_shader(&self, shader_id: &Guid, bytecode: &[u8]) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().LoadPixelShader)(
                self.as_raw(),
                shader_id,
                bytecode.as_ptr(),
                bytecode.len() as u32,
            )
        }
        .ok()
    }

    pub fn load_compute_shader(&self, shader_id: &Guid, bytecode: &[u8]) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().LoadComputeShader)(
                self.as_raw(),
                shader_id,
                bytecode.as_ptr(),
                bytecode.len() as u32,
            )
        }
        .ok()
    }

    /// Whether double precision shader ops are available on the device.
    pub fn supports_doubles(&self) -> Result<bool, HResult> {
        let mut data = D2D1_FEATURE_DATA_DOUBLES::default();
        unsafe {
            (self.vtbl().CheckFeatureSupport)(
                self.as_raw(),
                D2D1_FEATURE_DOUBLES,
                &mut data as *mut _ as *mut c_void,
                std::mem::size_of_val(&data) as u32,
            )
        }
        .ok()?;
        Ok(data.doublePrecisionFloatShaderOps != FALSE)
    }

    /// Whether compute shaders (with raw/structured buffers) are available.
    pub fn supports_compute_shaders(&self) -> Result<bool, HResult> {
        let mut data = D2D1_FEATURE_DATA_D3D10_X_HARDWARE_OPTIONS::default();
        unsafe {
            (self.vtbl().CheckFeatureSupport)(
                self.as_raw(),
                D2D1_FEATURE_D3D10_X_HARDWARE_OPTIONS,
                &mut data as *mut _ as *mut c_void,
                std::mem::size_of_val(&data) as u32,
            )
        }
        .ok()?;
        Ok(data.computeShaders_Plus_RawAndStructuredBuffers_Via_Shader_4_x != FALSE)
    }
}

impl ComPtr<ID2D1TransformGraph> {
    /// Register `node` (a transform-family pointer) as the only node.
    pub fn set_single_transform_node(&self, node: *mut c_void) -> Result<(), HResult> {
        unsafe { (self.vtbl().SetSingleTransformNode)(self.as_raw(), node) }.ok()
    }
}

/// Calls shared by draw and compute render-info objects.
pub trait RenderInfo {
    fn render_info_vtbl(&self) -> &ID2D1RenderInfoVtbl;
    fn raw(&self) -> *mut c_void;

    fn set_input_description(
        &self,
        index: u32,
        description: D2D1_INPUT_DESCRIPTION,
    ) -> Result<(), HResult> {
        unsafe { (self.render_info_vtbl().SetInputDescription)(self.raw(), index, description) }
            .ok()
    }

    fn set_output_buffer(&self, precision: u32, depth: u32) -> Result<(), HResult> {
        unsafe { (self.render_info_vtbl().SetOutputBuffer)(self.raw(), precision, depth) }.ok()
    }
}

impl RenderInfo for ComPtr<ID2D1DrawInfo> {
    fn render_info_vtbl(&self) -> &ID2D1RenderInfoVtbl {
        &self.vtbl().base
    }

    fn raw(&self) -> *mut c_void {
        self.as_raw()
    }
}

impl RenderInfo for ComPtr<ID2D1ComputeInfo> {
    fn render_info_vtbl(&self) -> &ID2D1RenderInfoVtbl {
        &self.vtbl().base
    }

    fn raw(&self) -> *mut c_void {
        self.as_raw()
    }
}

impl ComPtr<ID2D1DrawInfo> {
    pub fn set_pixel_shader(&self, shader_id: &Guid, options: u32) -> Result<(), HResult> {
        unsafe { (self.vtbl().SetPixelShader)(self.as_raw(), shader_id, options) }.ok()
    }

    pub fn set_pixel_shader_constant_buffer(&self, buffer: &[u8]) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().SetPixelShaderConstantBuffer)(
                self.as_raw(),
                buffer.as_ptr(),
                buffer.len() as u32,
            )
        }
        .ok()
    }

    pub fn set_resource_texture(
        &self,
        index: u32,
        texture: &ComPtr<ID2D1ResourceTexture>,
    ) -> Result<(), HResult> {
        unsafe { (self.vtbl().SetResourceTexture)(self.as_raw(), index, texture.as_raw()) }.ok()
    }
}

impl ComPtr<ID2D1ComputeInfo> {
    pub fn set_compute_shader(&self, shader_id: &Guid) -> Result<(), HResult> {
        unsafe { (self.vtbl().SetComputeShader)(self.as_raw(), shader_id) }.ok()
    }

    pub fn set_compute_shader_constant_buffer(&self, buffer: &[u8]) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().SetComputeShaderConstantBuffer)(
                self.as_raw(),
                buffer.as_ptr(),
                buffer.len() as u32,
            )
        }
        .ok()
    }

    pub fn set_resource_texture(
        &self,
        index: u32,
        texture: &ComPtr<ID2D1ResourceTexture>,
    ) -> Result<(), HResult> {
        unsafe { (self.vtbl().SetResourceTexture)(self.as_raw(), index, texture.as_raw()) }.ok()
    }
}

impl ComPtr<ID2D1TransformMapper> {
    pub fn map_inputs_to_output(
        &self,
        update_context: *mut c_void,
        inputs: &[Rect],
        opaque_inputs: &[Rect],
        output: &mut Rect,
        opaque_output: &mut Rect,
    ) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().MapInputsToOutput)(
                self.as_raw(),
                update_context,
                inputs.as_ptr(),
                opaque_inputs.as_ptr(),
                inputs.len() as u32,
                output,
                opaque_output,
            )
        }
        .ok()
    }

    pub fn map_output_to_inputs(&self, output: &Rect, inputs: &mut [Rect]) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().MapOutputToInputs)(
                self.as_raw(),
                output,
                inputs.as_mut_ptr(),
                inputs.len() as u32,
            )
        }
        .ok()
    }

    pub fn map_invalid_output(
        &self,
        input_index: u32,
        invalid_input: Rect,
        invalid_output: &mut Rect,
    ) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().MapInvalidOutput)(
                self.as_raw(),
                input_index,
                invalid_input,
                invalid_output,
            )
        }
        .ok()
    }
}

impl ComPtr<ID2D1ResourceTextureManagerInternal> {
    pub fn initialize(
        &self,
        context: &ComPtr<ID2D1EffectContext>,
        dimensions: u32,
    ) -> Result<(), HResult> {
        unsafe { (self.vtbl().Initialize)(self.as_raw(), context.as_raw(), dimensions) }.ok()
    }

    pub fn resource_texture(&self) -> Result<ComPtr<ID2D1ResourceTexture>, HResult> {
        let mut out = ptr::null_mut();
        unsafe { (self.vtbl().GetResourceTexture)(self.as_raw(), &mut out) }.ok()?;
        unsafe { ComPtr::from_raw(out) }.ok_or(E_POINTER)
    }
}

impl ComPtr<ID2D1Factory1> {
    /// # Safety
    ///
    /// `xml` must be NUL-terminated UTF-16 and every binding's name must
    /// outlive the call.
    pub unsafe fn register_effect_from_string(
        &self,
        class_id: &Guid,
        xml: &[u16],
        bindings: &[D2D1_PROPERTY_BINDING],
        factory: PD2D1_EFFECT_FACTORY,
    ) -> Result<(), HResult> {
        unsafe {
            (self.vtbl().RegisterEffectFromString)(
                self.as_raw(),
                class_id,
                xml.as_ptr(),
                bindings.as_ptr(),
                bindings.len() as u32,
                factory,
            )
        }
        .ok()
    }

    pub fn unregister_effect(&self, class_id: &Guid) -> Result<(), HResult> {
        unsafe { (self.vtbl().UnregisterEffect)(self.as_raw(), class_id) }.ok()
    }
}
