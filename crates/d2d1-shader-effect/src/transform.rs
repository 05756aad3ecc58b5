//! Rectangle negotiation shared by pixel and compute effects.
//!
//! With a transform mapper attached every mapping is delegated to it.
//! Otherwise a simple input needs exactly the output rectangle and a
//! complex input may need anything, so it maps to the infinite rectangle.

use std::ffi::c_void;
use std::slice;

use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::*;
use d2d1_abi::types::to_raw;
use d2d1_abi::{ComPtr, Guid, HResult, InputType, IntoHResult, Rect};
use tracing::{trace, warn};

use crate::shell::{Effect, ShellKind};
use crate::update_context::UpdateScope;

/// # Safety
///
/// When `count` is non-zero, `ptr` must be null or valid for `count` reads.
unsafe fn rects<'a>(ptr: *const Rect, count: u32) -> Result<&'a [Rect], HResult> {
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(E_POINTER);
    }
    Ok(unsafe { slice::from_raw_parts(ptr, count as usize) })
}

unsafe fn rects_mut<'a>(ptr: *mut Rect, count: u32) -> Result<&'a mut [Rect], HResult> {
    if count == 0 {
        return Ok(&mut []);
    }
    if ptr.is_null() {
        return Err(E_POINTER);
    }
    Ok(unsafe { slice::from_raw_parts_mut(ptr, count as usize) })
}

unsafe fn out_rect<'a>(ptr: *mut Rect) -> Result<&'a mut Rect, HResult> {
    unsafe { ptr.as_mut() }.ok_or(E_POINTER)
}

impl<K: ShellKind> Effect<K> {
    fn check_input_count(&self, count: u32) -> Result<(), HResult> {
        let declared = self.descriptor.input_count();
        if count != declared {
            warn!(kind = K::NAME, count, declared, "input count mismatch");
            return Err(E_INVALIDARG);
        }
        Ok(())
    }

    /// Decode every input type up front so a bad one fails the call
    /// before any rectangle is written.
    fn input_types(&self) -> Result<Vec<InputType>, HResult> {
        (0..self.descriptor.input_count())
            .map(|index| self.descriptor.input_type(index))
            .collect()
    }

    pub(crate) fn map_output_rect_to_input_rects(
        &self,
        output: &Rect,
        inputs: &mut [Rect],
    ) -> Result<(), HResult> {
        self.check_input_count(inputs.len() as u32)?;
        if let Some(mapper) = self.transform_mapper() {
            return mapper.map_output_to_inputs(output, inputs);
        }

        let types = self.input_types()?;
        for (input, kind) in inputs.iter_mut().zip(types) {
            *input = match kind {
                InputType::Simple => *output,
                InputType::Complex => Rect::INFINITE,
            };
        }
        trace!(kind = K::NAME, ?output, ?inputs, "mapped output to inputs");
        Ok(())
    }

    pub(crate) fn map_input_rects_to_output_rect(
        &self,
        inputs: &[Rect],
        opaque_inputs: &[Rect],
        output: &mut Rect,
        opaque_output: &mut Rect,
    ) -> Result<(), HResult> {
        self.check_input_count(inputs.len() as u32)?;
        if let Some(mapper) = self.transform_mapper() {
            let scope = UpdateScope::open(self)?;
            let result = mapper.map_inputs_to_output(
                scope.as_raw(),
                inputs,
                opaque_inputs,
                output,
                opaque_output,
            );
            drop(scope);
            return result;
        }

        let types = self.input_types()?;
        let simple_union = inputs
            .iter()
            .zip(types)
            .filter(|(_, kind)| *kind == InputType::Simple)
            .map(|(rect, _)| *rect)
            .reduce(|acc, rect| acc.union(&rect));

        *output = simple_union.unwrap_or(Rect::INFINITE);
        *opaque_output = Rect::EMPTY;
        trace!(kind = K::NAME, ?inputs, ?output, "mapped inputs to output");
        Ok(())
    }

    pub(crate) fn map_invalid_rect(
        &self,
        input_index: u32,
        invalid_input: Rect,
        invalid_output: &mut Rect,
    ) -> Result<(), HResult> {
        if input_index >= self.descriptor.input_count() {
            warn!(kind = K::NAME, input_index, "invalid rect for an undeclared input");
            return Err(E_INVALIDARG);
        }
        if let Some(mapper) = self.transform_mapper() {
            return mapper.map_invalid_output(input_index, invalid_input, invalid_output);
        }

        *invalid_output = match self.descriptor.input_type(input_index)? {
            InputType::Simple => invalid_input,
            InputType::Complex => Rect::INFINITE,
        };
        Ok(())
    }

    /// Bind the render info the host hands over and describe the shader
    /// to it. The info is kept even if describing fails.
    pub(crate) fn set_render_info(&self, info: *mut c_void) -> Result<(), HResult> {
        let info = unsafe { ComPtr::<K::Info>::from_borrowed(info) }.ok_or(E_POINTER)?;
        drop(self.render_info.replace(Some(info.clone())));

        let descriptor = self.descriptor;
        K::bind_shader(&info, descriptor)?;
        let render_info = K::render_info(&info);
        for description in descriptor.input_descriptions {
            render_info.set_input_description(description.index, description.to_raw())?;
        }
        if let Some(output) = descriptor.output_buffer {
            render_info.set_output_buffer(to_raw(output.precision), to_raw(output.depth))?;
        }
        trace!(kind = K::NAME, shader = ?descriptor.id, "render info bound");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Transform entry points
//
// The host calls these through the transform pointer; each recovers the
// effect base before doing anything else.
// ---------------------------------------------------------------------------

unsafe extern "system" fn query_interface<K: ShellKind>(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    unsafe { Effect::<K>::from_transform(this) }.query_interface(riid, out)
}

unsafe extern "system" fn add_ref<K: ShellKind>(this: *mut c_void) -> u32 {
    unsafe { Effect::<K>::from_transform(this) }.add_ref()
}

unsafe extern "system" fn release<K: ShellKind>(this: *mut c_void) -> u32 {
    unsafe { Effect::<K>::release(crate::shell::recover_base::<K>(this)) }
}

unsafe extern "system" fn get_input_count<K: ShellKind>(this: *mut c_void) -> u32 {
    unsafe { Effect::<K>::from_transform(this) }.descriptor.input_count()
}

unsafe extern "system" fn map_output_rect_to_input_rects<K: ShellKind>(
    this: *mut c_void,
    output_rect: *const Rect,
    input_rects: *mut Rect,
    input_rects_count: u32,
) -> HResult {
    let effect = unsafe { Effect::<K>::from_transform(this) };
    let result = (|| {
        let output = unsafe { output_rect.as_ref() }.ok_or(E_POINTER)?;
        let inputs = unsafe { rects_mut(input_rects, input_rects_count) }?;
        effect.map_output_rect_to_input_rects(output, inputs)
    })();
    result.into_hresult()
}

unsafe extern "system" fn map_input_rects_to_output_rect<K: ShellKind>(
    this: *mut c_void,
    input_rects: *const Rect,
    input_opaque_sub_rects: *const Rect,
    input_rect_count: u32,
    output_rect: *mut Rect,
    output_opaque_sub_rect: *mut Rect,
) -> HResult {
    let effect = unsafe { Effect::<K>::from_transform(this) };
    let result = (|| {
        let inputs = unsafe { rects(input_rects, input_rect_count) }?;
        let opaque_inputs = unsafe { rects(input_opaque_sub_rects, input_rect_count) }?;
        let output = unsafe { out_rect(output_rect) }?;
        let opaque_output = unsafe { out_rect(output_opaque_sub_rect) }?;
        effect.map_input_rects_to_output_rect(inputs, opaque_inputs, output, opaque_output)
    })();
    result.into_hresult()
}

unsafe extern "system" fn map_invalid_rect<K: ShellKind>(
    this: *mut c_void,
    input_index: u32,
    invalid_input_rect: Rect,
    invalid_output_rect: *mut Rect,
) -> HResult {
    let effect = unsafe { Effect::<K>::from_transform(this) };
    let result = unsafe { out_rect(invalid_output_rect) }
        .and_then(|out| effect.map_invalid_rect(input_index, invalid_input_rect, out));
    result.into_hresult()
}

/// `SetDrawInfo` / `SetComputeInfo`.
pub(crate) unsafe extern "system" fn set_render_info<K: ShellKind>(
    this: *mut c_void,
    info: *mut c_void,
) -> HResult {
    unsafe { Effect::<K>::from_transform(this) }
        .set_render_info(info)
        .into_hresult()
}

/// The seven `ID2D1Transform` slots shared by every effect kind.
pub(crate) fn transform_vtbl<K: ShellKind>() -> ID2D1TransformVtbl {
    ID2D1TransformVtbl {
        base: ID2D1TransformNodeVtbl {
            base: IUnknownVtbl {
                QueryInterface: query_interface::<K>,
                AddRef: add_ref::<K>,
                Release: release::<K>,
            },
            GetInputCount: get_input_count::<K>,
        },
        MapOutputRectToInputRects: map_output_rect_to_input_rects::<K>,
        MapInputRectsToOutputRect: map_input_rects_to_output_rect::<K>,
        MapInvalidRect: map_invalid_rect::<K>,
    }
}
