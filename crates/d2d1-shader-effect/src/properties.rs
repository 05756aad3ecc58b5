//! Custom effect properties, exposed to the host through
//! `D2D1_PROPERTY_BINDING` getter/setter pairs.
//!
//! | Property                       | Type       | Storage                              |
//! |--------------------------------|------------|--------------------------------------|
//! | `ConstantBuffer`               | blob       | copied into the effect               |
//! | `TransformMapper`              | `IUnknown` | `ID2D1TransformMapper`               |
//! | `ResourceTextureManager{0..15}`| `IUnknown` | `ID2D1ResourceTextureManagerInternal`|
//!
//! Interface-valued properties travel as a single pointer in the data
//! block. Only declared resource texture slots are accessible.

use std::ffi::c_void;
use std::ptr;
use std::slice;

use d2d1_abi::ffi::{PD2D1_PROPERTY_GET_FUNCTION, PD2D1_PROPERTY_SET_FUNCTION};
use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::*;
use d2d1_abi::{ComPtr, HResult, IntoHResult};
use tracing::{trace, warn};

use crate::descriptor::{ShaderDescriptor, MAX_RESOURCE_TEXTURES};
use crate::shell::{Effect, ShellKind, POINTER_WIDTH};

pub const CONSTANT_BUFFER: &str = "ConstantBuffer";
pub const TRANSFORM_MAPPER: &str = "TransformMapper";
pub const RESOURCE_TEXTURE_MANAGER_PREFIX: &str = "ResourceTextureManager";

/// One bindable property: its name and accessor pair for an effect kind.
pub(crate) struct PropertyAccessor {
    pub name: String,
    pub set: PD2D1_PROPERTY_SET_FUNCTION,
    pub get: PD2D1_PROPERTY_GET_FUNCTION,
}

/// Every property an effect for `descriptor` exposes, in registration order.
pub(crate) fn property_accessors<K: ShellKind>(
    descriptor: &ShaderDescriptor,
) -> Vec<PropertyAccessor> {
    let mut accessors = vec![
        PropertyAccessor {
            name: CONSTANT_BUFFER.to_string(),
            set: set_constant_buffer::<K>,
            get: get_constant_buffer::<K>,
        },
        PropertyAccessor {
            name: TRANSFORM_MAPPER.to_string(),
            set: set_transform_mapper::<K>,
            get: get_transform_mapper::<K>,
        },
    ];
    let managers = resource_texture_manager_accessors::<K>();
    let mut indices: Vec<u32> = descriptor.resource_textures.iter().map(|t| t.index).collect();
    indices.sort_unstable();
    for index in indices {
        if let Some(&(set, get)) = managers.get(index as usize) {
            accessors.push(PropertyAccessor {
                name: format!("{RESOURCE_TEXTURE_MANAGER_PREFIX}{index}"),
                set,
                get,
            });
        }
    }
    accessors
}

// ---------------------------------------------------------------------------
// Data block helpers
// ---------------------------------------------------------------------------

unsafe fn read_interface(data: *const u8, data_size: u32) -> Result<*mut c_void, HResult> {
    if data_size as usize != POINTER_WIDTH {
        return Err(E_INVALIDARG);
    }
    if data.is_null() {
        return Err(E_POINTER);
    }
    Ok(unsafe { ptr::read_unaligned(data.cast::<*mut c_void>()) })
}

/// Check a getter's target block before anything is written to it.
fn check_interface_target(data: *mut u8, data_size: u32) -> Result<(), HResult> {
    if (data_size as usize) < POINTER_WIDTH {
        return Err(E_INVALIDARG);
    }
    if data.is_null() {
        return Err(E_POINTER);
    }
    Ok(())
}

/// Write an owned interface pointer (or null) into a checked block.
unsafe fn write_interface(data: *mut u8, actual_size: *mut u32, value: *mut c_void) {
    unsafe {
        ptr::write_unaligned(data.cast::<*mut c_void>(), value);
        if let Some(actual) = actual_size.as_mut() {
            *actual = POINTER_WIDTH as u32;
        }
    }
}

// ---------------------------------------------------------------------------
// Effect-side accessors
// ---------------------------------------------------------------------------

impl<K: ShellKind> Effect<K> {
    pub(crate) fn get_constant_buffer_property(
        &self,
        data: *mut u8,
        data_size: u32,
        actual_size: *mut u32,
    ) -> Result<(), HResult> {
        let out: &mut [u8] = match data_size {
            0 => &mut [],
            _ if data.is_null() => return Err(E_POINTER),
            size => unsafe { slice::from_raw_parts_mut(data, size as usize) },
        };
        let written = self.read_constant_buffer(out);
        if let Some(actual) = unsafe { actual_size.as_mut() } {
            *actual = written as u32;
        }
        Ok(())
    }

    pub(crate) fn set_constant_buffer_property(
        &self,
        data: *const u8,
        data_size: u32,
    ) -> Result<(), HResult> {
        let data: &[u8] = match data_size {
            0 => &[],
            _ if data.is_null() => return Err(E_POINTER),
            size => unsafe { slice::from_raw_parts(data, size as usize) },
        };
        self.replace_constant_buffer(data)?;
        trace!(kind = K::NAME, bytes = data.len(), "constant buffer set");
        Ok(())
    }

    fn get_transform_mapper_property(
        &self,
        data: *mut u8,
        data_size: u32,
        actual_size: *mut u32,
    ) -> Result<(), HResult> {
        check_interface_target(data, data_size)?;
        let value = self
            .transform_mapper()
            .map_or(ptr::null_mut(), ComPtr::into_raw);
        unsafe { write_interface(data, actual_size, value) };
        Ok(())
    }

    fn set_transform_mapper_property(
        &self,
        data: *const u8,
        data_size: u32,
    ) -> Result<(), HResult> {
        let raw = unsafe { read_interface(data, data_size) }?;
        let mapper = match unsafe { ComPtr::<IUnknown>::from_borrowed(raw) } {
            Some(unknown) => Some(unknown.cast::<ID2D1TransformMapper>()?),
            None => None,
        };
        trace!(kind = K::NAME, attached = mapper.is_some(), "transform mapper set");
        drop(self.transform_mapper.replace(mapper));
        Ok(())
    }

    fn check_resource_texture_slot(&self, index: usize) -> Result<(), HResult> {
        if index >= MAX_RESOURCE_TEXTURES
            || self.descriptor.resource_texture(index as u32).is_none()
        {
            warn!(kind = K::NAME, index, "resource texture slot is not declared");
            return Err(E_INVALIDARG);
        }
        Ok(())
    }

    fn get_resource_texture_manager_property(
        &self,
        index: usize,
        data: *mut u8,
        data_size: u32,
        actual_size: *mut u32,
    ) -> Result<(), HResult> {
        self.check_resource_texture_slot(index)?;
        check_interface_target(data, data_size)?;
        let stored = self.resource_texture_managers.borrow()[index].clone();
        let value = match stored {
            Some(manager) => manager.cast::<ID2D1ResourceTextureManager>()?.into_raw(),
            None => ptr::null_mut(),
        };
        unsafe { write_interface(data, actual_size, value) };
        Ok(())
    }

    fn set_resource_texture_manager_property(
        &self,
        index: usize,
        data: *const u8,
        data_size: u32,
    ) -> Result<(), HResult> {
        self.check_resource_texture_slot(index)?;
        let raw = unsafe { read_interface(data, data_size) }?;
        let manager = match unsafe { ComPtr::<IUnknown>::from_borrowed(raw) } {
            Some(unknown) => Some(unknown.cast::<ID2D1ResourceTextureManagerInternal>()?),
            None => None,
        };
        trace!(kind = K::NAME, index, attached = manager.is_some(), "resource texture manager set");
        let previous =
            std::mem::replace(&mut self.resource_texture_managers.borrow_mut()[index], manager);
        drop(previous);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Binding entry points
//
// The host passes the lifecycle pointer of the effect as `effect`.
// ---------------------------------------------------------------------------

unsafe fn effect<'a, K: ShellKind>(effect: *const c_void) -> Result<&'a Effect<K>, HResult> {
    if effect.is_null() {
        return Err(E_POINTER);
    }
    Ok(unsafe { Effect::<K>::from_lifecycle(effect) })
}

unsafe extern "system" fn get_constant_buffer<K: ShellKind>(
    this: *const c_void,
    data: *mut u8,
    data_size: u32,
    actual_size: *mut u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| effect.get_constant_buffer_property(data, data_size, actual_size))
        .into_hresult()
}

unsafe extern "system" fn set_constant_buffer<K: ShellKind>(
    this: *mut c_void,
    data: *const u8,
    data_size: u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| effect.set_constant_buffer_property(data, data_size))
        .into_hresult()
}

unsafe extern "system" fn get_transform_mapper<K: ShellKind>(
    this: *const c_void,
    data: *mut u8,
    data_size: u32,
    actual_size: *mut u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| effect.get_transform_mapper_property(data, data_size, actual_size))
        .into_hresult()
}

unsafe extern "system" fn set_transform_mapper<K: ShellKind>(
    this: *mut c_void,
    data: *const u8,
    data_size: u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| effect.set_transform_mapper_property(data, data_size))
        .into_hresult()
}

unsafe extern "system" fn get_resource_texture_manager<K: ShellKind, const INDEX: usize>(
    this: *const c_void,
    data: *mut u8,
    data_size: u32,
    actual_size: *mut u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| {
            effect.get_resource_texture_manager_property(INDEX, data, data_size, actual_size)
        })
        .into_hresult()
}

unsafe extern "system" fn set_resource_texture_manager<K: ShellKind, const INDEX: usize>(
    this: *mut c_void,
    data: *const u8,
    data_size: u32,
) -> HResult {
    unsafe { effect::<K>(this) }
        .and_then(|effect| effect.set_resource_texture_manager_property(INDEX, data, data_size))
        .into_hresult()
}

type AccessorPair = (PD2D1_PROPERTY_SET_FUNCTION, PD2D1_PROPERTY_GET_FUNCTION);
type ManagerAccessors = [AccessorPair; MAX_RESOURCE_TEXTURES];

macro_rules! resource_texture_manager_accessors {
    ($($index:literal)*) => {
        /// One accessor pair per slot, indexed by slot.
        fn resource_texture_manager_accessors<K: ShellKind>() -> ManagerAccessors {
            [$((
                set_resource_texture_manager::<K, $index> as PD2D1_PROPERTY_SET_FUNCTION,
                get_resource_texture_manager::<K, $index> as PD2D1_PROPERTY_GET_FUNCTION,
            )),*]
        }
    };
}

resource_texture_manager_accessors!(0 1 2 3 4 5 6 7 8 9 10 11 12 13 14 15);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ResourceTextureDescription;
    use crate::pixel::{Pixel, PixelShaderEffect};
    use d2d1_abi::Guid;

    static SHADER: ShaderDescriptor = ShaderDescriptor {
        id: Guid::from_u128(0x0b0b_0000_0000_0000_0000_0000_0000_0002),
        bytecode: &[1],
        resource_textures: &[
            ResourceTextureDescription {
                index: 9,
                dimensions: 2,
            },
            ResourceTextureDescription {
                index: 4,
                dimensions: 1,
            },
        ],
        ..ShaderDescriptor::DEFAULT
    };

    #[test]
    fn accessors_cover_declared_slots_in_index_order() {
        let names: Vec<String> = property_accessors::<Pixel>(&SHADER)
            .into_iter()
            .map(|accessor| accessor.name)
            .collect();
        assert_eq!(
            names,
            [
                CONSTANT_BUFFER,
                TRANSFORM_MAPPER,
                "ResourceTextureManager4",
                "ResourceTextureManager9",
            ]
        );
    }

    #[test]
    fn undeclared_manager_slots_are_rejected() {
        let mut raw = ptr::null_mut();
        assert_eq!(PixelShaderEffect::create(&SHADER, &mut raw), S_OK);

        let null = [0u8; POINTER_WIDTH];
        let set = set_resource_texture_manager::<Pixel, 5>;
        assert_eq!(unsafe { set(raw, null.as_ptr(), POINTER_WIDTH as u32) }, E_INVALIDARG);
        let set = set_resource_texture_manager::<Pixel, 4>;
        assert_eq!(unsafe { set(raw, null.as_ptr(), POINTER_WIDTH as u32) }, S_OK);

        let mut out = [0xffu8; POINTER_WIDTH];
        let mut actual = 0;
        let get = get_resource_texture_manager::<Pixel, 4>;
        assert_eq!(
            unsafe { get(raw, out.as_mut_ptr(), POINTER_WIDTH as u32, &mut actual) },
            S_OK
        );
        assert_eq!(out, [0u8; POINTER_WIDTH]);
        assert_eq!(actual as usize, POINTER_WIDTH);

        assert_eq!(unsafe { PixelShaderEffect::release(raw.cast()) }, 0);
    }

    #[test]
    fn null_effect_pointers_are_rejected() {
        let data = [0u8; 4];
        assert_eq!(
            unsafe { set_constant_buffer::<Pixel>(ptr::null_mut(), data.as_ptr(), 4) },
            E_POINTER
        );
    }
}
