//! `ID2D1DrawInfoUpdateContext`: the handle a transform mapper receives
//! while output rectangles are negotiated, through which it may read and
//! replace the effect's constant buffer.
//!
//! The handle is only valid for the duration of one
//! `MapInputRectsToOutputRect` call. A mapper may keep a reference past
//! that, but every call on a closed handle returns `RO_E_CLOSED`.

use std::cell::Cell;
use std::ffi::c_void;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{fence, AtomicU32, Ordering};

use d2d1_abi::guid::{IID_ID2D1DrawInfoUpdateContext, IID_IUnknown};
use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::{ID2D1DrawInfoUpdateContextVtbl, IUnknownVtbl};
use d2d1_abi::{Guid, HResult, IntoHResult};
use once_cell::sync::Lazy;
use tracing::trace;

use crate::shell::{allocate, Effect, ShellKind};

/// What an update context needs from the effect that opened it.
pub(crate) trait ConstantBufferHost {
    fn constant_buffer_len(&self) -> usize;
    fn read_constant_buffer(&self, out: &mut [u8]) -> usize;
    /// Replace the buffer and push it to the bound render info.
    fn update_constant_buffer(&self, data: &[u8]) -> Result<(), HResult>;
}

impl<K: ShellKind> ConstantBufferHost for Effect<K> {
    fn constant_buffer_len(&self) -> usize {
        Effect::<K>::constant_buffer_len(self)
    }

    fn read_constant_buffer(&self, out: &mut [u8]) -> usize {
        Effect::<K>::read_constant_buffer(self, out)
    }

    fn update_constant_buffer(&self, data: &[u8]) -> Result<(), HResult> {
        self.replace_constant_buffer(data)?;
        self.push_constant_buffer()
    }
}

#[repr(C)]
struct DrawInfoUpdateContext {
    vtbl: *const ID2D1DrawInfoUpdateContextVtbl,
    ref_count: AtomicU32,
    host: Cell<Option<NonNull<dyn ConstantBufferHost>>>,
}

static VTBL: Lazy<ID2D1DrawInfoUpdateContextVtbl> = Lazy::new(|| ID2D1DrawInfoUpdateContextVtbl {
    base: IUnknownVtbl {
        QueryInterface: query_interface,
        AddRef: add_ref,
        Release: release,
    },
    GetConstantBufferSize: get_constant_buffer_size,
    GetConstantBuffer: get_constant_buffer,
    SetConstantBuffer: set_constant_buffer,
});

/// Owns the opener's reference to an update context and closes it on drop.
pub(crate) struct UpdateScope {
    context: NonNull<DrawInfoUpdateContext>,
}

impl UpdateScope {
    pub(crate) fn open(host: &(dyn ConstantBufferHost + 'static)) -> Result<Self, HResult> {
        let context = allocate(DrawInfoUpdateContext {
            vtbl: &*VTBL,
            ref_count: AtomicU32::new(1),
            host: Cell::new(Some(NonNull::from(host))),
        })?;
        trace!("update context opened");
        Ok(Self { context })
    }

    pub(crate) fn as_raw(&self) -> *mut c_void {
        self.context.as_ptr().cast()
    }
}

impl Drop for UpdateScope {
    fn drop(&mut self) {
        unsafe { self.context.as_ref() }.host.set(None);
        trace!("update context closed");
        unsafe { release(self.as_raw()) };
    }
}

/// # Safety
///
/// `this` must be a live update context.
unsafe fn context<'a>(this: *mut c_void) -> &'a DrawInfoUpdateContext {
    unsafe { &*this.cast::<DrawInfoUpdateContext>() }
}

/// The effect behind an open context, or `RO_E_CLOSED`.
unsafe fn host<'a>(this: *mut c_void) -> Result<&'a dyn ConstantBufferHost, HResult> {
    let host = unsafe { context(this) }.host.get().ok_or(RO_E_CLOSED)?;
    // SAFETY: the scope clears `host` before the opening call returns, so
    // a stored pointer always refers to an effect inside that call.
    Ok(unsafe { host.as_ref() })
}

unsafe extern "system" fn query_interface(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    if out.is_null() {
        return E_POINTER;
    }
    match unsafe { riid.as_ref() } {
        Some(riid) if *riid == IID_IUnknown || *riid == IID_ID2D1DrawInfoUpdateContext => {
            unsafe { add_ref(this) };
            unsafe { *out = this };
            S_OK
        }
        _ => {
            unsafe { *out = ptr::null_mut() };
            E_NOINTERFACE
        }
    }
}

unsafe extern "system" fn add_ref(this: *mut c_void) -> u32 {
    unsafe { context(this) }.ref_count.fetch_add(1, Ordering::Relaxed) + 1
}

unsafe extern "system" fn release(this: *mut c_void) -> u32 {
    let remaining = unsafe { context(this) }.ref_count.fetch_sub(1, Ordering::Release) - 1;
    if remaining == 0 {
        fence(Ordering::Acquire);
        // SAFETY: allocated by `allocate`; this was the last reference.
        drop(unsafe { Box::from_raw(this.cast::<DrawInfoUpdateContext>()) });
    }
    remaining
}

unsafe extern "system" fn get_constant_buffer_size(this: *mut c_void, size: *mut u32) -> HResult {
    let result = unsafe { host(this) }.and_then(|host| {
        let size = unsafe { size.as_mut() }.ok_or(E_POINTER)?;
        *size = host.constant_buffer_len() as u32;
        Ok(())
    });
    result.into_hresult()
}

unsafe extern "system" fn get_constant_buffer(
    this: *mut c_void,
    buffer: *mut u8,
    buffer_count: u32,
) -> HResult {
    let result = unsafe { host(this) }.and_then(|host| {
        let len = host.constant_buffer_len();
        if (buffer_count as usize) < len {
            return Err(E_INVALIDARG);
        }
        if len == 0 {
            return Ok(());
        }
        if buffer.is_null() {
            return Err(E_POINTER);
        }
        let out = unsafe { slice::from_raw_parts_mut(buffer, buffer_count as usize) };
        host.read_constant_buffer(out);
        Ok(())
    });
    result.into_hresult()
}

unsafe extern "system" fn set_constant_buffer(
    this: *mut c_void,
    buffer: *const u8,
    buffer_count: u32,
) -> HResult {
    let result = unsafe { host(this) }.and_then(|host| {
        let data = match buffer_count {
            0 => &[][..],
            _ if buffer.is_null() => return Err(E_POINTER),
            count => unsafe { slice::from_raw_parts(buffer, count as usize) },
        };
        trace!(bytes = data.len(), "constant buffer updated during negotiation");
        host.update_constant_buffer(data)
    });
    result.into_hresult()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct Recorder {
        buffer: RefCell<Vec<u8>>,
        pushes: Cell<usize>,
    }

    impl ConstantBufferHost for Recorder {
        fn constant_buffer_len(&self) -> usize {
            self.buffer.borrow().len()
        }

        fn read_constant_buffer(&self, out: &mut [u8]) -> usize {
            let stored = self.buffer.borrow();
            let len = stored.len().min(out.len());
            out[..len].copy_from_slice(&stored[..len]);
            len
        }

        fn update_constant_buffer(&self, data: &[u8]) -> Result<(), HResult> {
            *self.buffer.borrow_mut() = data.to_vec();
            self.pushes.set(self.pushes.get() + 1);
            Ok(())
        }
    }

    fn vtbl(raw: *mut c_void) -> &'static ID2D1DrawInfoUpdateContextVtbl {
        unsafe { &*(*(raw as *const *const ID2D1DrawInfoUpdateContextVtbl)) }
    }

    #[test]
    fn open_context_forwards_to_the_host() {
        let recorder: &'static Recorder = Box::leak(Box::default());
        let scope = UpdateScope::open(recorder).unwrap();
        let raw = scope.as_raw();
        let table = vtbl(raw);

        let data = [1u8, 2, 3, 4];
        unsafe {
            assert_eq!((table.SetConstantBuffer)(raw, data.as_ptr(), 4), S_OK);
            let mut size = 0;
            assert_eq!((table.GetConstantBufferSize)(raw, &mut size), S_OK);
            assert_eq!(size, 4);

            let mut small = [0u8; 2];
            assert_eq!((table.GetConstantBuffer)(raw, small.as_mut_ptr(), 2), E_INVALIDARG);
            let mut out = [0u8; 8];
            assert_eq!((table.GetConstantBuffer)(raw, out.as_mut_ptr(), 8), S_OK);
            assert_eq!(&out[..4], &data);
        }
        assert_eq!(recorder.pushes.get(), 1);
    }

    #[test]
    fn retained_context_is_closed_after_the_scope() {
        let recorder: &'static Recorder = Box::leak(Box::default());
        let scope = UpdateScope::open(recorder).unwrap();
        let raw = scope.as_raw();
        let table = vtbl(raw);

        unsafe {
            let mut alias = ptr::null_mut();
            assert_eq!(
                (table.base.QueryInterface)(raw, &IID_ID2D1DrawInfoUpdateContext, &mut alias),
                S_OK
            );
            assert_eq!(alias, raw);
            drop(scope);

            let mut size = 0;
            assert_eq!((table.GetConstantBufferSize)(raw, &mut size), RO_E_CLOSED);
            assert_eq!((table.SetConstantBuffer)(raw, [0u8].as_ptr(), 1), RO_E_CLOSED);
            assert_eq!((table.base.Release)(raw), 0);
        }
        assert_eq!(recorder.pushes.get(), 0);
    }
}
