//! The effect object: one allocation answering to the lifecycle interface
//! at its base address and to the transform interface one pointer further
//! in.
//!
//! ```text
//! base + 0       *const lifecycle vtable   <- ID2D1EffectImpl*
//! base + ptr     *const transform vtable   <- ID2D1DrawTransform* / ID2D1ComputeTransform*
//! base + 2*ptr   refcount, state, host handles ...
//! ```
//!
//! Pixel and compute effects share this layout and everything in this
//! module; [`ShellKind`] supplies the few calls that differ.

use std::alloc::{alloc, Layout};
use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr::{self, NonNull};
use std::sync::atomic::{fence, AtomicU32, Ordering};

use d2d1_abi::ffi::D2D1_FEATURE_DOUBLES;
use d2d1_abi::guid::{IID_ID2D1EffectImpl, IID_ID2D1Transform, IID_ID2D1TransformNode, IID_IUnknown};
use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::*;
use d2d1_abi::types::from_raw;
use d2d1_abi::{ChangeType, ComPtr, Guid, HResult, IntoHResult, RenderInfo};
use tracing::{debug, trace, warn};

use crate::descriptor::{ShaderDescriptor, MAX_RESOURCE_TEXTURES};

/// Distance between the lifecycle and transform interface pointers.
pub(crate) const POINTER_WIDTH: usize = size_of::<*const c_void>();

/// Where an effect is in the host's binding sequence. Teardown is not a
/// state: the object is gone once its last reference is released.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum BindingState {
    Uninitialized,
    Initializing,
    Bound,
    PreparingRender,
}

/// The calls that differ between pixel and compute effects.
pub(crate) trait ShellKind: Sized + 'static {
    /// `ID2D1DrawInfo` or `ID2D1ComputeInfo`.
    type Info: Interface + 'static;

    const NAME: &'static str;
    /// `ID2D1DrawTransform` or `ID2D1ComputeTransform`.
    const TRANSFORM_IID: Guid;

    /// The two halves of the kind's contiguous vtable.
    fn vtables() -> (*const ID2D1EffectImplVtbl, *const c_void);

    /// Fail with `D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES` when the device
    /// cannot run the shader at all.
    fn check_support(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult>;

    fn load_shader(
        context: &ComPtr<ID2D1EffectContext>,
        descriptor: &ShaderDescriptor,
    ) -> Result<(), HResult>;

    /// Install the shader identity (and options) on a freshly bound info.
    fn bind_shader(info: &ComPtr<Self::Info>, descriptor: &ShaderDescriptor)
        -> Result<(), HResult>;

    fn render_info(info: &ComPtr<Self::Info>) -> &dyn RenderInfo;

    fn push_constant_buffer(info: &ComPtr<Self::Info>, data: &[u8]) -> Result<(), HResult>;

    fn set_resource_texture(
        info: &ComPtr<Self::Info>,
        index: u32,
        texture: &ComPtr<ID2D1ResourceTexture>,
    ) -> Result<(), HResult>;
}

/// Fail when the shader needs doubles the device does not have.
pub(crate) fn check_double_precision(
    context: &ComPtr<ID2D1EffectContext>,
    descriptor: &ShaderDescriptor,
) -> Result<(), HResult> {
    if descriptor.requires_double_precision && !context.supports_doubles()? {
        debug!(feature = D2D1_FEATURE_DOUBLES, "device lacks double precision shader ops");
        return Err(D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Move `value` to the heap, reporting allocation failure as
/// `E_OUTOFMEMORY` instead of aborting. Free with `Box::from_raw`.
pub(crate) fn allocate<T>(value: T) -> Result<NonNull<T>, HResult> {
    let layout = Layout::new::<T>();
    debug_assert!(layout.size() > 0);
    // SAFETY: `T` is never zero-sized here (every caller stores a vtable
    // pointer), and the block is initialized before it is handed out.
    let raw = unsafe { alloc(layout) }.cast::<T>();
    let block = NonNull::new(raw).ok_or(E_OUTOFMEMORY)?;
    unsafe { block.as_ptr().write(value) };
    Ok(block)
}

// ---------------------------------------------------------------------------
// Effect
// ---------------------------------------------------------------------------

#[repr(C)]
pub(crate) struct Effect<K: ShellKind> {
    pub(crate) lifecycle: *const ID2D1EffectImplVtbl,
    pub(crate) transform: *const c_void,
    ref_count: AtomicU32,
    pub(crate) descriptor: &'static ShaderDescriptor,
    pub(crate) state: Cell<BindingState>,
    pub(crate) constant_buffer: RefCell<Option<Vec<u8>>>,
    pub(crate) context: RefCell<Option<ComPtr<ID2D1EffectContext>>>,
    pub(crate) render_info: RefCell<Option<ComPtr<K::Info>>>,
    pub(crate) transform_mapper: RefCell<Option<ComPtr<ID2D1TransformMapper>>>,
    pub(crate) resource_texture_managers:
        RefCell<[Option<ComPtr<ID2D1ResourceTextureManagerInternal>>; MAX_RESOURCE_TEXTURES]>,
}

impl<K: ShellKind> Effect<K> {
    /// Allocate an effect with one reference and write its lifecycle
    /// pointer to `out`. On failure `out` is cleared.
    pub(crate) fn create(descriptor: &'static ShaderDescriptor, out: *mut *mut c_void) -> HResult {
        if out.is_null() {
            return E_POINTER;
        }
        let (lifecycle, transform) = K::vtables();
        let effect = Self {
            lifecycle,
            transform,
            ref_count: AtomicU32::new(1),
            descriptor,
            state: Cell::new(BindingState::Uninitialized),
            constant_buffer: RefCell::new(None),
            context: RefCell::new(None),
            render_info: RefCell::new(None),
            transform_mapper: RefCell::new(None),
            resource_texture_managers: RefCell::new(std::array::from_fn(|_| None)),
        };
        match allocate(effect) {
            Ok(block) => {
                debug!(kind = K::NAME, shader = ?descriptor.id, "effect created");
                unsafe { *out = block.as_ptr().cast() };
                S_OK
            }
            Err(hr) => {
                warn!(kind = K::NAME, "effect allocation failed");
                unsafe { *out = ptr::null_mut() };
                hr
            }
        }
    }

    /// # Safety
    ///
    /// `this` must be the lifecycle pointer of a live `Effect<K>`.
    pub(crate) unsafe fn from_lifecycle<'a>(this: *const c_void) -> &'a Self {
        unsafe { &*this.cast::<Self>() }
    }

    /// # Safety
    ///
    /// `this` must be the transform pointer of a live `Effect<K>`.
    pub(crate) unsafe fn from_transform<'a>(this: *const c_void) -> &'a Self {
        unsafe { &*recover_base::<K>(this) }
    }

    pub(crate) fn lifecycle_ptr(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// The interface pointer handed out for the transform family.
    pub(crate) fn transform_ptr(&self) -> *mut c_void {
        (self as *const Self as *mut u8).wrapping_add(POINTER_WIDTH).cast()
    }

    pub(crate) fn state(&self) -> BindingState {
        self.state.get()
    }

    // -----------------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------------

    pub(crate) fn query_interface(&self, riid: *const Guid, out: *mut *mut c_void) -> HResult {
        if out.is_null() {
            return E_POINTER;
        }
        let Some(riid) = (unsafe { riid.as_ref() }) else {
            unsafe { *out = ptr::null_mut() };
            return E_POINTER;
        };

        let target = if *riid == IID_IUnknown || *riid == IID_ID2D1EffectImpl {
            self.lifecycle_ptr()
        } else if *riid == IID_ID2D1TransformNode
            || *riid == IID_ID2D1Transform
            || *riid == K::TRANSFORM_IID
        {
            self.transform_ptr()
        } else {
            trace!(kind = K::NAME, iid = ?riid, "interface not supported");
            unsafe { *out = ptr::null_mut() };
            return E_NOINTERFACE;
        };

        self.add_ref();
        unsafe { *out = target };
        S_OK
    }

    pub(crate) fn add_ref(&self) -> u32 {
        self.ref_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// # Safety
    ///
    /// `this` must point at a live effect and the caller must own one
    /// reference, which this call consumes.
    pub(crate) unsafe fn release(this: *mut Self) -> u32 {
        let remaining = unsafe { &*this }.ref_count.fetch_sub(1, Ordering::Release) - 1;
        if remaining == 0 {
            fence(Ordering::Acquire);
            unsafe { Self::destroy(this) };
        }
        remaining
    }

    unsafe fn destroy(this: *mut Self) {
        let effect = unsafe { &*this };
        debug!(kind = K::NAME, shader = ?effect.descriptor.id, "effect released");
        effect.release_handles();
        // SAFETY: allocated by `allocate` with the global allocator and
        // `Layout::new::<Self>()`; this is the last reference.
        drop(unsafe { Box::from_raw(this) });
    }

    /// Drop everything the effect holds, auxiliary handles first and the
    /// context last.
    fn release_handles(&self) {
        drop(self.constant_buffer.take());
        drop(self.transform_mapper.take());
        let managers = self.resource_texture_managers.take();
        drop(managers);
        drop(self.render_info.take());
        drop(self.context.take());
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    pub(crate) fn initialize(
        &self,
        context: *mut c_void,
        graph: *mut c_void,
    ) -> Result<(), HResult> {
        let state = self.state.get();
        if state != BindingState::Uninitialized {
            warn!(kind = K::NAME, ?state, "Initialize called twice");
            return Err(E_NOT_VALID_STATE);
        }

        self.state.set(BindingState::Initializing);
        match self.bind_to_graph(context, graph) {
            Ok(context) => {
                drop(self.context.replace(Some(context)));
                self.state.set(BindingState::Bound);
                debug!(kind = K::NAME, shader = ?self.descriptor.id, "effect bound");
                Ok(())
            }
            Err(hr) => {
                self.state.set(BindingState::Uninitialized);
                warn!(kind = K::NAME, %hr, "Initialize failed");
                Err(hr)
            }
        }
    }

    fn bind_to_graph(
        &self,
        context: *mut c_void,
        graph: *mut c_void,
    ) -> Result<ComPtr<ID2D1EffectContext>, HResult> {
        let context =
            unsafe { ComPtr::<ID2D1EffectContext>::from_borrowed(context) }.ok_or(E_POINTER)?;
        let graph =
            unsafe { ComPtr::<ID2D1TransformGraph>::from_borrowed(graph) }.ok_or(E_POINTER)?;

        K::check_support(&context, self.descriptor)?;
        if let Err(hr) = K::load_shader(&context, self.descriptor) {
            // Missing device features show up as invalid bytecode.
            if hr == E_INVALIDARG
                && K::check_support(&context, self.descriptor)
                    == Err(D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES)
            {
                return Err(D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES);
            }
            return Err(hr);
        }

        graph.set_single_transform_node(self.transform_ptr())?;
        Ok(context)
    }

    pub(crate) fn prepare_for_render(&self, change_type: u32) -> Result<(), HResult> {
        let state = self.state.get();
        if state != BindingState::Bound {
            warn!(kind = K::NAME, ?state, "PrepareForRender outside the bound state");
            return Err(E_NOT_VALID_STATE);
        }
        let change = from_raw::<ChangeType>(change_type).ok_or(E_INVALIDARG)?;

        let info = self.render_info.borrow().clone().ok_or(E_NOT_VALID_STATE)?;
        let context = self.context.borrow().clone().ok_or(E_NOT_VALID_STATE)?;
        let constants = self.constant_buffer.borrow().clone();
        if self.descriptor.constant_buffer_size != 0 && constants.is_none() {
            warn!(
                kind = K::NAME,
                expected = self.descriptor.constant_buffer_size,
                "rendering without a constant buffer"
            );
            return Err(E_NOT_VALID_STATE);
        }

        trace!(kind = K::NAME, ?change, "preparing for render");
        self.state.set(BindingState::PreparingRender);
        let result = self.push_render_state(&info, &context, constants.as_deref());
        self.state.set(BindingState::Bound);
        result
    }

    fn push_render_state(
        &self,
        info: &ComPtr<K::Info>,
        context: &ComPtr<ID2D1EffectContext>,
        constants: Option<&[u8]>,
    ) -> Result<(), HResult> {
        if let Some(constants) = constants {
            K::push_constant_buffer(info, constants)?;
        }
        for texture in self.descriptor.resource_textures {
            let manager = self
                .resource_texture_managers
                .borrow()
                .get(texture.index as usize)
                .cloned()
                .flatten();
            let Some(manager) = manager else {
                warn!(index = texture.index, "no resource texture manager set");
                return Err(E_NOT_VALID_STATE);
            };
            manager.initialize(context, texture.dimensions)?;
            let resource = manager.resource_texture()?;
            K::set_resource_texture(info, texture.index, &resource)?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Shared state helpers
    // -----------------------------------------------------------------------

    pub(crate) fn transform_mapper(&self) -> Option<ComPtr<ID2D1TransformMapper>> {
        self.transform_mapper.borrow().clone()
    }

    /// Replace the stored constant buffer wholesale.
    pub(crate) fn replace_constant_buffer(&self, data: &[u8]) -> Result<(), HResult> {
        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(data.len())
            .map_err(|_| E_OUTOFMEMORY)?;
        buffer.extend_from_slice(data);
        drop(self.constant_buffer.replace(Some(buffer)));
        Ok(())
    }

    /// Copy the start of the constant buffer into `out`, returning the
    /// number of bytes written.
    pub(crate) fn read_constant_buffer(&self, out: &mut [u8]) -> usize {
        match self.constant_buffer.borrow().as_deref() {
            Some(stored) => {
                let len = stored.len().min(out.len());
                out[..len].copy_from_slice(&stored[..len]);
                len
            }
            None => 0,
        }
    }

    pub(crate) fn constant_buffer_len(&self) -> usize {
        self.constant_buffer.borrow().as_ref().map_or(0, Vec::len)
    }

    /// Send the stored constant buffer to the bound render info, if any.
    pub(crate) fn push_constant_buffer(&self) -> Result<(), HResult> {
        let info = self.render_info.borrow().clone();
        let constants = self.constant_buffer.borrow().clone();
        match (info, constants) {
            (Some(info), Some(constants)) => K::push_constant_buffer(&info, &constants),
            _ => Ok(()),
        }
    }
}

/// Base address of the effect owning a transform interface pointer.
///
/// # Safety
///
/// `transform` must have been produced by [`Effect::transform_ptr`].
pub(crate) unsafe fn recover_base<K: ShellKind>(transform: *const c_void) -> *mut Effect<K> {
    transform.cast::<u8>().wrapping_sub(POINTER_WIDTH).cast_mut().cast()
}

// ---------------------------------------------------------------------------
// Lifecycle entry points
// ---------------------------------------------------------------------------

unsafe extern "system" fn query_interface<K: ShellKind>(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    unsafe { Effect::<K>::from_lifecycle(this) }.query_interface(riid, out)
}

unsafe extern "system" fn add_ref<K: ShellKind>(this: *mut c_void) -> u32 {
    unsafe { Effect::<K>::from_lifecycle(this) }.add_ref()
}

unsafe extern "system" fn release<K: ShellKind>(this: *mut c_void) -> u32 {
    unsafe { Effect::<K>::release(this.cast()) }
}

unsafe extern "system" fn initialize<K: ShellKind>(
    this: *mut c_void,
    context: *mut c_void,
    graph: *mut c_void,
) -> HResult {
    unsafe { Effect::<K>::from_lifecycle(this) }
        .initialize(context, graph)
        .into_hresult()
}

unsafe extern "system" fn prepare_for_render<K: ShellKind>(
    this: *mut c_void,
    change_type: u32,
) -> HResult {
    unsafe { Effect::<K>::from_lifecycle(this) }
        .prepare_for_render(change_type)
        .into_hresult()
}

unsafe extern "system" fn set_graph<K: ShellKind>(
    _this: *mut c_void,
    _graph: *mut c_void,
) -> HResult {
    warn!(kind = K::NAME, "SetGraph is not supported by single-node effects");
    E_NOTIMPL
}

/// The six lifecycle slots shared by every effect kind.
pub(crate) fn lifecycle_vtbl<K: ShellKind>() -> ID2D1EffectImplVtbl {
    ID2D1EffectImplVtbl {
        base: IUnknownVtbl {
            QueryInterface: query_interface::<K>,
            AddRef: add_ref::<K>,
            Release: release::<K>,
        },
        Initialize: initialize::<K>,
        PrepareForRender: prepare_for_render::<K>,
        SetGraph: set_graph::<K>,
    }
}
