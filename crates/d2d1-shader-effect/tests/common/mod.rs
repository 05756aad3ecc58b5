//! A scripted Direct2D host built from the same `#[repr(C)]` vtables the
//! effects use.
//!
//! Host objects are leaked for the life of the test binary so their
//! reference counts stay readable after an effect lets go of them. Every
//! object starts with one reference, owned by the test.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::ffi::c_void;
use std::mem::size_of;
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};

use d2d1_abi::ffi::*;
use d2d1_abi::guid::*;
use d2d1_abi::hresult::*;
use d2d1_abi::interfaces::*;
use d2d1_abi::{Guid, HResult, Rect};

pub fn init_logging() {
    let filter = d2d1_abi::logging::env_filter()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// The vtable behind any interface pointer.
///
/// # Safety
///
/// `object` must be a live object whose vtable has layout `V`.
pub unsafe fn vtbl<'a, V>(object: *mut c_void) -> &'a V {
    unsafe { &*(*(object as *const *const V)) }
}

// ---------------------------------------------------------------------------
// Shared object layout
// ---------------------------------------------------------------------------

#[repr(C)]
pub struct Mock<S: 'static> {
    vtbl: *const c_void,
    iids: &'static [Guid],
    refs: AtomicU32,
    pub state: S,
}

impl<S: 'static> Mock<S> {
    fn leak<V>(vtbl: &'static V, iids: &'static [Guid], state: S) -> &'static Self {
        Box::leak(Box::new(Self {
            vtbl: (vtbl as *const V).cast(),
            iids,
            refs: AtomicU32::new(1),
            state,
        }))
    }

    pub fn raw(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    pub fn refs(&self) -> u32 {
        self.refs.load(Ordering::SeqCst)
    }
}

unsafe fn mock<'a, S: 'static>(this: *mut c_void) -> &'a Mock<S> {
    unsafe { &*this.cast::<Mock<S>>() }
}

unsafe extern "system" fn query_interface<S: 'static>(
    this: *mut c_void,
    riid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    let object = unsafe { mock::<S>(this) };
    let riid = unsafe { &*riid };
    if *riid == IID_IUnknown || object.iids.contains(riid) {
        object.refs.fetch_add(1, Ordering::SeqCst);
        unsafe { *out = this };
        S_OK
    } else {
        unsafe { *out = ptr::null_mut() };
        E_NOINTERFACE
    }
}

unsafe extern "system" fn add_ref<S: 'static>(this: *mut c_void) -> u32 {
    unsafe { mock::<S>(this) }.refs.fetch_add(1, Ordering::SeqCst) + 1
}

unsafe extern "system" fn release<S: 'static>(this: *mut c_void) -> u32 {
    let previous = unsafe { mock::<S>(this) }.refs.fetch_sub(1, Ordering::SeqCst);
    assert!(previous > 0, "host object over-released");
    previous - 1
}

const fn unknown<S: 'static>() -> IUnknownVtbl {
    IUnknownVtbl {
        QueryInterface: query_interface::<S>,
        AddRef: add_ref::<S>,
        Release: release::<S>,
    }
}

// ---------------------------------------------------------------------------
// ID2D1EffectContext
// ---------------------------------------------------------------------------

pub struct ContextState {
    pub doubles: Cell<bool>,
    pub compute: Cell<bool>,
    pub load_result: Cell<HResult>,
    /// Report both features missing once a load has been attempted.
    pub features_lost_on_load: Cell<bool>,
    /// Shader id and bytecode length of every load.
    pub loaded: RefCell<Vec<(Guid, usize)>>,
}

pub type MockContext = Mock<ContextState>;

static CONTEXT_VTBL: ID2D1EffectContextVtbl = ID2D1EffectContextVtbl {
    base: unknown::<ContextState>(),
    GetDpi: get_dpi,
    CreateEffect: None,
    GetMaximumSupportedFeatureLevel: maximum_feature_level,
    CreateTransformNodeFromEffect: None,
    CreateBlendTransform: None,
    CreateBorderTransform: None,
    CreateOffsetTransform: None,
    CreateBoundsAdjustmentTransform: None,
    LoadPixelShader: load_shader,
    LoadVertexShader: None,
    LoadComputeShader: load_shader,
    IsShaderLoaded: is_shader_loaded,
    CreateResourceTexture: create_resource_texture,
    FindResourceTexture: find_resource_texture,
    CreateVertexBuffer: None,
    FindVertexBuffer: None,
    CreateColorContext: None,
    CreateColorContextFromFilename: None,
    CreateColorContextFromWicColorContext: None,
    CheckFeatureSupport: check_feature_support,
    IsBufferPrecisionSupported: is_buffer_precision_supported,
};

/// A context for a device with doubles and compute shaders that accepts
/// any bytecode.
pub fn context() -> &'static MockContext {
    Mock::leak(
        &CONTEXT_VTBL,
        &[IID_ID2D1EffectContext],
        ContextState {
            doubles: Cell::new(true),
            compute: Cell::new(true),
            load_result: Cell::new(S_OK),
            features_lost_on_load: Cell::new(false),
            loaded: RefCell::default(),
        },
    )
}

unsafe extern "system" fn get_dpi(_this: *mut c_void, dpi_x: *mut f32, dpi_y: *mut f32) {
    unsafe {
        *dpi_x = 96.0;
        *dpi_y = 96.0;
    }
}

unsafe extern "system" fn maximum_feature_level(
    _this: *mut c_void,
    _levels: *const u32,
    _count: u32,
    _maximum: *mut u32,
) -> HResult {
    E_NOTIMPL
}

unsafe extern "system" fn load_shader(
    this: *mut c_void,
    shader_id: *const Guid,
    _bytecode: *const u8,
    bytecode_count: u32,
) -> HResult {
    let state = &unsafe { mock::<ContextState>(this) }.state;
    state
        .loaded
        .borrow_mut()
        .push((unsafe { *shader_id }, bytecode_count as usize));
    if state.features_lost_on_load.get() {
        state.doubles.set(false);
        state.compute.set(false);
    }
    state.load_result.get()
}

unsafe extern "system" fn is_shader_loaded(this: *mut c_void, shader_id: *const Guid) -> BOOL {
    let state = &unsafe { mock::<ContextState>(this) }.state;
    let id = unsafe { *shader_id };
    if state.loaded.borrow().iter().any(|(loaded, _)| *loaded == id) {
        TRUE
    } else {
        FALSE
    }
}

unsafe extern "system" fn create_resource_texture(
    _this: *mut c_void,
    _resource_id: *const Guid,
    _properties: *const D2D1_RESOURCE_TEXTURE_PROPERTIES,
    _data: *const u8,
    _strides: *const u32,
    _data_size: u32,
    _texture: *mut *mut c_void,
) -> HResult {
    E_NOTIMPL
}

unsafe extern "system" fn find_resource_texture(
    _this: *mut c_void,
    _resource_id: *const Guid,
    _texture: *mut *mut c_void,
) -> HResult {
    E_NOTIMPL
}

unsafe extern "system" fn check_feature_support(
    this: *mut c_void,
    feature: u32,
    data: *mut c_void,
    data_size: u32,
) -> HResult {
    if data_size as usize != size_of::<BOOL>() {
        return E_INVALIDARG;
    }
    let state = &unsafe { mock::<ContextState>(this) }.state;
    let supported = match feature {
        D2D1_FEATURE_DOUBLES => state.doubles.get(),
        D2D1_FEATURE_D3D10_X_HARDWARE_OPTIONS => state.compute.get(),
        _ => return E_INVALIDARG,
    };
    unsafe { *data.cast::<BOOL>() = if supported { TRUE } else { FALSE } };
    S_OK
}

unsafe extern "system" fn is_buffer_precision_supported(
    _this: *mut c_void,
    _precision: u32,
) -> BOOL {
    TRUE
}

// ---------------------------------------------------------------------------
// ID2D1TransformGraph
// ---------------------------------------------------------------------------

pub struct GraphState {
    pub node: Cell<*mut c_void>,
}

pub type MockGraph = Mock<GraphState>;

static GRAPH_VTBL: ID2D1TransformGraphVtbl = ID2D1TransformGraphVtbl {
    base: unknown::<GraphState>(),
    GetInputCount: graph_input_count,
    SetSingleTransformNode: set_single_transform_node,
    AddNode: None,
    RemoveNode: None,
    SetOutputNode: None,
    ConnectNode: None,
    ConnectToEffectInput: None,
    Clear: None,
    SetPassthroughGraph: None,
};

pub fn graph() -> &'static MockGraph {
    Mock::leak(
        &GRAPH_VTBL,
        &[IID_ID2D1TransformGraph],
        GraphState {
            node: Cell::new(ptr::null_mut()),
        },
    )
}

unsafe extern "system" fn graph_input_count(_this: *mut c_void) -> u32 {
    0
}

unsafe extern "system" fn set_single_transform_node(
    this: *mut c_void,
    node: *mut c_void,
) -> HResult {
    unsafe { mock::<GraphState>(this) }.state.node.set(node);
    S_OK
}

// ---------------------------------------------------------------------------
// ID2D1DrawInfo / ID2D1ComputeInfo
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RenderInfoState {
    pub shader: Cell<Option<Guid>>,
    pub pixel_options: Cell<Option<u32>>,
    pub constant_buffers: RefCell<Vec<Vec<u8>>>,
    pub input_descriptions: RefCell<Vec<(u32, D2D1_INPUT_DESCRIPTION)>>,
    pub output_buffer: Cell<Option<(u32, u32)>>,
    pub textures: RefCell<Vec<(u32, *mut c_void)>>,
}

pub type MockRenderInfo = Mock<RenderInfoState>;

const fn render_info_vtbl() -> ID2D1RenderInfoVtbl {
    ID2D1RenderInfoVtbl {
        base: unknown::<RenderInfoState>(),
        SetInputDescription: set_input_description,
        SetOutputBuffer: set_output_buffer,
        SetCached: set_cached,
        SetInstructionCountHint: set_instruction_count_hint,
    }
}

static DRAW_INFO_VTBL: ID2D1DrawInfoVtbl = ID2D1DrawInfoVtbl {
    base: render_info_vtbl(),
    SetPixelShaderConstantBuffer: set_constant_buffer,
    SetResourceTexture: set_resource_texture,
    SetVertexShaderConstantBuffer: None,
    SetPixelShader: set_pixel_shader,
    SetVertexProcessing: None,
};

static COMPUTE_INFO_VTBL: ID2D1ComputeInfoVtbl = ID2D1ComputeInfoVtbl {
    base: render_info_vtbl(),
    SetComputeShaderConstantBuffer: set_constant_buffer,
    SetComputeShader: set_compute_shader,
    SetResourceTexture: set_resource_texture,
};

pub fn draw_info() -> &'static MockRenderInfo {
    Mock::leak(
        &DRAW_INFO_VTBL,
        &[IID_ID2D1RenderInfo, IID_ID2D1DrawInfo],
        RenderInfoState::default(),
    )
}

pub fn compute_info() -> &'static MockRenderInfo {
    Mock::leak(
        &COMPUTE_INFO_VTBL,
        &[IID_ID2D1RenderInfo, IID_ID2D1ComputeInfo],
        RenderInfoState::default(),
    )
}

fn render_info_state<'a>(this: *mut c_void) -> &'a RenderInfoState {
    &unsafe { mock::<RenderInfoState>(this) }.state
}

unsafe extern "system" fn set_input_description(
    this: *mut c_void,
    input_index: u32,
    description: D2D1_INPUT_DESCRIPTION,
) -> HResult {
    render_info_state(this)
        .input_descriptions
        .borrow_mut()
        .push((input_index, description));
    S_OK
}

unsafe extern "system" fn set_output_buffer(
    this: *mut c_void,
    precision: u32,
    depth: u32,
) -> HResult {
    render_info_state(this).output_buffer.set(Some((precision, depth)));
    S_OK
}

unsafe extern "system" fn set_cached(_this: *mut c_void, _is_cached: BOOL) {}

unsafe extern "system" fn set_instruction_count_hint(_this: *mut c_void, _count: u32) {}

unsafe extern "system" fn set_constant_buffer(
    this: *mut c_void,
    buffer: *const u8,
    count: u32,
) -> HResult {
    let data = match count {
        0 => Vec::new(),
        count => unsafe { slice::from_raw_parts(buffer, count as usize) }.to_vec(),
    };
    render_info_state(this).constant_buffers.borrow_mut().push(data);
    S_OK
}

unsafe extern "system" fn set_resource_texture(
    this: *mut c_void,
    texture_index: u32,
    texture: *mut c_void,
) -> HResult {
    render_info_state(this)
        .textures
        .borrow_mut()
        .push((texture_index, texture));
    S_OK
}

unsafe extern "system" fn set_pixel_shader(
    this: *mut c_void,
    shader_id: *const Guid,
    options: u32,
) -> HResult {
    let state = render_info_state(this);
    state.shader.set(Some(unsafe { *shader_id }));
    state.pixel_options.set(Some(options));
    S_OK
}

unsafe extern "system" fn set_compute_shader(this: *mut c_void, shader_id: *const Guid) -> HResult {
    render_info_state(this).shader.set(Some(unsafe { *shader_id }));
    S_OK
}

// ---------------------------------------------------------------------------
// ID2D1TransformMapper
// ---------------------------------------------------------------------------

pub struct MapperState {
    pub output: Cell<Rect>,
    pub input: Cell<Rect>,
    pub invalid: Cell<Rect>,
    /// Written through the update context on every forward mapping.
    pub constants: RefCell<Option<Vec<u8>>>,
    /// Last update context seen, retained past the call.
    pub update_context: Cell<*mut c_void>,
    pub calls: Cell<u32>,
}

pub type MockMapper = Mock<MapperState>;

static MAPPER_VTBL: ID2D1TransformMapperVtbl = ID2D1TransformMapperVtbl {
    base: unknown::<MapperState>(),
    MapInputsToOutput: map_inputs_to_output,
    MapOutputToInputs: map_output_to_inputs,
    MapInvalidOutput: map_invalid_output,
};

pub fn transform_mapper(output: Rect, input: Rect, invalid: Rect) -> &'static MockMapper {
    Mock::leak(
        &MAPPER_VTBL,
        &[IID_ID2D1TransformMapper],
        MapperState {
            output: Cell::new(output),
            input: Cell::new(input),
            invalid: Cell::new(invalid),
            constants: RefCell::new(None),
            update_context: Cell::new(ptr::null_mut()),
            calls: Cell::new(0),
        },
    )
}

unsafe extern "system" fn map_inputs_to_output(
    this: *mut c_void,
    update_context: *mut c_void,
    _inputs: *const Rect,
    _opaque_inputs: *const Rect,
    _count: u32,
    output: *mut Rect,
    opaque_output: *mut Rect,
) -> HResult {
    let state = &unsafe { mock::<MapperState>(this) }.state;
    state.calls.set(state.calls.get() + 1);

    if !update_context.is_null() {
        let table = unsafe { vtbl::<ID2D1DrawInfoUpdateContextVtbl>(update_context) };
        if let Some(data) = state.constants.borrow().as_ref() {
            let hr = unsafe {
                (table.SetConstantBuffer)(update_context, data.as_ptr(), data.len() as u32)
            };
            if hr.is_err() {
                return hr;
            }
        }
        unsafe { (table.base.AddRef)(update_context) };
        let previous = state.update_context.replace(update_context);
        if !previous.is_null() {
            unsafe { (table.base.Release)(previous) };
        }
    }

    unsafe {
        *output = state.output.get();
        *opaque_output = Rect::EMPTY;
    }
    S_OK
}

unsafe extern "system" fn map_output_to_inputs(
    this: *mut c_void,
    _output: *const Rect,
    inputs: *mut Rect,
    count: u32,
) -> HResult {
    let state = &unsafe { mock::<MapperState>(this) }.state;
    state.calls.set(state.calls.get() + 1);
    if count > 0 {
        unsafe { slice::from_raw_parts_mut(inputs, count as usize) }.fill(state.input.get());
    }
    S_OK
}

unsafe extern "system" fn map_invalid_output(
    this: *mut c_void,
    _input_index: u32,
    _invalid_input: Rect,
    invalid_output: *mut Rect,
) -> HResult {
    let state = &unsafe { mock::<MapperState>(this) }.state;
    state.calls.set(state.calls.get() + 1);
    unsafe { *invalid_output = state.invalid.get() };
    S_OK
}

// ---------------------------------------------------------------------------
// Resource textures and their managers
// ---------------------------------------------------------------------------

pub type MockTexture = Mock<()>;

static TEXTURE_VTBL: ID2D1ResourceTextureVtbl = ID2D1ResourceTextureVtbl {
    base: unknown::<()>(),
    Update: None,
};

pub struct ManagerState {
    pub texture: &'static MockTexture,
    /// Context and dimension count of every `Initialize`.
    pub initialized: RefCell<Vec<(*mut c_void, u32)>>,
}

pub type MockManager = Mock<ManagerState>;

static MANAGER_VTBL: ID2D1ResourceTextureManagerInternalVtbl =
    ID2D1ResourceTextureManagerInternalVtbl {
        base: unknown::<ManagerState>(),
        Initialize: manager_initialize,
        GetResourceTexture: manager_resource_texture,
    };

/// A manager answering to both the public and the internal interface.
pub fn resource_texture_manager() -> &'static MockManager {
    let texture = Mock::leak(&TEXTURE_VTBL, &[IID_ID2D1ResourceTexture], ());
    Mock::leak(
        &MANAGER_VTBL,
        &[IID_ID2D1ResourceTextureManager, IID_ID2D1ResourceTextureManagerInternal],
        ManagerState {
            texture,
            initialized: RefCell::default(),
        },
    )
}

unsafe extern "system" fn manager_initialize(
    this: *mut c_void,
    effect_context: *mut c_void,
    dimensions: u32,
) -> HResult {
    unsafe { mock::<ManagerState>(this) }
        .state
        .initialized
        .borrow_mut()
        .push((effect_context, dimensions));
    S_OK
}

unsafe extern "system" fn manager_resource_texture(
    this: *mut c_void,
    out: *mut *mut c_void,
) -> HResult {
    let texture = unsafe { mock::<ManagerState>(this) }.state.texture;
    texture.refs.fetch_add(1, Ordering::SeqCst);
    unsafe { *out = texture.raw() };
    S_OK
}

// ---------------------------------------------------------------------------
// ID2D1Factory1
// ---------------------------------------------------------------------------

pub struct Registered {
    pub class_id: Guid,
    pub xml: String,
    pub properties: Vec<String>,
    pub bindings: Vec<D2D1_PROPERTY_BINDING>,
    pub factory: PD2D1_EFFECT_FACTORY,
}

#[derive(Default)]
pub struct FactoryState {
    pub registered: RefCell<Option<Registered>>,
    pub unregistered: RefCell<Vec<Guid>>,
}

pub type MockFactory = Mock<FactoryState>;

static FACTORY_VTBL: ID2D1Factory1Vtbl = ID2D1Factory1Vtbl {
    base: unknown::<FactoryState>(),
    factory: [None; 14],
    CreateDevice: None,
    CreateStrokeStyle1: None,
    CreatePathGeometry1: None,
    CreateDrawingStateBlock1: None,
    CreateGdiMetafile: None,
    RegisterEffectFromStream: None,
    RegisterEffectFromString: register_effect_from_string,
    UnregisterEffect: unregister_effect,
    GetRegisteredEffects: None,
    GetEffectProperties: None,
};

pub fn factory() -> &'static MockFactory {
    Mock::leak(&FACTORY_VTBL, &[IID_ID2D1Factory1], FactoryState::default())
}

unsafe fn read_wide(text: *const u16) -> String {
    let mut len = 0;
    while unsafe { *text.add(len) } != 0 {
        len += 1;
    }
    String::from_utf16_lossy(unsafe { slice::from_raw_parts(text, len) })
}

unsafe extern "system" fn register_effect_from_string(
    this: *mut c_void,
    class_id: *const Guid,
    property_xml: *const u16,
    bindings: *const D2D1_PROPERTY_BINDING,
    bindings_count: u32,
    effect_factory: PD2D1_EFFECT_FACTORY,
) -> HResult {
    let bindings = match bindings_count {
        0 => Vec::new(),
        count => unsafe { slice::from_raw_parts(bindings, count as usize) }.to_vec(),
    };
    let properties = bindings
        .iter()
        .map(|binding| unsafe { read_wide(binding.propertyName) })
        .collect();
    let registered = Registered {
        class_id: unsafe { *class_id },
        xml: unsafe { read_wide(property_xml) },
        properties,
        bindings,
        factory: effect_factory,
    };
    *unsafe { mock::<FactoryState>(this) }.state.registered.borrow_mut() = Some(registered);
    S_OK
}

unsafe extern "system" fn unregister_effect(this: *mut c_void, class_id: *const Guid) -> HResult {
    unsafe { mock::<FactoryState>(this) }
        .state
        .unregistered
        .borrow_mut()
        .push(unsafe { *class_id });
    S_OK
}

// ---------------------------------------------------------------------------
// Driving an effect
// ---------------------------------------------------------------------------

/// An effect created through its factory, seen from the host side.
pub struct HostedEffect {
    pub lifecycle: *mut c_void,
    pub transform: *mut c_void,
}

impl HostedEffect {
    /// Create an effect and look up its transform pointer. The host owns
    /// exactly the one reference returned by the factory.
    pub fn create(factory: PD2D1_EFFECT_FACTORY, transform_iid: &Guid) -> Self {
        let mut lifecycle = ptr::null_mut();
        assert_eq!(unsafe { factory(&mut lifecycle) }, S_OK);
        assert!(!lifecycle.is_null());

        let mut transform = ptr::null_mut();
        let table = unsafe { vtbl::<ID2D1EffectImplVtbl>(lifecycle) };
        assert_eq!(
            unsafe { (table.base.QueryInterface)(lifecycle, transform_iid, &mut transform) },
            S_OK
        );
        unsafe { (table.base.Release)(lifecycle) };
        Self { lifecycle, transform }
    }

    pub fn lifecycle(&self) -> &ID2D1EffectImplVtbl {
        unsafe { vtbl(self.lifecycle) }
    }

    pub fn transform(&self) -> &ID2D1TransformVtbl {
        unsafe { vtbl(self.transform) }
    }

    pub fn draw_transform(&self) -> &ID2D1DrawTransformVtbl {
        unsafe { vtbl(self.transform) }
    }

    pub fn compute_transform(&self) -> &ID2D1ComputeTransformVtbl {
        unsafe { vtbl(self.transform) }
    }

    pub fn initialize(&self, context: &MockContext, graph: &MockGraph) -> HResult {
        unsafe { (self.lifecycle().Initialize)(self.lifecycle, context.raw(), graph.raw()) }
    }

    pub fn prepare_for_render(&self) -> HResult {
        unsafe { (self.lifecycle().PrepareForRender)(self.lifecycle, D2D1_CHANGE_TYPE_PROPERTIES) }
    }

    pub fn set_draw_info(&self, info: &MockRenderInfo) -> HResult {
        unsafe { (self.draw_transform().SetDrawInfo)(self.transform, info.raw()) }
    }

    pub fn set_compute_info(&self, info: &MockRenderInfo) -> HResult {
        unsafe { (self.compute_transform().SetComputeInfo)(self.transform, info.raw()) }
    }

    pub fn add_ref(&self) -> u32 {
        unsafe { (self.lifecycle().base.AddRef)(self.lifecycle) }
    }

    pub fn release(&self) -> u32 {
        unsafe { (self.lifecycle().base.Release)(self.lifecycle) }
    }
}

/// Pass an interface pointer through a property setter, the way the host
/// forwards `IUnknown`-typed property values.
pub fn set_interface_property(
    binding: &D2D1_PROPERTY_BINDING,
    effect: *mut c_void,
    value: *mut c_void,
) -> HResult {
    let set = binding.setFunction.expect("binding has a setter");
    let bytes = (value as usize).to_ne_bytes();
    unsafe { set(effect, bytes.as_ptr(), bytes.len() as u32) }
}

/// Read an interface-typed property. The returned pointer carries a
/// reference the caller must release.
pub fn get_interface_property(
    binding: &D2D1_PROPERTY_BINDING,
    effect: *mut c_void,
) -> (HResult, *mut c_void) {
    let get = binding.getFunction.expect("binding has a getter");
    let mut bytes = [0u8; size_of::<usize>()];
    let mut actual = 0;
    let hr = unsafe { get(effect, bytes.as_mut_ptr(), bytes.len() as u32, &mut actual) };
    (hr, usize::from_ne_bytes(bytes) as *mut c_void)
}
