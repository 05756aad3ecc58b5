mod common;

use std::ffi::c_void;
use std::ptr;

use common::*;
use d2d1_abi::guid::*;
use d2d1_abi::hresult::*;
use d2d1_abi::Guid;
use d2d1_shader_effect::{
    create_compute_effect, create_pixel_effect, ComputeShader, EffectRegistration, PixelShader,
    ResourceTextureDescription, ShaderDescriptor,
};
use proptest::prelude::*;

struct Passthrough;

static PASSTHROUGH: ShaderDescriptor = ShaderDescriptor {
    id: Guid::from_u128(0x7a3c9e21_4b5d_4f60_8a71_92b3c4d5e6f7),
    bytecode: &[0x44, 0x58, 0x42, 0x43, 0x01],
    input_types: &[0],
    constant_buffer_size: 8,
    resource_textures: &[ResourceTextureDescription {
        index: 3,
        dimensions: 1,
    }],
    ..ShaderDescriptor::DEFAULT
};

impl PixelShader for Passthrough {
    fn descriptor() -> &'static ShaderDescriptor {
        &PASSTHROUGH
    }
}

struct Histogram;

static HISTOGRAM: ShaderDescriptor = ShaderDescriptor {
    id: Guid::from_u128(0x0c1d2e3f_4a5b_4c6d_8e7f_8091a2b3c4d5),
    bytecode: &[0x44, 0x58, 0x42, 0x43, 0x02],
    input_types: &[0],
    thread_group_size: [16, 16, 1],
    ..ShaderDescriptor::DEFAULT
};

impl ComputeShader for Histogram {
    fn descriptor() -> &'static ShaderDescriptor {
        &HISTOGRAM
    }
}

fn query(object: *mut c_void, iid: &Guid) -> (HResult, *mut c_void) {
    let table = unsafe { vtbl::<d2d1_abi::interfaces::IUnknownVtbl>(object) };
    let mut out = ptr::null_mut();
    let hr = unsafe { (table.QueryInterface)(object, iid, &mut out) };
    (hr, out)
}

fn release(object: *mut c_void) -> u32 {
    let table = unsafe { vtbl::<d2d1_abi::interfaces::IUnknownVtbl>(object) };
    unsafe { (table.Release)(object) }
}

#[test]
fn transform_identity_leads_back_to_the_base() {
    init_logging();
    let effect = HostedEffect::create(create_pixel_effect::<Passthrough>, &IID_ID2D1DrawTransform);
    assert_ne!(effect.transform, effect.lifecycle);

    for iid in [IID_ID2D1TransformNode, IID_ID2D1Transform, IID_ID2D1DrawTransform] {
        let (hr, transform) = query(effect.lifecycle, &iid);
        assert_eq!(hr, S_OK);
        assert_eq!(transform, effect.transform);

        let (hr, base) = query(transform, &IID_ID2D1EffectImpl);
        assert_eq!(hr, S_OK);
        assert_eq!(base, effect.lifecycle);
        let (hr, unknown) = query(transform, &IID_IUnknown);
        assert_eq!(hr, S_OK);
        assert_eq!(unknown, effect.lifecycle);

        release(unknown);
        release(base);
        release(transform);
    }
    assert_eq!(effect.release(), 0);
}

#[test]
fn pixel_effects_do_not_claim_the_compute_transform() {
    let effect = HostedEffect::create(create_pixel_effect::<Passthrough>, &IID_ID2D1DrawTransform);
    let (hr, out) = query(effect.transform, &IID_ID2D1ComputeTransform);
    assert_eq!(hr, E_NOINTERFACE);
    assert!(out.is_null());

    let table = effect.lifecycle();
    assert_eq!(
        unsafe { (table.base.QueryInterface)(effect.lifecycle, &IID_IUnknown, ptr::null_mut()) },
        E_POINTER
    );
    assert_eq!(effect.release(), 0);
}

#[test]
fn compute_effects_answer_to_the_compute_transform() {
    let effect =
        HostedEffect::create(create_compute_effect::<Histogram>, &IID_ID2D1ComputeTransform);
    let (hr, out) = query(effect.lifecycle, &IID_ID2D1DrawTransform);
    assert_eq!(hr, E_NOINTERFACE);
    assert!(out.is_null());
    assert_eq!(unsafe { (effect.transform().base.GetInputCount)(effect.transform) }, 1);
    assert_eq!(effect.release(), 0);
}

#[test]
fn set_graph_is_not_supported() {
    let effect = HostedEffect::create(create_pixel_effect::<Passthrough>, &IID_ID2D1DrawTransform);
    let graph = graph();
    assert_eq!(unsafe { (effect.lifecycle().SetGraph)(effect.lifecycle, graph.raw()) }, E_NOTIMPL);
    assert_eq!(graph.refs(), 1);
    assert_eq!(effect.release(), 0);
}

#[test]
fn final_release_lets_go_of_every_host_object() {
    init_logging();
    let registration = EffectRegistration::for_pixel_shader::<Passthrough>().unwrap();
    let bindings = registration.bindings();
    let effect = HostedEffect::create(registration.factory(), &IID_ID2D1DrawTransform);

    let context = context();
    let graph = graph();
    let info = draw_info();
    let mapper = transform_mapper(Default::default(), Default::default(), Default::default());
    let manager = resource_texture_manager();

    assert_eq!(effect.initialize(context, graph), S_OK);
    assert_eq!(effect.set_draw_info(info), S_OK);
    assert_eq!(set_interface_property(&bindings[1], effect.lifecycle, mapper.raw()), S_OK);
    assert_eq!(set_interface_property(&bindings[2], effect.lifecycle, manager.raw()), S_OK);

    assert_eq!(graph.state.node.get(), effect.transform);
    assert_eq!(graph.refs(), 1);
    assert!(context.refs() > 1);
    assert!(info.refs() > 1);
    assert!(mapper.refs() > 1);
    assert!(manager.refs() > 1);

    assert_eq!(effect.release(), 0);
    assert_eq!(context.refs(), 1);
    assert_eq!(info.refs(), 1);
    assert_eq!(mapper.refs(), 1);
    assert_eq!(manager.refs(), 1);
}

proptest! {
    #[test]
    fn balanced_references_free_only_on_the_last_release(
        n in 1u32..32,
        through_transform in any::<bool>(),
    ) {
        let context = context();
        let graph = graph();
        let effect =
            HostedEffect::create(create_pixel_effect::<Passthrough>, &IID_ID2D1DrawTransform);
        prop_assert_eq!(effect.initialize(context, graph), S_OK);
        let held = context.refs();

        let target = if through_transform { effect.transform } else { effect.lifecycle };
        let table = unsafe { vtbl::<d2d1_abi::interfaces::IUnknownVtbl>(target) };
        for i in 0..n {
            prop_assert_eq!(unsafe { (table.AddRef)(target) }, i + 2);
        }
        for i in (0..n).rev() {
            prop_assert_eq!(unsafe { (table.Release)(target) }, i + 1);
            // Still alive, still holding the context.
            prop_assert_eq!(context.refs(), held);
        }
        prop_assert_eq!(effect.release(), 0);
        prop_assert_eq!(context.refs(), 1);
    }
}
