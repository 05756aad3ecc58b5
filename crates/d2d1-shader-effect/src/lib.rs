//! Host compiled HLSL shaders as Direct2D custom effects.
//!
//! A shader type describes itself once through a [`ShaderDescriptor`] and
//! implements [`PixelShader`] or [`ComputeShader`]. This crate supplies the
//! rest: the ABI-compatible effect object behind `ID2D1EffectImpl` and the
//! draw/compute transform, the property bindings the host uses to feed it
//! data, and the registration XML.
//!
//! # Overview
//!
//! - [`EffectRegistration`] builds and registers the effect class.
//! - [`create_pixel_effect`] / [`create_compute_effect`] are the factories
//!   the host calls for each new effect instance.
//! - [`properties`] names the custom properties every effect exposes.
//! - [`thread_group_count`] is the dispatch sizing used by compute effects.
//!
//! # Lifetime
//!
//! Effects are reference counted by the host. Each holds the effect
//! context, render info, transform mapper and resource texture managers it
//! was given and releases them, context last, when its final reference
//! goes away.
//!
//! # Build-time shader compilation
//!
//! Compile shaders to `.cso` in your `build.rs` and embed the result with
//! [`include_bytecode!`].

mod compute;
mod descriptor;
mod pixel;
pub mod properties;
mod registration;
mod shell;
mod transform;
mod update_context;

pub use compute::{create_compute_effect, thread_group_count};
pub use descriptor::{
    ComputeShader, EffectMetadata, InputDescription, OutputBuffer, PixelShader,
    ResourceTextureDescription, ShaderDescriptor, MAX_RESOURCE_TEXTURES,
};
pub use pixel::create_pixel_effect;
pub use registration::EffectRegistration;
