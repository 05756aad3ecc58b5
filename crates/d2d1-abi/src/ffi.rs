//! Hardcoded Direct2D effect-author constants and C-repr structs.
//!
//! These replace the `d2d1effectauthor.h` / `d2d1_1.h` bindings a Windows
//! bindings crate would provide, so the shell builds (and is testable) on any
//! target. Values are sourced from the Windows SDK headers.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]

use std::ffi::c_void;

use crate::hresult::HResult;

/// Win32 `BOOL`.
pub type BOOL = i32;
pub const TRUE: BOOL = 1;
pub const FALSE: BOOL = 0;

// =====================================================================
// D2D1_CHANGE_TYPE (PrepareForRender)
// =====================================================================
pub const D2D1_CHANGE_TYPE_NONE: u32 = 0;
pub const D2D1_CHANGE_TYPE_PROPERTIES: u32 = 1;
pub const D2D1_CHANGE_TYPE_CONTEXT: u32 = 2;
pub const D2D1_CHANGE_TYPE_GRAPH: u32 = 3;

// =====================================================================
// D2D1_FEATURE (CheckFeatureSupport)
// =====================================================================
pub const D2D1_FEATURE_DOUBLES: u32 = 0;
pub const D2D1_FEATURE_D3D10_X_HARDWARE_OPTIONS: u32 = 1;

// =====================================================================
// D2D1_BUFFER_PRECISION
// =====================================================================
pub const D2D1_BUFFER_PRECISION_UNKNOWN: u32 = 0;
pub const D2D1_BUFFER_PRECISION_8BPC_UNORM: u32 = 1;
pub const D2D1_BUFFER_PRECISION_8BPC_UNORM_SRGB: u32 = 2;
pub const D2D1_BUFFER_PRECISION_16BPC_UNORM: u32 = 3;
pub const D2D1_BUFFER_PRECISION_16BPC_FLOAT: u32 = 4;
pub const D2D1_BUFFER_PRECISION_32BPC_FLOAT: u32 = 5;

// =====================================================================
// D2D1_CHANNEL_DEPTH
// =====================================================================
pub const D2D1_CHANNEL_DEPTH_DEFAULT: u32 = 0;
pub const D2D1_CHANNEL_DEPTH_1: u32 = 1;
pub const D2D1_CHANNEL_DEPTH_4: u32 = 4;

// =====================================================================
// D2D1_PIXEL_OPTIONS
// =====================================================================
pub const D2D1_PIXEL_OPTIONS_NONE: u32 = 0;
pub const D2D1_PIXEL_OPTIONS_TRIVIAL_SAMPLING: u32 = 1;

// =====================================================================
// D2D1_FILTER (subset used by input descriptions)
// =====================================================================
pub const D2D1_FILTER_MIN_MAG_MIP_POINT: u32 = 0x00;
pub const D2D1_FILTER_MIN_MAG_POINT_MIP_LINEAR: u32 = 0x01;
pub const D2D1_FILTER_MIN_POINT_MAG_LINEAR_MIP_POINT: u32 = 0x04;
pub const D2D1_FILTER_MIN_POINT_MAG_MIP_LINEAR: u32 = 0x05;
pub const D2D1_FILTER_MIN_LINEAR_MAG_MIP_POINT: u32 = 0x10;
pub const D2D1_FILTER_MIN_LINEAR_MAG_POINT_MIP_LINEAR: u32 = 0x11;
pub const D2D1_FILTER_MIN_MAG_LINEAR_MIP_POINT: u32 = 0x14;
pub const D2D1_FILTER_MIN_MAG_MIP_LINEAR: u32 = 0x15;
pub const D2D1_FILTER_ANISOTROPIC: u32 = 0x55;

// =====================================================================
// D2D1_EXTEND_MODE (resource textures)
// =====================================================================
pub const D2D1_EXTEND_MODE_CLAMP: u32 = 0;
pub const D2D1_EXTEND_MODE_WRAP: u32 = 1;
pub const D2D1_EXTEND_MODE_MIRROR: u32 = 2;

// =====================================================================
// D3D_FEATURE_LEVEL
// =====================================================================
pub const D3D_FEATURE_LEVEL_9_1: u32 = 0x9100;
pub const D3D_FEATURE_LEVEL_10_0: u32 = 0xa000;
pub const D3D_FEATURE_LEVEL_11_0: u32 = 0xb000;

// =====================================================================
// C-repr structs matching the SDK
// =====================================================================

/// `D2D1_INPUT_DESCRIPTION`, passed to `ID2D1RenderInfo::SetInputDescription`.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct D2D1_INPUT_DESCRIPTION {
    pub filter: u32,
    pub levelOfDetailCount: u32,
}

/// `D2D1_FEATURE_DATA_DOUBLES`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct D2D1_FEATURE_DATA_DOUBLES {
    pub doublePrecisionFloatShaderOps: BOOL,
}

/// `D2D1_FEATURE_DATA_D3D10_X_HARDWARE_OPTIONS`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Default)]
pub struct D2D1_FEATURE_DATA_D3D10_X_HARDWARE_OPTIONS {
    pub computeShaders_Plus_RawAndStructuredBuffers_Via_Shader_4_x: BOOL,
}

/// `D2D1_RESOURCE_TEXTURE_PROPERTIES`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct D2D1_RESOURCE_TEXTURE_PROPERTIES {
    pub extents: *const u32,
    pub dimensions: u32,
    pub bufferPrecision: u32,
    pub channelDepth: u32,
    pub filter: u32,
    pub extendModes: *const u32,
}

/// Setter shape for `D2D1_PROPERTY_BINDING`: `(effect, data, dataSize)`.
pub type PD2D1_PROPERTY_SET_FUNCTION =
    unsafe extern "system" fn(effect: *mut c_void, data: *const u8, dataSize: u32) -> HResult;

/// Getter shape for `D2D1_PROPERTY_BINDING`: `(effect, data, dataSize, actualSize)`.
pub type PD2D1_PROPERTY_GET_FUNCTION = unsafe extern "system" fn(
    effect: *const c_void,
    data: *mut u8,
    dataSize: u32,
    actualSize: *mut u32,
) -> HResult;

/// `D2D1_PROPERTY_BINDING`, one entry per custom property passed to
/// `ID2D1Factory1::RegisterEffectFromString`.
#[repr(C)]
#[derive(Debug, Copy, Clone)]
pub struct D2D1_PROPERTY_BINDING {
    pub propertyName: *const u16,
    pub setFunction: Option<PD2D1_PROPERTY_SET_FUNCTION>,
    pub getFunction: Option<PD2D1_PROPERTY_GET_FUNCTION>,
}

/// Factory shape expected by `RegisterEffectFromString`.
pub type PD2D1_EFFECT_FACTORY = unsafe extern "system" fn(effectImpl: *mut *mut c_void) -> HResult;
