//! Static description of a compiled shader and the traits shader types
//! implement to be hosted as an effect.
//!
//! A [`ShaderDescriptor`] is plain data: everything the shell needs to know
//! about a shader (bytecode, inputs, constant buffer size, auxiliary
//! textures) is fixed when the shader is compiled, so descriptors live in
//! `static`s and the shell only ever holds `&'static` references to them.

use anyhow::{bail, ensure, Result};
use d2d1_abi::ffi::D2D1_INPUT_DESCRIPTION;
use d2d1_abi::hresult::{E_FAIL, E_INVALIDARG};
use d2d1_abi::{BufferPrecision, ChannelDepth, Guid, HResult, InputType, PixelOptions};

/// Number of auxiliary resource texture slots an effect exposes.
pub const MAX_RESOURCE_TEXTURES: usize = 16;

/// Sampling filter and mip count for one shader input.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct InputDescription {
    pub index: u32,
    /// A `D2D1_FILTER` value.
    pub filter: u32,
    pub level_of_detail_count: u32,
}

impl InputDescription {
    pub const fn new(index: u32, filter: u32) -> Self {
        Self {
            index,
            filter,
            level_of_detail_count: 0,
        }
    }

    pub const fn with_level_of_detail_count(self, level_of_detail_count: u32) -> Self {
        Self {
            level_of_detail_count,
            ..self
        }
    }

    pub(crate) fn to_raw(self) -> D2D1_INPUT_DESCRIPTION {
        D2D1_INPUT_DESCRIPTION {
            filter: self.filter,
            levelOfDetailCount: self.level_of_detail_count,
        }
    }
}

/// A resource texture slot the shader reads from.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ResourceTextureDescription {
    /// Slot index, below [`MAX_RESOURCE_TEXTURES`].
    pub index: u32,
    /// 1, 2 or 3.
    pub dimensions: u32,
}

/// Output buffer override applied when the render info is bound.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct OutputBuffer {
    pub precision: BufferPrecision,
    pub depth: ChannelDepth,
}

/// Strings shown by effect browsers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct EffectMetadata {
    /// Empty means "use the Rust type name".
    pub display_name: &'static str,
    pub author: &'static str,
    pub category: &'static str,
    pub description: &'static str,
}

impl EffectMetadata {
    pub const EMPTY: Self = Self {
        display_name: "",
        author: "",
        category: "",
        description: "",
    };
}

/// Everything the effect shell knows about one compiled shader.
///
/// Build descriptors as `static`s, starting from [`ShaderDescriptor::DEFAULT`]:
///
/// ```rust,ignore
/// static BLUR: ShaderDescriptor = ShaderDescriptor {
///     id: Guid::from_u128(0x6b8e2c1d_5a0f_4d6e_9a51_2f3c4b5d6e7f),
///     bytecode: d2d1_shader_effect::include_bytecode!("blur"),
///     input_types: &[1],
///     constant_buffer_size: 16,
///     ..ShaderDescriptor::DEFAULT
/// };
/// ```
#[derive(Debug, Copy, Clone)]
pub struct ShaderDescriptor {
    /// Shader identity; also used as the effect class id on registration.
    pub id: Guid,
    pub bytecode: &'static [u8],
    /// Raw input types, one per input. `0` is simple, `1` is complex;
    /// anything else is rejected when rectangles are negotiated.
    pub input_types: &'static [u32],
    pub input_descriptions: &'static [InputDescription],
    pub resource_textures: &'static [ResourceTextureDescription],
    /// Size of the constant buffer the shader expects. Zero means the shader
    /// has no constants and rendering does not require one to be set.
    pub constant_buffer_size: u32,
    pub output_buffer: Option<OutputBuffer>,
    pub pixel_options: PixelOptions,
    pub requires_double_precision: bool,
    /// `numthreads` of a compute shader. Ignored by pixel shaders.
    pub thread_group_size: [u32; 3],
    pub metadata: EffectMetadata,
}

impl ShaderDescriptor {
    pub const DEFAULT: Self = Self {
        id: Guid::ZERO,
        bytecode: &[],
        input_types: &[],
        input_descriptions: &[],
        resource_textures: &[],
        constant_buffer_size: 0,
        output_buffer: None,
        pixel_options: PixelOptions::None,
        requires_double_precision: false,
        thread_group_size: [1, 1, 1],
        metadata: EffectMetadata::EMPTY,
    };

    pub fn input_count(&self) -> u32 {
        self.input_types.len() as u32
    }

    /// Decode the type of input `index`.
    ///
    /// `E_INVALIDARG` for an index past the declared inputs, `E_FAIL` for a
    /// raw value that is neither simple nor complex.
    pub fn input_type(&self, index: u32) -> Result<InputType, HResult> {
        let raw = *self
            .input_types
            .get(index as usize)
            .ok_or(E_INVALIDARG)?;
        InputType::from_raw(raw).ok_or(E_FAIL)
    }

    pub fn resource_texture(&self, index: u32) -> Option<&ResourceTextureDescription> {
        self.resource_textures.iter().find(|t| t.index == index)
    }

    /// Check the parts of the descriptor the host cannot check for us.
    pub fn validate(&self) -> Result<()> {
        ensure!(!self.bytecode.is_empty(), "shader {:?} has no bytecode", self.id);
        for (index, raw) in self.input_types.iter().enumerate() {
            if InputType::from_raw(*raw).is_none() {
                bail!("input {index} has unknown type {raw}");
            }
        }
        for description in self.input_descriptions {
            ensure!(
                description.index < self.input_count(),
                "input description for input {} but only {} inputs are declared",
                description.index,
                self.input_count()
            );
        }
        let mut seen = [false; MAX_RESOURCE_TEXTURES];
        for texture in self.resource_textures {
            let index = texture.index as usize;
            ensure!(
                index < MAX_RESOURCE_TEXTURES,
                "resource texture index {index} is past the last slot"
            );
            ensure!(!seen[index], "resource texture index {index} declared twice");
            ensure!(
                (1..=3).contains(&texture.dimensions),
                "resource texture {index} has {} dimensions",
                texture.dimensions
            );
            seen[index] = true;
        }
        ensure!(
            self.thread_group_size.iter().all(|&n| n > 0),
            "thread group size {:?} has an empty axis",
            self.thread_group_size
        );
        Ok(())
    }
}

/// A pixel shader that can be hosted as a Direct2D effect.
///
/// Implementors are usually zero-sized marker types generated next to the
/// compiled shader; the shell never instantiates them.
///
/// # Example
///
/// ```rust,ignore
/// struct Invert;
///
/// impl PixelShader for Invert {
///     fn descriptor() -> &'static ShaderDescriptor {
///         &INVERT
///     }
/// }
///
/// let registration = EffectRegistration::for_pixel_shader::<Invert>()?;
/// registration.register(&factory)?;
/// ```
pub trait PixelShader: 'static {
    fn descriptor() -> &'static ShaderDescriptor;
}

/// A compute shader hosted as a Direct2D effect. Same contract as
/// [`PixelShader`]; the descriptor's `thread_group_size` decides dispatch
/// sizes.
pub trait ComputeShader: 'static {
    fn descriptor() -> &'static ShaderDescriptor;
}

/// Embed a compiled shader object (`.cso`) written to `OUT_DIR` by the
/// consumer's `build.rs`.
///
/// Expands to `include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".cso"))`.
#[macro_export]
macro_rules! include_bytecode {
    ($name:literal) => {
        include_bytes!(concat!(env!("OUT_DIR"), "/", $name, ".cso"))
    };
}
