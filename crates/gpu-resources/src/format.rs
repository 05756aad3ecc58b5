//! Texel formats and the element types that map onto them.

use bytemuck::{Pod, Zeroable};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum TexelFormat {
    R8Unorm,
    R32Float,
    R32Uint,
    R32Sint,
    Rg32Float,
    Rgba8Unorm,
    Bgra8Unorm,
    Rgba32Float,
    Rgba32Uint,
}

impl TexelFormat {
    pub const fn bytes_per_texel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R32Float | Self::R32Uint | Self::R32Sint => 4,
            Self::Rgba8Unorm | Self::Bgra8Unorm => 4,
            Self::Rg32Float => 8,
            Self::Rgba32Float | Self::Rgba32Uint => 16,
        }
    }
}

/// An element type that can be stored in a texture.
///
/// `size_of::<Self>()` must equal `FORMAT.bytes_per_texel()`; texture
/// constructors reject types where it does not.
pub trait Texel: Pod {
    const FORMAT: TexelFormat;
}

/// Four 8-bit channels in blue, green, red, alpha order.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(C)]
pub struct Bgra8 {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub a: u8,
}

impl Bgra8 {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { b, g, r, a }
    }
}

macro_rules! texel {
    ($($ty:ty => $format:ident),* $(,)?) => {
        $(impl Texel for $ty {
            const FORMAT: TexelFormat = TexelFormat::$format;
        })*
    };
}

texel! {
    u8 => R8Unorm,
    f32 => R32Float,
    u32 => R32Uint,
    i32 => R32Sint,
    [f32; 2] => Rg32Float,
    [u8; 4] => Rgba8Unorm,
    Bgra8 => Bgra8Unorm,
    [f32; 4] => Rgba32Float,
    [u32; 4] => Rgba32Uint,
}

pub(crate) fn texel_size_matches<T: Texel>() -> bool {
    std::mem::size_of::<T>() == T::FORMAT.bytes_per_texel() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_texels_match_their_format_size() {
        assert!(texel_size_matches::<u8>());
        assert!(texel_size_matches::<f32>());
        assert!(texel_size_matches::<[f32; 2]>());
        assert!(texel_size_matches::<[u8; 4]>());
        assert!(texel_size_matches::<Bgra8>());
        assert!(texel_size_matches::<[f32; 4]>());
        assert!(texel_size_matches::<[u32; 4]>());
    }

    #[test]
    fn bgra_stores_blue_first() {
        let texel = Bgra8::new(1, 2, 3, 4);
        assert_eq!(bytemuck::bytes_of(&texel), &[3, 2, 1, 4]);
    }
}
