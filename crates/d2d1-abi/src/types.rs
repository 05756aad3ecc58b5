//! Typed views over the raw `u32` enums that cross the boundary.
//!
//! The host hands these over as plain integers; decode with
//! [`num_traits::FromPrimitive`] and reject anything unknown.

use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::{FromPrimitive, ToPrimitive};

use crate::ffi::*;

/// `D2D1_CHANGE_TYPE`, the reason passed to `PrepareForRender`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum ChangeType {
    None = D2D1_CHANGE_TYPE_NONE as isize,
    Properties = D2D1_CHANGE_TYPE_PROPERTIES as isize,
    Context = D2D1_CHANGE_TYPE_CONTEXT as isize,
    Graph = D2D1_CHANGE_TYPE_GRAPH as isize,
}

/// `D2D1_BUFFER_PRECISION`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, FromPrimitive, ToPrimitive)]
pub enum BufferPrecision {
    #[default]
    Unknown = D2D1_BUFFER_PRECISION_UNKNOWN as isize,
    Unorm8 = D2D1_BUFFER_PRECISION_8BPC_UNORM as isize,
    Unorm8Srgb = D2D1_BUFFER_PRECISION_8BPC_UNORM_SRGB as isize,
    Unorm16 = D2D1_BUFFER_PRECISION_16BPC_UNORM as isize,
    Float16 = D2D1_BUFFER_PRECISION_16BPC_FLOAT as isize,
    Float32 = D2D1_BUFFER_PRECISION_32BPC_FLOAT as isize,
}

/// `D2D1_CHANNEL_DEPTH`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, FromPrimitive, ToPrimitive)]
pub enum ChannelDepth {
    #[default]
    Default = D2D1_CHANNEL_DEPTH_DEFAULT as isize,
    One = D2D1_CHANNEL_DEPTH_1 as isize,
    Four = D2D1_CHANNEL_DEPTH_4 as isize,
}

/// `D2D1_PIXEL_OPTIONS`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, FromPrimitive, ToPrimitive)]
pub enum PixelOptions {
    #[default]
    None = D2D1_PIXEL_OPTIONS_NONE as isize,
    TrivialSampling = D2D1_PIXEL_OPTIONS_TRIVIAL_SAMPLING as isize,
}

/// How a shader input samples its source, which decides how rectangles
/// propagate through it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum InputType {
    /// Reads only the pixel at the output coordinate.
    Simple = 0,
    /// Samples arbitrary positions of the input.
    Complex = 1,
}

impl InputType {
    /// Decode a raw input type, `None` for values outside the two known kinds.
    pub fn from_raw(raw: u32) -> Option<Self> {
        Self::from_u32(raw)
    }

    pub fn to_raw(self) -> u32 {
        self.to_u32().unwrap_or_default()
    }
}

/// Pack a typed enum back into the `u32` the host expects.
pub fn to_raw<T: ToPrimitive>(value: T) -> u32 {
    value.to_u32().unwrap_or_default()
}

/// Decode a raw `u32`, `None` when the host passed an unknown value.
pub fn from_raw<T: FromPrimitive>(raw: u32) -> Option<T> {
    T::from_u32(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_values_are_rejected() {
        assert_eq!(InputType::from_raw(0), Some(InputType::Simple));
        assert_eq!(InputType::from_raw(1), Some(InputType::Complex));
        assert_eq!(InputType::from_raw(7), None);
        assert_eq!(from_raw::<ChannelDepth>(2), None);
        assert_eq!(from_raw::<ChangeType>(D2D1_CHANGE_TYPE_GRAPH), Some(ChangeType::Graph));
    }

    #[test]
    fn raw_round_trip_keeps_sdk_values() {
        assert_eq!(to_raw(BufferPrecision::Float32), D2D1_BUFFER_PRECISION_32BPC_FLOAT);
        assert_eq!(to_raw(ChannelDepth::Four), 4);
        assert_eq!(to_raw(PixelOptions::TrivialSampling), 1);
    }
}
