//! 128-bit interface and class identities.

#![allow(non_upper_case_globals)]

use std::fmt;

/// Binary layout of a Win32 `GUID`.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const ZERO: Guid = Guid::from_u128(0);

    /// Build from the canonical textual order, e.g.
    /// `0xa248fd3f_3e6c_4e63_9f03_7f68ecc91db9`.
    pub const fn from_u128(value: u128) -> Self {
        Self {
            data1: (value >> 96) as u32,
            data2: (value >> 80 & 0xffff) as u16,
            data3: (value >> 64 & 0xffff) as u16,
            data4: (value as u64).to_be_bytes(),
        }
    }

    pub const fn to_u128(self) -> u128 {
        ((self.data1 as u128) << 96)
            | ((self.data2 as u128) << 80)
            | ((self.data3 as u128) << 64)
            | u64::from_be_bytes(self.data4) as u128
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d4 = &self.data4;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            d4[0],
            d4[1],
            d4[2],
            d4[3],
            d4[4],
            d4[5],
            d4[6],
            d4[7],
        )
    }
}

/// Braced registry form, the one used inside registration XML.
impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{self:?}}}")
    }
}

// =====================================================================
// Interface identities
// =====================================================================

pub const IID_IUnknown: Guid = Guid::from_u128(0x00000000_0000_0000_c000_000000000046);

// Lifecycle family.
pub const IID_ID2D1EffectImpl: Guid = Guid::from_u128(0xa248fd3f_3e6c_4e63_9f03_7f68ecc91db9);

// Transform family.
pub const IID_ID2D1TransformNode: Guid =
    Guid::from_u128(0xb2efe1e7_729f_4102_949f_505fa21bf666);
pub const IID_ID2D1Transform: Guid = Guid::from_u128(0xef1a287d_342a_4f76_8fdb_da0d6ea9f92b);
pub const IID_ID2D1DrawTransform: Guid =
    Guid::from_u128(0x36bfdcb6_9739_435d_a30d_a653beff6a6f);
pub const IID_ID2D1ComputeTransform: Guid =
    Guid::from_u128(0x0d85573c_01e3_4f7d_bfd9_0d60608bf3c3);

// Host-side interfaces.
pub const IID_ID2D1EffectContext: Guid =
    Guid::from_u128(0x3d9f916b_27dc_4ad7_b4f1_64945340f563);
pub const IID_ID2D1TransformGraph: Guid =
    Guid::from_u128(0x13d29038_c3e6_4034_9081_13b53a417992);
pub const IID_ID2D1RenderInfo: Guid = Guid::from_u128(0x519ae1bd_d19a_420d_b849_364f594776b7);
pub const IID_ID2D1DrawInfo: Guid = Guid::from_u128(0x693ce632_7f2f_45de_93fe_18d88b37aa21);
pub const IID_ID2D1ComputeInfo: Guid = Guid::from_u128(0x5598b14b_9fd7_48b7_9bdb_8f0964eb38bc);
pub const IID_ID2D1ResourceTexture: Guid =
    Guid::from_u128(0x688d15c3_02b0_438d_b13a_d1b44c32c39a);
pub const IID_ID2D1Factory1: Guid = Guid::from_u128(0xbb12d362_daee_4b9a_aa1d_14ba401cfa1f);

// Library-defined extension interfaces.
pub const IID_ID2D1TransformMapper: Guid =
    Guid::from_u128(0x02e6d48d_b892_4fbc_aa54_119203bab802);
pub const IID_ID2D1DrawInfoUpdateContext: Guid =
    Guid::from_u128(0x430c5b40_ae16_485f_90e6_4fa4915144b6);
pub const IID_ID2D1ResourceTextureManager: Guid =
    Guid::from_u128(0x3c4fc7e4_a419_46ca_b5f6_66eb4ff18d64);
pub const IID_ID2D1ResourceTextureManagerInternal: Guid =
    Guid::from_u128(0x5cbb1024_8ea1_4689_81bf_8ad190b5ef5d);
