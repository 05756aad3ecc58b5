//! 32-bit status words returned across the ABI boundary.

use std::fmt;

/// A COM `HRESULT`. Zero and positive values are success, negative values are
/// failures.
#[repr(transparent)]
#[derive(Copy, Clone, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

impl HResult {
    /// Build from the unsigned spelling used in SDK headers.
    pub const fn from_u32(value: u32) -> Self {
        Self(value as i32)
    }

    pub const fn is_ok(self) -> bool {
        self.0 >= 0
    }

    pub const fn is_err(self) -> bool {
        self.0 < 0
    }

    /// Convert into a `Result` so callers can use `?` on host calls.
    pub fn ok(self) -> Result<(), HResult> {
        if self.is_ok() {
            Ok(())
        } else {
            Err(self)
        }
    }

    /// Short symbolic name for well-known codes, used in log output.
    pub fn name(self) -> Option<&'static str> {
        Some(match self {
            S_OK => "S_OK",
            S_FALSE => "S_FALSE",
            E_NOTIMPL => "E_NOTIMPL",
            E_NOINTERFACE => "E_NOINTERFACE",
            E_POINTER => "E_POINTER",
            E_FAIL => "E_FAIL",
            E_INVALIDARG => "E_INVALIDARG",
            E_OUTOFMEMORY => "E_OUTOFMEMORY",
            E_BOUNDS => "E_BOUNDS",
            E_NOT_VALID_STATE => "E_NOT_VALID_STATE",
            RO_E_CLOSED => "RO_E_CLOSED",
            D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES => "D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES",
            _ => return None,
        })
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.0 as u32),
            None => write!(f, "0x{:08X}", self.0 as u32),
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl std::error::Error for HResult {}

/// Flatten an internal `Result` into the status word returned to the host.
pub trait IntoHResult {
    fn into_hresult(self) -> HResult;
}

impl IntoHResult for Result<(), HResult> {
    fn into_hresult(self) -> HResult {
        match self {
            Ok(()) => S_OK,
            Err(hr) => hr,
        }
    }
}

pub const S_OK: HResult = HResult(0);
pub const S_FALSE: HResult = HResult(1);
pub const E_NOTIMPL: HResult = HResult::from_u32(0x8000_4001);
pub const E_NOINTERFACE: HResult = HResult::from_u32(0x8000_4002);
pub const E_POINTER: HResult = HResult::from_u32(0x8000_4003);
pub const E_FAIL: HResult = HResult::from_u32(0x8000_4005);
pub const E_BOUNDS: HResult = HResult::from_u32(0x8000_000B);
pub const RO_E_CLOSED: HResult = HResult::from_u32(0x8000_0013);
pub const E_OUTOFMEMORY: HResult = HResult::from_u32(0x8007_000E);
pub const E_INVALIDARG: HResult = HResult::from_u32(0x8007_0057);
/// `HRESULT_FROM_WIN32(ERROR_INVALID_STATE)`.
pub const E_NOT_VALID_STATE: HResult = HResult::from_u32(0x8007_139F);
pub const D2DERR_INSUFFICIENT_DEVICE_CAPABILITIES: HResult = HResult::from_u32(0x8899_0026);
