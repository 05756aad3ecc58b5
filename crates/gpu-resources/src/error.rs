use thiserror::Error;

use crate::format::TexelFormat;
use crate::resource::ResourceKind;

/// Everything a resource or device operation can fail with.
///
/// Validation errors are raised before any native call is made, so a failed
/// operation never leaves a resource half-written.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GpuError {
    #[error("argument `{name}` is out of range: {detail}")]
    ArgumentOutOfRange { name: &'static str, detail: String },

    #[error("{object} has been disposed")]
    ObjectDisposed { object: &'static str },

    #[error("resource belongs to device {expected} but device {found} was supplied")]
    DeviceMismatch { expected: u64, found: u64 },

    #[error("device {device} was lost: {reason}")]
    DeviceLost { device: u64, reason: String },

    #[error("texel format {format:?} cannot back a {kind:?} texture")]
    UnsupportedTextureType { format: TexelFormat, kind: ResourceKind },

    #[error("descriptor pool exhausted ({capacity} slots)")]
    OutOfDescriptors { capacity: u32 },

    #[error("native call `{call}` failed: {message}")]
    Native { call: &'static str, message: String },
}

impl GpuError {
    pub(crate) fn out_of_range(name: &'static str, detail: impl Into<String>) -> Self {
        Self::ArgumentOutOfRange {
            name,
            detail: detail.into(),
        }
    }

    pub(crate) fn native(call: &'static str, message: impl Into<String>) -> Self {
        Self::Native {
            call,
            message: message.into(),
        }
    }
}

pub type Result<T, E = GpuError> = std::result::Result<T, E>;
