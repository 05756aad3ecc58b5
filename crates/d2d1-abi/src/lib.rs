//! Binary interface vocabulary for Direct2D custom effects.
//!
//! Everything that crosses the boundary between a Direct2D host and an
//! effect shell lives here: status codes ([`HResult`]), identities
//! ([`Guid`]), rectangles ([`Rect`]), SDK constants ([`ffi`]), vtable
//! layouts ([`interfaces`]) and the [`ComPtr`] handle used to hold host
//! objects. Nothing in this crate knows about a particular shader.

pub mod com;
pub mod ffi;
pub mod guid;
pub mod hresult;
pub mod interfaces;
pub mod logging;
pub mod rect;
pub mod types;

pub use com::{ComPtr, RenderInfo};
pub use guid::Guid;
pub use hresult::{HResult, IntoHResult};
pub use rect::{Rect, RectF};
pub use types::{BufferPrecision, ChangeType, ChannelDepth, InputType, PixelOptions};
