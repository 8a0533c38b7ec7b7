//! Codec capability: probing plus resize/re-encode, pure Rust apart from libwebp.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Probe** | `image::ImageReader::into_dimensions` |
//! | **Resize → WebP** | Lanczos3 + `webp` (lossy, quality-controlled) |
//! | **Resize → AVIF** | Lanczos3 + rav1e encoder |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for width/height math (unit testable)
//! - **Parameters**: Data structures describing one encode
//! - **Backend**: [`ImageCodec`] trait + [`RustCodec`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{CodecError, Dimensions, DynCodec, ImageCodec};
pub use calculations::{feasible_widths, scaled_height};
pub use params::{EncodeParams, EncodeTarget, Quality};
pub use rust_backend::{RustCodec, supported_input_extensions};
