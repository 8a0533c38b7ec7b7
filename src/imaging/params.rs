//! Parameter types for codec operations.
//!
//! These structs describe *what* to encode, not *how*. They are the interface
//! between the [derivative generator](crate::derive), which decides which
//! derivatives an image needs, and the [codec](super::backend), which does the
//! pixel work. Keeping them separate lets tests swap in a recording mock.
//!
//! - [`Quality`]: lossy encoding quality, clamped to 1–100 on construction.
//! - [`EncodeTarget`]: one derivative to produce: target box, format, quality.
//! - [`EncodeParams`]: an [`EncodeTarget`] bound to the source bytes.

use crate::types::OutputFormat;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Quality(u32);

impl Quality {
    pub const MIN: u32 = 1;
    pub const MAX: u32 = 100;

    pub fn new(value: u32) -> Self {
        Self(value.clamp(Self::MIN, Self::MAX))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

/// One derivative of a source, independent of the source bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeTarget {
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}

impl EncodeTarget {
    pub fn with_source(self, source: &[u8]) -> EncodeParams<'_> {
        EncodeParams {
            source,
            width: self.width,
            height: self.height,
            format: self.format,
            quality: self.quality,
        }
    }
}

/// A single resize + re-encode of an in-memory source.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeParams<'a> {
    pub source: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
}
