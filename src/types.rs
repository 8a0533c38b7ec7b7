//! Shared types passed between the resolver, generator, composer and
//! orchestrator.
//!
//! Everything here is request-scoped: a request owns its [`SourceImage`]s,
//! the [`Output`]s generated from them and the [`MarkupBundle`]s describing
//! those outputs. Nothing is cached or persisted across requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output encoding for a derivative.
///
/// The derive order is the generation order: WebP before AVIF. Markup
/// sources are emitted in the opposite order (see [`crate::markup`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Webp,
    Avif,
}

impl OutputFormat {
    /// Every format the generator can produce, in generation order.
    pub const ALL: [OutputFormat; 2] = [OutputFormat::Webp, OutputFormat::Avif];

    /// File extension, also used as the request token.
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Webp => "webp",
            OutputFormat::Avif => "avif",
        }
    }

    /// MIME type used in `<source type=...>`.
    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Webp => "image/webp",
            OutputFormat::Avif => "image/avif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    /// Case-insensitive, surrounding whitespace ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webp" => Ok(OutputFormat::Webp),
            "avif" => Ok(OutputFormat::Avif),
            other => Err(other.to_string()),
        }
    }
}

/// An uploaded original, probed once and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub intrinsic_width: u32,
    pub intrinsic_height: u32,
    /// Client-supplied file name, possibly empty.
    pub original_name: String,
}

/// One encoded derivative: a single (width, format) pair of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Output {
    /// `{base}-{width}.{ext}`
    pub file_name: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: Vec<u8>,
}

impl Output {
    pub fn file_name_for(base_name: &str, width: u32, format: OutputFormat) -> String {
        format!("{}-{}.{}", base_name, width, format.extension())
    }
}

/// The two ready-to-paste snippets for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarkupBundle {
    pub img_tag: String,
    pub picture_tag: String,
}
