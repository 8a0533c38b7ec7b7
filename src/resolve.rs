//! Request configuration resolver.
//!
//! Turns the raw, stringly-typed fields of a request (form fields or CLI flags)
//! into a typed [`RequestConfig`]. The default mode is lenient: malformed input
//! never fails a request, it degrades to a default.
//!
//! | Field | Parsing | Fallback |
//! |---|---|---|
//! | `widths` | comma list, leading-integer parse, positive only, sorted, deduped | default breakpoints |
//! | `formats` | comma list, case-insensitive, `webp`/`avif` only, canonical order | `[webp]` |
//! | `quality_webp` / `quality_avif` | leading-integer parse, clamped to 1–100 | format default |
//! | `basename` | see [`crate::naming::base_name`] | file stem, then `"image"` |
//! | `sizes` | used verbatim | generated from the widths |
//!
//! Defaults are never hidden constants: they arrive as a [`ResolverDefaults`]
//! built from the `[defaults]` config section.
//!
//! [`resolve_strict`] is the opt-in alternative that rejects the first bad
//! token instead of silently dropping it.

use crate::config::DefaultsConfig;
use crate::imaging::Quality;
use crate::naming;
use crate::types::OutputFormat;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ResolveError {
    #[error("invalid width {0:?}: expected a positive integer")]
    InvalidWidth(String),
    #[error("invalid format {0:?}: expected webp or avif")]
    InvalidFormat(String),
    #[error("invalid {field} {value:?}: expected an integer between 1 and 100")]
    InvalidQuality { field: &'static str, value: String },
}

/// Raw request fields exactly as the client sent them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RawParams {
    pub widths: Option<String>,
    pub formats: Option<String>,
    pub quality_webp: Option<String>,
    pub quality_avif: Option<String>,
    pub basename: Option<String>,
    pub sizes: Option<String>,
}

/// Values the resolver falls back to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverDefaults {
    pub breakpoints: Vec<u32>,
    pub formats: Vec<OutputFormat>,
    pub quality_webp: Quality,
    pub quality_avif: Quality,
}

impl Default for ResolverDefaults {
    fn default() -> Self {
        Self::from(&DefaultsConfig::default())
    }
}

impl From<&DefaultsConfig> for ResolverDefaults {
    fn from(config: &DefaultsConfig) -> Self {
        let mut breakpoints = config.breakpoints.clone();
        breakpoints.sort_unstable();
        breakpoints.dedup();
        let mut formats = config.formats.clone();
        formats.sort();
        formats.dedup();
        Self {
            breakpoints,
            formats,
            quality_webp: Quality::new(config.quality_webp),
            quality_avif: Quality::new(config.quality_avif),
        }
    }
}

/// Fully resolved configuration for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestConfig {
    /// Ascending, deduplicated, non-empty.
    pub widths: Vec<u32>,
    /// Canonical order (webp before avif), deduplicated, non-empty.
    pub formats: Vec<OutputFormat>,
    pub quality_webp: Quality,
    pub quality_avif: Quality,
    pub base_name: String,
    pub sizes_attr: String,
}

impl RequestConfig {
    pub fn quality_for(&self, format: OutputFormat) -> Quality {
        match format {
            OutputFormat::Webp => self.quality_webp,
            OutputFormat::Avif => self.quality_avif,
        }
    }

    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }
}

/// JavaScript-style `parseInt`: optional sign, then the longest digit prefix.
///
/// `"480px"` → 480, `" 12.5"` → 12, `"abc"` → None. Values beyond `i64`
/// saturate so that clamping still behaves.
fn parse_leading_int(token: &str) -> Option<i64> {
    let s = token.trim();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }
    let magnitude = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|t| !t.is_empty())
}

fn finish_widths(mut widths: Vec<u32>, defaults: &ResolverDefaults) -> Vec<u32> {
    widths.sort_unstable();
    widths.dedup();
    if widths.is_empty() {
        defaults.breakpoints.clone()
    } else {
        widths
    }
}

fn finish_formats(mut formats: Vec<OutputFormat>, defaults: &ResolverDefaults) -> Vec<OutputFormat> {
    formats.sort();
    formats.dedup();
    if formats.is_empty() {
        if defaults.formats.is_empty() {
            vec![OutputFormat::Webp]
        } else {
            defaults.formats.clone()
        }
    } else {
        formats
    }
}

/// Parse a width list, dropping anything that is not a positive integer.
pub fn parse_widths(raw: Option<&str>, defaults: &ResolverDefaults) -> Vec<u32> {
    let widths = non_blank(raw)
        .map(|raw| {
            split_list(raw)
                .filter_map(parse_leading_int)
                .filter(|&w| w > 0)
                .filter_map(|w| u32::try_from(w).ok())
                .collect()
        })
        .unwrap_or_default();
    finish_widths(widths, defaults)
}

/// Parse a format list, dropping unknown tokens.
pub fn parse_formats(raw: Option<&str>, defaults: &ResolverDefaults) -> Vec<OutputFormat> {
    let formats = non_blank(raw)
        .map(|raw| split_list(raw).filter_map(|t| t.parse().ok()).collect())
        .unwrap_or_default();
    finish_formats(formats, defaults)
}

/// Parse and clamp a quality value; unparseable input yields `default`.
pub fn parse_quality(raw: Option<&str>, default: Quality) -> Quality {
    match non_blank(raw).and_then(parse_leading_int) {
        Some(q) => Quality::new(q.clamp(Quality::MIN as i64, Quality::MAX as i64) as u32),
        None => default,
    }
}

/// The generated `sizes` attribute for an ascending width list.
///
/// `"(max-width: W0px) 100vw, (max-width: W1px) 50vw, WNpx"` where W0 and W1
/// are the two smallest widths (W1 = W0 for a single width) and WN the largest.
pub fn default_sizes_attr(widths: &[u32]) -> String {
    let (Some(&first), Some(&last)) = (widths.first(), widths.last()) else {
        return "100vw".to_string();
    };
    let second = widths.get(1).copied().unwrap_or(first);
    format!("(max-width: {first}px) 100vw, (max-width: {second}px) 50vw, {last}px")
}

/// Lenient resolution: never fails.
pub fn resolve(raw: &RawParams, original_name: &str, defaults: &ResolverDefaults) -> RequestConfig {
    let widths = parse_widths(raw.widths.as_deref(), defaults);
    let sizes_attr = non_blank(raw.sizes.as_deref())
        .map(str::to_string)
        .unwrap_or_else(|| default_sizes_attr(&widths));

    RequestConfig {
        formats: parse_formats(raw.formats.as_deref(), defaults),
        quality_webp: parse_quality(raw.quality_webp.as_deref(), defaults.quality_webp),
        quality_avif: parse_quality(raw.quality_avif.as_deref(), defaults.quality_avif),
        base_name: naming::base_name(raw.basename.as_deref(), original_name),
        sizes_attr,
        widths,
    }
}

fn strict_int(token: &str) -> Option<i64> {
    let t = token.trim();
    t.parse::<i64>().ok()
}

fn strict_quality(field: &'static str, raw: Option<&str>) -> Result<(), ResolveError> {
    match non_blank(raw) {
        None => Ok(()),
        Some(value) => match strict_int(value) {
            Some(q) if (Quality::MIN as i64..=Quality::MAX as i64).contains(&q) => Ok(()),
            _ => Err(ResolveError::InvalidQuality {
                field,
                value: value.to_string(),
            }),
        },
    }
}

/// Strict resolution: the first token lenient mode would drop or clamp is an
/// error. Absent and blank fields still take their defaults.
pub fn resolve_strict(
    raw: &RawParams,
    original_name: &str,
    defaults: &ResolverDefaults,
) -> Result<RequestConfig, ResolveError> {
    if let Some(widths) = non_blank(raw.widths.as_deref()) {
        for token in split_list(widths) {
            match strict_int(token) {
                Some(w) if w > 0 && u32::try_from(w).is_ok() => {}
                _ => return Err(ResolveError::InvalidWidth(token.to_string())),
            }
        }
    }
    if let Some(formats) = non_blank(raw.formats.as_deref()) {
        for token in split_list(formats) {
            token
                .parse::<OutputFormat>()
                .map_err(|_| ResolveError::InvalidFormat(token.to_string()))?;
        }
    }
    strict_quality("quality_webp", raw.quality_webp.as_deref())?;
    strict_quality("quality_avif", raw.quality_avif.as_deref())?;
    Ok(resolve(raw, original_name, defaults))
}
