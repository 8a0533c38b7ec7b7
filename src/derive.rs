//! Derivative generator.
//!
//! For one [`SourceImage`] and one [`RequestConfig`], works out which widths
//! are feasible (no upscaling) and asks the codec for one encode per
//! (width, format) pair.
//!
//! ## Ordering
//!
//! Outputs are width-major, format-minor: `480.webp, 480.avif, 768.webp, …`.
//! The codec runs the whole plan in one call, in parallel, and returns results
//! in plan order, so the output is deterministic regardless of scheduling.
//!
//! ## All-or-nothing
//!
//! A single failed encode fails the whole image. Callers never see a partial
//! output set.

use crate::imaging::{CodecError, EncodeTarget, ImageCodec, feasible_widths, scaled_height};
use crate::resolve::RequestConfig;
use crate::types::{Output, OutputFormat, SourceImage};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("all requested widths exceed the original width of {0}px")]
    AllWidthsExceedOriginal(u32),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Every encoded output for one image, plus the widths they cover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivatives {
    pub outputs: Vec<Output>,
    /// Ascending subset of the requested widths.
    pub feasible_widths: Vec<u32>,
}

impl Derivatives {
    /// Outputs of one format, ascending by width.
    pub fn of_format(&self, format: OutputFormat) -> impl Iterator<Item = &Output> {
        self.outputs.iter().filter(move |o| o.format == format)
    }

    pub fn total_bytes(&self) -> usize {
        self.outputs.iter().map(|o| o.bytes.len()).sum()
    }
}

/// Probe an upload and wrap it as an immutable [`SourceImage`].
pub fn probe_source(
    codec: &impl ImageCodec,
    bytes: Vec<u8>,
    original_name: &str,
) -> Result<SourceImage, CodecError> {
    let dims = codec.probe(&bytes)?;
    Ok(SourceImage {
        bytes,
        intrinsic_width: dims.width,
        intrinsic_height: dims.height,
        original_name: original_name.to_string(),
    })
}

/// Compute the encodes for one image without running them.
///
/// Returns the feasible widths alongside the plan.
pub fn plan_encodes(
    image: &SourceImage,
    config: &RequestConfig,
) -> Result<(Vec<u32>, Vec<EncodeTarget>), GenerateError> {
    let widths = feasible_widths(&config.widths, image.intrinsic_width);
    if widths.is_empty() {
        return Err(GenerateError::AllWidthsExceedOriginal(image.intrinsic_width));
    }

    let original = (image.intrinsic_width, image.intrinsic_height);
    let plan = widths
        .iter()
        .flat_map(|&width| {
            config.formats.iter().map(move |&format| EncodeTarget {
                width,
                height: scaled_height(original, width),
                format,
                quality: config.quality_for(format),
            })
        })
        .collect();
    Ok((widths, plan))
}

/// Generate every derivative for one image.
pub fn generate(
    codec: &impl ImageCodec,
    image: &SourceImage,
    config: &RequestConfig,
) -> Result<Derivatives, GenerateError> {
    let (feasible_widths, plan) = plan_encodes(image, config)?;

    let outputs = plan
        .iter()
        .zip(codec.resize_encode_all(&image.bytes, &plan))
        .map(|(step, encoded)| -> Result<Output, CodecError> {
            let bytes = encoded?;
            tracing::debug!(
                image = %config.base_name,
                width = step.width,
                format = %step.format,
                bytes = bytes.len(),
                "encoded derivative"
            );
            Ok(Output {
                file_name: Output::file_name_for(&config.base_name, step.width, step.format),
                format: step.format,
                width: step.width,
                height: step.height,
                bytes,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Derivatives {
        outputs,
        feasible_widths,
    })
}
