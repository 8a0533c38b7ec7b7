//! Batch orchestrator.
//!
//! Runs probe → generate → compose for every upload in a batch under one
//! shared configuration. Each image ends in an [`ImageOutcome`]: either
//! processed, or skipped with a [`SkipReason`]. Outcomes are folded into a
//! [`BatchReport`] by an explicit collection step, so one image's failure can
//! never unwind the others.
//!
//! A batch succeeds when at least one image was processed. If none were,
//! [`BatchError::NoImagesProcessable`] is returned after every image has been
//! attempted.
//!
//! ## Per-image configuration
//!
//! Widths, formats and qualities are shared. Two fields are per image:
//! - the base name comes from the image's own file name (deduplicated across
//!   the batch, see [`naming::dedupe_base_names`]);
//! - the `sizes` attribute is regenerated from the image's feasible widths.
//!   Batch requests do not accept a `sizes` override.

use crate::derive::{self, Derivatives, GenerateError};
use crate::imaging::{CodecError, ImageCodec};
use crate::markup::{self, ImageMarkup};
use crate::naming;
use crate::resolve::{RequestConfig, default_sizes_attr};
use crate::types::{MarkupBundle, Output};
use rayon::prelude::*;
use thiserror::Error;

/// One upload in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchInput {
    pub bytes: Vec<u8>,
    pub original_name: String,
}

/// Why an image was left out of a batch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    #[error("unreadable image metadata: {0}")]
    UnreadableMetadata(String),
    #[error("all requested widths exceed the original width of {0}px")]
    AllWidthsExceedOriginal(u32),
    #[error("encoding failed: {0}")]
    EncodingFailure(String),
}

impl From<GenerateError> for SkipReason {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::AllWidthsExceedOriginal(w) => SkipReason::AllWidthsExceedOriginal(w),
            GenerateError::Codec(CodecError::Metadata(m)) => SkipReason::UnreadableMetadata(m),
            GenerateError::Codec(CodecError::Encode(m)) => SkipReason::EncodingFailure(m),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessedImage {
    pub original_name: String,
    pub config: RequestConfig,
    pub derivatives: Derivatives,
    pub markup: MarkupBundle,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedImage {
    pub original_name: String,
    pub reason: SkipReason,
}

/// Result of one image in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Processed(Box<ProcessedImage>),
    Skipped(SkippedImage),
}

#[derive(Error, Debug)]
pub enum BatchError {
    #[error("none of the {} submitted images could be processed", skipped.len())]
    NoImagesProcessable { skipped: Vec<SkippedImage> },
}

/// Everything a successful batch produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    /// Shared configuration; `base_name` and `sizes_attr` are not meaningful here.
    pub config: RequestConfig,
    pub processed: Vec<ProcessedImage>,
    pub skipped: Vec<SkippedImage>,
}

impl BatchReport {
    /// All outputs across processed images, in submission order.
    pub fn outputs(&self) -> impl Iterator<Item = &Output> {
        self.processed
            .iter()
            .flat_map(|image| image.derivatives.outputs.iter())
    }

    /// The combined `snippets.html` document.
    pub fn document(&self) -> String {
        let images: Vec<ImageMarkup> = self
            .processed
            .iter()
            .map(|image| ImageMarkup {
                base_name: image.config.base_name.clone(),
                original_name: image.original_name.clone(),
                bundle: image.markup.clone(),
            })
            .collect();
        let skipped: Vec<(String, String)> = self
            .skipped
            .iter()
            .map(|s| (s.original_name.clone(), s.reason.to_string()))
            .collect();
        markup::batch_document(&images, &skipped, &self.config.widths, &self.config.formats)
    }
}

/// Run one image through the pipeline. Never fails: errors become a skip.
pub fn process_one(
    codec: &impl ImageCodec,
    input: BatchInput,
    base_name: String,
    shared: &RequestConfig,
) -> ImageOutcome {
    let original_name = input.original_name.clone();
    let skip = |reason: SkipReason| {
        tracing::warn!(image = %original_name, %reason, "skipping image");
        ImageOutcome::Skipped(SkippedImage {
            original_name: original_name.clone(),
            reason,
        })
    };

    let source = match derive::probe_source(codec, input.bytes, &input.original_name) {
        Ok(source) => source,
        Err(err) => return skip(GenerateError::from(err).into()),
    };

    let mut config = RequestConfig {
        base_name,
        ..shared.clone()
    };
    let derivatives = match derive::generate(codec, &source, &config) {
        Ok(d) => d,
        Err(err) => return skip(err.into()),
    };
    config.sizes_attr = default_sizes_attr(&derivatives.feasible_widths);
    let markup = markup::compose(&derivatives, &config);

    tracing::info!(
        image = %original_name,
        base = %config.base_name,
        outputs = derivatives.outputs.len(),
        "processed image"
    );
    ImageOutcome::Processed(Box::new(ProcessedImage {
        original_name: original_name.clone(),
        config,
        derivatives,
        markup,
    }))
}

/// Process every input independently and collect the outcomes.
pub fn run_batch(
    codec: &impl ImageCodec,
    inputs: Vec<BatchInput>,
    shared: &RequestConfig,
) -> Result<BatchReport, BatchError> {
    let names: Vec<String> = inputs
        .iter()
        .map(|input| naming::base_name(None, &input.original_name))
        .collect();
    let names = naming::dedupe_base_names(&names);

    let outcomes: Vec<ImageOutcome> = inputs
        .into_par_iter()
        .zip(names.into_par_iter())
        .map(|(input, name)| process_one(codec, input, name, shared))
        .collect();

    collect_outcomes(outcomes, shared)
}

/// Fold per-image outcomes into a report, or fail if nothing was processed.
pub fn collect_outcomes(
    outcomes: Vec<ImageOutcome>,
    shared: &RequestConfig,
) -> Result<BatchReport, BatchError> {
    let mut processed = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            ImageOutcome::Processed(image) => processed.push(*image),
            ImageOutcome::Skipped(skip) => skipped.push(skip),
        }
    }

    if processed.is_empty() {
        return Err(BatchError::NoImagesProcessable { skipped });
    }
    Ok(BatchReport {
        config: shared.clone(),
        processed,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::{MockCodec, fake_image};
    use crate::resolve::{RawParams, ResolverDefaults, resolve};
    use crate::types::OutputFormat;

    fn shared(widths: &str, formats: &str) -> RequestConfig {
        resolve(
            &RawParams {
                widths: Some(widths.into()),
                formats: Some(formats.into()),
                ..RawParams::default()
            },
            "",
            &ResolverDefaults::default(),
        )
    }

    fn input(name: &str, bytes: Vec<u8>) -> BatchInput {
        BatchInput {
            bytes,
            original_name: name.into(),
        }
    }

    #[test]
    fn one_unreadable_image_is_skipped() {
        let codec = MockCodec::new();
        let inputs = vec![
            input("a.jpg", fake_image(1600, 900)),
            input("broken.jpg", b"garbage".to_vec()),
            input("c.png", fake_image(2000, 2000)),
        ];
        let report = run_batch(&codec, inputs, &shared("480,768,1200", "webp")).unwrap();

        assert_eq!(report.processed.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].original_name, "broken.jpg");
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::UnreadableMetadata(_)
        ));
        let names: Vec<&str> = report.outputs().map(|o| o.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "a-480.webp", "a-768.webp", "a-1200.webp",
                "c-480.webp", "c-768.webp", "c-1200.webp",
            ]
        );
    }

    #[test]
    fn all_failing_is_no_images_processable() {
        let codec = MockCodec::new();
        let inputs = vec![
            input("a.jpg", b"nope".to_vec()),
            input("tiny.jpg", fake_image(100, 100)),
        ];
        let result = run_batch(&codec, inputs, &shared("480", "webp"));

        match result {
            Err(BatchError::NoImagesProcessable { skipped }) => {
                assert_eq!(skipped.len(), 2);
                assert_eq!(skipped[1].reason, SkipReason::AllWidthsExceedOriginal(100));
            }
            other => panic!("expected NoImagesProcessable, got {other:?}"),
        }
        assert!(codec.encodes().is_empty());
    }

    #[test]
    fn codec_failure_skips_only_that_image() {
        // Only the 1600px image reaches width 1200, so only it fails.
        let codec = MockCodec::failing_on(1200, OutputFormat::Webp);
        let inputs = vec![
            input("big.jpg", fake_image(1600, 900)),
            input("small.jpg", fake_image(800, 600)),
        ];
        let report = run_batch(&codec, inputs, &shared("480,1200", "webp")).unwrap();

        assert_eq!(report.processed.len(), 1);
        assert_eq!(report.processed[0].original_name, "small.jpg");
        assert!(matches!(
            report.skipped[0].reason,
            SkipReason::EncodingFailure(_)
        ));
    }

    #[test]
    fn sizes_derived_from_each_images_feasible_widths() {
        let codec = MockCodec::new();
        let inputs = vec![
            input("big.jpg", fake_image(2000, 1000)),
            input("small.jpg", fake_image(800, 600)),
        ];
        let report = run_batch(&codec, inputs, &shared("480,768,1200", "webp")).unwrap();

        assert_eq!(
            report.processed[0].config.sizes_attr,
            "(max-width: 480px) 100vw, (max-width: 768px) 50vw, 1200px"
        );
        assert_eq!(
            report.processed[1].config.sizes_attr,
            "(max-width: 480px) 100vw, (max-width: 768px) 50vw, 768px"
        );
        assert!(report.processed[1].markup.img_tag.contains("768px\""));
    }

    #[test]
    fn duplicate_file_names_get_unique_bases() {
        let codec = MockCodec::new();
        let inputs = vec![
            input("photo.jpg", fake_image(1000, 1000)),
            input("photo.png", fake_image(1000, 1000)),
        ];
        let report = run_batch(&codec, inputs, &shared("480", "webp")).unwrap();
        let names: Vec<&str> = report.outputs().map(|o| o.file_name.as_str()).collect();
        assert_eq!(names, vec!["photo-480.webp", "photo-2-480.webp"]);
    }

    #[test]
    fn document_lists_processed_and_skipped() {
        let codec = MockCodec::new();
        let inputs = vec![
            input("a.jpg", fake_image(1600, 900)),
            input("b.jpg", b"garbage".to_vec()),
        ];
        let report = run_batch(&codec, inputs, &shared("480,768", "webp,avif")).unwrap();
        let doc = report.document();

        assert!(doc.contains("<!-- Images: 1 -->"));
        assert!(doc.contains("<!-- Widths: 480, 768 -->"));
        assert!(doc.contains("<!-- Formats: webp, avif -->"));
        assert!(doc.contains("<!-- Skipped: b.jpg"));
        assert!(doc.contains("<picture>"));
    }

    #[test]
    fn collect_outcomes_preserves_order() {
        let cfg = shared("480", "webp");
        let outcomes = vec![
            ImageOutcome::Skipped(SkippedImage {
                original_name: "x".into(),
                reason: SkipReason::EncodingFailure("boom".into()),
            }),
            ImageOutcome::Skipped(SkippedImage {
                original_name: "y".into(),
                reason: SkipReason::AllWidthsExceedOriginal(10),
            }),
        ];
        match collect_outcomes(outcomes, &cfg) {
            Err(BatchError::NoImagesProcessable { skipped }) => {
                let names: Vec<&str> = skipped.iter().map(|s| s.original_name.as_str()).collect();
                assert_eq!(names, vec!["x", "y"]);
            }
            Ok(_) => panic!("expected failure"),
        }
    }
}
