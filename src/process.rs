//! Request flows: one upload, or a batch of uploads, in; one zip archive out.
//!
//! Both the HTTP handlers and the CLI call into this module. It owns input
//! validation (missing files, size and count limits, strict-mode parameter
//! checks), which always happens before any codec work, and maps the lower
//! layers' errors onto the boundary error set in [`ProcessError`].
//!
//! ## Single image
//!
//! ```text
//! upload + fields → resolve → probe → generate → compose → zip
//!                                                          ├── {base}-{w}.{ext} …
//!                                                          └── snippet.html
//! ```
//!
//! Any failure aborts the request; no partial archive is produced.
//!
//! ## Batch
//!
//! Fields are resolved once and shared. `basename` and `sizes` are ignored:
//! each image takes its base name from its own file name and gets a `sizes`
//! attribute derived from its own feasible widths. Images that fail are
//! skipped (see [`crate::batch`]); the request fails only when none succeed.

use crate::archive::{self, ArchiveError};
use crate::batch::{self, BatchError, BatchInput, SkippedImage};
use crate::config::ServiceConfig;
use crate::derive::{self, Derivatives, GenerateError};
use crate::imaging::{CodecError, ImageCodec, RustCodec};
use crate::markup;
use crate::resolve::{RawParams, RequestConfig, ResolveError, ResolverDefaults, resolve, resolve_strict};
use crate::types::{Output, OutputFormat};
use serde::Serialize;
use thiserror::Error;

/// Archive name for a batch request.
pub const BATCH_ARCHIVE_NAME: &str = "responsive-images.zip";

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("no image was provided")]
    MissingInput,
    #[error("{name} is {size} bytes; the per-file limit is {max} bytes")]
    FileTooLarge { name: String, size: usize, max: usize },
    #[error("{count} images submitted; the limit is {max}")]
    TooManyImages { count: usize, max: usize },
    #[error("{0}")]
    InvalidParameter(#[from] ResolveError),
    #[error("unreadable image metadata: {0}")]
    UnreadableMetadata(String),
    #[error("all requested widths exceed the original width of {0}px")]
    AllWidthsExceedOriginal(u32),
    #[error("encoding failed: {0}")]
    EncodingFailure(String),
    #[error("none of the {} submitted images could be processed", skipped.len())]
    NoImagesProcessable { skipped: Vec<SkippedImage> },
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),
}

impl From<CodecError> for ProcessError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Metadata(m) => ProcessError::UnreadableMetadata(m),
            CodecError::Encode(m) => ProcessError::EncodingFailure(m),
        }
    }
}

impl From<GenerateError> for ProcessError {
    fn from(err: GenerateError) -> Self {
        match err {
            GenerateError::AllWidthsExceedOriginal(w) => ProcessError::AllWidthsExceedOriginal(w),
            GenerateError::Codec(e) => e.into(),
        }
    }
}

impl From<BatchError> for ProcessError {
    fn from(err: BatchError) -> Self {
        match err {
            BatchError::NoImagesProcessable { skipped } => {
                ProcessError::NoImagesProcessable { skipped }
            }
        }
    }
}

/// One uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    /// Client-supplied file name, possibly empty.
    pub name: String,
    pub bytes: Vec<u8>,
}

/// Request-independent settings for the flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessSettings {
    pub defaults: ResolverDefaults,
    pub strict: bool,
    pub max_upload_bytes: usize,
    pub max_batch_images: usize,
    pub include_manifest: bool,
}

impl ProcessSettings {
    pub fn from_service_config(config: &ServiceConfig) -> Self {
        Self {
            defaults: ResolverDefaults::from(&config.defaults),
            strict: config.defaults.strict,
            max_upload_bytes: config.limits.max_upload_bytes,
            max_batch_images: config.limits.max_batch_images,
            include_manifest: config.archive.include_manifest,
        }
    }

    fn resolve(&self, raw: &RawParams, original_name: &str) -> Result<RequestConfig, ResolveError> {
        if self.strict {
            resolve_strict(raw, original_name, &self.defaults)
        } else {
            Ok(resolve(raw, original_name, &self.defaults))
        }
    }

    fn check_size(&self, upload: &Upload) -> Result<(), ProcessError> {
        if upload.bytes.len() > self.max_upload_bytes {
            return Err(ProcessError::FileTooLarge {
                name: upload.name.clone(),
                size: upload.bytes.len(),
                max: self.max_upload_bytes,
            });
        }
        Ok(())
    }
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self::from_service_config(&ServiceConfig::default())
    }
}

/// Size and shape of one archived derivative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputInfo {
    pub file_name: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub size: usize,
}

impl From<&Output> for OutputInfo {
    fn from(output: &Output) -> Self {
        Self {
            file_name: output.file_name.clone(),
            format: output.format,
            width: output.width,
            height: output.height,
            size: output.bytes.len(),
        }
    }
}

/// What was generated for one image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReport {
    pub original_name: String,
    pub base_name: String,
    pub feasible_widths: Vec<u32>,
    pub outputs: Vec<OutputInfo>,
}

impl ImageReport {
    fn new(original_name: &str, base_name: &str, derivatives: &Derivatives) -> Self {
        Self {
            original_name: original_name.to_string(),
            base_name: base_name.to_string(),
            feasible_widths: derivatives.feasible_widths.clone(),
            outputs: derivatives.outputs.iter().map(OutputInfo::from).collect(),
        }
    }
}

/// A finished request: the archive plus a summary of its contents.
#[derive(Debug, Clone)]
pub struct Package {
    /// Suggested download name.
    pub file_name: String,
    pub archive: Vec<u8>,
    /// The snippet document also stored inside the archive.
    pub document: String,
    pub images: Vec<ImageReport>,
    pub skipped: Vec<SkippedImage>,
}

/// Process one upload with the production codec.
pub fn process_single(
    upload: Option<Upload>,
    raw: &RawParams,
    settings: &ProcessSettings,
) -> Result<Package, ProcessError> {
    process_single_with_codec(&RustCodec::new(), upload, raw, settings)
}

/// Process one upload using a specific codec (allows testing with mock).
pub fn process_single_with_codec(
    codec: &impl ImageCodec,
    upload: Option<Upload>,
    raw: &RawParams,
    settings: &ProcessSettings,
) -> Result<Package, ProcessError> {
    let upload = upload
        .filter(|u| !u.bytes.is_empty())
        .ok_or(ProcessError::MissingInput)?;
    settings.check_size(&upload)?;
    let config = settings.resolve(raw, &upload.name)?;

    let source = derive::probe_source(codec, upload.bytes, &upload.name)?;
    let derivatives = derive::generate(codec, &source, &config)?;
    let bundle = markup::compose(&derivatives, &config);
    let document = markup::single_document(&derivatives, &config, &bundle);

    let archive = archive::assemble(
        &derivatives.outputs,
        archive::SNIPPET_FILE,
        &document,
        settings.include_manifest,
    )?;

    tracing::info!(
        image = %source.original_name,
        base = %config.base_name,
        outputs = derivatives.outputs.len(),
        bytes = archive.len(),
        "packaged image"
    );
    Ok(Package {
        file_name: format!("{}-responsive.zip", config.base_name),
        archive,
        document,
        images: vec![ImageReport::new(
            &source.original_name,
            &config.base_name,
            &derivatives,
        )],
        skipped: Vec::new(),
    })
}

/// Process a batch of uploads with the production codec.
pub fn process_batch(
    uploads: Vec<Upload>,
    raw: &RawParams,
    settings: &ProcessSettings,
) -> Result<Package, ProcessError> {
    process_batch_with_codec(&RustCodec::new(), uploads, raw, settings)
}

/// Process a batch using a specific codec (allows testing with mock).
pub fn process_batch_with_codec(
    codec: &impl ImageCodec,
    uploads: Vec<Upload>,
    raw: &RawParams,
    settings: &ProcessSettings,
) -> Result<Package, ProcessError> {
    let uploads: Vec<Upload> = uploads.into_iter().filter(|u| !u.bytes.is_empty()).collect();
    if uploads.is_empty() {
        return Err(ProcessError::MissingInput);
    }
    if uploads.len() > settings.max_batch_images {
        return Err(ProcessError::TooManyImages {
            count: uploads.len(),
            max: settings.max_batch_images,
        });
    }
    for upload in &uploads {
        settings.check_size(upload)?;
    }

    let shared_raw = RawParams {
        basename: None,
        sizes: None,
        ..raw.clone()
    };
    let shared = settings.resolve(&shared_raw, "")?;

    let inputs = uploads
        .into_iter()
        .map(|u| BatchInput {
            bytes: u.bytes,
            original_name: u.name,
        })
        .collect();
    let report = batch::run_batch(codec, inputs, &shared)?;
    let document = report.document();
    let archive = archive::assemble(
        report.outputs(),
        archive::BATCH_SNIPPET_FILE,
        &document,
        settings.include_manifest,
    )?;

    tracing::info!(
        processed = report.processed.len(),
        skipped = report.skipped.len(),
        bytes = archive.len(),
        "packaged batch"
    );
    Ok(Package {
        file_name: BATCH_ARCHIVE_NAME.to_string(),
        archive,
        document,
        images: report
            .processed
            .iter()
            .map(|image| {
                ImageReport::new(&image.original_name, &image.config.base_name, &image.derivatives)
            })
            .collect(),
        skipped: report.skipped,
    })
}
