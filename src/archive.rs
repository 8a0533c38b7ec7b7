//! Zip packaging of derivatives and snippet documents.
//!
//! Encoded images are already compressed, so they are stored as-is; only the
//! HTML and JSON documents are deflated. Entry timestamps are fixed so the
//! same outputs always produce the same archive bytes.
//!
//! With `include_manifest`, a `manifest.json` is appended listing every image
//! entry with its dimensions and SHA-256 digest.

use crate::types::{Output, OutputFormat};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::io::{Cursor, Write};
use thiserror::Error;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Snippet document in a single-image archive.
pub const SNIPPET_FILE: &str = "snippet.html";
/// Snippet document in a batch archive.
pub const BATCH_SNIPPET_FILE: &str = "snippets.html";
/// Optional digest listing.
pub const MANIFEST_FILE: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate archive entry: {0}")]
    DuplicateEntry(String),
}

/// One line of `manifest.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub file: String,
    pub format: OutputFormat,
    pub width: u32,
    pub height: u32,
    pub bytes: usize,
    pub sha256: String,
}

impl ManifestEntry {
    fn for_output(output: &Output) -> Self {
        Self {
            file: output.file_name.clone(),
            format: output.format,
            width: output.width,
            height: output.height,
            bytes: output.bytes.len(),
            sha256: format!("{:x}", Sha256::digest(&output.bytes)),
        }
    }
}

/// Incrementally builds an in-memory zip archive.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    names: HashSet<String>,
    manifest: Option<Vec<ManifestEntry>>,
}

fn entry_options(method: CompressionMethod) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(method)
        .last_modified_time(DateTime::default())
        .unix_permissions(0o644)
}

impl ArchiveBuilder {
    pub fn new(include_manifest: bool) -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            names: HashSet::new(),
            manifest: include_manifest.then(Vec::new),
        }
    }

    fn add_entry(
        &mut self,
        name: &str,
        bytes: &[u8],
        method: CompressionMethod,
    ) -> Result<(), ArchiveError> {
        if !self.names.insert(name.to_string()) {
            return Err(ArchiveError::DuplicateEntry(name.to_string()));
        }
        self.writer.start_file(name, entry_options(method))?;
        self.writer.write_all(bytes)?;
        Ok(())
    }

    /// Add one encoded derivative, stored uncompressed.
    pub fn add_output(&mut self, output: &Output) -> Result<(), ArchiveError> {
        self.add_entry(&output.file_name, &output.bytes, CompressionMethod::Stored)?;
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.push(ManifestEntry::for_output(output));
        }
        Ok(())
    }

    /// Add a text document, deflated.
    pub fn add_document(&mut self, name: &str, content: &str) -> Result<(), ArchiveError> {
        self.add_entry(name, content.as_bytes(), CompressionMethod::Deflated)
    }

    /// Append the manifest if enabled and return the archive bytes.
    pub fn finish(mut self) -> Result<Vec<u8>, ArchiveError> {
        if let Some(manifest) = self.manifest.take() {
            let json = serde_json::to_string_pretty(&manifest)?;
            self.add_document(MANIFEST_FILE, &json)?;
        }
        Ok(self.writer.finish()?.into_inner())
    }
}

/// Package outputs plus one snippet document.
pub fn assemble<'a>(
    outputs: impl IntoIterator<Item = &'a Output>,
    document_name: &str,
    document: &str,
    include_manifest: bool,
) -> Result<Vec<u8>, ArchiveError> {
    let mut builder = ArchiveBuilder::new(include_manifest);
    for output in outputs {
        builder.add_output(output)?;
    }
    builder.add_document(document_name, document)?;
    builder.finish()
}
