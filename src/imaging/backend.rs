//! Codec capability trait and shared types.
//!
//! The [`ImageCodec`] trait defines the two operations the pipeline needs from
//! a codec: probe the intrinsic dimensions of an upload, and produce a resized,
//! re-encoded copy of it. Everything above this trait is codec-agnostic.
//!
//! The production implementation is
//! [`RustCodec`](super::rust_backend::RustCodec). Tests use the recording
//! [`MockCodec`](tests::MockCodec).

use super::params::{EncodeParams, EncodeTarget};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("unreadable image metadata: {0}")]
    Metadata(String),
    #[error("encoding failed: {0}")]
    Encode(String),
}

/// Result of a probe operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Codec capability consumed by the derivative pipeline.
///
/// Implementations must be `Sync`: the generator fans encodes out over the
/// rayon pool and shares one codec across all of them.
pub trait ImageCodec: Sync {
    /// Report the intrinsic dimensions of an encoded image.
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, CodecError>;

    /// Resize to the target box and encode. Must never enlarge.
    fn resize_encode(&self, params: &EncodeParams<'_>) -> Result<Vec<u8>, CodecError>;

    /// Produce every target from one source, results in `targets` order.
    ///
    /// The default runs [`resize_encode`](Self::resize_encode) per target on
    /// the rayon pool. Codecs that decode override it to decode once.
    fn resize_encode_all(
        &self,
        source: &[u8],
        targets: &[EncodeTarget],
    ) -> Vec<Result<Vec<u8>, CodecError>> {
        targets
            .par_iter()
            .map(|target| self.resize_encode(&target.with_source(source)))
            .collect()
    }
}

/// Codec chosen at runtime, as held by the HTTP service.
pub type DynCodec = Box<dyn ImageCodec + Send>;

impl<T: ImageCodec + ?Sized> ImageCodec for Box<T> {
    fn probe(&self, bytes: &[u8]) -> Result<Dimensions, CodecError> {
        (**self).probe(bytes)
    }

    fn resize_encode(&self, params: &EncodeParams<'_>) -> Result<Vec<u8>, CodecError> {
        (**self).resize_encode(params)
    }

    fn resize_encode_all(
        &self,
        source: &[u8],
        targets: &[EncodeTarget],
    ) -> Vec<Result<Vec<u8>, CodecError>> {
        (**self).resize_encode_all(source, targets)
    }
}
