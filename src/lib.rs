//! # srcsetter
//!
//! Turns one uploaded image (or a batch) into a set of resized WebP/AVIF
//! derivatives plus ready-to-paste `<img srcset>` and `<picture>` markup,
//! packaged as a zip archive. Runs as a CLI or as a small HTTP service.
//!
//! # Architecture: Request Pipeline
//!
//! Every request flows through the same stages:
//!
//! ```text
//! 1. Resolve   raw fields     →  RequestConfig     (lenient parsing, defaults)
//! 2. Probe     upload bytes   →  SourceImage       (intrinsic dimensions)
//! 3. Generate  image + config →  Derivatives       (one encode per width × format)
//! 4. Compose   derivatives    →  MarkupBundle      (<img> and <picture> snippets)
//! 5. Package   all of it      →  zip archive       (outputs + snippet document)
//! ```
//!
//! Each stage is a plain function over owned data, so unit tests can exercise
//! the pipeline with a recording mock codec and never touch real pixels.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`resolve`] | Raw request fields → typed [`resolve::RequestConfig`], lenient or strict |
//! | [`derive`] | Feasible-width planning and parallel encoding of one image |
//! | [`markup`] | `srcset` strings, `<img>`/`<picture>` tags and snippet documents via Maud |
//! | [`batch`] | Per-image outcomes for many uploads, skip instead of fail |
//! | [`archive`] | Zip packaging with optional SHA-256 manifest |
//! | [`process`] | Single and batch request flows shared by CLI and HTTP |
//! | [`server`] | Axum routes, limits and error mapping |
//! | [`config`] | `srcsetter.toml` loading, validation and merging |
//! | [`naming`] | Base names for derivative files |
//! | [`imaging`] | Codec capability: probe + resize/encode |
//! | [`output`] | CLI output formatting |
//! | [`types`] | Shared request-scoped types |
//!
//! # Design Decisions
//!
//! ## Lenient By Default
//!
//! Malformed widths, formats or qualities degrade to defaults instead of
//! failing the request: `"480px"` parses as 480, `"gif"` is dropped, a
//! quality of 500 becomes 100. Operators who prefer rejection enable
//! `defaults.strict`, which turns the first bad token into a 400.
//!
//! ## Never Upscale
//!
//! Requested widths above the source's intrinsic width are silently skipped.
//! An image whose every requested width is too large is an error for a single
//! request and a skip inside a batch.
//!
//! ## Source Order In `<picture>`
//!
//! Derivatives are generated WebP first, but `<picture>` lists AVIF first so
//! browsers that understand it pick the smaller file. The fallback `<img>`
//! points at WebP unless AVIF is the only requested format.
//!
//! ## Nothing Persists
//!
//! Uploads, derivatives and archives live in memory for one request. There is
//! no cache and no disk spooling; the service is stateless apart from its
//! rate-limit table and job semaphore.

pub mod archive;
pub mod batch;
pub mod config;
pub mod derive;
pub mod imaging;
pub mod markup;
pub mod naming;
pub mod output;
pub mod process;
pub mod resolve;
pub mod server;
pub mod types;

use std::sync::LazyLock;

static VERSION: LazyLock<String> = LazyLock::new(|| {
    if env!("SRCSETTER_RELEASE_TAG") == "true" {
        env!("CARGO_PKG_VERSION").to_string()
    } else {
        let hash = env!("SRCSETTER_REVISION");
        if hash.is_empty() {
            "dev@unknown".to_string()
        } else {
            format!("dev@{hash}")
        }
    }
});

/// Release version on a tagged build, `dev@{hash}` otherwise.
pub fn version_string() -> &'static str {
    VERSION.as_str()
}
