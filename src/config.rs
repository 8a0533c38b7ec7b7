//! Service configuration module.
//!
//! Handles loading, validating, and merging `srcsetter.toml`. Configuration is
//! layered: stock defaults are overridden by an optional user file. Both the
//! CLI and the HTTP service read the same file.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [defaults]
//! breakpoints = [480, 768, 1200]  # Widths used when a request names none
//! formats = ["webp"]              # Formats used when a request names none
//! quality_webp = 82               # 1-100
//! quality_avif = 55               # 1-100
//! strict = false                  # Reject malformed request fields
//!
//! [limits]
//! max_upload_bytes = 15728640     # Per uploaded file
//! max_batch_images = 20
//! max_concurrent_jobs = 4         # Requests encoding at the same time
//! requests_per_minute = 30        # Per client IP, 0 disables
//! request_timeout_secs = 120
//!
//! [server]
//! host = "127.0.0.1"
//! port = 3000
//!
//! [processing]
//! max_processes = 4               # Max encode threads (omit for auto = CPU cores)
//!
//! [archive]
//! include_manifest = false        # Add manifest.json with SHA-256 digests
//! ```
//!
//! ## Partial Configuration
//!
//! Config files are sparse. Override just the values you want:
//!
//! ```toml
//! [defaults]
//! formats = ["webp", "avif"]
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::types::OutputFormat;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name looked up in the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "srcsetter.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Service configuration loaded from `srcsetter.toml`.
///
/// All fields have defaults. User config files need only specify the values
/// they want to override. Unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceConfig {
    /// Fallbacks for request fields the client leaves out.
    pub defaults: DefaultsConfig,
    /// Upload, batch and throughput limits.
    pub limits: LimitsConfig,
    /// Listen address for `serve`.
    pub server: ServerConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
    /// Archive contents.
    pub archive: ArchiveConfig,
}

impl ServiceConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let d = &self.defaults;
        for (name, q) in [("quality_webp", d.quality_webp), ("quality_avif", d.quality_avif)] {
            if !(1..=100).contains(&q) {
                return Err(ConfigError::Validation(format!(
                    "defaults.{name} must be 1-100"
                )));
            }
        }
        if d.breakpoints.is_empty() {
            return Err(ConfigError::Validation(
                "defaults.breakpoints must not be empty".into(),
            ));
        }
        if d.breakpoints.contains(&0) {
            return Err(ConfigError::Validation(
                "defaults.breakpoints values must be non-zero".into(),
            ));
        }
        if d.formats.is_empty() {
            return Err(ConfigError::Validation(
                "defaults.formats must not be empty".into(),
            ));
        }

        let l = &self.limits;
        for (name, value) in [
            ("max_upload_bytes", l.max_upload_bytes),
            ("max_batch_images", l.max_batch_images),
            ("max_concurrent_jobs", l.max_concurrent_jobs),
        ] {
            if value == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{name} must be non-zero"
                )));
            }
        }
        if l.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "limits.request_timeout_secs must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Request defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DefaultsConfig {
    /// Target widths when a request names none.
    pub breakpoints: Vec<u32>,
    /// Output formats when a request names none.
    pub formats: Vec<OutputFormat>,
    /// WebP quality (1 = worst, 100 = best).
    pub quality_webp: u32,
    /// AVIF quality (1 = worst, 100 = best).
    pub quality_avif: u32,
    /// Reject malformed request fields instead of falling back to defaults.
    pub strict: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            breakpoints: vec![480, 768, 1200],
            formats: vec![OutputFormat::Webp],
            quality_webp: 82,
            quality_avif: 55,
            strict: false,
        }
    }
}

/// Service limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LimitsConfig {
    /// Largest accepted upload, per file.
    pub max_upload_bytes: usize,
    /// Most images accepted by one batch request.
    pub max_batch_images: usize,
    /// Requests allowed to encode at the same time.
    pub max_concurrent_jobs: usize,
    /// Requests per client IP per minute. `0` disables rate limiting.
    pub requests_per_minute: u32,
    /// Overall time budget for one HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: 15 * 1024 * 1024,
            max_batch_images: 20,
            max_concurrent_jobs: 4,
            requests_per_minute: 30,
            request_timeout_secs: 120,
        }
    }
}

impl LimitsConfig {
    /// Body limit for the whole multipart request: a full batch plus slack
    /// for the form fields and boundaries.
    pub fn body_limit(&self) -> usize {
        self.max_upload_bytes
            .saturating_mul(self.max_batch_images)
            .saturating_add(64 * 1024)
    }
}

/// Listen address for the HTTP service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel encode workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Archive contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiveConfig {
    /// Add `manifest.json` listing every output with its SHA-256 digest.
    pub include_manifest: bool,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged onto.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(ServiceConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ServiceConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ServiceConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// `srcsetter.toml` in `dir`, if one exists.
pub fn discover_config(dir: &Path) -> Option<PathBuf> {
    let path = dir.join(CONFIG_FILE_NAME);
    path.is_file().then_some(path)
}

/// Load config from an explicit file, or stock defaults when `path` is `None`.
///
/// An explicit path that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<ServiceConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let overlay = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            Some(toml::from_str::<toml::Value>(&content)?)
        }
        None => None,
    };
    resolve_config(base, overlay)
}

/// Returns a fully-commented stock `srcsetter.toml` with all keys.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# srcsetter configuration
# =======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Request defaults
# ---------------------------------------------------------------------------
[defaults]
# Widths generated when a request does not name any.
breakpoints = [480, 768, 1200]

# Formats generated when a request does not name any ("webp", "avif").
formats = ["webp"]

# Encoding quality (1 = worst, 100 = best).
quality_webp = 82
quality_avif = 55

# Reject malformed widths, formats and qualities instead of ignoring them.
strict = false

# ---------------------------------------------------------------------------
# Service limits
# ---------------------------------------------------------------------------
[limits]
# Largest accepted upload, per file (15 MiB).
max_upload_bytes = 15728640

# Most images accepted by one batch request.
max_batch_images = 20

# Requests allowed to encode at the same time. Extra requests get 503.
max_concurrent_jobs = 4

# Requests per client IP per minute. 0 disables rate limiting.
requests_per_minute = 30

# Overall time budget for one HTTP request, in seconds.
request_timeout_secs = 120

# ---------------------------------------------------------------------------
# HTTP server
# ---------------------------------------------------------------------------
[server]
host = "127.0.0.1"
port = 3000

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel encode workers.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4

# ---------------------------------------------------------------------------
# Archive
# ---------------------------------------------------------------------------
[archive]
# Add manifest.json listing every output with its dimensions and SHA-256.
include_manifest = false
"##
}
