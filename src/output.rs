//! CLI output formatting for `render` and `batch`.
//!
//! # Output Format
//!
//! ```text
//! 001 hero.jpg → hero
//!     480px: hero-480.webp (18.2 KB), hero-480.avif (11.0 KB)
//!     768px: hero-768.webp (39.5 KB), hero-768.avif (22.7 KB)
//!
//! Skipped
//!     broken.jpg: unreadable image metadata: …
//!
//! Wrote out/hero-responsive.zip (5 files, 91.6 KB)
//! ```
//!
//! Untitled uploads (empty file name) show their base name in parentheses.
//!
//! # Architecture
//!
//! Each result has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects.

use crate::process::{ImageReport, OutputInfo, Package};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
///
/// ```text
/// 512      → 512 B
/// 18637    → 18.2 KB
/// 2621440  → 2.5 MB
/// ```
pub fn format_size(bytes: usize) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    let b = bytes as f64;
    if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if b >= KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{bytes} B")
    }
}

/// Header line for one processed image.
///
/// ```text
/// 001 hero.jpg → hero
/// 002 (image)             // no client file name
/// ```
fn image_header(index: usize, report: &ImageReport) -> String {
    if report.original_name.is_empty() {
        format!("{} ({})", format_index(index), report.base_name)
    } else {
        format!(
            "{} {} → {}",
            format_index(index),
            report.original_name,
            report.base_name
        )
    }
}

fn output_entry(output: &OutputInfo) -> String {
    format!("{} ({})", output.file_name, format_size(output.size))
}

// ============================================================================
// Package
// ============================================================================

/// Lines for one image: header plus one line per width.
pub fn format_image_report(index: usize, report: &ImageReport) -> Vec<String> {
    let mut lines = vec![image_header(index, report)];
    for &width in &report.feasible_widths {
        let entries: Vec<String> = report
            .outputs
            .iter()
            .filter(|o| o.width == width)
            .map(output_entry)
            .collect();
        lines.push(format!("{}{}px: {}", indent(1), width, entries.join(", ")));
    }
    lines
}

/// Full summary of a finished request written to `destination`.
pub fn format_package(package: &Package, destination: &Path) -> Vec<String> {
    let mut lines = Vec::new();
    for (i, report) in package.images.iter().enumerate() {
        lines.extend(format_image_report(i + 1, report));
    }

    if !package.skipped.is_empty() {
        lines.push(String::new());
        lines.push("Skipped".to_string());
        for skipped in &package.skipped {
            lines.push(format!(
                "{}{}: {}",
                indent(1),
                skipped.original_name,
                skipped.reason
            ));
        }
    }

    let files: usize = package.images.iter().map(|r| r.outputs.len()).sum();
    lines.push(String::new());
    lines.push(format!(
        "Wrote {} ({} files, {})",
        destination.display(),
        files,
        format_size(package.archive.len())
    ));
    lines
}

pub fn print_package(package: &Package, destination: &Path) {
    for line in format_package(package, destination) {
        println!("{}", line);
    }
}
