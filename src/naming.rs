//! Base-name derivation for derivative files.
//!
//! Every derivative is named `{base}-{width}.{ext}`. The base comes from, in
//! order: an explicit client value, the upload's file name without its
//! extension, or the literal `"image"`.
//!
//! Client-supplied names are reduced to their final path component before use,
//! so an archive entry can never point outside the archive root:
//! - `"hero.jpg"` → `"hero"`
//! - `"C:\\Users\\me\\hero.final.png"` → `"hero.final"`
//! - `"../../etc/passwd"` → `"passwd"`

use std::collections::HashMap;

/// Base name used when nothing better is available.
pub const FALLBACK_BASE_NAME: &str = "image";

/// Final component of a client path, accepting both `/` and `\` separators.
fn final_component(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name).trim()
}

/// Strip one trailing extension. Dotfiles keep their leading dot.
fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// Resolve the base name for one image.
///
/// ```
/// # use srcsetter::naming::base_name;
/// assert_eq!(base_name(Some("banner"), "IMG_0042.JPG"), "banner");
/// assert_eq!(base_name(None, "IMG_0042.JPG"), "IMG_0042");
/// assert_eq!(base_name(Some("  "), ""), "image");
/// ```
pub fn base_name(provided: Option<&str>, original_name: &str) -> String {
    if let Some(name) = provided.map(final_component).filter(|n| !n.is_empty()) {
        return name.to_string();
    }
    let stem = strip_extension(final_component(original_name));
    if stem.is_empty() || stem == "." || stem == ".." {
        FALLBACK_BASE_NAME.to_string()
    } else {
        stem.to_string()
    }
}

/// Make base names unique within one batch.
///
/// The first occurrence keeps its name; later ones get `-2`, `-3`, … appended,
/// skipping suffixes that would collide with a name already in the list.
pub fn dedupe_base_names(names: &[String]) -> Vec<String> {
    let mut taken: HashMap<String, u32> = HashMap::new();
    let mut seen: std::collections::HashSet<String> = names.iter().cloned().collect();
    let mut result = Vec::with_capacity(names.len());

    for name in names {
        let count = taken.entry(name.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            result.push(name.clone());
            continue;
        }
        let mut n = *count;
        let mut candidate = format!("{name}-{n}");
        while seen.contains(&candidate) {
            n += 1;
            candidate = format!("{name}-{n}");
        }
        *count = n;
        seen.insert(candidate.clone());
        result.push(candidate);
    }
    result
}
