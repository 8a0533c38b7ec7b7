//! Markup composer.
//!
//! Turns a [`Derivatives`] set into the two snippets a developer pastes into a
//! page, and wraps them into the `snippet.html` / `snippets.html` documents
//! shipped in the archive.
//!
//! ## Variants
//!
//! - **`<img>`**: `src` is the smallest primary-format output, `srcset` lists
//!   every primary-format output ascending. The primary format is WebP when
//!   requested, AVIF otherwise.
//! - **`<picture>`**: one `<source>` per requested format (AVIF first, so
//!   browsers that can decode it prefer it) followed by the `<img>` above as
//!   the fallback. With a single format this is identical to the `<img>`.
//!
//! `alt` is always emitted empty. Describing the image is the author's job.
//!
//! HTML is built with Maud, so file names and the `sizes` value are escaped.

use crate::derive::Derivatives;
use crate::resolve::RequestConfig;
use crate::types::{MarkupBundle, OutputFormat};
use maud::{Markup, PreEscaped, html};

/// Delimiter between per-image blocks in the batch document.
pub const BLOCK_SEPARATOR: &str =
    "<!-- ============================================================ -->";

/// Order of `<source>` elements inside `<picture>`.
const SOURCE_ORDER: [OutputFormat; 2] = [OutputFormat::Avif, OutputFormat::Webp];

/// `"{file} {width}w, ..."` for one format, ascending by width.
pub fn srcset(derivatives: &Derivatives, format: OutputFormat) -> String {
    derivatives
        .of_format(format)
        .map(|o| format!("{} {}w", o.file_name, o.width))
        .collect::<Vec<_>>()
        .join(", ")
}

fn has_format(derivatives: &Derivatives, config: &RequestConfig, format: OutputFormat) -> bool {
    config.wants(format) && derivatives.of_format(format).next().is_some()
}

/// WebP when present, AVIF otherwise.
fn primary_format(derivatives: &Derivatives, config: &RequestConfig) -> OutputFormat {
    if has_format(derivatives, config, OutputFormat::Webp) {
        OutputFormat::Webp
    } else {
        OutputFormat::Avif
    }
}

fn img_element(src: &str, srcset: &str, sizes: &str) -> Markup {
    html! {
        img src=(src) srcset=(srcset) sizes=(sizes) loading="lazy" decoding="async" alt="";
    }
}

/// Build both snippets for one image.
pub fn compose(derivatives: &Derivatives, config: &RequestConfig) -> MarkupBundle {
    let primary = primary_format(derivatives, config);
    let base_src = derivatives
        .of_format(primary)
        .next()
        .map(|o| o.file_name.as_str())
        .unwrap_or_default();
    let img = img_element(base_src, &srcset(derivatives, primary), &config.sizes_attr);
    let img_tag = img.clone().into_string();

    let sources: Vec<OutputFormat> = SOURCE_ORDER
        .into_iter()
        .filter(|&f| has_format(derivatives, config, f))
        .collect();

    let picture_tag = if sources.len() > 1 {
        html! {
            picture {
                @for format in &sources {
                    (PreEscaped("\n  "))
                    source type=(format.mime_type()) srcset=(srcset(derivatives, *format)) sizes=(config.sizes_attr);
                }
                (PreEscaped("\n  "))
                (img)
                (PreEscaped("\n"))
            }
        }
        .into_string()
    } else {
        img_tag.clone()
    };

    MarkupBundle {
        img_tag,
        picture_tag,
    }
}

/// Neutralise `--` so client-supplied text cannot close an HTML comment.
fn comment_safe(text: &str) -> String {
    let mut safe = text.to_string();
    while safe.contains("--") {
        safe = safe.replace("--", "- -");
    }
    safe
}

fn join_numbers(values: &[u32]) -> String {
    values
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_formats(formats: &[OutputFormat]) -> String {
    formats
        .iter()
        .map(|f| f.extension())
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_variants(doc: &mut String, bundle: &MarkupBundle) {
    doc.push_str("<!-- Option 1: <img> with srcset -->\n");
    doc.push_str(&bundle.img_tag);
    doc.push_str("\n\n<!-- Option 2: <picture> with format fallbacks -->\n");
    doc.push_str(&bundle.picture_tag);
    doc.push('\n');
}

/// The `snippet.html` document for a single-image request.
pub fn single_document(
    derivatives: &Derivatives,
    config: &RequestConfig,
    bundle: &MarkupBundle,
) -> String {
    let mut doc = String::new();
    doc.push_str("<!-- Responsive image markup generated by srcsetter -->\n");
    doc.push_str(&format!(
        "<!-- Widths: {} -->\n",
        join_numbers(&derivatives.feasible_widths)
    ));
    doc.push_str(&format!(
        "<!-- Formats: {} -->\n",
        join_formats(&config.formats)
    ));
    doc.push_str(&format!(
        "<!-- Sizes: {} -->\n",
        comment_safe(&config.sizes_attr)
    ));
    doc.push_str("<!-- Fill in the alt attribute before publishing. -->\n\n");
    push_variants(&mut doc, bundle);
    doc
}

/// One processed image's contribution to the batch document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMarkup {
    pub base_name: String,
    pub original_name: String,
    pub bundle: MarkupBundle,
}

/// The `snippets.html` document for a batch request.
///
/// `widths` and `formats` are the request-level values; each block's own
/// `srcset` reflects what was feasible for that image.
pub fn batch_document(
    images: &[ImageMarkup],
    skipped: &[(String, String)],
    widths: &[u32],
    formats: &[OutputFormat],
) -> String {
    let mut doc = String::new();
    doc.push_str("<!-- Responsive image markup generated by srcsetter -->\n");
    doc.push_str(&format!("<!-- Images: {} -->\n", images.len()));
    doc.push_str(&format!("<!-- Widths: {} -->\n", join_numbers(widths)));
    doc.push_str(&format!("<!-- Formats: {} -->\n", join_formats(formats)));
    for (name, reason) in skipped {
        doc.push_str(&format!(
            "<!-- Skipped: {} ({}) -->\n",
            comment_safe(name),
            comment_safe(reason)
        ));
    }
    doc.push_str("<!-- Fill in the alt attributes before publishing. -->\n");

    for image in images {
        doc.push('\n');
        doc.push_str(BLOCK_SEPARATOR);
        doc.push('\n');
        doc.push_str(&format!(
            "<!-- {} ({}) -->\n\n",
            comment_safe(&image.base_name),
            comment_safe(&image.original_name)
        ));
        push_variants(&mut doc, &image.bundle);
    }
    doc
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::{RawParams, ResolverDefaults, resolve};
    use crate::types::Output;

    fn config(widths: &str, formats: &str) -> RequestConfig {
        resolve(
            &RawParams {
                widths: Some(widths.into()),
                formats: Some(formats.into()),
                basename: Some("hero".into()),
                ..RawParams::default()
            },
            "hero.jpg",
            &ResolverDefaults::default(),
        )
    }

    /// Derivatives as the generator would produce them, without a codec.
    fn derivatives(config: &RequestConfig, feasible: &[u32]) -> Derivatives {
        let outputs = feasible
            .iter()
            .flat_map(|&w| {
                config.formats.iter().map(move |&f| Output {
                    file_name: Output::file_name_for(&config.base_name, w, f),
                    format: f,
                    width: w,
                    height: w / 2,
                    bytes: vec![0],
                })
            })
            .collect();
        Derivatives {
            outputs,
            feasible_widths: feasible.to_vec(),
        }
    }

    #[test]
    fn srcset_lists_ascending() {
        let cfg = config("480,768,1200", "webp");
        let d = derivatives(&cfg, &[480, 768, 1200]);
        assert_eq!(
            srcset(&d, OutputFormat::Webp),
            "hero-480.webp 480w, hero-768.webp 768w, hero-1200.webp 1200w"
        );
    }

    #[test]
    fn img_tag_webp_only() {
        let cfg = config("480,768,1200", "webp");
        let d = derivatives(&cfg, &[480, 768, 1200]);
        let bundle = compose(&d, &cfg);

        assert_eq!(
            bundle.img_tag,
            "<img src=\"hero-480.webp\" \
             srcset=\"hero-480.webp 480w, hero-768.webp 768w, hero-1200.webp 1200w\" \
             sizes=\"(max-width: 480px) 100vw, (max-width: 768px) 50vw, 1200px\" \
             loading=\"lazy\" decoding=\"async\" alt=\"\">"
        );
    }

    #[test]
    fn single_format_picture_equals_img() {
        let cfg = config("480,768", "webp");
        let d = derivatives(&cfg, &[480, 768]);
        let bundle = compose(&d, &cfg);
        assert_eq!(bundle.picture_tag, bundle.img_tag);
        assert!(!bundle.picture_tag.contains("<picture>"));
    }

    #[test]
    fn picture_has_avif_then_webp_sources() {
        let cfg = config("480,768,1200", "webp,avif");
        let d = derivatives(&cfg, &[480, 768, 1200]);
        let bundle = compose(&d, &cfg);
        let pic = &bundle.picture_tag;

        assert!(pic.starts_with("<picture>"));
        assert!(pic.ends_with("</picture>"));
        assert_eq!(pic.matches("<source").count(), 2);

        let avif = pic.find("type=\"image/avif\"").unwrap();
        let webp = pic.find("type=\"image/webp\"").unwrap();
        assert!(avif < webp);

        assert!(pic.contains(
            "srcset=\"hero-480.avif 480w, hero-768.avif 768w, hero-1200.avif 1200w\""
        ));
        assert!(pic.contains(
            "srcset=\"hero-480.webp 480w, hero-768.webp 768w, hero-1200.webp 1200w\""
        ));
        // Fallback is the plain <img>, pointing at the smallest webp.
        assert!(pic.contains(&bundle.img_tag));
        assert!(bundle.img_tag.contains("src=\"hero-480.webp\""));
    }

    #[test]
    fn avif_only_uses_avif_everywhere() {
        let cfg = config("480,768", "avif");
        let d = derivatives(&cfg, &[480, 768]);
        let bundle = compose(&d, &cfg);
        assert!(bundle.img_tag.contains("src=\"hero-480.avif\""));
        assert!(bundle.img_tag.contains("hero-768.avif 768w"));
        assert_eq!(bundle.picture_tag, bundle.img_tag);
    }

    #[test]
    fn sizes_value_is_escaped() {
        let mut cfg = config("480", "webp");
        cfg.sizes_attr = "\"><script>".into();
        let d = derivatives(&cfg, &[480]);
        let bundle = compose(&d, &cfg);
        assert!(!bundle.img_tag.contains("<script>"));
        assert!(bundle.img_tag.contains("&quot;&gt;&lt;script&gt;"));
    }

    #[test]
    fn compose_is_pure() {
        let cfg = config("480,768", "webp,avif");
        let d = derivatives(&cfg, &[480, 768]);
        assert_eq!(compose(&d, &cfg), compose(&d, &cfg));
    }

    #[test]
    fn single_document_header_and_variants() {
        let cfg = config("480,768,1200", "webp,avif");
        let d = derivatives(&cfg, &[480, 768]);
        let bundle = compose(&d, &cfg);
        let doc = single_document(&d, &cfg, &bundle);

        assert!(doc.contains("<!-- Widths: 480, 768 -->"));
        assert!(doc.contains("<!-- Formats: webp, avif -->"));
        assert!(doc.contains(&format!("<!-- Sizes: {} -->", cfg.sizes_attr)));
        assert!(doc.contains(&bundle.img_tag));
        assert!(doc.contains(&bundle.picture_tag));
    }

    #[test]
    fn comment_text_cannot_close_comment() {
        let mut cfg = config("480", "webp");
        cfg.sizes_attr = "100vw --> <b>".into();
        let d = derivatives(&cfg, &[480]);
        let doc = single_document(&d, &cfg, &compose(&d, &cfg));
        assert!(!doc.contains("100vw -->"));
    }

    #[test]
    fn dash_runs_cannot_close_comment() {
        for text in ["--->", "---->", "a----->b", "--!>"] {
            let safe = comment_safe(text);
            assert!(!safe.contains("--"), "{text:?} became {safe:?}");
        }
        assert_eq!(comment_safe("100vw ---> <b>x</b>"), "100vw - - -> <b>x</b>");

        let mut cfg = config("480", "webp");
        cfg.sizes_attr = "100vw ---> <b>x</b>".into();
        let d = derivatives(&cfg, &[480]);
        let doc = single_document(&d, &cfg, &compose(&d, &cfg));
        let header = &doc[..doc.find("<!-- Option 1").unwrap()];
        assert_eq!(header.matches("-->").count(), header.matches("<!--").count());
        assert!(header.contains("<!-- Sizes: 100vw - - -> <b>x</b> -->"));
    }

    #[test]
    fn batch_document_blocks() {
        let cfg = config("480", "webp");
        let d = derivatives(&cfg, &[480]);
        let bundle = compose(&d, &cfg);
        let images = vec![
            ImageMarkup {
                base_name: "a".into(),
                original_name: "a.jpg".into(),
                bundle: bundle.clone(),
            },
            ImageMarkup {
                base_name: "b".into(),
                original_name: "b.png".into(),
                bundle,
            },
        ];
        let skipped = vec![("c.gif".to_string(), "unreadable".to_string())];
        let doc = batch_document(&images, &skipped, &[480, 768], &[OutputFormat::Webp]);

        assert!(doc.contains("<!-- Images: 2 -->"));
        assert!(doc.contains("<!-- Widths: 480, 768 -->"));
        assert!(doc.contains("<!-- Formats: webp -->"));
        assert!(doc.contains("<!-- Skipped: c.gif (unreadable) -->"));
        assert_eq!(doc.matches(BLOCK_SEPARATOR).count(), 2);
        assert!(doc.find("<!-- a (a.jpg) -->").unwrap() < doc.find("<!-- b (b.png) -->").unwrap());
    }
}
