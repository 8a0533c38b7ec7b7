//! End-to-end tests through the public API with the real codec.
//!
//! Source images are generated in memory with the `image` crate, so no
//! fixture files are needed.

use image::{ImageEncoder, RgbImage, RgbaImage};
use srcsetter::batch::SkipReason;
use srcsetter::process::{
    ProcessError, ProcessSettings, Upload, process_batch, process_single,
};
use srcsetter::resolve::RawParams;
use std::io::{Cursor, Read};
use zip::ZipArchive;

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x * 255 / width) as u8, (y * 255 / height) as u8, 90])
    });
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn png_with_alpha(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_fn(width, height, |x, _| image::Rgba([200, 40, 40, (x % 256) as u8]));
    let mut buf = Vec::new();
    image::codecs::png::PngEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    buf
}

fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 30]));
    let mut buf = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut buf)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    buf
}

fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    (0..zip.len())
        .map(|i| {
            let mut file = zip.by_index(i).unwrap();
            let mut bytes = Vec::new();
            file.read_to_end(&mut bytes).unwrap();
            (file.name().to_string(), bytes)
        })
        .collect()
}

fn params(widths: &str, formats: &str) -> RawParams {
    RawParams {
        widths: Some(widths.into()),
        formats: Some(formats.into()),
        ..RawParams::default()
    }
}

#[test]
fn single_webp_derivatives_have_requested_widths() {
    let package = process_single(
        Some(Upload {
            name: "gradient.png".into(),
            bytes: png(320, 160),
        }),
        &params("80,160,640", "webp"),
        &ProcessSettings::default(),
    )
    .unwrap();

    let entries = entries(&package.archive);
    let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["gradient-80.webp", "gradient-160.webp", "snippet.html"]
    );

    let decoded = image::load_from_memory(&entries[0].1).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (80, 40));
    let decoded = image::load_from_memory(&entries[1].1).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (160, 80));
}

#[test]
fn single_snippet_matches_archive() {
    let package = process_single(
        Some(Upload {
            name: "hero.jpg".into(),
            bytes: jpeg(256, 128),
        }),
        &params("64,128", "webp,avif"),
        &ProcessSettings::default(),
    )
    .unwrap();

    let entries = entries(&package.archive);
    let (name, snippet) = entries.last().unwrap();
    assert_eq!(name, "snippet.html");
    let snippet = String::from_utf8(snippet.clone()).unwrap();
    assert_eq!(snippet, package.document);

    assert!(snippet.contains("<!-- Widths: 64, 128 -->"));
    assert!(snippet.contains("<!-- Formats: webp, avif -->"));
    assert!(snippet.contains("srcset=\"hero-64.avif 64w, hero-128.avif 128w\""));
    assert!(snippet.contains("srcset=\"hero-64.webp 64w, hero-128.webp 128w\""));
    assert!(snippet.contains("src=\"hero-64.webp\""));

    let avif = entries.iter().find(|(n, _)| n == "hero-64.avif").unwrap();
    assert_eq!(&avif.1[4..8], b"ftyp");
}

#[test]
fn alpha_sources_encode_to_webp() {
    let package = process_single(
        Some(Upload {
            name: "overlay.png".into(),
            bytes: png_with_alpha(100, 100),
        }),
        &params("50", "webp"),
        &ProcessSettings::default(),
    )
    .unwrap();
    let entries = entries(&package.archive);
    let decoded = image::load_from_memory(&entries[0].1).unwrap();
    assert_eq!(decoded.width(), 50);
}

#[test]
fn single_rejects_oversized_widths() {
    let result = process_single(
        Some(Upload {
            name: "tiny.png".into(),
            bytes: png(40, 40),
        }),
        &params("480", "webp"),
        &ProcessSettings::default(),
    );
    assert!(matches!(result, Err(ProcessError::AllWidthsExceedOriginal(40))));
}

#[test]
fn single_rejects_non_image() {
    let result = process_single(
        Some(Upload {
            name: "notes.txt".into(),
            bytes: b"just some text".to_vec(),
        }),
        &RawParams::default(),
        &ProcessSettings::default(),
    );
    assert!(matches!(result, Err(ProcessError::UnreadableMetadata(_))));
}

#[test]
fn batch_mixed_inputs() {
    let uploads = vec![
        Upload {
            name: "a.png".into(),
            bytes: png(200, 100),
        },
        Upload {
            name: "b.txt".into(),
            bytes: b"nope".to_vec(),
        },
        Upload {
            name: "c.jpg".into(),
            bytes: jpeg(120, 120),
        },
    ];
    let package =
        process_batch(uploads, &params("100,150", "webp"), &ProcessSettings::default()).unwrap();

    let names: Vec<String> = entries(&package.archive).into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["a-100.webp", "a-150.webp", "c-100.webp", "snippets.html"]
    );
    assert_eq!(package.skipped.len(), 1);
    assert!(matches!(
        package.skipped[0].reason,
        SkipReason::UnreadableMetadata(_)
    ));
    assert!(package.document.contains("<!-- Images: 2 -->"));
}

#[test]
fn identical_inputs_give_identical_archives() {
    let run = || {
        process_single(
            Some(Upload {
                name: "same.png".into(),
                bytes: png(160, 90),
            }),
            &params("80", "webp"),
            &ProcessSettings::default(),
        )
        .unwrap()
        .archive
    };
    assert_eq!(run(), run());
}

#[test]
fn batch_skips_image_beyond_webp_limit() {
    let uploads = vec![
        Upload {
            name: "ok.png".into(),
            bytes: png(64, 64),
        },
        Upload {
            name: "tall.png".into(),
            bytes: png(64, 17000),
        },
    ];
    let package =
        process_batch(uploads, &params("64", "webp"), &ProcessSettings::default()).unwrap();

    assert_eq!(package.images.len(), 1);
    assert_eq!(package.images[0].base_name, "ok");
    assert_eq!(package.skipped.len(), 1);
    assert_eq!(package.skipped[0].original_name, "tall.png");
    assert!(matches!(
        package.skipped[0].reason,
        SkipReason::EncodingFailure(_)
    ));
}

#[test]
fn single_image_beyond_webp_limit_is_encoding_failure() {
    let result = process_single(
        Some(Upload {
            name: "tall.png".into(),
            bytes: png(64, 17000),
        }),
        &params("64", "webp"),
        &ProcessSettings::default(),
    );
    assert!(matches!(result, Err(ProcessError::EncodingFailure(_))));
}
