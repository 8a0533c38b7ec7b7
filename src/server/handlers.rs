//! Request handlers.
//!
//! Both upload endpoints read the whole multipart form into memory, take a
//! job permit (503 when none is free) and hand the CPU-bound work to
//! `spawn_blocking`, which in turn fans encodes out over the rayon pool.

use axum::{
    extract::{Multipart, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::imaging::DynCodec;
use crate::process::{
    Package, ProcessError, ProcessSettings, Upload, process_batch_with_codec,
    process_single_with_codec,
};
use crate::resolve::RawParams;

use super::error::AppError;
use super::state::AppState;

/// Multipart field carrying the single-image upload.
pub const IMAGE_FIELD: &str = "image";
/// Repeated multipart field carrying batch uploads.
pub const BATCH_FIELD: &str = "images";

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: crate::version_string(),
    })
}

/// POST /api/process
pub async fn process_image(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart, IMAGE_FIELD).await?;
    let upload = form.uploads.into_iter().next();
    let raw = form.raw;
    run_job(&state, move |codec, settings| {
        process_single_with_codec(codec, upload, &raw, settings)
    })
    .await
}

/// POST /api/batch
pub async fn process_batch(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let form = read_form(multipart, BATCH_FIELD).await?;
    let (uploads, raw) = (form.uploads, form.raw);
    run_job(&state, move |codec, settings| {
        process_batch_with_codec(codec, uploads, &raw, settings)
    })
    .await
}

#[derive(Debug, Default)]
struct Form {
    uploads: Vec<Upload>,
    raw: RawParams,
}

async fn read_form(mut multipart: Multipart, file_field: &str) -> Result<Form, AppError> {
    let mut form = Form::default();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        if name == file_field {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let bytes = field.bytes().await?;
            form.uploads.push(Upload {
                name: file_name,
                bytes: bytes.to_vec(),
            });
            continue;
        }

        let slot = match name.as_str() {
            "widths" => &mut form.raw.widths,
            "formats" => &mut form.raw.formats,
            "quality_webp" => &mut form.raw.quality_webp,
            "quality_avif" => &mut form.raw.quality_avif,
            "basename" => &mut form.raw.basename,
            "sizes" => &mut form.raw.sizes,
            _ => {
                tracing::debug!(field = %name, "ignoring unknown form field");
                continue;
            }
        };
        *slot = Some(field.text().await?);
    }
    Ok(form)
}

async fn run_job<F>(state: &AppState, job: F) -> Result<Response, AppError>
where
    F: FnOnce(&DynCodec, &ProcessSettings) -> Result<Package, ProcessError> + Send + 'static,
{
    let permit = state
        .jobs
        .clone()
        .try_acquire_owned()
        .map_err(|_| AppError::Busy)?;
    let codec = state.codec.clone();
    let settings = state.settings.clone();

    let package = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        job(&codec, &settings)
    })
    .await
    .map_err(|err| AppError::Internal(err.to_string()))??;

    Ok(zip_response(package))
}

/// Header-safe download name.
fn attachment_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_ascii_graphic() || c == ' ' => c,
            _ => '_',
        })
        .collect()
}

fn zip_response(package: Package) -> Response {
    let disposition = format!(
        "attachment; filename=\"{}\"",
        attachment_name(&package.file_name)
    );
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        package.archive,
    )
        .into_response()
}
