//! PNG QR codes.

use crate::error::{ApiError, ApiResult};
use axum::extract::Query;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use image::ImageEncoder;
use qrcode::{EcLevel, QrCode};
use serde::Deserialize;

#[derive(Deserialize)]
pub struct QrQuery {
    /// Content to encode.
    pub c: Option<String>,
    /// Size in pixels; a small negative value scales per module.
    pub s: Option<i32>,
    /// Recovery level: L, M, Q or H.
    pub r: Option<String>,
}

/// `GET /qr?c=<text>&s=<size>&r=<level>`
pub async fn get_qr(Query(query): Query<QrQuery>) -> ApiResult<Response> {
    let content = query.c.unwrap_or_default();

    // Negatives in (-10, 0) select per-module pixel sizing; positives are
    // clamped into [64, 4096] with a default of 64.
    let requested = query.s.unwrap_or(0);
    let mut size: i32 = 64;
    if requested > -10 && requested < 0 {
        size = requested;
    } else if requested > 64 && requested < 4096 {
        size = requested;
    } else if requested >= 4096 {
        size = 4096;
    }

    let level = match query.r.as_deref() {
        Some("L") => EcLevel::L,
        Some("Q") => EcLevel::Q,
        Some("H") => EcLevel::H,
        _ => EcLevel::M,
    };

    tracing::debug!(content, size, ?level, "qr code");

    let code = QrCode::with_error_correction_level(content.as_bytes(), level)
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let image = if size < 0 {
        let pixels = size.unsigned_abs();
        code.render::<image::Luma<u8>>()
            .module_dimensions(pixels, pixels)
            .build()
    } else {
        code.render::<image::Luma<u8>>()
            .min_dimensions(size as u32, size as u32)
            .build()
    };

    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png)
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::L8,
        )
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "image/png")], png).into_response())
}
