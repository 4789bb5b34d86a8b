//! Avatar, background and cover images.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyproofs_core::{hash, style};
use keyproofs_resolver::style as style_resolver;
use std::sync::OnceLock;

fn pixel_png() -> &'static [u8] {
    static PNG: OnceLock<Vec<u8>> = OnceLock::new();
    PNG.get_or_init(|| {
        let b64 = style::PIXEL.split_once(',').map(|(_, b)| b).unwrap_or("");
        BASE64.decode(b64).unwrap_or_default()
    })
}

fn png_response(bytes: Vec<u8>) -> Response {
    ([(header::CONTENT_TYPE, "image/png")], bytes).into_response()
}

/// `GET /{kind}/{hash}` for `avatar`, `bg` and `cover`.
///
/// An `@`-form hash resolves the domain's SRV override and redirects to
/// the avatar host with the sha256 address hash. Otherwise the hashed
/// symlink tree is served, with the transparent pixel standing in for
/// missing files.
pub async fn get_image(
    State(state): State<AppState>,
    Path((kind, hash)): Path<(String, String)>,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    if !matches!(kind.as_str(), "avatar" | "bg" | "cover") {
        return Err(ApiError::NotFound(format!("no such image kind: {kind}")));
    }

    if hash.contains('@') {
        let (avatar_host, _) = style_resolver::get_srv(state.dns.as_ref(), &hash).await;
        let hashed = hash::sha256_hex(hash.to_lowercase().as_bytes());
        let mut location = format!("https://{avatar_host}/{kind}/{hashed}");
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            location.push('?');
            location.push_str(&query);
        }
        tracing::debug!(kind, location, "redirecting to avatar host");
        return Ok(
            (StatusCode::MOVED_PERMANENTLY, [(header::LOCATION, location)]).into_response(),
        );
    }

    let path = state.avatar_links.link_path(&format!("{kind}-{hash}"));
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(png_response(bytes)),
        Err(err) => {
            tracing::debug!(kind, hash, error = %err, "image missing, serving pixel");
            Ok(png_response(pixel_png().to_vec()))
        }
    }
}
