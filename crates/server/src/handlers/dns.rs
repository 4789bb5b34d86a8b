//! TXT lookups for `dns:` proofs.

use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

/// `GET /dns/{domain}` — TXT records joined by newline.
pub async fn get_dns(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Response {
    match state.dns.txt(&domain).await {
        Ok(records) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            records.join("\n"),
        )
            .into_response(),
        Err(err) => (
            StatusCode::BAD_REQUEST,
            [(header::CONTENT_TYPE, "text/plain")],
            err.to_string(),
        )
            .into_response(),
    }
}
