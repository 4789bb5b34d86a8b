//! Home page, lookup redirect and favicon.

use crate::handlers::app_name;
use crate::render;
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;
use std::sync::OnceLock;

// 16x16 key icon.
const KEY_PNG_B64: &str = "iVBORw0KGgoAAAANSUhEUgAAABAAAAAQCAYAAAAf8/9hAAABKUlEQVQ4jZ2SvUoDURCFUy/Y2Fv4BoKIiFgLSWbmCWw0e3cmNgGfwacQsbCxUEFEEIVkxsQulaK1kheIiFVW1mJXiZv904FbXb5zzvzUaiWlPqyYwIkyvRjjqwmeaauxUcbFMKOvTKEJRVPv05hCY9wrhHt+fckEJ79gxg9rweJN8qdSkESZjlLOkQm+Xe9szlubFkxwYoznuQIm9DgrQJEyjZXpPU5Eo6L+H7IEUmJFAnBQJmAMp5nw0IFnjFoiEGrQXJuBLx14JtgtiR5qAO2c4aFLAffGeGiMT8b0rAEe96WxnBlbGbbia/vZ+2CwjXO5g0pN/TZ1NNXgoQPPHO2aJLsViu4E+xdVnXsOOtPOMbxeDY6jw/6/nL+r6+qryjQyhqs/OSf1Bf+pJC1wKqO/AAAAAElFTkSuQmCC";

fn key_png() -> &'static [u8] {
    static PNG: OnceLock<Vec<u8>> = OnceLock::new();
    PNG.get_or_init(|| BASE64.decode(KEY_PNG_B64).unwrap_or_default())
}

#[derive(Deserialize)]
pub struct HomeQuery {
    pub id: Option<String>,
}

/// `GET /` — home page; `?id=` redirects to the identity page.
pub async fn get_home(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> Response {
    if let Some(id) = query.id.filter(|id| !id.is_empty()) {
        let location = format!("{}/id/{}", state.config.base_url(), id);
        return (StatusCode::FOUND, [(header::LOCATION, location)]).into_response();
    }

    Html(render::home_page(&app_name())).into_response()
}

/// `GET /favicon.ico`
pub async fn favicon() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "image/png")], key_png())
}
