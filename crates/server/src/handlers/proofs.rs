//! The identity page.

use crate::handlers::app_name;
use crate::{assemble, render};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::response::Html;

/// `GET /id/{id}` — assemble and render the proofs page for an identity.
pub async fn get_proofs(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Html<String> {
    tracing::debug!(id, "identity page");
    let view = assemble::assemble(&state, &id).await;
    Html(render::identity_page(&app_name(), &view))
}
