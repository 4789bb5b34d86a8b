//! XMPP vCard lookups for `xmpp:` proofs.
//!
//! The XMPP transport is an external collaborator; until one is wired in
//! the route validates the JID and reports the service unavailable.

use crate::error::{ApiError, ApiResult};
use axum::extract::{Path, State};
use axum::response::Response;
use keyproofs_core::MailAddress;

use crate::state::AppState;

/// `GET /vcard/{jid}`
pub async fn get_vcard(
    State(state): State<AppState>,
    Path(jid): Path<String>,
) -> ApiResult<Response> {
    MailAddress::parse(&jid).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    if state.config.xmpp_username.is_none() || state.config.xmpp_password.is_none() {
        return Err(ApiError::Unavailable(
            "vcard lookup is not configured".to_string(),
        ));
    }

    Err(ApiError::Unavailable(
        "no XMPP transport is connected".to_string(),
    ))
}
