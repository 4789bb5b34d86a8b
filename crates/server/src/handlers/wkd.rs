//! WKD key serving and HKP key submission.

use crate::error::{ApiError, ApiResult, HkpStatus};
use crate::state::AppState;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Form;
use keyproofs_core::{hash, Entity};
use keyproofs_resolver::opgp;
use serde::Deserialize;

/// `GET /.well-known/openpgpkey/hu/{hash}` — direct method, configured
/// domain.
pub async fn get_key_by_hash(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> ApiResult<Response> {
    let domain = state.config.wkd_domain.clone();
    serve_key(&state, domain, hash).await
}

/// `GET /.well-known/openpgpkey/hu/{domain}/{hash}` — advanced method.
pub async fn get_key_by_domain(
    State(state): State<AppState>,
    Path((domain, hash)): Path<(String, String)>,
) -> ApiResult<Response> {
    serve_key(&state, domain, hash).await
}

async fn serve_key(state: &AppState, domain: String, hash: String) -> ApiResult<Response> {
    // A human-form hash is convenient for manual lookups.
    let (hash, domain) = if hash.contains('@') {
        hash::wkd_hash_address(&hash)
    } else {
        (hash, domain)
    };

    let path = state.wkd_links.link_path(&format!("keys-{domain}-{hash}"));
    tracing::debug!(path = %path.display(), "serving key");

    let bytes = tokio::fs::read(&path).await?;
    Ok(([(header::CONTENT_TYPE, "application/octet-stream")], bytes).into_response())
}

#[derive(Deserialize)]
pub struct KeySubmission {
    pub keytext: String,
}

/// Outcome of comparing a submitted key against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HkpDecision {
    Create,
    Update,
    Reject(HkpStatus),
}

/// Decide what to do with a submitted key.
///
/// A first submission is stored. A resubmission must match the stored
/// fingerprint, both keys must carry a self-signature, and the submitted
/// self-signature must be strictly newer.
pub fn hkp_decision(submitted: &Entity, current: Option<&Entity>) -> HkpDecision {
    let Some(current) = current else {
        return HkpDecision::Create;
    };

    if submitted.fingerprint != current.fingerprint {
        return HkpDecision::Reject(HkpStatus::MismatchFingerprint);
    }

    let (Some(new_sig), Some(cur_sig)) = (submitted.self_signature, current.self_signature)
    else {
        return HkpDecision::Reject(HkpStatus::MissingSignature);
    };

    let Some(new_time) = new_sig.created else {
        return HkpDecision::Reject(HkpStatus::MissingSignature);
    };

    match cur_sig.created {
        Some(cur_time) if cur_time < new_time => HkpDecision::Update,
        None => HkpDecision::Update,
        Some(_) => HkpDecision::Reject(HkpStatus::OutOfDate),
    }
}

/// `POST /pks/add` — HKP key submission.
pub async fn post_key(
    State(state): State<AppState>,
    Form(submission): Form<KeySubmission>,
) -> Response {
    let parsed = match opgp::parse_key(submission.keytext.as_bytes(), true) {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::debug!(error = %err, "rejecting unreadable key submission");
            return text(StatusCode::BAD_REQUEST, "ERR READ KEY");
        }
    };

    let address = parsed.entity.primary.address.clone();
    let file = state.wkd_links.file_path("keys", &address);

    let current = match tokio::fs::read(&file).await {
        Ok(bytes) => match opgp::parse_key(&bytes, false) {
            Ok(current) => Some(current.entity),
            Err(err) => {
                tracing::error!(error = %err, address, "stored key is unreadable");
                return text(StatusCode::INTERNAL_SERVER_ERROR, "ERR PARSE");
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            tracing::error!(error = %err, address, "reading stored key failed");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "ERR READ");
        }
    };

    let decision = hkp_decision(&parsed.entity, current.as_ref());
    tracing::debug!(address, ?decision, "key submission");

    let (status_header, body) = match decision {
        HkpDecision::Reject(reason) => return ApiError::Hkp(reason).into_response(),
        HkpDecision::Create => ("Created key", "OK CREATED"),
        HkpDecision::Update => ("Updated key", "OK UPDATED"),
    };

    let bytes = match parsed.to_bytes() {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::error!(error = %err, "serializing key failed");
            return text(StatusCode::INTERNAL_SERVER_ERROR, "ERR WRITE");
        }
    };

    if let Err(err) = tokio::fs::write(&file, bytes).await {
        tracing::error!(error = %err, file = %file.display(), "writing key failed");
        return text(StatusCode::INTERNAL_SERVER_ERROR, "ERR CREATE");
    }

    if let Err(err) = state.wkd_links.link("keys", &address) {
        tracing::error!(error = %err, address, "linking key failed");
    }

    (
        StatusCode::OK,
        [
            ("X-HKP-Status", status_header),
            ("Content-Type", "text/plain"),
        ],
        body,
    )
        .into_response()
}

fn text(status: StatusCode, body: &'static str) -> Response {
    (status, [(header::CONTENT_TYPE, "text/plain")], body).into_response()
}
