//! HTTP verification primitives shared by the proof resolvers.

use futures::StreamExt;
use keyproofs_core::{Error, Result};
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde::Serialize;

fn apply_headers(
    mut req: reqwest::RequestBuilder,
    headers: &[(String, String)],
) -> reqwest::RequestBuilder {
    req = req.header(ACCEPT, "application/json");
    for (name, value) in headers {
        req = req.header(name.as_str(), value.as_str());
    }
    req
}

/// Stream the body of `url` line by line and succeed as soon as one line
/// contains the uppercased fingerprint, case-insensitively.
///
/// Server errors surface as fetch errors; any other response is scanned,
/// and a body without the marker is [`Error::NoFingerprint`].
pub(crate) async fn check_http(
    http: &reqwest::Client,
    url: &str,
    fingerprint: &str,
    headers: &[(String, String)],
) -> Result<()> {
    tracing::debug!(url, fingerprint, "checking proof source");

    let resp = apply_headers(http.get(url), headers)
        .send()
        .await
        .map_err(|err| Error::fetch(url, err))?;

    let status = resp.status();
    if status.is_server_error() {
        return Err(Error::fetch(url, format!("bad response from remote: {status}")));
    }

    let needle = fingerprint.to_uppercase();
    let mut stream = resp.bytes_stream();
    let mut buf: Vec<u8> = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|err| Error::fetch(url, err))?;
        buf.extend_from_slice(&chunk);

        while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buf.drain(..=pos).collect();
            if String::from_utf8_lossy(&line).to_uppercase().contains(&needle) {
                return Ok(());
            }
        }
    }

    if String::from_utf8_lossy(&buf).to_uppercase().contains(&needle) {
        return Ok(());
    }

    Err(Error::NoFingerprint)
}

/// GET `url` and decode the JSON body.
pub(crate) async fn http_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    headers: &[(String, String)],
) -> Result<T> {
    tracing::debug!(url, "fetching json");

    let resp = apply_headers(http.get(url), headers)
        .send()
        .await
        .map_err(|err| Error::fetch(url, err))?;

    resp.json().await.map_err(|err| Error::fetch(url, err))
}

/// POST a JSON `payload` to `url` and decode the JSON response.
pub(crate) async fn post_json<B: Serialize, T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    payload: &B,
    headers: &[(String, String)],
) -> Result<T> {
    tracing::debug!(url, "posting json");

    let resp = apply_headers(http.post(url).json(payload), headers)
        .send()
        .await
        .map_err(|err| Error::fetch(url, err))?;

    resp.json().await.map_err(|err| Error::fetch(url, err))
}
