//! Public key lookup for an identity string.
//!
//! A hex identity goes straight to the keyserver by fingerprint. An email
//! identity tries the WKD direct method, then the advanced method, then
//! falls back to the keyserver by email. Anything else is a parse error.

use crate::opgp::parse_key;
use async_trait::async_trait;
use keyproofs_core::{hash, Entity, Error, MailAddress, Result};

/// Default verifying keyserver.
pub const DEFAULT_KEYSERVER: &str = "https://keys.openpgp.org";

/// The seam the page assembler fetches entities through.
#[async_trait]
pub trait KeyLookup: Send + Sync {
    async fn fetch(&self, id: &str) -> Result<Entity>;
}

/// Production lookup over WKD and a verifying keyserver.
pub struct HttpKeyLookup {
    http: reqwest::Client,
    keyserver: String,
    use_wkd: bool,
}

impl HttpKeyLookup {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_keyserver(http, DEFAULT_KEYSERVER, true)
    }

    /// Override the keyserver base URL and WKD probing; lets tests point at
    /// a local server without touching real domains.
    pub fn with_keyserver(
        http: reqwest::Client,
        keyserver: impl Into<String>,
        use_wkd: bool,
    ) -> Self {
        Self {
            http,
            keyserver: keyserver.into().trim_end_matches('/').to_string(),
            use_wkd,
        }
    }

    /// WKD direct and advanced method URLs for an address.
    pub fn wkd_urls(addr: &MailAddress) -> (String, String) {
        let domain = addr.domain();
        let direct_hash = hash::wkd_hash(addr.local());
        let advanced_hash = hash::wkd_hash_exact(addr.local());

        (
            format!("https://{domain}/.well-known/openpgpkey/hu/{direct_hash}"),
            format!("https://openpgpkey.{domain}/.well-known/openpgpkey/hu/{domain}/{advanced_hash}"),
        )
    }

    async fn fetch_entity(&self, url: &str, expect_armored: bool) -> Result<Entity> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|err| Error::fetch(url, err))?;

        let status = resp.status();
        tracing::debug!(url, %status, expect_armored, "key lookup response");
        if !status.is_success() {
            return Err(Error::fetch(url, format!("bad response from remote: {status}")));
        }

        let armored = expect_armored
            || resp
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|ct| ct.starts_with("application/pgp-keys"));

        let body = resp.bytes().await.map_err(|err| Error::fetch(url, err))?;
        Ok(parse_key(&body, armored)?.entity)
    }
}

#[async_trait]
impl KeyLookup for HttpKeyLookup {
    async fn fetch(&self, id: &str) -> Result<Entity> {
        if hash::is_fingerprint(id) {
            let url = format!(
                "{}/vks/v1/by-fingerprint/{}",
                self.keyserver,
                id.to_uppercase()
            );
            return self.fetch_entity(&url, true).await;
        }

        let addr = MailAddress::parse(id)
            .map_err(|err| Error::ParseAddress(format!("{id}: {err}")))?;

        if self.use_wkd {
            let (direct, advanced) = Self::wkd_urls(&addr);
            if let Ok(entity) = self.fetch_entity(&direct, false).await {
                return Ok(entity);
            }
            if let Ok(entity) = self.fetch_entity(&advanced, false).await {
                return Ok(entity);
            }
        }

        let encoded: String = url::form_urlencoded::byte_serialize(id.as_bytes()).collect();
        let url = format!("{}/vks/v1/by-email/{}", self.keyserver, encoded);
        self.fetch_entity(&url, true).await
    }
}
