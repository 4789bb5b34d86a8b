//! Server test utilities: a live test server with stubbed key and DNS
//! seams so the full request path runs hermetically.

use async_trait::async_trait;
use keyproofs_core::{AppConfig, Entity, Error, MailAddress};
use keyproofs_resolver::{DnsResolver, KeyLookup};
use keyproofs_server::{create_router, AppState};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Fingerprint used by most fixtures.
#[allow(dead_code)]
pub const FINGERPRINT: &str = "ABCDEF0123456789ABCDEF0123456789ABCDEF01";

/// Key lookup stub with per-identity fixtures, an artificial delay and a
/// fetch counter.
#[derive(Default)]
pub struct StubKeys {
    entities: Mutex<HashMap<String, Entity>>,
    pub fetch_count: AtomicUsize,
    delay: Mutex<Duration>,
}

#[allow(dead_code)]
impl StubKeys {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert(&self, id: &str, entity: Entity) {
        self.entities.lock().unwrap().insert(id.to_string(), entity);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fetches(&self) -> usize {
        self.fetch_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KeyLookup for StubKeys {
    async fn fetch(&self, id: &str) -> Result<Entity, Error> {
        self.fetch_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.entities
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::fetch(id, "no such key"))
    }
}

/// DNS stub: TXT fixtures plus a lookup counter; no SRV overrides.
#[derive(Default)]
pub struct StubDns {
    txt: Mutex<HashMap<String, Vec<String>>>,
    pub txt_count: AtomicUsize,
}

#[allow(dead_code)]
impl StubDns {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn insert_txt(&self, domain: &str, records: Vec<String>) {
        self.txt.lock().unwrap().insert(domain.to_string(), records);
    }

    pub fn lookups(&self) -> usize {
        self.txt_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for StubDns {
    async fn srv_first_target(
        &self,
        _service: &str,
        _proto: &str,
        _domain: &str,
    ) -> Option<String> {
        None
    }

    async fn txt(&self, domain: &str) -> Result<Vec<String>, Error> {
        self.txt_count.fetch_add(1, Ordering::SeqCst);
        self.txt
            .lock()
            .unwrap()
            .get(domain)
            .cloned()
            .ok_or_else(|| Error::fetch(domain, "no TXT records"))
    }
}

/// A server listening on an ephemeral port with stubbed seams.
#[allow(dead_code)]
pub struct TestServer {
    pub base_url: String,
    pub state: AppState,
    pub keys: Arc<StubKeys>,
    pub dns: Arc<StubDns>,
    pub http: reqwest::Client,
    _temp: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn start() -> Self {
        Self::start_with(StubKeys::new(), StubDns::new(), Duration::from_secs(20 * 60)).await
    }

    pub async fn start_with(
        keys: Arc<StubKeys>,
        dns: Arc<StubDns>,
        cache_expiry: Duration,
    ) -> Self {
        let temp = tempfile::tempdir().expect("create temp dir");

        // Bind first so the base URL (used by proof verify URLs) is known
        // before the state is built.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let mut config = AppConfig::for_testing(temp.path());
        config.base_url = Some(base_url.clone());
        config.wkd_domain = "example.org".to_string();

        let http = reqwest::Client::new();
        let state = AppState::with_cache_expiry(
            config,
            http.clone(),
            keys.clone(),
            dns.clone(),
            cache_expiry,
        )
        .expect("build app state");

        let router = create_router(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("serve");
        });

        Self {
            base_url,
            state,
            keys,
            dns,
            http,
            _temp: temp,
        }
    }

    /// GET a path, returning status and body.
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, String) {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .expect("request");
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        (status, body)
    }

    /// GET a path repeatedly until `pred` holds or `timeout` elapses.
    pub async fn get_until<F>(&self, path: &str, timeout: Duration, pred: F) -> String
    where
        F: Fn(&str) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let (_, body) = self.get(path).await;
            if pred(&body) {
                return body;
            }
            if tokio::time::Instant::now() > deadline {
                panic!("condition not met within {timeout:?}; last body:\n{body}");
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }
}

/// Entity fixture with the given proofs.
#[allow(dead_code)]
pub fn entity_with_proofs(address: &str, proofs: &[&str]) -> Entity {
    Entity {
        primary: MailAddress {
            name: Some("Test User".into()),
            address: address.to_string(),
        },
        emails: Vec::new(),
        fingerprint: FINGERPRINT.to_string(),
        proofs: proofs.iter().map(|p| p.to_string()).collect(),
        armor_text: "-----BEGIN PGP PUBLIC KEY BLOCK-----\n...\n-----END PGP PUBLIC KEY BLOCK-----\n"
            .to_string(),
        self_signature: None,
    }
}
