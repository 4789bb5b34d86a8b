//! Application state shared across handlers.

use crate::links::LinkFarm;
use keyproofs_cache::TaskCache;
use keyproofs_core::AppConfig;
use keyproofs_resolver::{DnsResolver, KeyLookup, ProofSettings};
use keyproofs_runner::{RunOptions, Runner};
use std::sync::Arc;
use std::time::Duration;

/// How long successful task results stay cached.
pub const CACHE_EXPIRY: Duration = Duration::from_secs(20 * 60);

/// Default deadline for any single task.
pub const RUNNER_TIMEOUT: Duration = Duration::from_secs(30);

/// Task starts per second.
pub const RUNNER_RATE: u32 = 10;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Result cache backing the runner's memoization.
    pub cache: TaskCache,
    /// The keyed task runner.
    pub runner: Runner,
    /// Shared outbound HTTP client.
    pub http: reqwest::Client,
    /// Key lookup seam (WKD + keyserver in production).
    pub keys: Arc<dyn KeyLookup>,
    /// DNS seam (SRV/TXT).
    pub dns: Arc<dyn DnsResolver>,
    /// Credentials and base URL for proof classification.
    pub proof_settings: Arc<ProofSettings>,
    /// Hashed symlink tree for avatar/bg/cover files.
    pub avatar_links: Arc<LinkFarm>,
    /// Hashed symlink tree for WKD key files.
    pub wkd_links: Arc<LinkFarm>,
}

impl AppState {
    /// Build the application state.
    ///
    /// Validates configuration (logging warnings), prepares the link farms
    /// on disk, and wires the runner with its default timeout and
    /// cache-backed decorator.
    pub fn new(
        config: AppConfig,
        http: reqwest::Client,
        keys: Arc<dyn KeyLookup>,
        dns: Arc<dyn DnsResolver>,
    ) -> std::io::Result<Self> {
        Self::with_cache_expiry(config, http, keys, dns, CACHE_EXPIRY)
    }

    /// Like [`AppState::new`] with a custom result TTL. Tests use short
    /// expiries to exercise staleness.
    pub fn with_cache_expiry(
        config: AppConfig,
        http: reqwest::Client,
        keys: Arc<dyn KeyLookup>,
        dns: Arc<dyn DnsResolver>,
        cache_expiry: Duration,
    ) -> std::io::Result<Self> {
        match config.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("configuration warning: {warning}");
                }
            }
            Err(error) => {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidInput, error))
            }
        }

        let cache = TaskCache::default();
        let runner = Runner::new(
            RUNNER_RATE,
            RunOptions::new()
                .timeout(RUNNER_TIMEOUT)
                .with_cache(cache.clone(), cache_expiry),
        );

        let proof_settings = Arc::new(ProofSettings {
            base_url: config.base_url(),
            reddit: config.reddit_credentials(),
            github_token: config.github_secret.clone(),
        });

        let avatar_links = Arc::new(LinkFarm::avatar(&config.avatar_path));
        let wkd_links = Arc::new(LinkFarm::wkd(&config.wkd_path));
        if !config.disable_avatar {
            avatar_links.ensure_dirs()?;
            avatar_links.rebuild()?;
        }
        if !config.disable_wkd {
            wkd_links.ensure_dirs()?;
            wkd_links.rebuild()?;
        }

        Ok(Self {
            config: Arc::new(config),
            cache,
            runner,
            http,
            keys,
            dns,
            proof_settings,
            avatar_links,
            wkd_links,
        })
    }

    /// Cancel the runner's root context; pending tasks finish cancelled.
    pub fn shutdown(&self) {
        self.runner.shutdown();
    }
}
