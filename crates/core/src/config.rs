//! Application configuration.
//!
//! Configuration comes from the environment only; every field has a
//! default so the binary runs with no setup. Boolean switches expect the
//! literal `true`.

use figment::providers::Env;
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variables the config is read from.
const ENV_KEYS: &[&str] = &[
    "http_listen",
    "base_url",
    "cors_methods",
    "cors_origin",
    "avatar_path",
    "wkd_path",
    "wkd_domain",
    "reddit_apikey",
    "reddit_secret",
    "github_secret",
    "xmpp_username",
    "xmpp_password",
    "disable_keyproof",
    "disable_dns",
    "disable_avatar",
    "disable_wkd",
    "disable_vcard",
];

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Listen address (`HTTP_LISTEN`). A bare `:port` binds all interfaces.
    #[serde(default = "default_http_listen")]
    pub http_listen: String,
    /// External base URL (`BASE_URL`). Derived from the hostname and listen
    /// address when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Allowed CORS methods, whitespace-separated (`CORS_METHODS`).
    #[serde(default = "default_cors_methods")]
    pub cors_methods: String,
    /// Allowed CORS origins, whitespace-separated (`CORS_ORIGIN`).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Root of the avatar/bg/cover file trees (`AVATAR_PATH`).
    #[serde(default = "default_avatar_path")]
    pub avatar_path: PathBuf,
    /// Root of the WKD key tree (`WKD_PATH`).
    #[serde(default = "default_wkd_path")]
    pub wkd_path: PathBuf,
    /// Domain served by the single-hash WKD route (`WKD_DOMAIN`).
    #[serde(default)]
    pub wkd_domain: String,
    /// Reddit API credentials (`REDDIT_APIKEY` / `REDDIT_SECRET`). Absent
    /// credentials simply disable the Basic auth header.
    #[serde(default)]
    pub reddit_apikey: Option<String>,
    #[serde(default)]
    pub reddit_secret: Option<String>,
    /// GitHub token (`GITHUB_SECRET`); absent disables the Bearer header.
    #[serde(default)]
    pub github_secret: Option<String>,
    /// XMPP collaborator credentials (`XMPP_USERNAME` / `XMPP_PASSWORD`).
    #[serde(default)]
    pub xmpp_username: Option<String>,
    #[serde(default)]
    pub xmpp_password: Option<String>,
    /// Feature switches (`DISABLE_*`), each dropping a route group.
    #[serde(default)]
    pub disable_keyproof: bool,
    #[serde(default)]
    pub disable_dns: bool,
    #[serde(default)]
    pub disable_avatar: bool,
    #[serde(default)]
    pub disable_wkd: bool,
    #[serde(default)]
    pub disable_vcard: bool,
}

fn default_http_listen() -> String {
    ":9061".to_string()
}

fn default_cors_methods() -> String {
    "GET".to_string()
}

fn default_cors_origin() -> String {
    "*".to_string()
}

fn default_avatar_path() -> PathBuf {
    PathBuf::from("data/avatar")
}

fn default_wkd_path() -> PathBuf {
    PathBuf::from("data/wkd")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http_listen: default_http_listen(),
            base_url: None,
            cors_methods: default_cors_methods(),
            cors_origin: default_cors_origin(),
            avatar_path: default_avatar_path(),
            wkd_path: default_wkd_path(),
            wkd_domain: String::new(),
            reddit_apikey: None,
            reddit_secret: None,
            github_secret: None,
            xmpp_username: None,
            xmpp_password: None,
            disable_keyproof: false,
            disable_dns: false,
            disable_avatar: false,
            disable_wkd: false,
            disable_vcard: false,
        }
    }
}

impl AppConfig {
    /// Load from the environment.
    pub fn from_env() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Env::raw().only(ENV_KEYS))
            .extract()
    }

    /// Address suitable for binding; a bare `:port` becomes `0.0.0.0:port`.
    pub fn listen_addr(&self) -> String {
        if self.http_listen.starts_with(':') {
            format!("0.0.0.0{}", self.http_listen)
        } else {
            self.http_listen.clone()
        }
    }

    /// External base URL, derived from the hostname when not configured.
    pub fn base_url(&self) -> String {
        if let Some(url) = &self.base_url {
            return url.trim_end_matches('/').to_string();
        }

        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "localhost".to_string());

        if self.http_listen.starts_with(':') {
            format!("http://{}{}", host, self.http_listen)
        } else {
            format!("http://{}", self.http_listen)
        }
    }

    /// Reddit Basic-auth credentials when both halves are configured.
    pub fn reddit_credentials(&self) -> Option<(String, String)> {
        match (&self.reddit_apikey, &self.reddit_secret) {
            (Some(key), Some(secret)) if !key.is_empty() => {
                Some((key.clone(), secret.clone()))
            }
            _ => None,
        }
    }

    /// Validate the configuration, returning warnings for odd but allowed
    /// settings.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if self.http_listen.is_empty() {
            return Err("HTTP_LISTEN cannot be empty".to_string());
        }

        if self.reddit_apikey.is_some() != self.reddit_secret.is_some() {
            warnings.push(
                "REDDIT_APIKEY and REDDIT_SECRET must both be set; \
                 Reddit requests will go out unauthenticated"
                    .to_string(),
            );
        }

        if self.xmpp_username.is_some() != self.xmpp_password.is_some() {
            warnings.push(
                "XMPP_USERNAME and XMPP_PASSWORD must both be set; \
                 the vcard route will answer 503"
                    .to_string(),
            );
        }

        Ok(warnings)
    }

    /// Create a test configuration rooted in a scratch directory.
    ///
    /// **For testing only.**
    pub fn for_testing(root: &std::path::Path) -> Self {
        Self {
            http_listen: "127.0.0.1:0".to_string(),
            base_url: Some("http://127.0.0.1:0".to_string()),
            avatar_path: root.join("avatar"),
            wkd_path: root.join("wkd"),
            ..Self::default()
        }
    }
}
