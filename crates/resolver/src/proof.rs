//! Proof resolver factory.
//!
//! Classifies a proof URI into a per-service verification plan. The
//! classification table follows the upstream service conventions, quirks
//! included: a Twitter URI with a short path falls through to the generic
//! HTTPS handler, Reddit requires exactly six path segments, and the Twtxt
//! hash travels in the POST body rather than the fetch URL.

use crate::verify;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyproofs_core::{Error, Proof, ProofStatus, Result};
use serde::Deserialize;
use url::Url;

/// Configuration the classifier draws service credentials from.
#[derive(Debug, Clone, Default)]
pub struct ProofSettings {
    /// Base URL of this service, for `dns:` and `xmpp:` verify endpoints.
    pub base_url: String,
    /// Reddit `(api key, secret)` for the Basic auth header.
    pub reddit: Option<(String, String)>,
    /// GitHub token for the Bearer header.
    pub github_token: Option<String>,
}

/// How a classified proof gets verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckKind {
    /// Fetch a URL and scan for the fingerprint line by line.
    Http {
        url: String,
        headers: Vec<(String, String)>,
    },
    /// GitLab: look up the user id, then scan project descriptions.
    Gitlab { host: String, user: String },
    /// Twtxt: POST the conversation hash and inspect the first twt.
    Twtxt { url: String, hash: String },
    /// Unverifiable; resolves to `Invalid`.
    None,
}

/// A classified proof, ready to resolve.
#[derive(Debug, Clone)]
pub struct ProofCheck {
    proof: Proof,
    kind: CheckKind,
}

/// Marker text GitLab and Twtxt profiles must carry.
fn fingerprint_marker(fingerprint: &str) -> String {
    format!(
        "[Verifying my OpenPGP key: openpgp4fpr:{}]",
        fingerprint.to_lowercase()
    )
}

/// Classify `uri` into a verification plan for `fingerprint`.
pub fn classify(uri: &str, fingerprint: &str, settings: &ProofSettings) -> ProofCheck {
    let mut proof = Proof {
        uri: uri.to_string(),
        fingerprint: fingerprint.to_string(),
        icon: String::new(),
        service: String::new(),
        name: String::new(),
        link: uri.to_string(),
        verify_url: uri.to_string(),
        status: ProofStatus::Checking,
    };

    let parsed = match Url::parse(uri) {
        Ok(parsed) => parsed,
        Err(err) => {
            proof.icon = "exclamation-triangle".into();
            proof.service = "error".into();
            proof.name = err.to_string();
            return ProofCheck {
                proof,
                kind: CheckKind::None,
            };
        }
    };

    proof.service = parsed.scheme().to_string();

    match parsed.scheme() {
        "dns" => {
            let opaque = parsed.path();
            proof.icon = "fas fa-globe".into();
            proof.name = opaque.to_string();
            proof.link = format!("https://{opaque}");
            proof.verify_url = format!("{}/dns/{opaque}", settings.base_url);
            let url = proof.verify_url.clone();
            ProofCheck {
                proof,
                kind: CheckKind::Http {
                    url,
                    headers: Vec::new(),
                },
            }
        }
        "xmpp" => {
            let opaque = parsed.path();
            proof.icon = "fas fa-comments".into();
            proof.name = opaque.to_string();
            proof.verify_url = format!("{}/vcard/{opaque}", settings.base_url);
            let url = proof.verify_url.clone();
            ProofCheck {
                proof,
                kind: CheckKind::Http {
                    url,
                    headers: Vec::new(),
                },
            }
        }
        "https" => classify_https(proof, &parsed, uri, settings),
        _ => {
            proof.icon = "exclamation-triangle".into();
            proof.service = "unknown".into();
            proof.name = "nobody".into();
            ProofCheck {
                proof,
                kind: CheckKind::None,
            }
        }
    }
}

fn classify_https(
    mut proof: Proof,
    parsed: &Url,
    uri: &str,
    settings: &ProofSettings,
) -> ProofCheck {
    let host = parsed.host_str().unwrap_or("");
    let path = parsed.path();

    proof.icon = "fas fa-atlas".into();
    proof.name = host.to_string();
    proof.link = format!("https://{host}");

    // Path segments the way the table counts them: a leading slash yields
    // an empty first element.
    let sp3: Vec<&str> = path.splitn(3, '/').collect();

    let kind = if host.starts_with("twitter.com") && sp3.len() > 2 {
        proof.icon = "fab fa-twitter".into();
        proof.service = "Twitter".into();
        proof.name = sp3[1].to_string();
        proof.link = format!("https://twitter.com/{}", proof.name);
        proof.verify_url = format!("https://twitter.com{path}");
        CheckKind::Http {
            url: format!("https://mobile.twitter.com{path}"),
            headers: Vec::new(),
        }
    } else if host.starts_with("news.ycombinator.com") {
        proof.icon = "fab fa-hacker-news".into();
        proof.service = "HackerNews".into();
        proof.name = parsed
            .query_pairs()
            .find(|(k, _)| k == "id")
            .map(|(_, v)| v.into_owned())
            .unwrap_or_default();
        proof.link = uri.to_string();
        CheckKind::Http {
            url: proof.verify_url.clone(),
            headers: Vec::new(),
        }
    } else if host.starts_with("dev.to") && sp3.len() > 2 {
        proof.icon = "fab fa-dev".into();
        proof.service = "dev.to".into();
        proof.name = sp3[1].to_string();
        proof.link = format!("https://dev.to/{}", proof.name);
        CheckKind::Http {
            url: format!("https://dev.to/api/articles/{}/{}", sp3[1], sp3[2]),
            headers: Vec::new(),
        }
    } else if (host.starts_with("reddit.com") || host.starts_with("www.reddit.com"))
        && path.splitn(6, '/').count() > 5
    {
        let sp6: Vec<&str> = path.splitn(6, '/').collect();

        let mut headers = Vec::new();
        if let Some((apikey, secret)) = &settings.reddit {
            headers.push((
                "Authorization".to_string(),
                format!("basic {}", BASE64.encode(format!("{apikey}:{secret}"))),
            ));
            headers.push(("User-Agent".to_string(), "ipseity/0.1.0".to_string()));
        }

        proof.icon = "fab fa-reddit".into();
        proof.service = "Reddit".into();
        proof.name = sp6[2].to_string();
        proof.link = format!("https://www.reddit.com/user/{}", proof.name);
        CheckKind::Http {
            url: format!(
                "https://api.reddit.com/user/{}/comments/{}/{}",
                sp6[2], sp6[4], sp6[5]
            ),
            headers,
        }
    } else if host.starts_with("gist.github.com") && sp3.len() > 2 {
        let mut headers = Vec::new();
        if let Some(token) = &settings.github_token {
            headers.push(("Authorization".to_string(), format!("bearer {token}")));
            headers.push(("User-Agent".to_string(), "keyproofs/0.1.0".to_string()));
        }

        proof.icon = "fab fa-github".into();
        proof.service = "GitHub".into();
        proof.name = sp3[1].to_string();
        proof.link = format!("https://github.com/{}", proof.name);
        CheckKind::Http {
            url: format!("https://api.github.com/gists/{}", sp3[2]),
            headers,
        }
    } else if host.starts_with("lobste.rs") && sp3.len() > 2 {
        proof.icon = "fas fa-list-ul".into();
        proof.service = "Lobsters".into();
        proof.name = sp3[2].to_string();
        proof.link = uri.to_string();
        proof.verify_url = format!("{uri}.json");
        CheckKind::Http {
            url: proof.verify_url.clone(),
            headers: Vec::new(),
        }
    } else if path.ends_with("/gitlab_proof") && sp3.len() > 1 {
        proof.icon = "fab fa-gitlab".into();
        proof.service = "GitLab".into();
        let user = sp3[1].to_string();
        proof.link = format!("https://{host}/{user}");
        proof.name = format!("{user}@{host}");
        CheckKind::Gitlab {
            host: host.to_string(),
            user,
        }
    } else if path.ends_with("/gitea_proof") && sp3.len() > 2 {
        proof.icon = "fas fa-mug-hot".into();
        proof.service = "Gitea".into();
        let user = sp3[1].to_string();
        proof.link = format!("https://{host}/{user}");
        proof.name = format!("{user}@{host}");
        CheckKind::Http {
            url: format!("https://{host}/api/v1/repos/{user}/gitea_proof"),
            headers: Vec::new(),
        }
    } else if path.contains("/conv/") && sp3.len() == 3 {
        proof.icon = "fas fa-comment-alt".into();
        proof.service = "Twtxt".into();
        proof.name = "loading...".into();
        proof.link = format!("https://{host}");
        // The hash rides in the POST body; the fetch URL carries only the
        // conversation endpoint.
        CheckKind::Twtxt {
            url: format!("https://{host}/api/v1/conv"),
            hash: sp3[2].to_string(),
        }
    } else if sp3.len() > 1 && !sp3[1].is_empty() {
        proof.icon = "fas fa-project-diagram".into();
        proof.service = "Fediverse".into();
        let name = if sp3.len() > 2 && matches!(sp3[1], "u" | "user" | "users") {
            sp3[2]
        } else {
            sp3[1]
        };
        proof.name = format!("{name}@{host}");
        proof.link = uri.to_string();
        CheckKind::Http {
            url: proof.verify_url.clone(),
            headers: Vec::new(),
        }
    } else {
        CheckKind::None
    };

    ProofCheck { proof, kind }
}

#[derive(Deserialize)]
struct GitlabUser {
    id: u64,
}

#[derive(Deserialize)]
struct GitlabProject {
    #[serde(default)]
    description: Option<String>,
}

#[derive(Deserialize, Default)]
struct TwtxtConv {
    #[serde(default)]
    twts: Vec<Twt>,
}

#[derive(Deserialize)]
struct Twt {
    #[serde(default)]
    text: String,
    #[serde(default)]
    twter: Twter,
}

#[derive(Deserialize, Default)]
struct Twter {
    #[serde(default)]
    nick: String,
}

impl ProofCheck {
    pub fn proof(&self) -> &Proof {
        &self.proof
    }

    pub fn into_proof(self) -> Proof {
        self.proof
    }

    pub fn kind(&self) -> &CheckKind {
        &self.kind
    }

    /// Run the verification plan, updating the proof's status.
    ///
    /// `Ok` means verified. [`Error::NoFingerprint`] marks the proof
    /// `Invalid`; any other error marks it `Error`.
    pub async fn resolve(&mut self, http: &reqwest::Client) -> Result<()> {
        let result = match &self.kind {
            CheckKind::Http { url, headers } => {
                verify::check_http(http, url, &self.proof.fingerprint, headers).await
            }
            CheckKind::Gitlab { host, user } => self.resolve_gitlab(http, host, user).await,
            CheckKind::Twtxt { url, hash } => {
                let (result, name) = Self::resolve_twtxt(
                    http,
                    url,
                    hash,
                    &self.proof.fingerprint,
                )
                .await;
                if let Some(nick) = name {
                    self.proof.link = format!("{}/user/{}", self.proof.link, nick);
                    self.proof.name = nick;
                }
                result
            }
            CheckKind::None => Err(Error::Internal("no resolver for this proof".to_string())),
        };

        self.proof.status = match &result {
            Ok(()) => ProofStatus::Verified,
            Err(Error::NoFingerprint) => ProofStatus::Invalid,
            Err(_) if self.kind == CheckKind::None => ProofStatus::Invalid,
            Err(_) => ProofStatus::Error,
        };

        result
    }

    async fn resolve_gitlab(
        &self,
        http: &reqwest::Client,
        host: &str,
        user: &str,
    ) -> Result<()> {
        let users: Vec<GitlabUser> = verify::http_json(
            http,
            &format!("https://{host}/api/v4/users?username={user}"),
            &[],
        )
        .await?;
        let Some(user) = users.first() else {
            return Err(Error::NoFingerprint);
        };

        let projects: Vec<GitlabProject> = verify::http_json(
            http,
            &format!("https://{host}/api/v4/users/{}/projects", user.id),
            &[],
        )
        .await?;

        let marker = fingerprint_marker(&self.proof.fingerprint);
        if projects
            .iter()
            .any(|p| p.description.as_deref().unwrap_or("").contains(&marker))
        {
            Ok(())
        } else {
            Err(Error::NoFingerprint)
        }
    }

    async fn resolve_twtxt(
        http: &reqwest::Client,
        url: &str,
        hash: &str,
        fingerprint: &str,
    ) -> (Result<()>, Option<String>) {
        let conv: TwtxtConv = match verify::post_json(
            http,
            url,
            &serde_json::json!({ "hash": hash }),
            &[],
        )
        .await
        {
            Ok(conv) => conv,
            Err(err) => return (Err(err), None),
        };

        let Some(twt) = conv.twts.first() else {
            return (Err(Error::NoFingerprint), None);
        };

        let nick = Some(twt.twter.nick.clone());
        if twt.text.contains(&fingerprint_marker(fingerprint)) {
            (Ok(()), nick)
        } else {
            (Err(Error::NoFingerprint), nick)
        }
    }
}
