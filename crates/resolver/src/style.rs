//! Style resolution: SRV-directed avatar and style hosts.

use crate::dns::DnsResolver;
use keyproofs_core::style::DEFAULT_AVATAR_HOST;
use keyproofs_core::Style;

/// Discover `(avatar_host, style_host)` for an email's domain.
///
/// `_style-sec._tcp` directs both hosts; `_avatars-sec._tcp` only the
/// avatar host. Without either record the defaults apply: libravatar for
/// avatars and no style host.
pub async fn get_srv(dns: &dyn DnsResolver, email: &str) -> (String, String) {
    let domain = email.split_once('@').map(|(_, d)| d).unwrap_or("");

    if let Some(target) = dns.srv_first_target("style-sec", "tcp", domain).await {
        return (target.clone(), target);
    }

    if let Some(target) = dns.srv_first_target("avatars-sec", "tcp", domain).await {
        return (target, String::new());
    }

    (DEFAULT_AVATAR_HOST.to_string(), String::new())
}

/// Resolve the full style for an email.
pub async fn get_style(dns: &dyn DnsResolver, email: &str) -> Style {
    let (avatar_host, style_host) = get_srv(dns, email).await;
    tracing::debug!(email, avatar_host, style_host, "resolved style hosts");
    Style::derive(email, &avatar_host, &style_host)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use keyproofs_core::Error;

    struct StubDns {
        style: Option<String>,
        avatars: Option<String>,
    }

    #[async_trait]
    impl DnsResolver for StubDns {
        async fn srv_first_target(
            &self,
            service: &str,
            _proto: &str,
            _domain: &str,
        ) -> Option<String> {
            match service {
                "style-sec" => self.style.clone(),
                "avatars-sec" => self.avatars.clone(),
                _ => None,
            }
        }

        async fn txt(&self, _domain: &str) -> Result<Vec<String>, Error> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn style_record_sets_both_hosts() {
        let dns = StubDns {
            style: Some("img.example.org".into()),
            avatars: None,
        };
        let (avatar, style) = get_srv(&dns, "me@example.org").await;
        assert_eq!(avatar, "img.example.org");
        assert_eq!(style, "img.example.org");
    }

    #[tokio::test]
    async fn avatar_record_sets_avatar_only() {
        let dns = StubDns {
            style: None,
            avatars: Some("ava.example.org".into()),
        };
        let (avatar, style) = get_srv(&dns, "me@example.org").await;
        assert_eq!(avatar, "ava.example.org");
        assert_eq!(style, "");
    }

    #[tokio::test]
    async fn defaults_without_records() {
        let dns = StubDns {
            style: None,
            avatars: None,
        };
        let (avatar, style) = get_srv(&dns, "me@example.org").await;
        assert_eq!(avatar, DEFAULT_AVATAR_HOST);
        assert_eq!(style, "");
    }

    #[tokio::test]
    async fn style_urls_point_at_style_host() {
        let dns = StubDns {
            style: Some("img.example.org".into()),
            avatars: None,
        };
        let style = get_style(&dns, "me@example.org").await;
        assert!(style.cover.starts_with("https://img.example.org/cover/"));
        assert!(style.background.starts_with("https://img.example.org/bg/"));
    }
}
