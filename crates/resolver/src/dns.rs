//! DNS seam: SRV discovery for styles and TXT lookup for the `/dns`
//! endpoint.
//!
//! The trait exists so tests can stub DNS; production uses the system
//! resolver.

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use keyproofs_core::Error;

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Target of the first SRV record for `_<service>._<proto>.<domain>`,
    /// with any trailing dot stripped. `None` when the record set is empty
    /// or the lookup fails.
    async fn srv_first_target(&self, service: &str, proto: &str, domain: &str) -> Option<String>;

    /// TXT records for `domain`, each record's character strings joined.
    async fn txt(&self, domain: &str) -> Result<Vec<String>, Error>;
}

/// System-configured hickory resolver.
pub struct HickoryDns {
    resolver: TokioAsyncResolver,
}

impl HickoryDns {
    /// Build from `/etc/resolv.conf`, falling back to public defaults.
    pub fn from_system() -> Self {
        let resolver = TokioAsyncResolver::tokio_from_system_conf().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "no system resolver config, using defaults");
            TokioAsyncResolver::tokio(ResolverConfig::default(), ResolverOpts::default())
        });
        Self { resolver }
    }
}

#[async_trait]
impl DnsResolver for HickoryDns {
    async fn srv_first_target(&self, service: &str, proto: &str, domain: &str) -> Option<String> {
        let name = format!("_{service}._{proto}.{domain}.");
        let lookup = self.resolver.srv_lookup(name).await.ok()?;
        lookup
            .iter()
            .next()
            .map(|srv| srv.target().to_utf8().trim_end_matches('.').to_string())
    }

    async fn txt(&self, domain: &str) -> Result<Vec<String>, Error> {
        let lookup = self
            .resolver
            .txt_lookup(domain.to_string())
            .await
            .map_err(|err| Error::fetch(domain, err))?;

        Ok(lookup
            .iter()
            .map(|txt| {
                txt.txt_data()
                    .iter()
                    .map(|part| String::from_utf8_lossy(part).into_owned())
                    .collect::<String>()
            })
            .collect())
    }
}
