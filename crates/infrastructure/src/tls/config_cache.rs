use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use rustls::client::ClientSessionMemoryCache;
use rustls::{ClientConfig, RootCertStore};

const SESSION_CACHE_CAPACITY: usize = 1000;

fn root_store() -> &'static Arc<RootCertStore> {
    static ROOTS: OnceLock<Arc<RootCertStore>> = OnceLock::new();
    ROOTS.get_or_init(|| {
        let mut store = RootCertStore::empty();
        store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        Arc::new(store)
    })
}

/// One `rustls::ClientConfig` per front domain, each with SNI suppressed
/// (the ClientHello never names the real destination) but its own private
/// session-resumption cache, so tickets issued while vetting or dialing one
/// front domain are never replayed against a different one.
pub struct TlsConfigCache {
    configs: DashMap<String, Arc<ClientConfig>>,
    roots: Arc<RootCertStore>,
}

impl TlsConfigCache {
    pub fn new() -> Self {
        Self {
            configs: DashMap::new(),
            roots: root_store().clone(),
        }
    }

    /// Builds a cache trusting `roots` instead of the public CA set. Only
    /// useful for pointing tests at a local TLS listener with a test-only
    /// certificate; real masquerades always verify against public roots.
    #[doc(hidden)]
    pub fn with_roots(roots: Arc<RootCertStore>) -> Self {
        Self {
            configs: DashMap::new(),
            roots,
        }
    }

    pub fn get_or_build(&self, front_domain: &str) -> Arc<ClientConfig> {
        if let Some(existing) = self.configs.get(front_domain) {
            return existing.clone();
        }

        let config = Arc::new(self.build_config());
        self.configs
            .entry(front_domain.to_string())
            .or_insert(config)
            .clone()
    }

    fn build_config(&self) -> ClientConfig {
        let mut config = ClientConfig::builder()
            .with_root_certificates(self.roots.clone())
            .with_no_client_auth();

        // Deliberately suppressed: the ClientHello never carries
        // server_name, while certificate verification below still checks
        // the real ServerName the caller supplied to `connect`.
        config.enable_sni = false;
        config.resumption =
            rustls::client::Resumption::store(Arc::new(ClientSessionMemoryCache::new(
                SESSION_CACHE_CAPACITY,
            )));
        config
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl Default for TlsConfigCache {
    fn default() -> Self {
        Self::new()
    }
}
