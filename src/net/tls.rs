//! Automatic TLS certificate provisioning.
//!
//! Certificates are requested from Let's Encrypt during the TLS handshake
//! (TLS-ALPN-01) for the configured domains and, when a cache directory is
//! set, persisted there so restarts reuse them.

use std::path::{Path, PathBuf};

use futures_util::StreamExt;
use rustls_acme::{axum::AxumAcceptor, caches::DirCache, AcmeConfig};
use tokio::task::JoinHandle;

/// Auto-cert settings attached to a server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AutoCert {
    cache_dir: Option<PathBuf>,
    domains: Vec<String>,
}

impl AutoCert {
    /// An empty `cache_dir` means certificates are not cached.
    pub fn new<P, I, D>(cache_dir: P, domains: I) -> Self
    where
        P: Into<PathBuf>,
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        let cache_dir = cache_dir.into();
        Self {
            cache_dir: (!cache_dir.as_os_str().is_empty()).then_some(cache_dir),
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    pub fn cache_dir(&self) -> Option<&Path> {
        self.cache_dir.as_deref()
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Build the TLS acceptor and spawn the task driving certificate
    /// orders. The task runs until aborted.
    pub(crate) fn acceptor(&self) -> (AxumAcceptor, JoinHandle<()>) {
        let mut state = AcmeConfig::new(self.domains.clone())
            .cache_option(self.cache_dir.clone().map(DirCache::new))
            .directory_lets_encrypt(true)
            .state();
        let acceptor = state.axum_acceptor(state.default_rustls_config());

        let domains = self.domains.clone();
        let events = tokio::spawn(async move {
            while let Some(event) = state.next().await {
                match event {
                    Ok(ok) => tracing::info!(domains = ?domains, event = ?ok, "ACME event"),
                    Err(err) => tracing::error!(domains = ?domains, error = ?err, "ACME error"),
                }
            }
        });

        (acceptor, events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_dir_disables_cache() {
        let auto_cert = AutoCert::new("", ["example.com"]);
        assert_eq!(auto_cert.cache_dir(), None);
        assert_eq!(auto_cert.domains(), ["example.com".to_string()]);

        let auto_cert = AutoCert::new("./ssl", Vec::<String>::new());
        assert_eq!(auto_cert.cache_dir(), Some(Path::new("./ssl")));
        assert!(auto_cert.domains().is_empty());
    }
}
