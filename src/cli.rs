//! Command-line surface.
//!
//! Flags may also come from `QUICKSERVE_*` environment variables; a flag on
//! the command line wins over its variable, and both win over a config file.

use std::path::PathBuf;

use clap::Parser;

use crate::config::{
    load_config, validate_config, AutoCertConfig, ConfigError, ServiceConfig,
};

#[derive(Debug, Clone, Parser)]
#[command(name = "quickserve", version)]
#[command(about = "HTTP service bootstrap with pluggable storage", long_about = None)]
pub struct Cli {
    /// TOML configuration file.
    #[arg(long, env = "QUICKSERVE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Server will listen on the address.
    #[arg(long, env = "QUICKSERVE_ADDRESS")]
    pub address: Option<String>,

    /// Database type.
    #[arg(long, env = "QUICKSERVE_DATABASE_TYPE")]
    pub database_type: Option<String>,

    /// Show debug messages.
    #[arg(long, env = "QUICKSERVE_DEBUG")]
    pub debug: bool,

    /// Domain to provision a TLS certificate for (repeatable).
    #[arg(long = "auto-cert-domain", env = "QUICKSERVE_AUTO_CERT_DOMAINS", value_delimiter = ',')]
    pub auto_cert_domains: Vec<String>,

    /// Directory caching provisioned certificates.
    #[arg(long, env = "QUICKSERVE_AUTO_CERT_CACHE_DIR")]
    pub auto_cert_cache_dir: Option<PathBuf>,
}

impl Cli {
    /// Resolve the effective configuration: defaults, then the config file,
    /// then these flags.
    pub fn into_config(self) -> Result<ServiceConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServiceConfig::default(),
        };

        if let Some(address) = self.address {
            config.address = address;
        }
        if let Some(database_type) = self.database_type {
            config.database_type = database_type;
        }
        if self.debug {
            config.debug = true;
        }
        if !self.auto_cert_domains.is_empty() || self.auto_cert_cache_dir.is_some() {
            let auto_cert = config.auto_cert.get_or_insert_with(AutoCertConfig::default);
            if !self.auto_cert_domains.is_empty() {
                auto_cert.domains = self.auto_cert_domains;
            }
            if self.auto_cert_cache_dir.is_some() {
                auto_cert.cache_dir = self.auto_cert_cache_dir;
            }
        }

        validate_config(&config).map_err(ConfigError::Validation)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("quickserve").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn defaults_without_flags() {
        let config = parse(&[]).into_config().unwrap();
        assert_eq!(config.address, "0.0.0.0:8888");
        assert_eq!(config.database_type, "mock");
        assert!(!config.debug);
        assert!(config.auto_cert.is_none());
    }

    #[test]
    fn flags_override_defaults() {
        let config = parse(&[
            "--address",
            "127.0.0.1:9999",
            "--database-type",
            "redis",
            "--debug",
            "--auto-cert-domain",
            "a.example.com,b.example.com",
            "--auto-cert-cache-dir",
            "./ssl",
        ])
        .into_config()
        .unwrap();

        assert_eq!(config.address, "127.0.0.1:9999");
        assert_eq!(config.database_type, "redis");
        assert!(config.debug);
        let auto_cert = config.auto_cert.unwrap();
        assert_eq!(auto_cert.domains, vec!["a.example.com", "b.example.com"]);
        assert_eq!(auto_cert.cache_dir, Some(PathBuf::from("./ssl")));
    }

    #[test]
    fn invalid_address_is_rejected() {
        let err = parse(&["--address", ""]).into_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn rejects_subcommands() {
        assert!(Cli::try_parse_from(["quickserve", "serve"]).is_err());
    }
}
