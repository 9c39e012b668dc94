//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listen address (e.g., "0.0.0.0:8888").
    pub address: String,

    /// Store backend name.
    pub database_type: String,

    /// Enable debug logging.
    pub debug: bool,

    /// Automatic TLS certificates. Absent means plain HTTP.
    pub auto_cert: Option<AutoCertConfig>,

    /// Built-in routes and middleware.
    pub features: FeatureConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8888".to_string(),
            database_type: "mock".to_string(),
            debug: false,
            auto_cert: None,
            features: FeatureConfig::default(),
        }
    }
}

/// Automatic certificate provisioning settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct AutoCertConfig {
    /// Directory where obtained certificates are cached.
    pub cache_dir: Option<PathBuf>,

    /// Domains to obtain certificates for.
    pub domains: Vec<String>,
}

/// Toggles for the built-in options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Honor `X-HTTP-Method-Override`.
    pub method_override: bool,

    /// Serve `GET /ping`.
    pub ping_route: bool,

    /// Serve the `/debug` introspection routes.
    pub debug_routes: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            method_override: true,
            ping_route: true,
            debug_routes: true,
        }
    }
}
