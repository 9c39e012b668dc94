//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the listen address is usable
//! - Check auto-cert domains are well formed

use std::net::ToSocketAddrs;

use crate::config::schema::ServiceConfig;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("address must not be empty")]
    EmptyAddress,
    #[error("address {0:?} is not a valid host:port")]
    InvalidAddress(String),
    #[error("database_type must not be empty")]
    EmptyDatabaseType,
    #[error("auto_cert domain #{0} is blank")]
    BlankDomain(usize),
}

/// Validate `config`, returning every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.address.trim().is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else if config.address.to_socket_addrs().is_err() {
        errors.push(ValidationError::InvalidAddress(config.address.clone()));
    }

    if config.database_type.trim().is_empty() {
        errors.push(ValidationError::EmptyDatabaseType);
    }

    if let Some(auto_cert) = &config.auto_cert {
        for (i, domain) in auto_cert.domains.iter().enumerate() {
            if domain.trim().is_empty() {
                errors.push(ValidationError::BlankDomain(i));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
