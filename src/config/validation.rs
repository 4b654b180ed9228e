//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check that the selected routing mode has a routing table (local mode
//!   included)
//! - Validate value ranges (timeouts > 0, ports valid)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RpcConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use thiserror::Error;

use crate::config::schema::{RpcConfig, ServerType};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("module routing requires a non-empty module list")]
    EmptyModuleList,

    #[error("{mode} routing requires root_domain")]
    MissingRootDomain { mode: &'static str },

    #[error("domain routing requires a non-empty domain table")]
    EmptyDomainTable,

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },

    #[error("signing is enabled but no secret is configured")]
    MissingSignSecret,

    #[error("proxy requires a host and a non-zero port")]
    InvalidProxy,

    #[error("error.{field} must not be empty")]
    EmptyEnvelopeKey { field: &'static str },

    #[error("intranet entry '{name}' has neither host nor ip")]
    EmptyIntranetEntry { name: String },

    #[error("token_key must not be empty")]
    EmptyTokenKey,
}

/// Check a configuration, collecting every violation.
pub fn validate_config(config: &RpcConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match config.server_type {
        ServerType::Module => {
            if config.module.is_empty() {
                errors.push(ValidationError::EmptyModuleList);
            }
            if config.root_domain.trim().is_empty() {
                errors.push(ValidationError::MissingRootDomain { mode: "module" });
            }
        }
        ServerType::Domain => {
            if config.domain.is_empty() {
                errors.push(ValidationError::EmptyDomainTable);
            }
            if config.is_local() && config.root_domain.trim().is_empty() {
                errors.push(ValidationError::MissingRootDomain { mode: "local domain" });
            }
        }
    }

    if config.timeout == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "timeout" });
    }
    if config.connect_timeout == 0 {
        errors.push(ValidationError::ZeroTimeout { field: "connect_timeout" });
    }

    if config.sign.enable && config.sign.secret.is_empty() {
        errors.push(ValidationError::MissingSignSecret);
    }

    if let Some(proxy) = &config.proxy {
        if proxy.host.trim().is_empty() || proxy.port == 0 {
            errors.push(ValidationError::InvalidProxy);
        }
    }

    if config.error.code_key.is_empty() {
        errors.push(ValidationError::EmptyEnvelopeKey { field: "code_key" });
    }
    if config.error.msg_key.is_empty() {
        errors.push(ValidationError::EmptyEnvelopeKey { field: "msg_key" });
    }

    for (name, entry) in &config.intranet_address {
        if entry.address().is_empty() {
            errors.push(ValidationError::EmptyIntranetEntry { name: name.clone() });
        }
    }

    if config.token_key.trim().is_empty() {
        errors.push(ValidationError::EmptyTokenKey);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::{DomainEntry, IntranetEntry, ProxyConfig};

    fn domain_config() -> RpcConfig {
        let mut config = RpcConfig::default();
        config
            .domain
            .insert("user".into(), DomainEntry::Plain("user.example.com".into()));
        config
    }

    #[test]
    fn test_valid_domain_config() {
        assert!(validate_config(&domain_config()).is_ok());
    }

    #[test]
    fn test_module_mode_requirements() {
        let mut config = RpcConfig::default();
        config.server_type = ServerType::Module;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.contains(&ValidationError::EmptyModuleList));
        assert!(errors.contains(&ValidationError::MissingRootDomain { mode: "module" }));
    }

    #[test]
    fn test_local_mode_needs_table_and_root_domain() {
        let mut config = RpcConfig::default();
        config.server = "local".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![
                ValidationError::EmptyDomainTable,
                ValidationError::MissingRootDomain { mode: "local domain" },
            ]
        );

        let mut config = domain_config();
        config.server = "local".into();
        assert_eq!(
            validate_config(&config).unwrap_err(),
            vec![ValidationError::MissingRootDomain { mode: "local domain" }]
        );

        config.root_domain = ".dev.example.com".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = domain_config();
        config.timeout = 0;
        config.sign.enable = true;
        config.proxy = Some(ProxyConfig { host: String::new(), port: 0 });
        config.intranet_address.insert(
            "pay.example.com".into(),
            IntranetEntry { host: String::new(), ip: String::new(), port: 80 },
        );

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 4);
        assert!(errors.contains(&ValidationError::MissingSignSecret));
        assert!(errors.contains(&ValidationError::InvalidProxy));
    }
}
