//! Effective timeout composition.
//!
//! # Design Decisions
//! - Per-call values only lengthen the configured defaults ("max wins")
//! - Connect and total timeouts compose independently

use std::time::Duration;

use crate::config::RpcConfig;
use crate::request::CallOptions;

/// Connect and total timeout applied to one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectiveTimeouts {
    pub connect: Duration,
    pub total: Duration,
}

impl EffectiveTimeouts {
    pub fn from_config(config: &RpcConfig) -> Self {
        Self {
            connect: Duration::from_millis(config.connect_timeout),
            total: Duration::from_millis(config.timeout),
        }
    }

    pub fn compose(config: &RpcConfig, options: &CallOptions) -> Self {
        Self {
            connect: Duration::from_millis(
                config.connect_timeout.max(options.connect_timeout.unwrap_or(0)),
            ),
            total: Duration::from_millis(config.timeout.max(options.timeout.unwrap_or(0))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_wins() {
        let config = RpcConfig { timeout: 3000, connect_timeout: 500, ..RpcConfig::default() };

        let shorter = CallOptions::default().timeout_ms(1000).connect_timeout_ms(100);
        assert_eq!(EffectiveTimeouts::compose(&config, &shorter), EffectiveTimeouts::from_config(&config));

        let longer = CallOptions::default().timeout_ms(8000);
        let effective = EffectiveTimeouts::compose(&config, &longer);
        assert_eq!(effective.total, Duration::from_millis(8000));
        assert_eq!(effective.connect, Duration::from_millis(500));
    }
}
