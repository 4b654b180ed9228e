//! Deterministic request signing.
//!
//! The signed payload is `secret&k1=v1&k2=v2…` over the decoded query
//! parameters (excluding `sign` and `timestamp`) plus the fresh timestamp,
//! sorted by key. `sign` and `timestamp` are always the last two parameters
//! of a signed URL.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use url::Url;

use crate::config::SignConfig;

pub const SIGN_PARAM: &str = "sign";
pub const TIMESTAMP_PARAM: &str = "timestamp";

/// Compute the signature of `url` for `secret` at `timestamp`.
pub fn signature(url: &Url, secret: &str, timestamp: u64) -> String {
    let mut pairs: Vec<(String, String)> = unsigned_pairs(url);
    pairs.push((TIMESTAMP_PARAM.to_string(), timestamp.to_string()));
    pairs.sort();

    let mut payload = String::from(secret);
    for (key, value) in &pairs {
        payload.push('&');
        payload.push_str(key);
        payload.push('=');
        payload.push_str(value);
    }

    hex::encode(Sha256::digest(payload.as_bytes()))
}

fn unsigned_pairs(url: &Url) -> Vec<(String, String)> {
    url.query_pairs()
        .filter(|(k, _)| k != SIGN_PARAM && k != TIMESTAMP_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Appends `sign` and `timestamp` to resolved URLs when enabled.
#[derive(Clone, Default)]
pub struct Signer {
    secret: Option<String>,
}

impl Signer {
    pub fn new(secret: impl Into<String>) -> Self {
        Self { secret: Some(secret.into()) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SignConfig) -> Self {
        if config.enable && !config.secret.is_empty() {
            Self::new(config.secret.clone())
        } else {
            Self::disabled()
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Sign `url` in place with the current time.
    pub fn apply(&self, url: &mut Url) {
        self.apply_at(url, now_secs());
    }

    /// Sign `url` in place with an explicit timestamp.
    pub fn apply_at(&self, url: &mut Url, timestamp: u64) {
        let Some(secret) = &self.secret else {
            return;
        };

        let sign = signature(url, secret, timestamp);
        let kept = unsigned_pairs(url);

        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(kept.iter());
        query.append_pair(SIGN_PARAM, &sign);
        query.append_pair(TIMESTAMP_PARAM, &timestamp.to_string());
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signer")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
