//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! CallSpec.service_ref + is_external
//!     → resolver.rs (module / domain / external lookup)
//!     → intranet substitution (external hosts only)
//!     → proxy.rs (forward proxy decision)
//!     → append wr_id
//!     → signer.rs (sign + timestamp, HTTP driver only)
//!     → ResolvedTarget { real_url, real_host, needs_proxy }
//! ```
//!
//! # Design Decisions
//! - Resolution is pure: same config and reference always give the same URL
//! - Unknown modules and services fail before anything is sent
//! - Signing parameters are always the last two query parameters

pub mod proxy;
pub mod resolver;
pub mod signer;

pub use proxy::{is_private_ipv4, ProxyPolicy};
pub use resolver::{ResolvedTarget, Resolver, CORRELATION_PARAM};
pub use signer::{signature, Signer, SIGN_PARAM, TIMESTAMP_PARAM};
