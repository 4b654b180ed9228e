//! Outbound RPC client.
//!
//! Calls internal services and external HTTP endpoints through an HTTP/JSON
//! or a binary RPC transport, as serial chains or parallel fan-outs.
//!
//! ```text
//!   RpcClient::build_request ─► RequestContext::get
//!                                   │
//!                     ┌─────────────┴─────────────┐
//!                     ▼                           ▼
//!              SerialStrategy              ParallelStrategy
//!                     │                           │
//!                     └───────► Driver ◄──────────┘
//!                       (HttpDriver | BinaryRpcDriver)
//!                                 │
//!        Resolver ─► ProxyPolicy ─► Signer ─► transport ─► Normalizer
//! ```

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod observability;
pub mod request;
pub mod response;
pub mod routing;
pub mod strategy;
pub mod transport;

pub use client::{RpcClient, TransportKind};
pub use config::RpcConfig;
pub use error::{CallError, ErrorKind, RpcError};
pub use request::{CallOptions, CallSpec, ClientOrigin, ProxyOverride, RequestContext, Token};
