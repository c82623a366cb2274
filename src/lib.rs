//! disco-dns - an authoritative DNS server backed by Docker container discovery.
//!
//! This crate provides a DNS server that automatically serves records for the
//! containers running on a Docker endpoint. It registers every running
//! container at startup, then follows the event stream so records appear and
//! disappear with container lifecycles.
//!
//! ## Features
//!
//! - A records for container identifiers under a configurable TLD
//! - PTR records under `in-addr.arpa` for registered addresses
//! - Configurable identifier templates over container metadata
//! - Plain-text zone renderings (BIND and hosts formats) over HTTP
//! - Graceful shutdown support
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                          disco-dns                             │
//! │                                                                │
//! │  ┌──────────────────┐    ┌──────────────────┐                  │
//! │  │  Docker Client   │───▶│    Registry      │                  │
//! │  │  (event stream)  │    │   (in-memory)    │                  │
//! │  └──────────────────┘    └────────┬─────────┘                  │
//! │         │                         │                            │
//! │         │ Watch for:              ▼                            │
//! │         │ - start            ┌──────────────────┐              │
//! │         │ - die              │  Hickory DNS     │◀── UDP/TCP   │
//! │         │                    │  Server          │    :10053    │
//! │         │                    └──────────────────┘              │
//! │         │                    ┌──────────────────┐              │
//! │         └───────────────────▶│  Web (axum)      │◀── HTTP      │
//! │                              │  /zone /hosts    │    :19053    │
//! │                              └──────────────────┘              │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## DNS Resolution
//!
//! ```text
//! web.containers.internal
//!   → strip the TLD suffix
//!   → walk the ident tree (wildcard `*` segments fan out)
//!   → return A records for every registered address
//! ```
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use disco_dns::{Config, DiscoServer};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let config: Config = load_config();
//!
//!     let cancel = CancellationToken::new();
//!     let server = DiscoServer::new(config).unwrap();
//!     server.run(cancel).await.unwrap();
//! }
//! ```

#![warn(missing_docs)]

pub mod authority;
pub mod config;
pub mod container;
pub mod docker;
pub mod error;
pub mod labels;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod telemetry;
pub mod tree;
pub mod web;
pub mod zone;

// Re-export main types
pub use config::{Config, DnsConfig, DockerConfig, SoaConfig, TelemetryConfig, WebConfig};
pub use container::{ContainerInfo, ContainerMetadata};
pub use error::DiscoError;
pub use labels::LabelFormatter;
pub use registry::Registry;
pub use server::DiscoServer;
pub use tree::LabelTree;
