//! # Meshplane
//!
//! Meshplane is the xDS generation core of a multi-zone service mesh: a
//! pure library that turns an immutable mesh snapshot (dataplanes,
//! policies, endpoints, datacenter catalog) into the Envoy v3 resources
//! one proxy needs. It owns no servers, storage or certificate issuance;
//! the embedding control plane feeds snapshots in and ships the resulting
//! resource sets out over its own delivery protocol.
//!
//! ## Architecture
//!
//! ```text
//! Mesh Snapshot → Destination Resolver → Resource Generators → ResourceSet
//!                        ↓                       ↓
//!                  Policy Sources        Geo Ranker / SNI Codec
//! ```
//!
//! ## Core Components
//!
//! - **Destination Resolver**: merges every traffic-policy source into one
//!   map of reachable destinations per service
//! - **SNI Codec**: reversible encoding of (service, tags) into TLS server
//!   names, so zone boundaries route mTLS traffic without decrypting it
//! - **Geo Ranker**: haversine-ranked datacenter chains feeding aggregate
//!   cluster fallback order
//! - **Generator Registry**: explicit per-proxy-kind generator lineup
//!   assembling clusters, load assignments, listeners, routes and runtime
//!   layers
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshplane::model::snapshot::MeshSnapshot;
//! use meshplane::xds::secret::StaticSecretSource;
//! use meshplane::xds::{GenerationContext, GeneratorRegistry, Proxy};
//! use meshplane::{GenerationConfig, Result};
//!
//! fn regenerate(snapshot: &MeshSnapshot) -> Result<()> {
//!     let config = GenerationConfig::default();
//!     let secrets = StaticSecretSource::new();
//!     let registry = GeneratorRegistry::with_defaults();
//!     for dataplane in &snapshot.dataplanes {
//!         let ctx = GenerationContext { snapshot, config: &config, secrets: &secrets };
//!         let resources = registry.generate(&Proxy::Sidecar(dataplane), &ctx)?;
//!         tracing::info!(proxy = %dataplane.name, count = resources.len(), "regenerated");
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod errors;
pub mod geo;
pub mod model;
pub mod observability;
pub mod resolve;
pub mod sni;
pub mod xds;

// Re-export commonly used types and traits
pub use config::GenerationConfig;
pub use errors::{Error, Result};
pub use observability::{init_tracing, LogFormat};

/// Library version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
