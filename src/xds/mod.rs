//! Envoy xDS resource generation.
//!
//! The entry point is [`GeneratorRegistry::generate`]: given an immutable
//! mesh snapshot, a config and a proxy identity, it runs every registered
//! generator that handles the proxy's kind and collects their output into
//! one [`ResourceSet`]. There is no global registry; embedders construct
//! one explicitly at startup (usually [`GeneratorRegistry::with_defaults`])
//! and share it freely, since generation holds no mutable state.

pub mod aggregate;
pub mod cluster;
pub mod endpoint;
pub mod generator;
pub mod listener;
pub mod route;
pub mod runtime;
pub mod secret;

use std::collections::BTreeMap;
use std::fmt;

use envoy_types::pb::google::protobuf::Any;
use prost::Message;
use tracing::{debug, info};

use crate::config::GenerationConfig;
use crate::errors::{Error, Result};
use crate::model::dataplane::{Dataplane, MeshGateway, ZoneIngress};
use crate::model::snapshot::MeshSnapshot;
use crate::xds::secret::SecretSource;

pub const CLUSTER_TYPE_URL: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";
pub const ENDPOINT_TYPE_URL: &str =
    "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";
pub const LISTENER_TYPE_URL: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";
pub const ROUTE_TYPE_URL: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";
pub const RUNTIME_TYPE_URL: &str = "type.googleapis.com/envoy.service.runtime.v3.Runtime";

/// Which generator family produced a resource. Carried on every built
/// resource so duplicate emissions can be traced back to their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Origin {
    /// Sidecar outbound traffic to reachable services
    Outbound,
    /// Cross-zone traffic through a remote zone boundary
    CrossZone,
    /// Geo-ranked aggregate fallback chains
    Geo,
    /// Zone-boundary SNI pass-through
    ZoneBoundary,
    /// Terminating gateway listeners and routes
    Gateway,
    /// Runtime key/value layers
    Runtime,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Outbound => "outbound",
            Self::CrossZone => "cross-zone",
            Self::Geo => "geo",
            Self::ZoneBoundary => "zone-boundary",
            Self::Gateway => "gateway",
            Self::Runtime => "runtime",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, origin-tagged xDS resource ready for delivery
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltResource {
    pub name: String,
    pub origin: Origin,
    pub resource: Any,
}

impl BuiltResource {
    /// Encode a protobuf message into an `Any`-wrapped resource
    pub fn pack<M: Message>(
        name: impl Into<String>,
        origin: Origin,
        type_url: &str,
        message: &M,
    ) -> Self {
        Self {
            name: name.into(),
            origin,
            resource: Any { type_url: type_url.to_string(), value: message.encode_to_vec() },
        }
    }
}

fn short_type(type_url: &str) -> &str {
    type_url.rsplit('.').next().unwrap_or(type_url)
}

/// The resources one generation pass accumulates, keyed by type URL and
/// name. Insertion order does not matter: per-type buckets are BTreeMaps,
/// so every read is in sorted name order.
#[derive(Debug, Default)]
pub struct ResourceSet {
    resources: BTreeMap<String, BTreeMap<String, BuiltResource>>,
}

impl ResourceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource, deduplicating byte-identical re-emissions. Two
    /// resources with the same type and name but different payloads are a
    /// conflict and abort the pass; debugging starts from the two origins
    /// in the log.
    pub fn add(&mut self, type_url: &str, resource: BuiltResource) -> Result<()> {
        let bucket = self.resources.entry(type_url.to_string()).or_default();
        if let Some(existing) = bucket.get(&resource.name) {
            if existing.resource == resource.resource {
                debug!(
                    resource = %resource.name,
                    origin = %resource.origin,
                    previous_origin = %existing.origin,
                    "Identical resource already emitted, skipping duplicate"
                );
                return Ok(());
            }
            tracing::error!(
                resource = %resource.name,
                origin = %resource.origin,
                previous_origin = %existing.origin,
                "Conflicting resource emissions"
            );
            return Err(Error::Conflict {
                name: resource.name,
                resource_type: short_type(type_url).to_string(),
            });
        }
        bucket.insert(resource.name.clone(), resource);
        Ok(())
    }

    /// Resources of one type, in name order
    pub fn of_type(&self, type_url: &str) -> impl Iterator<Item = &BuiltResource> {
        self.resources.get(type_url).into_iter().flat_map(|bucket| bucket.values())
    }

    /// Names of one type's resources, in sorted order
    pub fn names_of(&self, type_url: &str) -> Vec<String> {
        self.of_type(type_url).map(|r| r.name.clone()).collect()
    }

    pub fn contains(&self, type_url: &str, name: &str) -> bool {
        self.resources.get(type_url).is_some_and(|bucket| bucket.contains_key(name))
    }

    /// Total resource count across all types
    pub fn len(&self) -> usize {
        self.resources.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The proxy a generation pass targets
#[derive(Debug, Clone, Copy)]
pub enum Proxy<'a> {
    Sidecar(&'a Dataplane),
    ZoneIngress(&'a ZoneIngress),
    Gateway(&'a MeshGateway),
}

impl Proxy<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Sidecar(_) => "sidecar",
            Self::ZoneIngress(_) => "zone-ingress",
            Self::Gateway(_) => "gateway",
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Sidecar(dataplane) => &dataplane.name,
            Self::ZoneIngress(ingress) => &ingress.name,
            Self::Gateway(gateway) => &gateway.name,
        }
    }
}

/// Everything a generator reads. Borrowed for the duration of one pass;
/// nothing here is mutated.
pub struct GenerationContext<'a> {
    pub snapshot: &'a MeshSnapshot,
    pub config: &'a GenerationConfig,
    pub secrets: &'a dyn SecretSource,
}

/// One resource family's generator. Implementations must be pure over
/// (proxy, context): no I/O, no shared mutable state.
pub trait ResourceGenerator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this generator applies to the given proxy kind
    fn handles(&self, proxy: &Proxy<'_>) -> bool;

    fn generate(
        &self,
        proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()>;
}

/// Explicit generator registry, constructed at startup. Generators run in
/// registration order; order matters only for generators that read earlier
/// output (gateway routes read geo aggregate clusters, the runtime layer
/// reads listener names).
pub struct GeneratorRegistry {
    generators: Vec<Box<dyn ResourceGenerator>>,
}

impl GeneratorRegistry {
    pub fn new() -> Self {
        Self { generators: Vec::new() }
    }

    /// The standard generator lineup
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(generator::OutboundGenerator));
        registry.register(Box::new(generator::GeoAggregateGenerator));
        registry.register(Box::new(generator::ZoneBoundaryGenerator));
        registry.register(Box::new(generator::GatewayGenerator));
        registry.register(Box::new(generator::RuntimeLayerGenerator));
        registry
    }

    pub fn register(&mut self, generator: Box<dyn ResourceGenerator>) {
        self.generators.push(generator);
    }

    /// Run every applicable generator for one proxy and collect the
    /// resulting resource set. Fatal errors abort the whole pass; per-item
    /// problems were already logged and skipped inside the generators.
    pub fn generate(&self, proxy: &Proxy<'_>, ctx: &GenerationContext<'_>) -> Result<ResourceSet> {
        let span = crate::generation_span!(proxy.kind(), proxy.name(), mesh = %ctx.snapshot.mesh);
        let _guard = span.entered();

        let mut set = ResourceSet::new();
        for generator in &self.generators {
            if !generator.handles(proxy) {
                continue;
            }
            let before = set.len();
            generator.generate(proxy, ctx, &mut set)?;
            debug!(
                generator = generator.name(),
                emitted = set.len() - before,
                "Generator finished"
            );
        }

        info!(resources = set.len(), "Generated proxy resources");
        Ok(set)
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use envoy_types::pb::envoy::config::cluster::v3::Cluster;

    fn built(name: &str, origin: Origin, cluster_name: &str) -> BuiltResource {
        let cluster = Cluster { name: cluster_name.to_string(), ..Default::default() };
        BuiltResource::pack(name, origin, CLUSTER_TYPE_URL, &cluster)
    }

    #[test]
    fn test_identical_duplicate_is_absorbed() {
        let mut set = ResourceSet::new();
        set.add(CLUSTER_TYPE_URL, built("backend", Origin::Outbound, "backend"))
            .expect("first add");
        set.add(CLUSTER_TYPE_URL, built("backend", Origin::Geo, "backend"))
            .expect("identical duplicate");
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_conflicting_payloads_are_rejected() {
        let mut set = ResourceSet::new();
        set.add(CLUSTER_TYPE_URL, built("backend", Origin::Outbound, "backend"))
            .expect("first add");
        let err = set
            .add(CLUSTER_TYPE_URL, built("backend", Origin::Geo, "other"))
            .expect_err("conflict");
        assert!(
            matches!(err, Error::Conflict { name, resource_type }
                if name == "backend" && resource_type == "Cluster")
        );
    }

    #[test]
    fn test_names_are_sorted() {
        let mut set = ResourceSet::new();
        set.add(CLUSTER_TYPE_URL, built("web", Origin::Outbound, "web")).expect("add");
        set.add(CLUSTER_TYPE_URL, built("api", Origin::Outbound, "api")).expect("add");
        assert_eq!(set.names_of(CLUSTER_TYPE_URL), vec!["api", "web"]);
    }

    #[test]
    fn test_contains_checks_type_and_name() {
        let mut set = ResourceSet::new();
        set.add(CLUSTER_TYPE_URL, built("api", Origin::Outbound, "api")).expect("add");
        assert!(set.contains(CLUSTER_TYPE_URL, "api"));
        assert!(!set.contains(LISTENER_TYPE_URL, "api"));
    }
}
