//! Destination resolution: merging every independent traffic-policy source
//! into one map of service name to reachable tag subsets.
//!
//! Five sources contribute destinations: legacy traffic-split policies,
//! MeshHTTPRoute/MeshTCPRoute backend references, gateway route backends,
//! cross-mesh gateway listeners, and virtual outbound templates. The
//! resolver is additive and never fatal: a backend reference that does not
//! resolve to a concrete tag set contributes nothing and is logged, the
//! rest of the pass continues.
//!
//! Ordering inside each service bucket is not guaranteed here; emitters
//! that turn destinations into wire resources sort first.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::MATCH_ALL;
use crate::model::policy::{
    GatewayRoute, MeshHttpRoute, MeshTcpRoute, TrafficRoute, VirtualOutbound,
};
use crate::model::snapshot::MeshSnapshot;
use crate::model::tags::TagSet;
use crate::model::MeshGateway;

/// Service name -> reachable destination tag subsets. The special key `*`
/// aggregates destinations that apply regardless of target service.
pub type DestinationMap = BTreeMap<String, Vec<TagSet>>;

/// The policy inputs destination resolution reads
#[derive(Debug, Clone, Copy)]
pub struct PolicySources<'a> {
    pub traffic_routes: &'a [TrafficRoute],
    pub http_routes: &'a [MeshHttpRoute],
    pub tcp_routes: &'a [MeshTcpRoute],
    pub gateway_routes: &'a [GatewayRoute],
    pub mesh_gateways: &'a [MeshGateway],
    pub virtual_outbounds: &'a [VirtualOutbound],
}

impl<'a> PolicySources<'a> {
    pub fn from_snapshot(snapshot: &'a MeshSnapshot) -> Self {
        Self {
            traffic_routes: &snapshot.traffic_routes,
            http_routes: &snapshot.http_routes,
            tcp_routes: &snapshot.tcp_routes,
            gateway_routes: &snapshot.gateway_routes,
            mesh_gateways: &snapshot.mesh_gateways,
            virtual_outbounds: &snapshot.virtual_outbounds,
        }
    }
}

fn add_destination(map: &mut DestinationMap, destination: TagSet) {
    let key = match destination.service() {
        Some(MATCH_ALL) | None => MATCH_ALL.to_string(),
        Some(service) => service.to_string(),
    };
    map.entry(key).or_default().push(destination);
}

/// Merge all policy sources into one destination map.
///
/// Compatibility rule: the newer route-policy model defaults to "traffic
/// flows unless restricted", while absence of legacy traffic-splits used
/// to mean "nothing flows". When a route-policy family is present and zero
/// legacy traffic-splits exist, a `*` -> `{kuma.io/service: *}` destination
/// is synthesized so that omission of legacy policy does not wrongly close
/// the mesh. The rule fires once per present family, independently.
pub fn resolve(available_services: &[TagSet], sources: &PolicySources<'_>) -> DestinationMap {
    let mut destinations = DestinationMap::new();

    for route in sources.traffic_routes {
        for split in &route.splits {
            add_destination(&mut destinations, split.destination.clone());
        }
    }

    if sources.traffic_routes.is_empty() && !sources.http_routes.is_empty() {
        add_destination(&mut destinations, TagSet::of_service(MATCH_ALL));
    }
    for route in sources.http_routes {
        for rule in &route.rules {
            for backend in &rule.backends {
                match &backend.tags {
                    Some(tags) => add_destination(&mut destinations, tags.clone()),
                    None => warn!(
                        policy = %route.name,
                        backend = %backend.name,
                        "Skipping unresolvable MeshHTTPRoute backend reference"
                    ),
                }
            }
        }
    }

    if sources.traffic_routes.is_empty() && !sources.tcp_routes.is_empty() {
        add_destination(&mut destinations, TagSet::of_service(MATCH_ALL));
    }
    for route in sources.tcp_routes {
        for rule in &route.rules {
            for backend in &rule.backends {
                match &backend.tags {
                    Some(tags) => add_destination(&mut destinations, tags.clone()),
                    None => warn!(
                        policy = %route.name,
                        backend = %backend.name,
                        "Skipping unresolvable MeshTCPRoute backend reference"
                    ),
                }
            }
        }
    }

    for route in sources.gateway_routes {
        for rule in &route.rules {
            for backend in &rule.backends {
                match &backend.tags {
                    Some(tags) => add_destination(&mut destinations, tags.clone()),
                    None => warn!(
                        policy = %route.name,
                        backend = %backend.name,
                        "Skipping unresolvable gateway route backend reference"
                    ),
                }
            }
        }
    }

    for gateway in sources.mesh_gateways {
        for listener in &gateway.listeners {
            if !listener.cross_mesh {
                continue;
            }
            // The merged gateway+listener tags become a destination keyed
            // by the gateway's own service tag.
            let merged = gateway.tags.merged_with(&listener.tags);
            add_destination(&mut destinations, merged);
        }
    }

    for outbound in sources.virtual_outbounds {
        let keys = outbound.projected_keys();
        for service_tags in available_services {
            if !outbound.selectors.iter().any(|s| s.matches(service_tags)) {
                continue;
            }
            let projected = service_tags.project(&keys);
            if projected.is_empty() {
                debug!(
                    policy = %outbound.name,
                    "Virtual outbound projection produced no tags, skipping"
                );
                continue;
            }
            add_destination(&mut destinations, projected);
        }
    }

    debug!(
        services = destinations.len(),
        total_destinations = destinations.values().map(Vec::len).sum::<usize>(),
        "Resolved reachable destinations"
    );

    destinations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SERVICE_TAG;
    use crate::model::dataplane::{GatewayListener, ListenerProtocol};
    use crate::model::policy::{
        BackendRef, RouteRule, TrafficSplit, VirtualOutboundConf,
        VirtualOutboundParameter,
    };

    fn empty_sources() -> PolicySources<'static> {
        PolicySources {
            traffic_routes: &[],
            http_routes: &[],
            tcp_routes: &[],
            gateway_routes: &[],
            mesh_gateways: &[],
            virtual_outbounds: &[],
        }
    }

    #[test]
    fn test_traffic_route_splits_grouped_by_service() {
        let routes = vec![TrafficRoute {
            name: "split".to_string(),
            splits: vec![
                TrafficSplit {
                    weight: 90,
                    destination: TagSet::from([(SERVICE_TAG, "backend"), ("version", "v1")]),
                },
                TrafficSplit {
                    weight: 10,
                    destination: TagSet::from([(SERVICE_TAG, "backend"), ("version", "v2")]),
                },
            ],
        }];
        let sources = PolicySources { traffic_routes: &routes, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        assert_eq!(destinations.get("backend").map(Vec::len), Some(2));
    }

    #[test]
    fn test_default_open_rule_fires_for_http_routes() {
        // Zero legacy traffic routes and one MeshHTTPRoute with no
        // resolvable backends: the wildcard destination must still appear.
        let http = vec![MeshHttpRoute {
            name: "web".to_string(),
            rules: vec![RouteRule {
                backends: vec![BackendRef { name: "missing".to_string(), tags: None }],
            }],
        }];
        let sources = PolicySources { http_routes: &http, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        let wildcard = destinations.get(MATCH_ALL).expect("wildcard bucket");
        assert!(wildcard.contains(&TagSet::of_service(MATCH_ALL)));
    }

    #[test]
    fn test_default_open_rule_fires_per_family() {
        let http = vec![MeshHttpRoute { name: "h".to_string(), rules: vec![] }];
        let tcp = vec![MeshTcpRoute { name: "t".to_string(), rules: vec![] }];
        let sources = PolicySources { http_routes: &http, tcp_routes: &tcp, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        // One synthesized entry per present family.
        assert_eq!(destinations.get(MATCH_ALL).map(Vec::len), Some(2));
    }

    #[test]
    fn test_default_open_rule_suppressed_by_legacy_routes() {
        let legacy = vec![TrafficRoute {
            name: "legacy".to_string(),
            splits: vec![TrafficSplit {
                weight: 100,
                destination: TagSet::of_service("backend"),
            }],
        }];
        let http = vec![MeshHttpRoute { name: "h".to_string(), rules: vec![] }];
        let sources =
            PolicySources { traffic_routes: &legacy, http_routes: &http, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        assert!(destinations.get(MATCH_ALL).is_none());
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_unresolvable_backend_is_skipped_not_fatal() {
        let http = vec![MeshHttpRoute {
            name: "web".to_string(),
            rules: vec![RouteRule {
                backends: vec![
                    BackendRef { name: "missing".to_string(), tags: None },
                    BackendRef {
                        name: "backend".to_string(),
                        tags: Some(TagSet::of_service("backend")),
                    },
                ],
            }],
        }];
        let sources = PolicySources { http_routes: &http, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        assert_eq!(destinations.get("backend").map(Vec::len), Some(1));
        assert!(logs_contain("Skipping unresolvable MeshHTTPRoute backend reference"));
    }

    #[test]
    fn test_cross_mesh_listener_contributes_merged_tags() {
        let gateways = vec![MeshGateway {
            name: "edge".to_string(),
            tags: TagSet::from([(SERVICE_TAG, "edge-gateway")]),
            address: "10.0.0.5".to_string(),
            listeners: vec![
                GatewayListener {
                    port: 8443,
                    protocol: ListenerProtocol::Http,
                    hostname: None,
                    tags: TagSet::from([("listener", "cross")]),
                    cross_mesh: true,
                    tls: None,
                },
                GatewayListener {
                    port: 8080,
                    protocol: ListenerProtocol::Http,
                    hostname: None,
                    tags: TagSet::new(),
                    cross_mesh: false,
                    tls: None,
                },
            ],
        }];
        let sources = PolicySources { mesh_gateways: &gateways, ..empty_sources() };

        let destinations = resolve(&[], &sources);
        let edge = destinations.get("edge-gateway").expect("gateway bucket");
        assert_eq!(edge.len(), 1);
        assert_eq!(edge[0].get("listener"), Some("cross"));
        assert_eq!(edge[0].service(), Some("edge-gateway"));
    }

    #[test]
    fn test_virtual_outbound_projects_parameter_tags() {
        let outbounds = vec![VirtualOutbound {
            name: "versioned".to_string(),
            selectors: vec![TagSet::from([(SERVICE_TAG, "*")])],
            conf: VirtualOutboundConf {
                host: "{{.service}}.mesh".to_string(),
                port: 80,
                parameters: vec![
                    VirtualOutboundParameter {
                        name: "service".to_string(),
                        tag_key: Some(SERVICE_TAG.to_string()),
                    },
                    VirtualOutboundParameter { name: "version".to_string(), tag_key: None },
                ],
            },
        }];
        let services = vec![TagSet::from([
            (SERVICE_TAG, "backend"),
            ("version", "v1"),
            ("env", "prod"),
        ])];
        let sources = PolicySources { virtual_outbounds: &outbounds, ..empty_sources() };

        let destinations = resolve(&services, &sources);
        let backend = destinations.get("backend").expect("backend bucket");
        assert_eq!(backend.len(), 1);
        // Only the parameter-listed keys survive the projection.
        assert_eq!(
            backend[0],
            TagSet::from([(SERVICE_TAG, "backend"), ("version", "v1")])
        );
    }
}
