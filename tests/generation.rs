//! End-to-end generation: one mesh snapshot, three proxy kinds, full
//! resource sets out. Exercises the public surface the embedding control
//! plane uses, starting from a JSON-deserialized snapshot.

use envoy_types::pb::envoy::config::listener::v3::Listener;
use envoy_types::pb::envoy::config::route::v3::RouteConfiguration;
use meshplane::config::GenerationConfig;
use meshplane::model::dataplane::{Dataplane, MeshGateway, ZoneIngress};
use meshplane::model::snapshot::MeshSnapshot;
use meshplane::model::tags::TagSet;
use meshplane::xds::secret::StaticSecretSource;
use meshplane::xds::{
    GenerationContext, GeneratorRegistry, Proxy, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL,
    LISTENER_TYPE_URL, ROUTE_TYPE_URL,
};
use prost::Message;

const SNAPSHOT_JSON: &str = r#"{
  "mesh": "default",
  "available_services": [
    {"kuma.io/service": "backend", "version": "v1"},
    {"kuma.io/service": "backend", "version": "v2"},
    {"kuma.io/service": "frontend"}
  ],
  "endpoints": {
    "backend": [
      {"address": "10.0.0.1", "port": 8080,
       "tags": {"kuma.io/service": "backend", "version": "v1"}},
      {"address": "10.0.0.2", "port": 8080,
       "tags": {"kuma.io/service": "backend", "version": "v2"}}
    ],
    "frontend": [
      {"address": "10.0.1.1", "port": 3000,
       "tags": {"kuma.io/service": "frontend"}}
    ],
    "dc_bxl1": [
      {"address": "203.0.113.7", "port": 443, "tags": {}}
    ]
  },
  "traffic_routes": [
    {"name": "allow-all", "splits": [
      {"weight": 100, "destination": {"kuma.io/service": "*"}}
    ]}
  ],
  "gateway_routes": [
    {"name": "edge-routes",
     "selectors": [{"kuma.io/service": "edge-gateway"}],
     "hostnames": ["edge.example.com"],
     "rules": [
       {"path_prefix": "/backend",
        "backends": [{"name": "backend",
                      "tags": {"kuma.io/service": "backend"}}]},
       {"path_prefix": "/",
        "backends": [{"name": "frontend",
                      "tags": {"kuma.io/service": "frontend"}}]}
     ]}
  ],
  "zone_ingresses": [
    {"name": "nyc1-ingress", "zone": "nyc1",
     "address": "192.0.2.10", "port": 10001,
     "available_services": [
       {"kuma.io/service": "remote-api", "env": "prod"}
     ]}
  ],
  "datacenters": [
    {"id": "par1", "coordinate": {"latitude": 48.8566, "longitude": 2.3522}},
    {"id": "bxl1", "coordinate": {"latitude": 50.8503, "longitude": 4.3517}},
    {"id": "nyc1", "coordinate": {"latitude": 40.7128, "longitude": 74.0060}}
  ],
  "geo_services": [
    {"id": "api", "datacenter_ids": ["bxl1", "nyc1"], "port": 443,
     "routable_paths": ["/api"]}
  ]
}"#;

fn snapshot() -> MeshSnapshot {
    serde_json::from_str(SNAPSHOT_JSON).expect("snapshot json")
}

fn sidecar() -> Dataplane {
    Dataplane {
        name: "backend-1".to_string(),
        address: "10.0.0.1".to_string(),
        tags: TagSet::from([("kuma.io/service", "backend"), ("kuma.io/zone", "par1")]),
    }
}

#[test]
fn sidecar_pass_produces_full_resource_set() {
    let snap = snapshot();
    let config = GenerationConfig::default();
    let secrets = StaticSecretSource::new();
    let registry = GeneratorRegistry::with_defaults();

    let dataplane = sidecar();
    let ctx = GenerationContext { snapshot: &snap, config: &config, secrets: &secrets };
    let set = registry.generate(&Proxy::Sidecar(&dataplane), &ctx).expect("sidecar pass");

    // Local services.
    assert!(set.contains(CLUSTER_TYPE_URL, "backend"));
    assert!(set.contains(CLUSTER_TYPE_URL, "frontend"));
    assert!(set.contains(ENDPOINT_TYPE_URL, "backend"));

    // Cross-zone cluster named by its destination SNI.
    assert!(set.contains(CLUSTER_TYPE_URL, "remote-api{env=prod}"));

    // Geo aggregate and its ranked members.
    assert!(set.contains(CLUSTER_TYPE_URL, "api"));
    assert!(set.contains(CLUSTER_TYPE_URL, "dc_bxl1"));
    assert!(set.contains(CLUSTER_TYPE_URL, "dc_nyc1"));
    // Endpoints were only known for the Brussels deployment.
    assert!(set.contains(ENDPOINT_TYPE_URL, "dc_bxl1"));
    assert!(!set.contains(ENDPOINT_TYPE_URL, "dc_nyc1"));
}

#[test]
fn generation_is_deterministic_across_passes() {
    let snap = snapshot();
    let config = GenerationConfig::default();
    let secrets = StaticSecretSource::new();
    let registry = GeneratorRegistry::with_defaults();
    let dataplane = sidecar();

    let ctx = GenerationContext { snapshot: &snap, config: &config, secrets: &secrets };
    let first = registry.generate(&Proxy::Sidecar(&dataplane), &ctx).expect("first pass");
    let second = registry.generate(&Proxy::Sidecar(&dataplane), &ctx).expect("second pass");

    for type_url in [CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL, LISTENER_TYPE_URL, ROUTE_TYPE_URL] {
        let a: Vec<_> = first.of_type(type_url).collect();
        let b: Vec<_> = second.of_type(type_url).collect();
        assert_eq!(a, b, "resource type {} differs between passes", type_url);
    }
}

#[test]
fn zone_ingress_pass_builds_blind_sni_listener() {
    let snap = snapshot();
    let config = GenerationConfig::default();
    let secrets = StaticSecretSource::new();
    let registry = GeneratorRegistry::with_defaults();

    let ingress = ZoneIngress {
        name: "par1-ingress".to_string(),
        zone: "par1".to_string(),
        address: "10.0.0.9".to_string(),
        port: 10001,
        available_services: vec![
            TagSet::from([("kuma.io/service", "backend"), ("version", "v1")]),
            TagSet::from([("kuma.io/service", "backend"), ("version", "v2")]),
            TagSet::from([("kuma.io/service", "frontend")]),
        ],
    };
    let ctx = GenerationContext { snapshot: &snap, config: &config, secrets: &secrets };
    let set = registry.generate(&Proxy::ZoneIngress(&ingress), &ctx).expect("ingress pass");

    let built = set
        .of_type(LISTENER_TYPE_URL)
        .find(|r| r.name == "ingress:10.0.0.9:10001")
        .expect("ingress listener");
    let decoded = Listener::decode(built.resource.value.as_slice()).expect("decode listener");

    // One chain per exposed service tag set, each matching its exact SNI.
    let server_names: Vec<&str> = decoded
        .filter_chains
        .iter()
        .filter_map(|c| c.filter_chain_match.as_ref())
        .flat_map(|m| m.server_names.iter().map(String::as_str))
        .collect();
    assert_eq!(server_names, vec!["backend", "frontend"]);
    for chain in &decoded.filter_chains {
        let fcm = chain.filter_chain_match.as_ref().expect("chain match");
        assert_eq!(fcm.transport_protocol, "tls");
    }

    // Each chain's target cluster exists with a filtered load assignment.
    assert!(set.contains(CLUSTER_TYPE_URL, "backend"));
    assert!(set.contains(ENDPOINT_TYPE_URL, "backend"));
}

#[test]
fn gateway_pass_routes_longest_prefix_first_with_geo_paths() {
    let snap = snapshot();
    let config = GenerationConfig::default();
    let secrets = StaticSecretSource::new();
    let registry = GeneratorRegistry::with_defaults();

    let gateway: MeshGateway = serde_json::from_str(
        r#"{
          "name": "edge",
          "tags": {"kuma.io/service": "edge-gateway", "kuma.io/zone": "par1"},
          "address": "10.0.0.5",
          "listeners": [
            {"port": 8080, "protocol": "HTTP",
             "hostname": "edge.example.com", "tls": null}
          ]
        }"#,
    )
    .expect("gateway json");

    let ctx = GenerationContext { snapshot: &snap, config: &config, secrets: &secrets };
    let set = registry.generate(&Proxy::Gateway(&gateway), &ctx).expect("gateway pass");

    let built =
        set.of_type(ROUTE_TYPE_URL).find(|r| r.name == "edge:8080").expect("route config");
    let decoded =
        RouteConfiguration::decode(built.resource.value.as_slice()).expect("decode routes");
    let vhost = &decoded.virtual_hosts[0];
    assert_eq!(vhost.domains, vec!["edge.example.com".to_string()]);

    // /backend expands into two entries ordered before the geo /api pair
    // and the root route; a root route exists, so no 404 catch-all.
    let prefixes: Vec<&str> = vhost
        .routes
        .iter()
        .filter_map(|r| r.r#match.as_ref())
        .filter_map(|m| match m.path_specifier.as_ref() {
            Some(
                envoy_types::pb::envoy::config::route::v3::route_match::PathSpecifier::Prefix(p),
            ) => Some(p.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(prefixes, vec!["/backend/", "/backend", "/api/", "/api", "/"]);

    assert!(set.contains(CLUSTER_TYPE_URL, "backend"));
    assert!(set.contains(CLUSTER_TYPE_URL, "frontend"));
    assert!(set.contains(CLUSTER_TYPE_URL, "api"));
    assert!(set.contains(LISTENER_TYPE_URL, "gateway:10.0.0.5:8080"));
}
