//! Cluster resource construction.
//!
//! Every service with known endpoints gets one EDS-backed cluster. Subset
//! load balancing is keyed on the minimal "relevant tag" set so the subset
//! matrix does not explode combinatorially; cross-zone clusters carry an
//! mTLS transport socket whose SNI encodes the destination. Geo-distributed
//! services get an Envoy aggregate cluster whose members form the ranked
//! fallback chain.

use envoy_types::pb::envoy::config::cluster::v3::cluster::{
    lb_subset_config::LbSubsetSelector, ClusterDiscoveryType, CustomClusterType, DiscoveryType,
    EdsClusterConfig, LbSubsetConfig,
};
use envoy_types::pb::envoy::config::cluster::v3::Cluster;
use envoy_types::pb::envoy::config::core::v3::{
    config_source::ConfigSourceSpecifier, transport_socket::ConfigType, AggregatedConfigSource,
    ConfigSource, TransportSocket,
};
use envoy_types::pb::envoy::extensions::clusters::aggregate::v3::ClusterConfig as AggregateConfig;
use envoy_types::pb::google::protobuf::{Any, Duration};
use prost::Message;

use crate::config::{GenerationConfig, SERVICE_TAG};
use crate::model::endpoint::Endpoint;
use crate::xds::secret::upstream_tls_context;

pub const AGGREGATE_CLUSTER_TYPE: &str = "envoy.clusters.aggregate";
pub const AGGREGATE_CONFIG_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.clusters.aggregate.v3.ClusterConfig";
pub const TLS_TRANSPORT_SOCKET: &str = "envoy.transport_sockets.tls";
pub const UPSTREAM_TLS_CONTEXT_TYPE_URL: &str =
    "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.UpstreamTlsContext";

/// Compute the relevant tag keys of a service's endpoints: the keys where
/// at least one candidate endpoint would be excluded *and* at least one
/// included by some key=value match. A key every endpoint agrees on (same
/// value, or uniformly absent) can never change which endpoints are
/// eligible, so keying subsets on it would only multiply subset count.
/// The service tag is uniform by construction and falls out naturally.
pub fn relevant_tags(endpoints: &[Endpoint]) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    if endpoints.is_empty() {
        return keys;
    }
    let mut candidates: std::collections::BTreeSet<&str> = std::collections::BTreeSet::new();
    for endpoint in endpoints {
        for key in endpoint.tags.keys() {
            candidates.insert(key);
        }
    }

    for key in candidates {
        if key == SERVICE_TAG {
            continue;
        }
        let first = endpoints[0].tags.get(key);
        let discriminates = endpoints.iter().any(|e| e.tags.get(key) != first);
        if discriminates {
            keys.push(key.to_string());
        }
    }
    keys
}

fn ads_config_source() -> ConfigSource {
    ConfigSource {
        config_source_specifier: Some(ConfigSourceSpecifier::Ads(AggregatedConfigSource::default())),
        ..Default::default()
    }
}

/// Build an EDS-backed cluster. `subset_keys` come from [`relevant_tags`];
/// an empty set disables subset load balancing entirely.
pub fn eds_cluster(
    name: &str,
    eds_service_name: &str,
    subset_keys: &[String],
    config: &GenerationConfig,
) -> Cluster {
    let lb_subset_config = if subset_keys.is_empty() {
        None
    } else {
        Some(LbSubsetConfig {
            subset_selectors: vec![LbSubsetSelector {
                keys: subset_keys.to_vec(),
                ..Default::default()
            }],
            ..Default::default()
        })
    };

    Cluster {
        name: name.to_string(),
        cluster_discovery_type: Some(ClusterDiscoveryType::Type(DiscoveryType::Eds as i32)),
        eds_cluster_config: Some(EdsClusterConfig {
            eds_config: Some(ads_config_source()),
            service_name: eds_service_name.to_string(),
        }),
        connect_timeout: Some(Duration {
            seconds: config.connect_timeout_secs as i64,
            nanos: 0,
        }),
        lb_subset_config,
        ..Default::default()
    }
}

/// Attach the cross-zone mTLS transport socket to a cluster. The SNI is
/// the encoded destination, so the remote zone boundary can route the
/// handshake without decrypting it.
pub fn with_mtls_transport(mut cluster: Cluster, sni: &str) -> Cluster {
    let tls_context = upstream_tls_context(sni);
    cluster.transport_socket = Some(TransportSocket {
        name: TLS_TRANSPORT_SOCKET.to_string(),
        config_type: Some(ConfigType::TypedConfig(Any {
            type_url: UPSTREAM_TLS_CONTEXT_TYPE_URL.to_string(),
            value: tls_context.encode_to_vec(),
        })),
    });
    cluster
}

/// Build an aggregate cluster over an ordered member chain. Envoy treats
/// the member order as priority order, which is exactly the geo-ranked
/// fallback semantic.
pub fn aggregate_cluster(
    name: &str,
    members: &[String],
    config: &GenerationConfig,
) -> Cluster {
    let aggregate = AggregateConfig { clusters: members.to_vec() };

    Cluster {
        name: name.to_string(),
        cluster_discovery_type: Some(ClusterDiscoveryType::ClusterType(CustomClusterType {
            name: AGGREGATE_CLUSTER_TYPE.to_string(),
            typed_config: Some(Any {
                type_url: AGGREGATE_CONFIG_TYPE_URL.to_string(),
                value: aggregate.encode_to_vec(),
            }),
        })),
        connect_timeout: Some(Duration {
            seconds: config.connect_timeout_secs as i64,
            nanos: 0,
        }),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::tags::TagSet;

    fn endpoint(tags: TagSet) -> Endpoint {
        Endpoint { address: "10.0.0.1".to_string(), port: 8080, tags, weight: None }
    }

    #[test]
    fn test_relevant_tags_keeps_discriminating_keys() {
        let endpoints = vec![
            endpoint(TagSet::from([("version", "v1"), ("team", "core")])),
            endpoint(TagSet::from([("version", "v2"), ("team", "core")])),
        ];
        assert_eq!(relevant_tags(&endpoints), vec!["version".to_string()]);
    }

    #[test]
    fn test_relevant_tags_includes_partially_absent_keys() {
        // A key present on one endpoint and absent on another still
        // discriminates: matching on it excludes the untagged endpoint.
        let endpoints = vec![
            endpoint(TagSet::from([("canary", "true")])),
            endpoint(TagSet::new()),
        ];
        assert_eq!(relevant_tags(&endpoints), vec!["canary".to_string()]);
    }

    #[test]
    fn test_relevant_tags_drops_uniform_and_service_keys() {
        let endpoints = vec![
            endpoint(TagSet::from([(SERVICE_TAG, "backend"), ("zone", "eu")])),
            endpoint(TagSet::from([(SERVICE_TAG, "backend"), ("zone", "eu")])),
        ];
        assert!(relevant_tags(&endpoints).is_empty());
    }

    #[test]
    fn test_eds_cluster_with_subsets() {
        let config = GenerationConfig::default();
        let cluster =
            eds_cluster("backend", "backend", &["version".to_string()], &config);
        assert_eq!(cluster.name, "backend");
        let subsets = cluster.lb_subset_config.expect("subset config");
        assert_eq!(subsets.subset_selectors[0].keys, vec!["version".to_string()]);
        assert!(cluster.eds_cluster_config.is_some());
    }

    #[test]
    fn test_eds_cluster_without_subsets() {
        let config = GenerationConfig::default();
        let cluster = eds_cluster("backend", "backend", &[], &config);
        assert!(cluster.lb_subset_config.is_none());
    }

    #[test]
    fn test_mtls_transport_socket_carries_sni() {
        use envoy_types::pb::envoy::extensions::transport_sockets::tls::v3::UpstreamTlsContext;

        let config = GenerationConfig::default();
        let cluster = with_mtls_transport(
            eds_cluster("backend{env=prod}", "backend", &[], &config),
            "backend{env=prod}",
        );
        let socket = cluster.transport_socket.expect("transport socket");
        assert_eq!(socket.name, TLS_TRANSPORT_SOCKET);
        let any = match socket.config_type.expect("config type") {
            ConfigType::TypedConfig(any) => any,
        };
        let decoded = UpstreamTlsContext::decode(any.value.as_slice()).expect("decode");
        assert_eq!(decoded.sni, "backend{env=prod}");
    }

    #[test]
    fn test_aggregate_cluster_preserves_member_order() {
        let config = GenerationConfig::default();
        let members = vec!["dc_bxl1".to_string(), "dc_nyc1".to_string()];
        let cluster = aggregate_cluster("api", &members, &config);

        let custom = match cluster.cluster_discovery_type.expect("discovery type") {
            ClusterDiscoveryType::ClusterType(custom) => custom,
            other => panic!("expected custom cluster type, got {:?}", other),
        };
        assert_eq!(custom.name, AGGREGATE_CLUSTER_TYPE);
        let decoded =
            AggregateConfig::decode(custom.typed_config.expect("typed config").value.as_slice())
                .expect("decode aggregate config");
        assert_eq!(decoded.clusters, members);
    }
}
