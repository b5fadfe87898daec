//! Endpoint assignment (EDS) resource construction.
//!
//! Builds `ClusterLoadAssignment`s from the externally-supplied endpoint
//! map. Endpoint tags travel as `envoy.lb` metadata so subset load
//! balancing can match on them.

use std::collections::HashMap;

use envoy_types::pb::envoy::config::core::v3::{
    address::Address as AddressType, socket_address::PortSpecifier, Address, Metadata,
    SocketAddress,
};
use envoy_types::pb::envoy::config::endpoint::v3::{
    lb_endpoint::HostIdentifier, ClusterLoadAssignment, Endpoint as EnvoyEndpoint, LbEndpoint,
    LocalityLbEndpoints,
};
use envoy_types::pb::google::protobuf::{value::Kind, Struct, UInt32Value, Value};

use crate::model::endpoint::Endpoint;
use crate::model::tags::TagSet;

/// Namespace Envoy's subset load balancer reads endpoint metadata from
pub const ENVOY_LB_METADATA_KEY: &str = "envoy.lb";

fn lb_metadata(tags: &TagSet) -> Option<Metadata> {
    if tags.is_empty() {
        return None;
    }
    let mut fields = HashMap::new();
    for (key, value) in tags.iter() {
        fields.insert(
            key.to_string(),
            Value { kind: Some(Kind::StringValue(value.to_string())) },
        );
    }
    let mut filter_metadata = HashMap::new();
    filter_metadata.insert(ENVOY_LB_METADATA_KEY.to_string(), Struct { fields });
    Some(Metadata { filter_metadata, ..Default::default() })
}

fn lb_endpoint(endpoint: &Endpoint) -> LbEndpoint {
    let socket_address = SocketAddress {
        address: endpoint.address.clone(),
        port_specifier: Some(PortSpecifier::PortValue(endpoint.port)),
        ..Default::default()
    };

    LbEndpoint {
        host_identifier: Some(HostIdentifier::Endpoint(EnvoyEndpoint {
            address: Some(Address { address: Some(AddressType::SocketAddress(socket_address)) }),
            ..Default::default()
        })),
        metadata: lb_metadata(&endpoint.tags),
        load_balancing_weight: endpoint.weight.map(|w| UInt32Value { value: w }),
        ..Default::default()
    }
}

/// Build the load assignment for a cluster from its candidate endpoints
pub fn cluster_load_assignment(
    cluster_name: &str,
    endpoints: &[&Endpoint],
) -> ClusterLoadAssignment {
    let lb_endpoints: Vec<LbEndpoint> = endpoints.iter().map(|e| lb_endpoint(e)).collect();

    ClusterLoadAssignment {
        cluster_name: cluster_name.to_string(),
        endpoints: vec![LocalityLbEndpoints { lb_endpoints, ..Default::default() }],
        ..Default::default()
    }
}

/// Candidate endpoints of a service that satisfy a destination's tags.
/// The destination's service tag is ignored here — membership in the
/// service's endpoint list already established it.
pub fn filter_by_destination<'a>(
    endpoints: &'a [Endpoint],
    destination: &TagSet,
) -> Vec<&'a Endpoint> {
    endpoints
        .iter()
        .filter(|endpoint| {
            destination.without_service().all(|(key, value)| {
                value == crate::config::MATCH_ALL || endpoint.tags.get(key) == Some(value)
            })
        })
        .collect()
}
