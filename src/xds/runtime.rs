//! Runtime key/value layer emission.
//!
//! The only runtime knob generation owns today is the per-listener
//! downstream connection limit, delivered through Envoy's resource-limit
//! runtime keys rather than baked into the listener protos.

use std::collections::HashMap;

use envoy_types::pb::envoy::service::runtime::v3::Runtime;
use envoy_types::pb::google::protobuf::{value::Kind, Struct, Value};

/// Name of the emitted runtime layer
pub const CONNECTION_LIMIT_LAYER: &str = "connection-limits";

fn runtime_key(listener_name: &str) -> String {
    format!("envoy.resource_limits.listener.{}.connection_limit", listener_name)
}

/// Build a runtime layer capping downstream connections on each named
/// listener
pub fn connection_limit_layer(listener_names: &[String], limit: u64) -> Runtime {
    let mut fields = HashMap::new();
    for name in listener_names {
        fields.insert(
            runtime_key(name),
            Value { kind: Some(Kind::NumberValue(limit as f64)) },
        );
    }

    Runtime {
        name: CONNECTION_LIMIT_LAYER.to_string(),
        layer: Some(Struct { fields }),
    }
}
