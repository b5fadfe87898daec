//! Endpoints — the concrete network targets behind each service.
//!
//! Endpoints are discovered by an external collaborator and handed in with
//! the snapshot; the core only consumes them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::tags::TagSet;

/// One addressable network target of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u32,
    /// Endpoint metadata tags (version, zone, ...); drives subset load
    /// balancing and cross-zone filtering
    #[serde(default)]
    pub tags: TagSet,
    /// Relative load-balancing weight, 1 when absent
    #[serde(default)]
    pub weight: Option<u32>,
}

/// Endpoints grouped by service name. BTreeMap keeps service iteration
/// order deterministic for resource emission.
pub type EndpointMap = BTreeMap<String, Vec<Endpoint>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_deserializes_without_tags() {
        let endpoint: Endpoint =
            serde_json::from_str(r#"{"address": "10.0.0.1", "port": 8080}"#)
                .expect("endpoint json");
        assert!(endpoint.tags.is_empty());
        assert_eq!(endpoint.weight, None);
    }
}
