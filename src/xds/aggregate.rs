//! Aggregate cluster chains for geo-distributed services.
//!
//! Ranks the datacenter catalog from the proxy's own location and maps the
//! datacenters hosting the service to an ordered list of member cluster
//! names. Index 0 is always the closest deployment, so every zone gets a
//! locally-optimal fallback ordering of the same clusters.

use tracing::warn;

use crate::errors::{Error, Result};
use crate::geo::{self, Datacenter, GeoService};

/// Prefix of per-datacenter member cluster names
pub const DATACENTER_CLUSTER_PREFIX: &str = "dc_";

/// Member cluster name for a datacenter
pub fn datacenter_cluster_name(id: &str) -> String {
    format!("{}{}", DATACENTER_CLUSTER_PREFIX, id)
}

/// Build the ordered member list of a service's aggregate cluster.
///
/// Fatal when `local_datacenter_id` is missing from the catalog — a proxy
/// that cannot locate itself cannot rank anything. An empty result (the
/// service is not deployed in any known datacenter) is *not* an error;
/// callers log and skip that one service.
pub fn build_aggregate(
    service: &GeoService,
    datacenters: &[Datacenter],
    local_datacenter_id: &str,
) -> Result<Vec<String>> {
    let local = datacenters
        .iter()
        .find(|dc| dc.id == local_datacenter_id)
        .ok_or_else(|| Error::DatacenterNotFound { id: local_datacenter_id.to_string() })?;

    let ranked = geo::rank(local.coordinate, datacenters);

    let members: Vec<String> = ranked
        .iter()
        .filter(|dc| service.datacenter_ids.iter().any(|id| id == &dc.id))
        .map(|dc| datacenter_cluster_name(&dc.id))
        .collect();

    if members.is_empty() {
        warn!(
            service = %service.id,
            local_datacenter = %local_datacenter_id,
            "Geo service has no reachable datacenters, aggregate cluster will be skipped"
        );
    }

    Ok(members)
}
