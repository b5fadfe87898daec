//! The immutable mesh snapshot a generation pass computes over.
//!
//! The resource store assembles one of these per reconciliation event and
//! hands it in; nothing here is mutated or cached across passes, so
//! concurrent generation calls for different proxies share no state.

use serde::{Deserialize, Serialize};

use crate::geo::{Datacenter, GeoService};
use crate::model::dataplane::{Dataplane, MeshGateway, ZoneIngress};
use crate::model::endpoint::EndpointMap;
use crate::model::policy::{
    GatewayRoute, MeshHttpRoute, MeshTcpRoute, TrafficRoute, VirtualOutbound,
};
use crate::model::tags::TagSet;

/// Everything one proxy's generation pass reads
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshSnapshot {
    pub mesh: String,

    /// All dataplanes in the mesh
    #[serde(default)]
    pub dataplanes: Vec<Dataplane>,

    /// Tag sets of all services known to the mesh
    #[serde(default)]
    pub available_services: Vec<TagSet>,

    /// Endpoints per service name
    #[serde(default)]
    pub endpoints: EndpointMap,

    /// Legacy traffic-split policies
    #[serde(default)]
    pub traffic_routes: Vec<TrafficRoute>,

    #[serde(default)]
    pub http_routes: Vec<MeshHttpRoute>,

    #[serde(default)]
    pub tcp_routes: Vec<MeshTcpRoute>,

    #[serde(default)]
    pub gateway_routes: Vec<GatewayRoute>,

    /// Mesh gateways, including cross-mesh listeners
    #[serde(default)]
    pub mesh_gateways: Vec<MeshGateway>,

    #[serde(default)]
    pub virtual_outbounds: Vec<VirtualOutbound>,

    /// Zone-boundary proxies known to the mesh
    #[serde(default)]
    pub zone_ingresses: Vec<ZoneIngress>,

    /// Datacenter catalog for geo-aware generation
    #[serde(default)]
    pub datacenters: Vec<Datacenter>,

    /// Geo-distributed services (global-load-balancer scenarios)
    #[serde(default)]
    pub geo_services: Vec<GeoService>,
}

impl MeshSnapshot {
    /// Service names with at least one known endpoint, in sorted order
    pub fn services_with_endpoints(&self) -> impl Iterator<Item = &str> {
        self.endpoints.keys().map(String::as_str)
    }
}
