//! Mesh snapshot model: tag sets, proxies, policies and endpoints.
//!
//! These are the narrow, already-validated interfaces the generation core
//! consumes. Policy CRUD, storage and field-level validation live in the
//! surrounding control plane.

pub mod dataplane;
pub mod endpoint;
pub mod policy;
pub mod snapshot;
pub mod tags;

pub use dataplane::{
    CertificateRef, Dataplane, GatewayListener, ListenerProtocol, MeshGateway, TlsConfig, TlsMode,
    ZoneIngress,
};
pub use endpoint::{Endpoint, EndpointMap};
pub use policy::{
    BackendRef, GatewayRoute, GatewayRouteRule, MeshHttpRoute, MeshTcpRoute, RouteRule,
    TrafficRoute, TrafficSplit, VirtualOutbound, VirtualOutboundConf, VirtualOutboundParameter,
};
pub use snapshot::MeshSnapshot;
pub use tags::{MultiValueTagSet, TagSet};
