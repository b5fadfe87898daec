//! Narrow, pre-validated views of the proxies we generate configuration
//! for: sidecars, zone-boundary proxies and mesh gateways. Field-level
//! validation happened in the policy layer before the snapshot was built;
//! the core trusts these structural invariants.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::model::tags::TagSet;

/// Listener protocol of a gateway listener. Dispatch over this enum is
/// exhaustive; anything the model cannot represent is rejected at parse
/// time with an unsupported-protocol error, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListenerProtocol {
    Http,
    Https,
}

impl ListenerProtocol {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "HTTP" => Ok(Self::Http),
            "HTTPS" => Ok(Self::Https),
            other => Err(Error::UnsupportedProtocol { protocol: other.to_string() }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
        }
    }
}

/// TLS handling mode of an HTTPS gateway listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TlsMode {
    Terminate,
    Passthrough,
}

/// Reference to a PEM certificate/key pair resolvable through the secret
/// source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateRef {
    pub name: String,
    /// Datasource reference handed to the secret accessor
    pub secret: String,
}

/// TLS configuration of an HTTPS listener. Only `Terminate` mode is
/// supported by generation; other modes are a fatal config error there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    pub mode: TlsMode,
    pub certificates: Vec<CertificateRef>,
}

/// A sidecar dataplane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataplane {
    pub name: String,
    pub address: String,
    /// Inbound tags; must carry the service tag
    pub tags: TagSet,
}

impl Dataplane {
    /// Zone/datacenter this dataplane runs in, from the well-known zone tag
    pub fn zone(&self) -> Option<&str> {
        self.tags.get(crate::config::ZONE_TAG)
    }
}

/// A zone-boundary proxy (ingress or egress) that routes cross-zone mTLS
/// traffic by SNI without terminating it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneIngress {
    pub name: String,
    pub zone: String,
    pub address: String,
    pub port: u32,
    /// Tag sets of the services this zone exposes to other zones
    pub available_services: Vec<TagSet>,
}

/// One listener of a mesh gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayListener {
    pub port: u32,
    pub protocol: ListenerProtocol,
    pub hostname: Option<String>,
    /// Listener-level tags, merged over the gateway tags for destination
    /// resolution of cross-mesh listeners
    #[serde(default)]
    pub tags: TagSet,
    #[serde(default)]
    pub cross_mesh: bool,
    pub tls: Option<TlsConfig>,
}

/// A mesh gateway (builtin edge/ingress gateway that terminates TLS)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshGateway {
    pub name: String,
    /// Gateway selector tags; must carry the service tag
    pub tags: TagSet,
    pub address: String,
    pub listeners: Vec<GatewayListener>,
}

impl MeshGateway {
    pub fn service(&self) -> Option<&str> {
        self.tags.service()
    }
}
