//! Pre-validated traffic-policy inputs consumed by destination resolution.
//!
//! These are narrow views of the declarative policy model: the field-level
//! validators ran before the snapshot was assembled, so structural
//! invariants (non-empty selectors, positive weights) are trusted here.

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::model::tags::TagSet;

/// Legacy traffic-split policy: each split names a destination tag set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficRoute {
    pub name: String,
    pub splits: Vec<TrafficSplit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficSplit {
    pub weight: u32,
    pub destination: TagSet,
}

/// Backend reference of a newer route policy rule. The reference was
/// resolved against the mesh by the policy layer; `tags` is `None` when the
/// target-ref did not map to a concrete tag set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendRef {
    pub name: String,
    pub tags: Option<TagSet>,
}

/// MeshHTTPRoute policy: per-rule backend references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshHttpRoute {
    pub name: String,
    pub rules: Vec<RouteRule>,
}

/// MeshTCPRoute policy: per-rule backend references
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshTcpRoute {
    pub name: String,
    pub rules: Vec<RouteRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteRule {
    pub backends: Vec<BackendRef>,
}

/// Gateway route policy attached to a mesh gateway listener
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRoute {
    pub name: String,
    /// Gateway selector; matched against the gateway's tags
    pub selectors: Vec<TagSet>,
    /// Externally-routable hostnames this route serves
    pub hostnames: Vec<String>,
    pub rules: Vec<GatewayRouteRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayRouteRule {
    /// Path prefix matched against the request path
    pub path_prefix: String,
    pub backends: Vec<BackendRef>,
}

impl GatewayRoute {
    /// Whether any selector matches the gateway's tags
    pub fn selects(&self, gateway_tags: &TagSet) -> bool {
        self.selectors.iter().any(|s| s.matches(gateway_tags))
    }
}

/// Virtual outbound policy: a parameterized template that, applied to a
/// real available service's tags, projects out only the tag subset named in
/// its parameter list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualOutbound {
    pub name: String,
    /// Which services the template applies to
    pub selectors: Vec<TagSet>,
    pub conf: VirtualOutboundConf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualOutboundConf {
    /// Hostname template, e.g. `{{.service}}.{{.version}}.mesh`
    pub host: String,
    pub port: u32,
    pub parameters: Vec<VirtualOutboundParameter>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VirtualOutboundParameter {
    /// Placeholder name used in the host template
    pub name: String,
    /// Tag key the placeholder reads from; defaults to `name` when empty
    #[serde(default)]
    pub tag_key: Option<String>,
}

impl VirtualOutboundParameter {
    pub fn tag_key(&self) -> &str {
        self.tag_key.as_deref().unwrap_or(&self.name)
    }
}

impl VirtualOutbound {
    /// Tag keys the template projects onto
    pub fn projected_keys(&self) -> Vec<String> {
        self.conf.parameters.iter().map(|p| p.tag_key().to_string()).collect()
    }

    /// Render the host template against a concrete tag set. Every
    /// `{{.name}}` placeholder must correspond to a declared parameter
    /// whose tag key is present in `tags`; anything else is an unparseable
    /// template and fatal to the proxy's generation pass.
    pub fn format_host(&self, tags: &TagSet) -> Result<String> {
        let mut host = self.conf.host.clone();
        let mut scan = self.conf.host.as_str();
        while let Some(start) = scan.find("{{.") {
            let rest = &scan[start + 3..];
            let end = rest.find("}}").ok_or_else(|| {
                Error::config_field(
                    format!("unterminated placeholder in host template '{}'", self.conf.host),
                    format!("virtual-outbound[{}].conf.host", self.name),
                )
            })?;
            let placeholder = &rest[..end];
            let parameter =
                self.conf.parameters.iter().find(|p| p.name == placeholder).ok_or_else(|| {
                    Error::config_field(
                        format!("host template references undeclared parameter '{}'", placeholder),
                        format!("virtual-outbound[{}].conf.host", self.name),
                    )
                })?;
            let value = tags.get(parameter.tag_key()).unwrap_or_default();
            host = host.replace(&format!("{{{{.{}}}}}", placeholder), value);
            scan = &rest[end + 2..];
        }
        Ok(host)
    }
}
