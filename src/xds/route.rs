//! Route configuration for terminating (edge/ingress) gateways.
//!
//! The underlying route matcher is first-match-wins, so path-prefix routes
//! are inserted longest-prefix-first. Prefix rewriting in the proxy
//! mishandles exact-prefix vs. prefix-with-children requests, so every
//! configured prefix that does not already end in `/` expands into two
//! entries: the prefix with a trailing slash added and the bare prefix,
//! both rewriting to `/`.

use envoy_types::pb::envoy::config::route::v3::{
    route::Action, route_action::ClusterSpecifier, route_match::PathSpecifier,
    DirectResponseAction, Route, RouteAction, RouteConfiguration, RouteMatch, VirtualHost,
};

/// One configured path prefix and the cluster it routes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathRoute {
    pub prefix: String,
    pub cluster: String,
}

fn prefix_route(prefix: &str, cluster: &str, rewrite: bool) -> Route {
    #[allow(deprecated)]
    let action = RouteAction {
        cluster_specifier: Some(ClusterSpecifier::Cluster(cluster.to_string())),
        prefix_rewrite: if rewrite { "/".to_string() } else { String::new() },
        ..Default::default()
    };

    Route {
        r#match: Some(RouteMatch {
            path_specifier: Some(PathSpecifier::Prefix(prefix.to_string())),
            ..Default::default()
        }),
        action: Some(Action::Route(action)),
        ..Default::default()
    }
}

fn not_found_route() -> Route {
    Route {
        r#match: Some(RouteMatch {
            path_specifier: Some(PathSpecifier::Prefix("/".to_string())),
            ..Default::default()
        }),
        action: Some(Action::DirectResponse(DirectResponseAction {
            status: 404,
            ..Default::default()
        })),
        ..Default::default()
    }
}

/// Build a virtual host from configured path routes.
///
/// Paths are sorted longest-prefix-first before expansion; a catch-all 404
/// is appended only when no configured route already claimed the root
/// (`""` or `"/"`) prefix.
pub fn virtual_host(name: &str, domains: &[String], paths: &[PathRoute]) -> VirtualHost {
    let mut ordered: Vec<&PathRoute> = paths.iter().collect();
    ordered.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

    let has_root = paths.iter().any(|p| p.prefix.is_empty() || p.prefix == "/");

    let mut routes = Vec::new();
    for path in ordered {
        if path.prefix.is_empty() || path.prefix == "/" {
            routes.push(prefix_route("/", &path.cluster, false));
        } else if path.prefix.ends_with('/') {
            routes.push(prefix_route(&path.prefix, &path.cluster, true));
        } else {
            routes.push(prefix_route(&format!("{}/", path.prefix), &path.cluster, true));
            routes.push(prefix_route(&path.prefix, &path.cluster, true));
        }
    }

    if !has_root {
        routes.push(not_found_route());
    }

    let domains =
        if domains.is_empty() { vec!["*".to_string()] } else { domains.to_vec() };

    VirtualHost { name: name.to_string(), domains, routes, ..Default::default() }
}

/// Assemble a route configuration from virtual hosts
pub fn route_configuration(name: &str, virtual_hosts: Vec<VirtualHost>) -> RouteConfiguration {
    RouteConfiguration { name: name.to_string(), virtual_hosts, ..Default::default() }
}
