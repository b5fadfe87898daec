//! The standard generator lineup.
//!
//! Each generator covers one resource family and guards on the proxy kind
//! it applies to. Fatal errors (structural config problems, unknown local
//! datacenter, resource conflicts) abort the whole pass; per-item problems
//! are logged with structured fields and skipped.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{MATCH_ALL, ZONE_TAG};
use crate::errors::Result;
use crate::geo::GeoService;
use crate::model::endpoint::Endpoint;
use crate::resolve::{self, DestinationMap, PolicySources};
use crate::sni;
use crate::xds::route::PathRoute;
use crate::xds::{
    aggregate, cluster, endpoint, listener, route, runtime, BuiltResource, GenerationContext,
    Origin, Proxy, ResourceGenerator, ResourceSet, CLUSTER_TYPE_URL, ENDPOINT_TYPE_URL,
    LISTENER_TYPE_URL, ROUTE_TYPE_URL, RUNTIME_TYPE_URL,
};

fn is_reachable(destinations: &DestinationMap, service: &str) -> bool {
    destinations.contains_key(service) || destinations.contains_key(MATCH_ALL)
}

/// Name of the route configuration carrying rendered virtual-outbound
/// hostnames
pub const VIRTUAL_OUTBOUND_ROUTES: &str = "virtual-outbounds";

/// Sidecar outbound traffic: one EDS cluster and load assignment per
/// reachable service with known endpoints, plus mTLS clusters toward
/// remote zone boundaries for services this zone has no endpoints for.
pub struct OutboundGenerator;

impl ResourceGenerator for OutboundGenerator {
    fn name(&self) -> &'static str {
        "outbound"
    }

    fn handles(&self, proxy: &Proxy<'_>) -> bool {
        matches!(proxy, Proxy::Sidecar(_))
    }

    fn generate(
        &self,
        proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()> {
        let dataplane = match proxy {
            Proxy::Sidecar(dataplane) => dataplane,
            _ => return Ok(()),
        };
        let snapshot = ctx.snapshot;
        let destinations =
            resolve::resolve(&snapshot.available_services, &PolicySources::from_snapshot(snapshot));

        for (service, endpoints) in &snapshot.endpoints {
            if !is_reachable(&destinations, service) {
                debug!(service = %service, "Service not reachable by policy, skipping cluster");
                continue;
            }

            let subset_keys = cluster::relevant_tags(endpoints);
            let eds = cluster::eds_cluster(service, service, &subset_keys, ctx.config);
            set.add(
                CLUSTER_TYPE_URL,
                BuiltResource::pack(service.clone(), Origin::Outbound, CLUSTER_TYPE_URL, &eds),
            )?;

            let refs: Vec<&Endpoint> = endpoints.iter().collect();
            let assignment = endpoint::cluster_load_assignment(service, &refs);
            set.add(
                ENDPOINT_TYPE_URL,
                BuiltResource::pack(
                    service.clone(),
                    Origin::Outbound,
                    ENDPOINT_TYPE_URL,
                    &assignment,
                ),
            )?;
        }

        // Remote-only services are reached through the owning zone's
        // boundary proxy: the cluster originates mTLS whose SNI encodes
        // the destination, and its endpoints are the boundary proxies
        // themselves. Services with local endpoints were already handled
        // above and keep zone-local traffic zone-local.
        let local_zone = dataplane.zone();
        let mut remote: BTreeMap<String, Vec<Endpoint>> = BTreeMap::new();
        for ingress in &snapshot.zone_ingresses {
            if local_zone == Some(ingress.zone.as_str()) {
                continue;
            }
            for tags in &ingress.available_services {
                let service = match tags.service() {
                    Some(service) => service,
                    None => {
                        warn!(
                            ingress = %ingress.name,
                            "Exposed tag set has no service tag, skipping"
                        );
                        continue;
                    }
                };
                if snapshot.endpoints.contains_key(service) {
                    continue;
                }
                if !is_reachable(&destinations, service) {
                    debug!(service = %service, "Remote service not reachable by policy, skipping");
                    continue;
                }
                remote.entry(sni::encode(tags)).or_default().push(Endpoint {
                    address: ingress.address.clone(),
                    port: ingress.port,
                    tags: tags.clone(),
                    weight: None,
                });
            }
        }

        for (sni_name, endpoints) in &remote {
            let eds = cluster::with_mtls_transport(
                cluster::eds_cluster(sni_name, sni_name, &[], ctx.config),
                sni_name,
            );
            set.add(
                CLUSTER_TYPE_URL,
                BuiltResource::pack(sni_name.clone(), Origin::CrossZone, CLUSTER_TYPE_URL, &eds),
            )?;

            let refs: Vec<&Endpoint> = endpoints.iter().collect();
            let assignment = endpoint::cluster_load_assignment(sni_name, &refs);
            set.add(
                ENDPOINT_TYPE_URL,
                BuiltResource::pack(
                    sni_name.clone(),
                    Origin::CrossZone,
                    ENDPOINT_TYPE_URL,
                    &assignment,
                ),
            )?;
        }

        // Virtual outbounds render their host template against every
        // selected service; the rendered hostnames become one route
        // configuration mapping each host to its service cluster. An
        // unparseable template is a structural error and aborts the pass.
        let mut outbound_hosts: BTreeMap<String, String> = BTreeMap::new();
        for outbound in &snapshot.virtual_outbounds {
            for service_tags in &snapshot.available_services {
                if !outbound.selectors.iter().any(|s| s.matches(service_tags)) {
                    continue;
                }
                let service = match service_tags.service() {
                    Some(service) => service,
                    None => continue,
                };
                if !snapshot.endpoints.contains_key(service)
                    || !is_reachable(&destinations, service)
                {
                    continue;
                }
                let host = outbound.format_host(service_tags)?;
                if host.is_empty() {
                    continue;
                }
                if let Some(existing) = outbound_hosts.get(&host) {
                    if existing != service {
                        warn!(
                            host = %host,
                            cluster = %existing,
                            "Rendered virtual-outbound host already mapped, keeping first"
                        );
                    }
                    continue;
                }
                outbound_hosts.insert(host, service.to_string());
            }
        }
        if !outbound_hosts.is_empty() {
            let vhosts = outbound_hosts
                .iter()
                .map(|(host, service)| {
                    route::virtual_host(
                        host,
                        &[host.clone()],
                        &[PathRoute { prefix: "/".to_string(), cluster: service.clone() }],
                    )
                })
                .collect();
            let outbound_routes = route::route_configuration(VIRTUAL_OUTBOUND_ROUTES, vhosts);
            set.add(
                ROUTE_TYPE_URL,
                BuiltResource::pack(
                    VIRTUAL_OUTBOUND_ROUTES,
                    Origin::Outbound,
                    ROUTE_TYPE_URL,
                    &outbound_routes,
                ),
            )?;
        }

        Ok(())
    }
}

/// Geo-distributed services: one aggregate cluster per service whose
/// member order is the datacenter chain ranked from the proxy's own
/// location, plus the per-datacenter member clusters.
pub struct GeoAggregateGenerator;

impl ResourceGenerator for GeoAggregateGenerator {
    fn name(&self) -> &'static str {
        "geo-aggregate"
    }

    fn handles(&self, proxy: &Proxy<'_>) -> bool {
        matches!(proxy, Proxy::Sidecar(_) | Proxy::Gateway(_))
    }

    fn generate(
        &self,
        proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()> {
        let snapshot = ctx.snapshot;
        if snapshot.geo_services.is_empty() {
            return Ok(());
        }

        let zone = match proxy {
            Proxy::Sidecar(dataplane) => dataplane.zone(),
            Proxy::Gateway(gateway) => gateway.tags.get(ZONE_TAG),
            Proxy::ZoneIngress(_) => return Ok(()),
        };
        let zone = match zone {
            Some(zone) => zone,
            None => {
                warn!(proxy = %proxy.name(), "Proxy carries no zone tag, skipping geo aggregates");
                return Ok(());
            }
        };

        let mut services: Vec<&GeoService> = snapshot.geo_services.iter().collect();
        services.sort_by(|a, b| a.id.cmp(&b.id));

        for service in services {
            let members = aggregate::build_aggregate(service, &snapshot.datacenters, zone)?;
            if members.is_empty() {
                continue;
            }

            let agg = cluster::aggregate_cluster(&service.id, &members, ctx.config);
            set.add(
                CLUSTER_TYPE_URL,
                BuiltResource::pack(service.id.clone(), Origin::Geo, CLUSTER_TYPE_URL, &agg),
            )?;

            for member in &members {
                let eds = cluster::eds_cluster(member, member, &[], ctx.config);
                set.add(
                    CLUSTER_TYPE_URL,
                    BuiltResource::pack(member.clone(), Origin::Geo, CLUSTER_TYPE_URL, &eds),
                )?;

                if let Some(endpoints) = snapshot.endpoints.get(member) {
                    let refs: Vec<&Endpoint> = endpoints.iter().collect();
                    let assignment = endpoint::cluster_load_assignment(member, &refs);
                    set.add(
                        ENDPOINT_TYPE_URL,
                        BuiltResource::pack(
                            member.clone(),
                            Origin::Geo,
                            ENDPOINT_TYPE_URL,
                            &assignment,
                        ),
                    )?;
                }
            }
        }

        Ok(())
    }
}

/// Zone-boundary pass-through: one listener whose filter chains match the
/// exact SNI of each (exposed service x destination) pair and forward the
/// still-encrypted stream to a cluster of that destination's endpoints.
pub struct ZoneBoundaryGenerator;

impl ResourceGenerator for ZoneBoundaryGenerator {
    fn name(&self) -> &'static str {
        "zone-boundary"
    }

    fn handles(&self, proxy: &Proxy<'_>) -> bool {
        matches!(proxy, Proxy::ZoneIngress(_))
    }

    fn generate(
        &self,
        proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()> {
        let ingress = match proxy {
            Proxy::ZoneIngress(ingress) => ingress,
            _ => return Ok(()),
        };
        let snapshot = ctx.snapshot;
        let destinations = resolve::resolve(
            &ingress.available_services,
            &PolicySources::from_snapshot(snapshot),
        );

        let mut chains = Vec::new();
        for planned in listener::sni_destinations(&ingress.available_services, &destinations) {
            let endpoints = match snapshot.endpoints.get(&planned.service) {
                Some(endpoints) => endpoints,
                None => {
                    warn!(
                        service = %planned.service,
                        sni = %planned.sni,
                        "Exposed service has no known endpoints, skipping SNI chain"
                    );
                    continue;
                }
            };

            let matched = endpoint::filter_by_destination(endpoints, &planned.tags);
            // Cluster, EDS reference and assignment all share the SNI name:
            // the assignment is tag-filtered, so pointing the cluster at the
            // bare service would resolve an assignment that is never emitted.
            let eds = cluster::eds_cluster(&planned.sni, &planned.sni, &[], ctx.config);
            set.add(
                CLUSTER_TYPE_URL,
                BuiltResource::pack(
                    planned.sni.clone(),
                    Origin::ZoneBoundary,
                    CLUSTER_TYPE_URL,
                    &eds,
                ),
            )?;
            let assignment = endpoint::cluster_load_assignment(&planned.sni, &matched);
            set.add(
                ENDPOINT_TYPE_URL,
                BuiltResource::pack(
                    planned.sni.clone(),
                    Origin::ZoneBoundary,
                    ENDPOINT_TYPE_URL,
                    &assignment,
                ),
            )?;

            chains.push(listener::sni_filter_chain(&planned.sni, &planned.sni, ctx.config));
        }

        let name = format!("ingress:{}:{}", ingress.address, ingress.port);
        let built = listener::ingress_listener(&name, &ingress.address, ingress.port, chains);
        set.add(
            LISTENER_TYPE_URL,
            BuiltResource::pack(name, Origin::ZoneBoundary, LISTENER_TYPE_URL, &built),
        )?;

        Ok(())
    }
}

/// Terminating gateway: per listener, a route configuration assembled
/// from the gateway routes selecting it (plus the routable paths of any
/// geo service whose aggregate cluster exists), wrapped in an HTTP
/// connection manager with TLS termination for HTTPS.
pub struct GatewayGenerator;

impl ResourceGenerator for GatewayGenerator {
    fn name(&self) -> &'static str {
        "gateway"
    }

    fn handles(&self, proxy: &Proxy<'_>) -> bool {
        matches!(proxy, Proxy::Gateway(_))
    }

    fn generate(
        &self,
        proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()> {
        let gateway = match proxy {
            Proxy::Gateway(gateway) => gateway,
            _ => return Ok(()),
        };
        let snapshot = ctx.snapshot;

        let mut listeners: Vec<_> = gateway.listeners.iter().collect();
        listeners.sort_by_key(|l| l.port);

        let mut geo_services: Vec<&GeoService> = snapshot.geo_services.iter().collect();
        geo_services.sort_by(|a, b| a.id.cmp(&b.id));

        for gw_listener in listeners {
            let merged_tags = gateway.tags.merged_with(&gw_listener.tags);
            let routes: Vec<_> =
                snapshot.gateway_routes.iter().filter(|r| r.selects(&merged_tags)).collect();

            let mut paths: Vec<PathRoute> = Vec::new();
            for gw_route in &routes {
                for rule in &gw_route.rules {
                    let tags = match rule.backends.iter().find_map(|b| b.tags.as_ref()) {
                        Some(tags) => tags,
                        None => {
                            warn!(
                                policy = %gw_route.name,
                                prefix = %rule.path_prefix,
                                "Gateway rule has no resolvable backend, skipping route"
                            );
                            continue;
                        }
                    };
                    let service = match tags.service() {
                        Some(service) => service.to_string(),
                        None => {
                            warn!(
                                policy = %gw_route.name,
                                prefix = %rule.path_prefix,
                                "Gateway backend has no service tag, skipping route"
                            );
                            continue;
                        }
                    };
                    let endpoints = match snapshot.endpoints.get(&service) {
                        Some(endpoints) => endpoints,
                        None => {
                            warn!(
                                service = %service,
                                prefix = %rule.path_prefix,
                                "Gateway backend has no known endpoints, skipping route"
                            );
                            continue;
                        }
                    };

                    let subset_keys = cluster::relevant_tags(endpoints);
                    let eds = cluster::eds_cluster(&service, &service, &subset_keys, ctx.config);
                    set.add(
                        CLUSTER_TYPE_URL,
                        BuiltResource::pack(
                            service.clone(),
                            Origin::Gateway,
                            CLUSTER_TYPE_URL,
                            &eds,
                        ),
                    )?;
                    let refs: Vec<&Endpoint> = endpoints.iter().collect();
                    let assignment = endpoint::cluster_load_assignment(&service, &refs);
                    set.add(
                        ENDPOINT_TYPE_URL,
                        BuiltResource::pack(
                            service.clone(),
                            Origin::Gateway,
                            ENDPOINT_TYPE_URL,
                            &assignment,
                        ),
                    )?;

                    paths.push(PathRoute { prefix: rule.path_prefix.clone(), cluster: service });
                }
            }

            // Geo services publish their externally-routable paths; they
            // route to the aggregate cluster when the geo generator built
            // one for this proxy.
            for geo in &geo_services {
                if !set.contains(CLUSTER_TYPE_URL, &geo.id) {
                    continue;
                }
                for path in &geo.routable_paths {
                    paths.push(PathRoute { prefix: path.clone(), cluster: geo.id.clone() });
                }
            }

            let domains = match &gw_listener.hostname {
                Some(hostname) => vec![hostname.clone()],
                None => {
                    let mut hostnames: Vec<String> =
                        routes.iter().flat_map(|r| r.hostnames.iter().cloned()).collect();
                    hostnames.sort();
                    hostnames.dedup();
                    hostnames
                }
            };

            let route_name = format!("{}:{}", gateway.name, gw_listener.port);
            let vhost = route::virtual_host(&route_name, &domains, &paths);
            let route_config = route::route_configuration(&route_name, vec![vhost]);
            set.add(
                ROUTE_TYPE_URL,
                BuiltResource::pack(
                    route_name.clone(),
                    Origin::Gateway,
                    ROUTE_TYPE_URL,
                    &route_config,
                ),
            )?;

            let chain =
                listener::gateway_filter_chain(gw_listener, route_config, ctx.secrets, ctx.config)?;
            let listener_name = format!("gateway:{}:{}", gateway.address, gw_listener.port);
            let built = listener::gateway_listener(
                &listener_name,
                &gateway.address,
                gw_listener.port,
                chain,
            );
            set.add(
                LISTENER_TYPE_URL,
                BuiltResource::pack(listener_name, Origin::Gateway, LISTENER_TYPE_URL, &built),
            )?;
        }

        Ok(())
    }
}

/// Runtime key/value layer: per-listener connection limits, read from the
/// listeners earlier generators emitted. Registered last for that reason.
pub struct RuntimeLayerGenerator;

impl ResourceGenerator for RuntimeLayerGenerator {
    fn name(&self) -> &'static str {
        "runtime-layer"
    }

    fn handles(&self, _proxy: &Proxy<'_>) -> bool {
        true
    }

    fn generate(
        &self,
        _proxy: &Proxy<'_>,
        ctx: &GenerationContext<'_>,
        set: &mut ResourceSet,
    ) -> Result<()> {
        let limit = match ctx.config.listener_connection_limit {
            Some(limit) => limit,
            None => return Ok(()),
        };
        let listener_names = set.names_of(LISTENER_TYPE_URL);
        if listener_names.is_empty() {
            debug!("No listeners emitted, skipping runtime connection-limit layer");
            return Ok(());
        }

        let layer = runtime::connection_limit_layer(&listener_names, limit);
        set.add(
            RUNTIME_TYPE_URL,
            BuiltResource::pack(
                runtime::CONNECTION_LIMIT_LAYER,
                Origin::Runtime,
                RUNTIME_TYPE_URL,
                &layer,
            ),
        )?;
        Ok(())
    }
}
