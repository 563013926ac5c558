/*!
End-to-end pipeline: fabric -> link-state database -> routing tables -> tunnels.

Every run recomputes everything from the fabric it is given. The result is a plain value, so
running twice on the same input gives identical reports (and identical revisions).
*/

use std::{collections::BTreeMap, net::Ipv4Addr};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    config::{ConfigError, OverlayConfig},
    network::{
        fabric::{ConfigurationError, Fabric, TopologySpec},
        node::{NodeId, Role},
    },
    overlay::{
        encap::EncapsulationSample,
        registry::{EndpointId, OverlayError, OverlayRegistry, SegmentId, TunnelEndpoint},
        tunnel::{self, OverlayNote, Tunnel, TunnelReport},
    },
    routing::{
        lsdb::LinkStateDatabase,
        table::{RouteEntry, RoutingTables},
    },
    topology::source::TopologyError,
};

const DEFAULT_SEGMENT_ALL: u32 = 100;
const DEFAULT_SEGMENT_PARTIAL: u32 = 200;

/// Top level error of a simulation request.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Overlay(#[from] OverlayError),
    #[error(transparent)]
    Source(TopologyError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<TopologyError> for SimulationError {
    fn from(error: TopologyError) -> Self {
        match error {
            TopologyError::Configuration(error) => SimulationError::Configuration(error),
            other => SimulationError::Source(other),
        }
    }
}

impl SimulationError {
    pub fn kind(&self) -> &'static str {
        match self {
            SimulationError::Configuration(_) => "configuration",
            SimulationError::Overlay(_) => "overlay",
            SimulationError::Source(_) => "source",
            SimulationError::Config(_) => "config",
        }
    }

    pub fn report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

/// Machine readable error, printed by the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

/// Numbered ids sort by their number ("L2" before "L10"), anything else after them by name.
fn leaf_order(id: &str) -> (String, Option<u64>, String) {
    let prefix = id.trim_end_matches(|c: char| c.is_ascii_digit());
    let number = id[prefix.len()..].parse().ok();
    (prefix.to_string(), number, id.to_string())
}

/// Populate an overlay registry for `fabric`.
///
/// Every router with a VTEP address gets an endpoint named after it. Configured endpoints are
/// added on top and must sit on a router of the fabric. Without configured segments, VNI 100
/// spans every leaf endpoint and VNI 200 the first `max(2, leaves / 2 + 1)` of them.
pub fn build_overlay(fabric: &Fabric, config: &OverlayConfig) -> Result<OverlayRegistry, OverlayError> {
    let mut registry = OverlayRegistry::new();

    let mut leaf_endpoints = Vec::new();
    for node in fabric.nodes() {
        if let Some(ip) = node.vtep_ip {
            let endpoint = TunnelEndpoint::new(node.id.as_str(), node.id.clone()).with_ip(ip);
            if node.role == Role::Leaf {
                leaf_endpoints.push(endpoint.id.clone());
            }
            registry.add_endpoint(endpoint);
        }
    }

    for configured in &config.endpoints {
        let router = NodeId::from(configured.router.as_str());
        let mut endpoint = TunnelEndpoint::new(configured.id.as_str(), router.clone());
        if !fabric.contains(&router) {
            return Err(OverlayError::UnknownRouter {
                endpoint: endpoint.id,
                router,
            });
        }
        if let Some(ip) = configured.ip {
            endpoint = endpoint.with_ip(ip);
        }
        registry.add_endpoint(endpoint);
    }

    let segments: Vec<(SegmentId, String, Vec<EndpointId>)> = if config.segments.is_empty() {
        leaf_endpoints.sort_by_cached_key(|id| leaf_order(id.as_str()));
        let partial = leaf_endpoints.len().min((leaf_endpoints.len() / 2 + 1).max(2));
        vec![
            (
                SegmentId::new(DEFAULT_SEGMENT_ALL)?,
                format!("V{DEFAULT_SEGMENT_ALL}"),
                leaf_endpoints.clone(),
            ),
            (
                SegmentId::new(DEFAULT_SEGMENT_PARTIAL)?,
                format!("V{DEFAULT_SEGMENT_PARTIAL}"),
                leaf_endpoints[..partial].to_vec(),
            ),
        ]
    } else {
        config
            .segments
            .iter()
            .map(|segment| -> Result<_, OverlayError> {
                let id = SegmentId::new(segment.vni)?;
                let name = segment.name.clone().unwrap_or_else(|| format!("VNI-{id}"));
                let members = match &segment.members {
                    Some(members) => members.iter().map(|member| EndpointId::from(member.as_str())).collect(),
                    None => leaf_endpoints.clone(),
                };
                Ok((id, name, members))
            })
            .collect::<Result<_, _>>()?
    };

    for (id, name, members) in segments {
        registry.add_segment(id, name);
        for member in &members {
            registry.join(member, id)?;
        }
    }

    tracing::info!(
        endpoints = registry.endpoints().count(),
        segments = registry.segments().count(),
        "overlay registry built"
    );
    Ok(registry)
}

/// Result of one pipeline run. Owns copies of its inputs so it can outlive them.
#[derive(Debug, Clone)]
pub struct Simulation {
    topology: TopologySpec,
    lsdb: LinkStateDatabase,
    tables: RoutingTables,
    registry: OverlayRegistry,
    tunnels: TunnelReport,
}

/// Run the underlay and overlay pipeline against an immutable fabric.
pub fn run(fabric: &Fabric, registry: &OverlayRegistry) -> Simulation {
    let lsdb = LinkStateDatabase::synthesize(fabric);
    tracing::info!(routers = lsdb.len(), "link-state database synthesized");

    let tables = RoutingTables::install_all(&lsdb);
    tracing::info!(tables = tables.len(), "routing tables installed");

    let tunnels = tunnel::resolve_all(registry, &tables);
    tracing::info!(
        tunnels = tunnels.tunnels.len(),
        unreachable = tunnels.unreachable().count(),
        "overlay tunnels resolved"
    );

    Simulation {
        topology: fabric.to_spec(),
        lsdb,
        tables,
        registry: registry.clone(),
        tunnels,
    }
}

/// Build the overlay from configuration and run the pipeline.
pub fn simulate(fabric: &Fabric, overlay: &OverlayConfig) -> Result<Simulation, SimulationError> {
    let registry = build_overlay(fabric, overlay)?;
    Ok(run(fabric, &registry))
}

impl Simulation {
    pub fn topology(&self) -> &TopologySpec {
        &self.topology
    }

    pub fn lsdb(&self) -> &LinkStateDatabase {
        &self.lsdb
    }

    pub fn tables(&self) -> &RoutingTables {
        &self.tables
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn tunnels(&self) -> &TunnelReport {
        &self.tunnels
    }

    /// Outer addresses of a tunnel: the endpoint addresses, or the VTEP address of the router.
    fn outer_ips(&self, tunnel: &Tunnel) -> (Option<Ipv4Addr>, Option<Ipv4Addr>) {
        let lookup = |endpoint: &EndpointId, router: &NodeId| {
            self.registry
                .endpoint(endpoint)
                .and_then(|endpoint| endpoint.ip)
                .or_else(|| {
                    self.topology
                        .nodes
                        .iter()
                        .find(|node| node.id == *router)
                        .and_then(|node| node.vtep_ip)
                })
        };
        (
            lookup(&tunnel.source, &tunnel.source_router),
            lookup(&tunnel.destination, &tunnel.destination_router),
        )
    }

    /// Encapsulation of the first reachable tunnel that crosses the underlay.
    pub fn sample_encapsulation(&self) -> Option<EncapsulationSample> {
        let tunnel = self
            .tunnels
            .tunnels
            .iter()
            .find(|tunnel| tunnel.reachable && !tunnel.hops.is_empty())?;
        let (source, destination) = self.outer_ips(tunnel);
        Some(EncapsulationSample::for_tunnel(tunnel, source, destination))
    }

    pub fn report(&self) -> SimulationReport {
        let mut report = SimulationReport {
            revision: Uuid::nil(),
            topology: self.topology.clone(),
            lsdb: self.lsdb.clone(),
            routes: self.tables.to_entries(),
            overlay: self.registry.clone(),
            tunnels: self.tunnels.tunnels.clone(),
            notes: self.tunnels.notes.clone(),
            encapsulation: self.sample_encapsulation(),
        };
        report.revision = report.content_revision();
        report
    }
}

/// Everything a run produced, in serialized form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub revision: Uuid,
    pub topology: TopologySpec,
    pub lsdb: LinkStateDatabase,
    pub routes: BTreeMap<NodeId, Vec<RouteEntry>>,
    pub overlay: OverlayRegistry,
    pub tunnels: Vec<Tunnel>,
    pub notes: Vec<OverlayNote>,
    pub encapsulation: Option<EncapsulationSample>,
}

impl SimulationReport {
    /// UUIDv5 over the canonical JSON of the report with a nil revision.
    pub fn content_revision(&self) -> Uuid {
        let canonical = SimulationReport {
            revision: Uuid::nil(),
            ..self.clone()
        };
        match serde_json::to_vec(&canonical) {
            Ok(bytes) => Uuid::new_v5(&Uuid::NAMESPACE_OID, &bytes),
            Err(e) => {
                tracing::error!(error = %e, "report could not be serialized, revision left nil");
                Uuid::nil()
            }
        }
    }

    pub fn routes_of(&self, router: &NodeId) -> Option<&[RouteEntry]> {
        self.routes.get(router).map(Vec::as_slice)
    }

    pub fn tunnels_of(&self, segment: SegmentId) -> impl Iterator<Item = &Tunnel> {
        self.tunnels.iter().filter(move |tunnel| tunnel.segment == segment)
    }
}
