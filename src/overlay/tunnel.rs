use serde::{Deserialize, Serialize};

use crate::{
    network::node::NodeId,
    overlay::registry::{EndpointId, OverlayRegistry, SegmentId, TunnelEndpoint},
    routing::{spf::PathCost, table::RoutingTables},
};

/// Resolved overlay tunnel between two endpoints of a segment.
///
/// `hops` lists the routers after the source router, ending with the destination router, so a
/// tunnel across one spine has two hops. Unreachable tunnels have no hops and no cost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tunnel {
    pub segment: SegmentId,
    pub source: EndpointId,
    pub destination: EndpointId,
    pub source_router: NodeId,
    pub destination_router: NodeId,
    pub hops: Vec<NodeId>,
    pub cost: Option<PathCost>,
    pub reachable: bool,
}

impl Tunnel {
    /// Full router path including the source router, `None` when unreachable.
    pub fn path(&self) -> Option<Vec<NodeId>> {
        self.reachable.then(|| {
            std::iter::once(self.source_router.clone())
                .chain(self.hops.iter().cloned())
                .collect()
        })
    }
}

/// Informational remarks produced while resolving, never fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OverlayNote {
    /// Fewer than two members, so no tunnel exists.
    EmptySegment { segment: SegmentId, members: usize },
    UnknownSegment { segment: SegmentId },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TunnelReport {
    pub tunnels: Vec<Tunnel>,
    pub notes: Vec<OverlayNote>,
}

impl TunnelReport {
    pub fn for_segment(&self, segment: SegmentId) -> impl Iterator<Item = &Tunnel> {
        self.tunnels
            .iter()
            .filter(move |tunnel| tunnel.segment == segment)
    }

    pub fn unreachable(&self) -> impl Iterator<Item = &Tunnel> {
        self.tunnels.iter().filter(|tunnel| !tunnel.reachable)
    }

    fn extend(&mut self, other: TunnelReport) {
        self.tunnels.extend(other.tunnels);
        self.notes.extend(other.notes);
    }
}

/// Follow the next-hop chain from the source endpoint's router to the destination endpoint's
/// router. The total cost is taken from the source router's table, not re-summed.
pub fn resolve_tunnel(
    tables: &RoutingTables,
    segment: SegmentId,
    source: &TunnelEndpoint,
    destination: &TunnelEndpoint,
) -> Tunnel {
    let mut tunnel = Tunnel {
        segment,
        source: source.id.clone(),
        destination: destination.id.clone(),
        source_router: source.router.clone(),
        destination_router: destination.router.clone(),
        hops: Vec::new(),
        cost: None,
        reachable: false,
    };
    let target = &destination.router;

    if tables.table(&source.router).is_none() || tables.table(target).is_none() {
        tracing::debug!(%segment, source = %source.id, destination = %destination.id, "endpoint on a router without routing table");
        return tunnel;
    }

    if source.router == *target {
        tunnel.cost = Some(0);
        tunnel.reachable = true;
        return tunnel;
    }

    let Some(route) = tables
        .table(&source.router)
        .and_then(|table| table.route(target))
    else {
        tracing::debug!(%segment, source = %source.id, destination = %destination.id, "no underlay route");
        return tunnel;
    };

    let mut hops = Vec::new();
    let mut current = &source.router;
    while current != target {
        if hops.len() >= tables.len() {
            tracing::warn!(%segment, source = %source.id, destination = %destination.id, "next-hop chain loops, tunnel marked unreachable");
            return tunnel;
        }
        let Some(next_hop) = tables.table(current).and_then(|table| table.next_hop(target)) else {
            tracing::debug!(%segment, router = %current, %target, "next-hop chain broken");
            return tunnel;
        };
        hops.push(next_hop.clone());
        current = next_hop;
    }

    tunnel.hops = hops;
    tunnel.cost = Some(route.cost);
    tunnel.reachable = true;
    tunnel
}

/// Resolve every unordered endpoint pair of one segment.
pub fn resolve_segment(
    registry: &OverlayRegistry,
    tables: &RoutingTables,
    segment: SegmentId,
) -> TunnelReport {
    let mut report = TunnelReport::default();
    let Some(entry) = registry.segment(segment) else {
        report.notes.push(OverlayNote::UnknownSegment { segment });
        return report;
    };
    if entry.members.len() < 2 {
        tracing::info!(%segment, members = entry.members.len(), "segment has fewer than two members, no tunnels");
        report.notes.push(OverlayNote::EmptySegment {
            segment,
            members: entry.members.len(),
        });
        return report;
    }

    report.tunnels = registry
        .pairs(segment)
        .into_iter()
        .map(|(source, destination)| resolve_tunnel(tables, segment, source, destination))
        .collect();

    let unreachable = report.unreachable().count();
    if unreachable > 0 {
        tracing::warn!(%segment, unreachable, "segment has unreachable tunnels");
    }
    report
}

/// Resolve all segments, in segment id order.
pub fn resolve_all(registry: &OverlayRegistry, tables: &RoutingTables) -> TunnelReport {
    let mut report = TunnelReport::default();
    for segment in registry.segments() {
        report.extend(resolve_segment(registry, tables, segment.id));
    }
    report
}
