//! Plain text rendering of reports for the `routes` and `tunnels` commands.

use std::fmt::Write;

use crate::{
    network::node::NodeId,
    overlay::{registry::SegmentId, tunnel::OverlayNote},
    simulation::SimulationReport,
};

/// Routing tables, one block per router. `router` restricts the output to one table.
pub fn format_routes(report: &SimulationReport, router: Option<&NodeId>) -> String {
    let mut out = String::new();
    for (id, routes) in &report.routes {
        if router.is_some_and(|router| router != id) {
            continue;
        }
        let _ = writeln!(out, "Router {id}");
        if routes.is_empty() {
            let _ = writeln!(out, "  (no routes)");
        }
        for route in routes {
            let _ = writeln!(
                out,
                "  {:<12} via {:<12} cost {}",
                route.destination.as_str(),
                route.next_hop.as_str(),
                route.cost
            );
        }
    }
    out
}

/// Tunnels grouped by segment, followed by the resolver notes.
pub fn format_tunnels(report: &SimulationReport, segment: Option<SegmentId>) -> String {
    let mut out = String::new();
    for entry in report.overlay.segments() {
        if segment.is_some_and(|segment| segment != entry.id) {
            continue;
        }
        let _ = writeln!(out, "VNI {} ({})", entry.id, entry.name);
        for tunnel in report.tunnels_of(entry.id) {
            match tunnel.path() {
                Some(path) => {
                    let path: Vec<&str> = path.iter().map(NodeId::as_str).collect();
                    let cost = tunnel.cost.unwrap_or_default();
                    let _ = writeln!(
                        out,
                        "  {} -> {}: {} (cost {cost})",
                        tunnel.source,
                        tunnel.destination,
                        path.join(" > ")
                    );
                }
                None => {
                    let _ = writeln!(out, "  {} -> {}: unreachable", tunnel.source, tunnel.destination);
                }
            }
        }
        for note in &report.notes {
            match note {
                OverlayNote::EmptySegment { segment, members } if *segment == entry.id => {
                    let _ = writeln!(out, "  no tunnels, {members} member(s)");
                }
                _ => {}
            }
        }
    }
    out
}
