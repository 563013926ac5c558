use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    network::node::NodeId,
    routing::{
        lsdb::LinkStateDatabase,
        spf::{PathCost, ShortestPathTree},
    },
};

/// Forwarding decision for one destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub next_hop: NodeId,
    pub cost: PathCost,
}

/// Flat row of a routing table, the shape handed to the CLI and the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteEntry {
    pub destination: NodeId,
    pub next_hop: NodeId,
    pub cost: PathCost,
}

/// Forwarding table of a single router. Unreachable destinations and the router itself are
/// absent.
///
/// Only one next hop is installed per destination. Among equal-cost paths the one chosen by the
/// shortest path tree wins (lowest first hop id, see `routing::spf`); equal-cost multipath is not
/// modelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTable {
    router: NodeId,
    routes: BTreeMap<NodeId, Route>,
}

impl RoutingTable {
    /// Flatten a shortest path tree into next-hop entries.
    pub fn install(tree: &ShortestPathTree) -> Self {
        let source = tree.source();
        let mut routes = BTreeMap::new();
        for (destination, entry) in tree.entries() {
            if destination == source {
                continue;
            }
            match tree.path_to(destination).as_deref() {
                Some([_, next_hop, ..]) => {
                    routes.insert(
                        destination.clone(),
                        Route {
                            next_hop: next_hop.clone(),
                            cost: entry.cost,
                        },
                    );
                }
                _ => {
                    tracing::warn!(%source, %destination, "no path could be reconstructed, route skipped");
                }
            }
        }
        tracing::debug!(router = %source, routes = routes.len(), "installed routing table");
        Self {
            router: source.clone(),
            routes,
        }
    }

    pub fn router(&self) -> &NodeId {
        &self.router
    }

    pub fn route(&self, destination: &NodeId) -> Option<&Route> {
        self.routes.get(destination)
    }

    pub fn next_hop(&self, destination: &NodeId) -> Option<&NodeId> {
        self.routes.get(destination).map(|route| &route.next_hop)
    }

    pub fn cost_to(&self, destination: &NodeId) -> Option<PathCost> {
        self.routes.get(destination).map(|route| route.cost)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Rows ordered by destination.
    pub fn entries(&self) -> Vec<RouteEntry> {
        self.routes
            .iter()
            .map(|(destination, route)| RouteEntry {
                destination: destination.clone(),
                next_hop: route.next_hop.clone(),
                cost: route.cost,
            })
            .collect()
    }
}

/// Routing tables of every router in the fabric.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingTables {
    tables: BTreeMap<NodeId, RoutingTable>,
}

impl RoutingTables {
    /// Run SPF from every router and install the result.
    pub fn install_all(lsdb: &LinkStateDatabase) -> Self {
        let tables = lsdb
            .routers()
            .map(|router| {
                let tree = ShortestPathTree::compute(lsdb, router);
                (router.clone(), RoutingTable::install(&tree))
            })
            .collect();
        Self { tables }
    }

    pub fn table(&self, router: &NodeId) -> Option<&RoutingTable> {
        self.tables.get(router)
    }

    /// Tables ordered by router id.
    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &RoutingTable)> {
        self.tables.iter()
    }

    pub fn routers(&self) -> impl Iterator<Item = &NodeId> {
        self.tables.keys()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Router -> rows, the serialized form of all tables.
    pub fn to_entries(&self) -> BTreeMap<NodeId, Vec<RouteEntry>> {
        self.tables
            .iter()
            .map(|(router, table)| (router.clone(), table.entries()))
            .collect()
    }
}
