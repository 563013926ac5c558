/*!
Topology module

Structure:
- `source`: the async `TopologySource` trait and its implementations (generated fabric,
            topology file).
- `store`: `SnapshotStore`, which holds the latest published simulation report for long-lived
           consumers (watch loop, dashboard).
*/

pub mod source;
pub mod store;

pub use source::{TopologyError, TopologySource};
pub use store::SnapshotStore;
