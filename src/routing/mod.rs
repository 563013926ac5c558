/*!
Underlay routing.

Pipeline stages, each a pure function of the previous one:
- `lsdb`: the link-state database synthesized from the fabric.
- `spf`: per-router shortest path trees.
- `table`: routing tables installed from the trees.
*/

pub mod lsdb;
pub mod spf;
pub mod table;

pub use lsdb::LinkStateDatabase;
pub use table::{RouteEntry, RoutingTables};
