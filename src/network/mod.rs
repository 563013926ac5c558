/*!
Underlay topology.

- `node`: router identifiers, roles and addresses.
- `link`: weighted links and their unvalidated file form.
- `fabric`: the validated fabric graph and the spine-leaf builder.
*/

pub mod fabric;
pub mod link;
pub mod node;

pub use fabric::{ConfigurationError, Fabric, TopologySpec};
pub use node::NodeId;
