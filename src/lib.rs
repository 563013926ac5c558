/*!
Spine-leaf underlay and VXLAN overlay simulation.

- `network`: routers, links and the validated fabric.
- `routing`: link-state database, shortest path trees and routing tables.
- `overlay`: segments, tunnel endpoints, tunnel resolution and encapsulation samples.
- `simulation`: the full pipeline from a fabric to a `SimulationReport`.
- `topology`: where fabrics come from and where reports are published.
- `config`: the TOML configuration file.
- `output`: text rendering of reports.
*/

pub mod config;
pub mod network;
pub mod output;
pub mod overlay;
pub mod routing;
pub mod simulation;
pub mod topology;
