/*!
VXLAN-style overlay.

- `registry`: segments, tunnel endpoints and their memberships.
- `tunnel`: resolution of endpoint pairs into underlay paths.
- `encap`: the VXLAN header and sample encapsulations.
*/

pub mod encap;
pub mod registry;
pub mod tunnel;

pub use registry::{EndpointId, OverlayError, OverlayRegistry, SegmentId, TunnelEndpoint};
pub use tunnel::{Tunnel, TunnelReport};
