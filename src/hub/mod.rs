// Connection hub
// Single-writer coordinator and per-peer fan-out

pub mod coordinator;
pub mod fanout;

pub use coordinator::{Hub, HubCommand, HubError, HubHandle};
pub use fanout::{prediction_frame, PeerId, PeerSet};
