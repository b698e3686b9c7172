// Peer fan-out
// Outbound queues of every connected peer; dead peers are dropped on first failed send

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::mpsc::UnboundedSender;
use uuid::Uuid;

use crate::classify::MotionLabel;

/// Identity assigned to a connection when it joins
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerId(Uuid);

impl PeerId {
    pub fn new() -> Self {
        PeerId(Uuid::new_v4())
    }
}

impl Default for PeerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Frame announcing a smoothed prediction
pub fn prediction_frame(label: MotionLabel) -> String {
    format!("PREDICTION:{}", label.as_str())
}

#[derive(Debug, Default)]
pub struct PeerSet {
    peers: HashMap<PeerId, UnboundedSender<String>>,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, peer: PeerId, outbound: UnboundedSender<String>) {
        self.peers.insert(peer, outbound);
    }

    /// Returns false if the peer was already gone
    pub fn remove(&mut self, peer: PeerId) -> bool {
        self.peers.remove(&peer).is_some()
    }

    pub fn contains(&self, peer: PeerId) -> bool {
        self.peers.contains_key(&peer)
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Send a frame to every peer
    pub fn broadcast(&mut self, frame: &str) -> usize {
        self.send_where(frame, |_| true)
    }

    /// Send a frame to every peer except `origin`
    pub fn relay(&mut self, origin: PeerId, frame: &str) -> usize {
        self.send_where(frame, |peer| peer != origin)
    }

    /// Returns the number of peers reached
    fn send_where(&mut self, frame: &str, include: impl Fn(PeerId) -> bool) -> usize {
        let mut delivered = 0;
        self.peers.retain(|peer, outbound| {
            if !include(*peer) {
                return true;
            }
            match outbound.send(frame.to_string()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(_) => {
                    log::debug!("Dropping peer {}: outbound closed", peer);
                    false
                }
            }
        });
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn test_prediction_frame() {
        assert_eq!(prediction_frame(MotionLabel::Tremor), "PREDICTION:tremor");
        assert_eq!(prediction_frame(MotionLabel::Rest), "PREDICTION:rest");
    }

    #[test]
    fn test_broadcast_and_relay() {
        let mut peers = PeerSet::new();
        let (a, b) = (PeerId::new(), PeerId::new());
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        peers.add(a, tx_a);
        peers.add(b, tx_b);

        assert_eq!(peers.broadcast("PREDICTION:rest"), 2);
        assert_eq!(peers.relay(a, "1,2,3,4,5,6,7"), 1);

        assert_eq!(rx_a.try_recv().unwrap(), "PREDICTION:rest");
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), "PREDICTION:rest");
        assert_eq!(rx_b.try_recv().unwrap(), "1,2,3,4,5,6,7");
    }

    #[test]
    fn test_closed_peer_removed_on_send() {
        let mut peers = PeerSet::new();
        let (a, b) = (PeerId::new(), PeerId::new());
        let (tx_a, rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        peers.add(a, tx_a);
        peers.add(b, tx_b);
        drop(rx_a);

        assert_eq!(peers.broadcast("PREDICTION:tremor"), 1);
        assert!(!peers.contains(a));
        assert_eq!(peers.len(), 1);
        assert_eq!(rx_b.try_recv().unwrap(), "PREDICTION:tremor");

        // Removing twice is harmless
        assert!(!peers.remove(a));
        assert!(peers.remove(b));
        assert!(peers.is_empty());
    }
}
