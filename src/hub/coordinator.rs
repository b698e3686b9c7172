// Session coordinator
// Single task owning the session context and the peer set; connections talk to it by message

use chrono::Utc;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::hub::fanout::{prediction_frame, PeerId, PeerSet};
use crate::pipeline::{RecordOutcome, SessionContext, SessionStats};

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Coordinator is not running")]
    Closed,
}

#[derive(Debug)]
pub enum HubCommand {
    Connect {
        peer: PeerId,
        outbound: UnboundedSender<String>,
    },
    Record {
        peer: PeerId,
        text: String,
    },
    Disconnect {
        peer: PeerId,
    },
}

/// Owner of all mutable session state
pub struct Hub {
    session: SessionContext,
    peers: PeerSet,
}

impl Hub {
    pub fn new(session: SessionContext) -> Self {
        Hub {
            session,
            peers: PeerSet::new(),
        }
    }

    /// Apply one command; commands are processed strictly in arrival order
    pub fn apply(&mut self, command: HubCommand) {
        match command {
            HubCommand::Connect { peer, outbound } => {
                self.peers.add(peer, outbound);
                self.session.on_connect();
                log::info!("Peer {} connected ({} total)", peer, self.peers.len());
            }
            HubCommand::Record { peer, text } => self.handle_record(peer, &text),
            HubCommand::Disconnect { peer } => {
                if self.peers.remove(peer) {
                    log::info!("Peer {} disconnected ({} total)", peer, self.peers.len());
                }
            }
        }
    }

    fn handle_record(&mut self, peer: PeerId, text: &str) {
        match self.session.ingest(text, Utc::now()) {
            RecordOutcome::Rejected(_) => {}
            RecordOutcome::Accepted { prediction } => {
                if let Some(label) = prediction {
                    self.peers.broadcast(&prediction_frame(label));
                }
                self.peers.relay(peer, text);
            }
        }
    }

    pub fn peers(&self) -> &PeerSet {
        &self.peers
    }

    pub fn stats(&self) -> SessionStats {
        self.session.stats()
    }

    /// Drain commands until every handle is dropped, then hand the hub back
    pub async fn run(mut self, mut commands: UnboundedReceiver<HubCommand>) -> Self {
        while let Some(command) = commands.recv().await {
            self.apply(command);
        }
        let stats = self.stats();
        log::info!(
            "Coordinator stopped: {} accepted, {} rejected, {} predictions, {} signal failures, {} classifier failures",
            stats.accepted,
            stats.rejected,
            stats.inferences,
            stats.signal_failures,
            stats.classifier_failures
        );
        self
    }

    /// Start the coordinator task
    pub fn spawn(self) -> (HubHandle, JoinHandle<Hub>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        (HubHandle { commands: tx }, task)
    }
}

/// Cloneable entry point used by connection tasks
#[derive(Debug, Clone)]
pub struct HubHandle {
    commands: UnboundedSender<HubCommand>,
}

impl HubHandle {
    /// Register a new peer and return its id and outbound frame queue
    pub fn connect(&self) -> Result<(PeerId, UnboundedReceiver<String>), HubError> {
        let peer = PeerId::new();
        let (outbound, frames) = mpsc::unbounded_channel();
        self.send(HubCommand::Connect { peer, outbound })?;
        Ok((peer, frames))
    }

    pub fn submit(&self, peer: PeerId, text: impl Into<String>) -> Result<(), HubError> {
        self.send(HubCommand::Record {
            peer,
            text: text.into(),
        })
    }

    pub fn disconnect(&self, peer: PeerId) -> Result<(), HubError> {
        self.send(HubCommand::Disconnect { peer })
    }

    fn send(&self, command: HubCommand) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{Classifier, ModelSpec};
    use crate::config::PipelineConfig;
    use crate::motion::FEATURE_COUNT;

    const RECORD: &str = "1000,0.01,-0.02,9.81,0.1,0.0,-0.1";

    fn tremor_session() -> SessionContext {
        let config = PipelineConfig {
            window_size: 20,
            ..PipelineConfig::default()
        };
        let classifier = Classifier::new(
            ModelSpec::Linear {
                coef: vec![0.0; FEATURE_COUNT],
                intercept: 1.0,
                threshold: 0.0,
            },
            None,
        );
        SessionContext::classify(&config, classifier).unwrap()
    }

    fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn test_prediction_precedes_echo() {
        let mut hub = Hub::new(tremor_session());
        let (a, b) = (PeerId::new(), PeerId::new());
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.apply(HubCommand::Connect { peer: a, outbound: tx_a });
        hub.apply(HubCommand::Connect { peer: b, outbound: tx_b });

        for _ in 0..20 {
            hub.apply(HubCommand::Record {
                peer: a,
                text: RECORD.to_string(),
            });
        }

        // Sender never sees its own record, only the prediction
        assert_eq!(drain(&mut rx_a), vec!["PREDICTION:rest".to_string()]);

        let frames_b = drain(&mut rx_b);
        assert_eq!(frames_b.len(), 21);
        assert_eq!(frames_b[18], RECORD);
        assert_eq!(frames_b[19], "PREDICTION:rest");
        assert_eq!(frames_b[20], RECORD);
    }

    #[test]
    fn test_rejected_record_not_relayed() {
        let mut hub = Hub::new(tremor_session());
        let (a, b) = (PeerId::new(), PeerId::new());
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        hub.apply(HubCommand::Connect { peer: a, outbound: tx_a });
        hub.apply(HubCommand::Connect { peer: b, outbound: tx_b });

        hub.apply(HubCommand::Record {
            peer: a,
            text: "garbage".to_string(),
        });
        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(hub.stats().rejected, 1);
    }

    #[test]
    fn test_disconnect_and_dead_peer() {
        let mut hub = Hub::new(tremor_session());
        let (a, b) = (PeerId::new(), PeerId::new());
        let (tx_a, _rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        hub.apply(HubCommand::Connect { peer: a, outbound: tx_a });
        hub.apply(HubCommand::Connect { peer: b, outbound: tx_b });
        drop(rx_b);

        hub.apply(HubCommand::Record {
            peer: a,
            text: RECORD.to_string(),
        });
        assert!(!hub.peers().contains(b));

        hub.apply(HubCommand::Disconnect { peer: a });
        assert!(hub.peers().is_empty());
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let (handle, task) = Hub::new(tremor_session()).spawn();

        let (a, mut rx_a) = handle.connect().unwrap();
        let (b, mut rx_b) = handle.connect().unwrap();

        handle.submit(a, RECORD).unwrap();
        assert_eq!(rx_b.recv().await.unwrap(), RECORD);

        handle.disconnect(a).unwrap();
        drop(handle);

        let hub = task.await.unwrap();
        assert_eq!(hub.stats().accepted, 1);
        assert!(!hub.peers().contains(a));
        assert!(hub.peers().contains(b));
        assert!(rx_a.try_recv().is_err());
    }
}
