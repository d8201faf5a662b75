//! Message delivery between replicas.
//!
//! The core needs reliable, per-pair ordered delivery. [`ChannelHub`] provides
//! it in process over unbounded tokio channels; a networked relay would
//! implement [`Transport`] the same way.

use std::sync::Arc;

use moneymatters_types::{ReplicaId, Target};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::sync::Outbound;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("unknown replica {replica}")]
    UnknownReplica { replica: ReplicaId },
    #[error("replica {replica} is unreachable")]
    Unreachable { replica: ReplicaId },
    #[error("failed to encode {kind}: {reason}")]
    Encode { kind: &'static str, reason: String },
}

pub trait Transport {
    fn send(&self, outbound: &Outbound) -> Result<(), TransportError>;

    fn send_all(&self, batch: &[Outbound]) -> Result<(), TransportError> {
        for outbound in batch {
            self.send(outbound)?;
        }
        Ok(())
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        (**self).send(outbound)
    }
}

/// Receiving half of a replica's inbox. Each item is an encoded envelope.
pub type Inbox = mpsc::UnboundedReceiver<Vec<u8>>;

/// In-process fan-out over one unbounded channel per replica.
#[derive(Debug)]
pub struct ChannelHub {
    peers: Vec<mpsc::UnboundedSender<Vec<u8>>>,
}

impl ChannelHub {
    pub fn new(replicas: usize) -> (Arc<Self>, Vec<Inbox>) {
        let (peers, inboxes): (Vec<_>, Vec<_>) =
            (0..replicas).map(|_| mpsc::unbounded_channel()).unzip();
        (Arc::new(Self { peers }), inboxes)
    }

    fn recipients(&self, outbound: &Outbound) -> Vec<ReplicaId> {
        let sender = outbound.envelope.sender;
        match outbound.target {
            Target::All => (0..self.peers.len()).collect(),
            Target::Others => (0..self.peers.len()).filter(|&r| r != sender).collect(),
            Target::Authority => vec![outbound.authority],
        }
    }
}

impl Transport for ChannelHub {
    fn send(&self, outbound: &Outbound) -> Result<(), TransportError> {
        let bytes = outbound
            .envelope
            .encode()
            .map_err(|err| TransportError::Encode {
                kind: outbound.envelope.message.kind(),
                reason: err.to_string(),
            })?;
        for replica in self.recipients(outbound) {
            let peer = self
                .peers
                .get(replica)
                .ok_or(TransportError::UnknownReplica { replica })?;
            if peer.send(bytes.clone()).is_err() {
                if outbound.target == Target::Authority {
                    return Err(TransportError::Unreachable { replica });
                }
                debug!(replica, "inbox closed, skipping");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneymatters_types::{Envelope, SyncMessage};

    fn outbound(sender: ReplicaId, seq: u64, target: Target) -> Outbound {
        Outbound {
            target,
            authority: 0,
            envelope: Envelope {
                sender,
                seq,
                message: SyncMessage::StartTurn { round: seq as u32 },
            },
        }
    }

    #[tokio::test]
    async fn test_others_skips_sender_and_preserves_order() {
        let (hub, mut inboxes) = ChannelHub::new(3);
        hub.send_all(&[outbound(0, 1, Target::Others), outbound(0, 2, Target::Others)])
            .unwrap();

        assert!(inboxes[0].try_recv().is_err());
        for inbox in inboxes.iter_mut().skip(1) {
            let first = Envelope::decode(&inbox.recv().await.unwrap()).unwrap();
            let second = Envelope::decode(&inbox.recv().await.unwrap()).unwrap();
            assert_eq!((first.seq, second.seq), (1, 2));
        }
    }

    #[tokio::test]
    async fn test_all_and_authority_targets() {
        let (hub, mut inboxes) = ChannelHub::new(2);
        hub.send(&outbound(1, 1, Target::All)).unwrap();
        hub.send(&outbound(1, 2, Target::Authority)).unwrap();

        assert_eq!(Envelope::decode(&inboxes[1].recv().await.unwrap()).unwrap().seq, 1);
        assert_eq!(Envelope::decode(&inboxes[0].recv().await.unwrap()).unwrap().seq, 1);
        assert_eq!(Envelope::decode(&inboxes[0].recv().await.unwrap()).unwrap().seq, 2);
        assert!(inboxes[1].try_recv().is_err());
    }

    #[tokio::test]
    async fn test_closed_inbox() {
        let (hub, mut inboxes) = ChannelHub::new(2);
        drop(inboxes.remove(0));

        // Broadcasts skip the departed replica.
        hub.send(&outbound(1, 1, Target::Others)).unwrap();
        assert_eq!(
            hub.send(&outbound(1, 2, Target::Authority)),
            Err(TransportError::Unreachable { replica: 0 })
        );

        let mut bad = outbound(1, 3, Target::Authority);
        bad.authority = 9;
        assert_eq!(
            hub.send(&bad),
            Err(TransportError::UnknownReplica { replica: 9 })
        );
    }

    #[test]
    fn test_encode_error_names_message() {
        let err = TransportError::Encode {
            kind: "end_game",
            reason: "key must be a string".to_string(),
        };
        assert_eq!(err.to_string(), "failed to encode end_game: key must be a string");
    }
}
