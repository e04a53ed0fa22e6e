use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::handle::{ProcessGroup, ROOT};
use crate::error::RankError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Collective {
    Broadcast,
    Gather,
}

impl fmt::Display for Collective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collective::Broadcast => f.write_str("broadcast"),
            Collective::Gather => f.write_str("gather"),
        }
    }
}

/// A frame stamped with the collective it belongs to.
#[derive(Debug)]
struct Envelope {
    seq: u64,
    op: Collective,
    payload: Bytes,
}

enum Links {
    Root {
        to_peers: Vec<UnboundedSender<Envelope>>,
        from_peers: Vec<Mutex<UnboundedReceiver<Envelope>>>,
    },
    Peer {
        to_root: UnboundedSender<Envelope>,
        from_root: Mutex<UnboundedReceiver<Envelope>>,
    },
}

/// In-process participant group backed by tokio channels.
///
/// The root holds one channel pair per peer. Each collective stamps its
/// frames with a sequence number, so a participant that runs ahead or falls
/// behind is reported as a fault instead of silently mixing up payloads.
/// A participant that has gone away shows up as a closed channel.
pub struct LocalGroup {
    rank: usize,
    size: usize,
    seq: AtomicU64,
    links: Links,
}

impl LocalGroup {
    /// Creates the handles for a group of `size` participants, indexed by rank.
    pub fn create(size: usize) -> Result<Vec<LocalGroup>, RankError> {
        if size == 0 {
            return Err(RankError::InvalidConfig(
                "a participant group needs at least one member".into(),
            ));
        }

        let mut to_peers = Vec::with_capacity(size - 1);
        let mut from_peers = Vec::with_capacity(size - 1);
        let mut peers = Vec::with_capacity(size - 1);

        for rank in 1..size {
            let (down_tx, down_rx) = mpsc::unbounded_channel();
            let (up_tx, up_rx) = mpsc::unbounded_channel();
            to_peers.push(down_tx);
            from_peers.push(Mutex::new(up_rx));
            peers.push(LocalGroup {
                rank,
                size,
                seq: AtomicU64::new(0),
                links: Links::Peer {
                    to_root: up_tx,
                    from_root: Mutex::new(down_rx),
                },
            });
        }

        let root = LocalGroup {
            rank: ROOT,
            size,
            seq: AtomicU64::new(0),
            links: Links::Root {
                to_peers,
                from_peers,
            },
        };

        let mut handles = Vec::with_capacity(size);
        handles.push(root);
        handles.extend(peers);
        Ok(handles)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst)
    }
}

async fn receive(
    rx: &Mutex<UnboundedReceiver<Envelope>>,
    from: usize,
    seq: u64,
    op: Collective,
) -> Result<Bytes, RankError> {
    let envelope = rx
        .lock()
        .await
        .recv()
        .await
        .ok_or_else(|| RankError::fault(format!("participant {from} is unreachable")))?;

    if envelope.seq != seq || envelope.op != op {
        return Err(RankError::fault(format!(
            "participant {from} is out of step: expected {op} #{seq}, received {} #{}",
            envelope.op, envelope.seq
        )));
    }
    Ok(envelope.payload)
}

#[async_trait]
impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    async fn broadcast(&self, frame: Bytes) -> Result<Bytes, RankError> {
        let seq = self.next_seq();
        match &self.links {
            Links::Root { to_peers, .. } => {
                for (i, tx) in to_peers.iter().enumerate() {
                    let envelope = Envelope {
                        seq,
                        op: Collective::Broadcast,
                        payload: frame.clone(),
                    };
                    tx.send(envelope).map_err(|_| {
                        RankError::fault(format!("participant {} is unreachable", i + 1))
                    })?;
                }
                Ok(frame)
            }
            Links::Peer { from_root, .. } => {
                receive(from_root, ROOT, seq, Collective::Broadcast).await
            }
        }
    }

    async fn gather(&self, frame: Bytes) -> Result<Option<Vec<Bytes>>, RankError> {
        let seq = self.next_seq();
        match &self.links {
            Links::Root { from_peers, .. } => {
                let mut frames = Vec::with_capacity(self.size);
                frames.push(frame);
                for (i, rx) in from_peers.iter().enumerate() {
                    frames.push(receive(rx, i + 1, seq, Collective::Gather).await?);
                }
                Ok(Some(frames))
            }
            Links::Peer { to_root, .. } => {
                let envelope = Envelope {
                    seq,
                    op: Collective::Gather,
                    payload: frame,
                };
                to_root
                    .send(envelope)
                    .map_err(|_| RankError::fault("root participant is unreachable"))?;
                Ok(None)
            }
        }
    }
}
