use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::handle::ProcessGroup;
use crate::error::RankError;

/// A [`ProcessGroup`] wrapper that logs every collective it forwards.
///
/// Each call is numbered in the order this participant issued it, which
/// lines up across participants when the protocol is followed.
pub struct Traced<G> {
    pub inner: G,
    calls: AtomicU64,
}

impl<G> Traced<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            calls: AtomicU64::new(0),
        }
    }

    /// Number of collectives issued so far.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl<G: ProcessGroup> ProcessGroup for Traced<G> {
    fn rank(&self) -> usize {
        self.inner.rank()
    }

    fn size(&self) -> usize {
        self.inner.size()
    }

    async fn broadcast(&self, frame: Bytes) -> Result<Bytes, RankError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let sent = frame.len();
        let result = self.inner.broadcast(frame).await;
        match &result {
            Ok(received) => debug!(call, sent, received = received.len(), "broadcast"),
            Err(e) => warn!(call, error = %e, "broadcast failed"),
        }
        result
    }

    async fn gather(&self, frame: Bytes) -> Result<Option<Vec<Bytes>>, RankError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed);
        let sent = frame.len();
        let result = self.inner.gather(frame).await;
        match &result {
            Ok(Some(frames)) => {
                let received: usize = frames.iter().map(Bytes::len).sum();
                debug!(call, sent, received, contributors = frames.len(), "gather");
            }
            Ok(None) => debug!(call, sent, "gather contribution sent"),
            Err(e) => warn!(call, error = %e, "gather failed"),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::LocalGroup;

    #[tokio::test]
    async fn test_calls_are_counted_and_forwarded() {
        let solo = Traced::new(LocalGroup::create(1).unwrap().remove(0));

        let echoed = solo.broadcast(Bytes::from_static(b"abc")).await.unwrap();
        let gathered = solo.gather(Bytes::from_static(b"d")).await.unwrap();

        assert_eq!(&echoed[..], b"abc");
        assert_eq!(gathered.map(|f| f.len()), Some(1));
        assert_eq!(solo.calls(), 2);
        assert_eq!(solo.rank(), 0);
        assert_eq!(solo.size(), 1);
    }
}
