use async_trait::async_trait;
use bytes::Bytes;

use crate::error::RankError;

/// Rank of the participant that reads the source and collects results.
pub const ROOT: usize = 0;

/// A fixed-size group of participants that only talk through collectives.
///
/// Every participant must call the collectives in the same order; a call
/// completes only once the matching call has been made where it needs to be.
#[async_trait]
pub trait ProcessGroup: Send + Sync {
    /// Zero-based rank of this participant.
    fn rank(&self) -> usize;

    /// Number of participants, fixed for the life of the group.
    fn size(&self) -> usize;

    /// Delivers the root's `frame` to every participant. Non-root callers'
    /// `frame` is ignored; everyone gets the root's frame back.
    async fn broadcast(&self, frame: Bytes) -> Result<Bytes, RankError>;

    /// Collects one frame from every participant on the root, in rank order.
    /// Returns `None` everywhere but the root.
    async fn gather(&self, frame: Bytes) -> Result<Option<Vec<Bytes>>, RankError>;
}
