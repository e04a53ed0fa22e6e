//! Participant groups and the typed collectives built on top of them.
//!
//! [`ProcessGroup`] moves opaque frames; the helpers here encode scalars,
//! word arrays and byte strings with [`crate::wire`] so any transport that
//! can broadcast and gather bytes can carry a run.

mod handle;
mod local;
mod traced;

pub use handle::{ProcessGroup, ROOT};
pub use local::LocalGroup;
pub use traced::Traced;

use bytes::Bytes;

use crate::error::RankError;
use crate::wire;

/// Broadcasts a single integer from the root.
pub async fn broadcast_scalar<G: ProcessGroup + ?Sized>(
    group: &G,
    value: u64,
) -> Result<u64, RankError> {
    let frame = if group.rank() == ROOT {
        wire::encode_scalar(value)
    } else {
        Bytes::new()
    };
    Ok(wire::decode_scalar(group.broadcast(frame).await?)?)
}

/// Broadcasts a length-prefixed integer array from the root.
pub async fn broadcast_words<G: ProcessGroup + ?Sized>(
    group: &G,
    words: &[u64],
) -> Result<Vec<u64>, RankError> {
    let frame = if group.rank() == ROOT {
        wire::encode_words(words)?
    } else {
        Bytes::new()
    };
    Ok(wire::decode_words(group.broadcast(frame).await?)?)
}

/// Broadcasts a length-prefixed byte string from the root.
pub async fn broadcast_bytes<G: ProcessGroup + ?Sized>(
    group: &G,
    data: &[u8],
) -> Result<Bytes, RankError> {
    let frame = if group.rank() == ROOT {
        wire::encode_bytes(data)?
    } else {
        Bytes::new()
    };
    Ok(wire::decode_bytes(group.broadcast(frame).await?)?)
}

/// Gathers one equal-length integer array per participant onto the root.
///
/// The root gets the arrays in rank order; a contribution whose length
/// differs from the root's is a [`RankError::CommunicationFault`].
pub async fn gather_words<G: ProcessGroup + ?Sized>(
    group: &G,
    words: &[u64],
) -> Result<Option<Vec<Vec<u64>>>, RankError> {
    let Some(frames) = group.gather(wire::encode_words(words)?).await? else {
        return Ok(None);
    };

    let mut gathered = Vec::with_capacity(frames.len());
    for (rank, frame) in frames.into_iter().enumerate() {
        let contribution = wire::decode_words(frame)?;
        if contribution.len() != words.len() {
            return Err(RankError::fault(format!(
                "participant {rank} contributed {} words, expected {}",
                contribution.len(),
                words.len()
            )));
        }
        gathered.push(contribution);
    }
    Ok(Some(gathered))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scalar_broadcast_reaches_every_participant() {
        let mut tasks = Vec::new();
        for (rank, group) in LocalGroup::create(3).unwrap().into_iter().enumerate() {
            tasks.push(tokio::spawn(async move {
                // only the root's value should matter
                broadcast_scalar(&group, 40 + rank as u64).await
            }));
        }

        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), 40);
        }
    }

    #[tokio::test]
    async fn test_gather_preserves_rank_order() {
        let mut tasks = Vec::new();
        for group in LocalGroup::create(4).unwrap() {
            tasks.push(tokio::spawn(async move {
                let rank = group.rank() as u64;
                gather_words(&group, &[rank, rank * 10]).await
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap().unwrap());
        }

        assert_eq!(
            results[0],
            Some(vec![vec![0, 0], vec![1, 10], vec![2, 20], vec![3, 30]])
        );
        assert!(results[1..].iter().all(Option::is_none));
    }

    #[tokio::test]
    async fn test_gather_rejects_uneven_contributions() {
        let mut tasks = Vec::new();
        for group in LocalGroup::create(2).unwrap() {
            tasks.push(tokio::spawn(async move {
                let words = vec![1; group.rank() + 1];
                gather_words(&group, &words).await
            }));
        }

        let root = tasks.remove(0).await.unwrap();
        assert!(matches!(root, Err(RankError::CommunicationFault(_))));
    }

    #[tokio::test]
    async fn test_bytes_broadcast_carries_text() {
        let mut tasks = Vec::new();
        for group in LocalGroup::create(2).unwrap() {
            tasks.push(tokio::spawn(async move {
                broadcast_bytes(&group, b"2024-01-01 08:00").await
            }));
        }

        for task in tasks {
            let got = task.await.unwrap().unwrap();
            assert_eq!(&got[..], b"2024-01-01 08:00");
        }
    }
}
