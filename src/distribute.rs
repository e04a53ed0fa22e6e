//! Replicates the root's grouped readings onto every participant.
//!
//! Collective sequence, identical on every participant:
//!
//! ```text
//! status           scalar   0 = ok, otherwise an abort code
//!   [message]      bytes    only when status != 0, then everyone stops
//! group count      scalar
//! per group, in canonical order:
//!   timestamp      bytes
//!   reading count  scalar
//!   signal ids     words
//!   car counts     words
//! ```

use tracing::{debug, info, warn};

use crate::error::RankError;
use crate::group::{ProcessGroup, ROOT, broadcast_bytes, broadcast_scalar, broadcast_words};
use crate::readings::{Reading, TimestampGroup, TimestampGroups};

const STATUS_OK: u64 = 0;

/// Runs the distribution protocol.
///
/// The root passes `Some` with the outcome of its ingestion; everyone else
/// passes `None`. If the root's ingestion failed, the failure is announced
/// to the group first so no participant is left waiting: the root gets its
/// own error back and every other participant gets
/// [`RankError::PeerAborted`].
pub async fn distribute<G: ProcessGroup + ?Sized>(
    group: &G,
    ingested: Option<Result<TimestampGroups, RankError>>,
) -> Result<TimestampGroups, RankError> {
    if group.rank() == ROOT {
        let ingested = ingested.ok_or_else(|| {
            RankError::fault("root participant started distribution without a source")
        })?;
        send(group, ingested).await
    } else {
        receive(group).await
    }
}

async fn send<G: ProcessGroup + ?Sized>(
    group: &G,
    ingested: Result<TimestampGroups, RankError>,
) -> Result<TimestampGroups, RankError> {
    let groups = match ingested {
        Ok(groups) => groups,
        Err(err) => {
            let code = err.abort_code();
            warn!(code, error = %err, "Announcing abort to participant group");
            broadcast_scalar(group, code).await?;
            broadcast_bytes(group, err.to_string().as_bytes()).await?;
            return Err(err);
        }
    };

    broadcast_scalar(group, STATUS_OK).await?;
    broadcast_scalar(group, groups.len() as u64).await?;

    for entry in groups.iter() {
        let ids: Vec<u64> = entry.readings.iter().map(|r| u64::from(r.signal_id)).collect();
        let counts: Vec<u64> = entry.readings.iter().map(|r| r.car_count).collect();

        broadcast_bytes(group, entry.timestamp.as_bytes()).await?;
        broadcast_scalar(group, entry.readings.len() as u64).await?;
        broadcast_words(group, &ids).await?;
        broadcast_words(group, &counts).await?;
    }

    info!(
        groups = groups.len(),
        readings = groups.reading_count(),
        participants = group.size(),
        "Readings distributed"
    );
    Ok(groups)
}

async fn receive<G: ProcessGroup + ?Sized>(group: &G) -> Result<TimestampGroups, RankError> {
    let status = broadcast_scalar(group, 0).await?;
    if status != STATUS_OK {
        let message = broadcast_bytes(group, &[]).await?;
        return Err(RankError::PeerAborted {
            code: status,
            message: String::from_utf8_lossy(&message).into_owned(),
        });
    }

    let group_count = broadcast_scalar(group, 0).await?;
    let mut groups = Vec::new();

    for index in 0..group_count {
        let timestamp = broadcast_bytes(group, &[]).await?;
        let timestamp = String::from_utf8(timestamp.to_vec())
            .map_err(|_| RankError::fault(format!("timestamp of group {index} is not UTF-8")))?;

        let expected = broadcast_scalar(group, 0).await? as usize;
        let ids = broadcast_words(group, &[]).await?;
        let counts = broadcast_words(group, &[]).await?;

        if ids.len() != expected || counts.len() != expected {
            return Err(RankError::fault(format!(
                "group '{timestamp}' announced {expected} readings but carried {} ids and {} counts",
                ids.len(),
                counts.len()
            )));
        }

        let mut readings = Vec::with_capacity(expected);
        for (id, car_count) in ids.into_iter().zip(counts) {
            let signal_id = u32::try_from(id)
                .map_err(|_| RankError::fault(format!("signal id {id} does not fit in 32 bits")))?;
            readings.push(Reading {
                signal_id,
                car_count,
                timestamp: timestamp.clone(),
            });
        }

        debug!(timestamp = %timestamp, readings = readings.len(), "Group received");
        groups.push(TimestampGroup {
            timestamp,
            readings,
        });
    }

    Ok(TimestampGroups::from_groups(groups))
}
