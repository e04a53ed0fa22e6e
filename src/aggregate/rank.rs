use std::cmp::Reverse;
use tracing::debug;

use crate::aggregate::types::{
    LocalAccumulator, LocalTally, RankedEntry, TimestampRanking, WorkSplit,
};
use crate::error::RankError;
use crate::readings::TimestampGroups;

/// Default number of signals reported per timestamp.
pub const DEFAULT_TOP_N: usize = 4;

/// Combines the participants' tallies (in rank order) into true per-signal
/// totals for every group.
pub fn combine(tallies: &[LocalTally], split: WorkSplit) -> Result<LocalTally, RankError> {
    let (first, rest) = tallies
        .split_first()
        .ok_or_else(|| RankError::fault("no participant tallies to combine"))?;

    for (offset, tally) in rest.iter().enumerate() {
        if tally.len() != first.len() || tally.signal_count() != first.signal_count() {
            return Err(RankError::fault(format!(
                "participant {} tallied {} groups of {} signals, root tallied {} of {}",
                offset + 1,
                tally.len(),
                tally.signal_count(),
                first.len(),
                first.signal_count()
            )));
        }
    }

    match split {
        WorkSplit::Replicated => Ok(first.clone()),
        WorkSplit::Strided => {
            let mut combined = LocalTally::new(first.signal_count());
            for (i, acc) in first.accumulators().iter().enumerate() {
                let mut acc = acc.clone();
                for tally in rest {
                    acc.merge(&tally.accumulators()[i])?;
                }
                combined.push(acc);
            }
            Ok(combined)
        }
    }
}

/// Ranks the signals present in one accumulator, most cars first.
///
/// Signals with no readings are left out. Equal totals go to the lower
/// signal id first. At most `top_n` entries are returned; never padded.
pub fn rank_accumulator(acc: &LocalAccumulator, top_n: usize) -> Vec<RankedEntry> {
    let mut entries: Vec<RankedEntry> = acc
        .slots()
        .filter(|(_, _, hits)| *hits > 0)
        .map(|(signal_id, total, _)| RankedEntry {
            signal_id,
            total_car_count: total,
        })
        .collect();

    entries.sort_by_key(|e| (Reverse(e.total_car_count), e.signal_id));
    entries.truncate(top_n);
    entries
}

/// Pairs each group's timestamp with the ranking of its combined totals.
pub fn rank_groups(
    groups: &TimestampGroups,
    combined: &LocalTally,
    top_n: usize,
) -> Result<Vec<TimestampRanking>, RankError> {
    if groups.len() != combined.len() {
        return Err(RankError::fault(format!(
            "{} combined accumulators for {} timestamp groups",
            combined.len(),
            groups.len()
        )));
    }

    let rankings = groups
        .timestamps()
        .zip(combined.accumulators())
        .map(|(timestamp, acc)| TimestampRanking {
            timestamp: timestamp.to_string(),
            entries: rank_accumulator(acc, top_n),
        })
        .collect();
    Ok(rankings)
}

/// Collection on the root: combine every participant's tally, then rank
/// each group in canonical order.
pub fn collect(
    groups: &TimestampGroups,
    tallies: &[LocalTally],
    split: WorkSplit,
    top_n: usize,
) -> Result<Vec<TimestampRanking>, RankError> {
    let combined = combine(tallies, split)?;
    let rankings = rank_groups(groups, &combined, top_n)?;
    debug!(
        participants = tallies.len(),
        timestamps = rankings.len(),
        top_n,
        "Collection finished"
    );
    Ok(rankings)
}
