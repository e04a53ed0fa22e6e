use tracing::debug;

use crate::aggregate::types::{LocalAccumulator, LocalTally, WorkSplit};
use crate::error::RankError;
use crate::readings::TimestampGroups;

/// Sums this participant's share of the readings, one accumulator per group.
///
/// Readings are numbered across all groups in canonical order, so the
/// assignment only depends on the distributed structure and the group size.
pub fn aggregate_local(
    groups: &TimestampGroups,
    rank: usize,
    size: usize,
    split: WorkSplit,
    signal_count: usize,
) -> Result<LocalTally, RankError> {
    let mut tally = LocalTally::new(signal_count);
    let mut index = 0usize;
    let mut summed = 0usize;

    for group in groups.iter() {
        let mut acc = LocalAccumulator::new(signal_count);
        for reading in &group.readings {
            if split.assigns(index, rank, size) {
                acc.add(reading.signal_id, reading.car_count)?;
                summed += 1;
            }
            index += 1;
        }
        tally.push(acc);
    }

    debug!(rank, %split, summed, of = index, "Local aggregation finished");
    Ok(tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::readings::Reading;

    fn groups() -> TimestampGroups {
        let rows = [(1, "A", 5), (2, "A", 7), (1, "B", 3), (1, "A", 2), (2, "B", 9)];
        TimestampGroups::from_readings(rows.into_iter().map(|(signal_id, ts, car_count)| {
            Reading {
                signal_id,
                car_count,
                timestamp: ts.to_string(),
            }
        }))
    }

    #[test]
    fn test_single_participant_sums_everything() {
        let tally = aggregate_local(&groups(), 0, 1, WorkSplit::Strided, 2).unwrap();
        let a = &tally.accumulators()[0];
        let b = &tally.accumulators()[1];

        assert_eq!((a.total(1), a.total(2)), (7, 7));
        assert_eq!((b.total(1), b.total(2)), (3, 9));
    }

    #[test]
    fn test_strided_shares_partition_the_readings() {
        // canonical order: A:(1,5) A:(2,7) A:(1,2) B:(1,3) B:(2,9)
        let r0 = aggregate_local(&groups(), 0, 2, WorkSplit::Strided, 2).unwrap();
        let r1 = aggregate_local(&groups(), 1, 2, WorkSplit::Strided, 2).unwrap();

        let a0 = &r0.accumulators()[0];
        let a1 = &r1.accumulators()[0];
        assert_eq!((a0.total(1), a0.total(2)), (7, 0));
        assert_eq!((a1.total(1), a1.total(2)), (0, 7));

        let b0 = &r0.accumulators()[1];
        let b1 = &r1.accumulators()[1];
        assert_eq!((b0.total(1), b0.total(2)), (0, 9));
        assert_eq!((b1.total(1), b1.total(2)), (3, 0));
    }

    #[test]
    fn test_replicated_shares_are_identical() {
        let r0 = aggregate_local(&groups(), 0, 3, WorkSplit::Replicated, 2).unwrap();
        let r2 = aggregate_local(&groups(), 2, 3, WorkSplit::Replicated, 2).unwrap();
        assert_eq!(r0, r2);
    }

    #[test]
    fn test_more_participants_than_readings_leaves_some_idle() {
        let tally = aggregate_local(&groups(), 7, 8, WorkSplit::Strided, 2).unwrap();
        assert_eq!(tally.len(), 2);
        assert!(tally.to_words().iter().all(|&w| w == 0));
    }

    #[test]
    fn test_signal_beyond_configured_count_fails() {
        let result = aggregate_local(&groups(), 0, 1, WorkSplit::Strided, 1);
        assert!(matches!(result, Err(RankError::InvalidConfig(_))));
    }
}
