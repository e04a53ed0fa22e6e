//! Data types shared by local aggregation and collection.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::RankError;

/// How readings are assigned to participants.
///
/// Local aggregation and collection must agree on this for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkSplit {
    /// Participant `r` of `n` sums readings whose global index `i` has
    /// `i % n == r`; collection adds the partial sums.
    #[default]
    Strided,
    /// Every participant sums every reading; collection keeps the root's
    /// sums and ignores the duplicates.
    Replicated,
}

impl WorkSplit {
    /// Whether the reading at global `index` is summed by participant `rank`.
    pub fn assigns(self, index: usize, rank: usize, size: usize) -> bool {
        match self {
            WorkSplit::Strided => index % size == rank,
            WorkSplit::Replicated => true,
        }
    }
}

impl fmt::Display for WorkSplit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkSplit::Strided => f.write_str("strided"),
            WorkSplit::Replicated => f.write_str("replicated"),
        }
    }
}

impl FromStr for WorkSplit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strided" => Ok(WorkSplit::Strided),
            "replicated" => Ok(WorkSplit::Replicated),
            other => Err(format!(
                "unknown work split '{other}' (expected 'strided' or 'replicated')"
            )),
        }
    }
}

/// Per-signal running totals for one timestamp group on one participant.
///
/// Slot `i` belongs to signal id `i + 1`. `hits` counts the readings that
/// landed in a slot, so a signal seen only with zero cars is still present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAccumulator {
    totals: Vec<u64>,
    hits: Vec<u64>,
}

impl LocalAccumulator {
    pub fn new(signal_count: usize) -> Self {
        Self {
            totals: vec![0; signal_count],
            hits: vec![0; signal_count],
        }
    }

    pub fn signal_count(&self) -> usize {
        self.totals.len()
    }

    pub fn add(&mut self, signal_id: u32, car_count: u64) -> Result<(), RankError> {
        let slot = self.slot(signal_id).ok_or_else(|| {
            RankError::InvalidConfig(format!(
                "signal id {signal_id} is outside the {} configured signals",
                self.signal_count()
            ))
        })?;
        self.totals[slot] = self.totals[slot]
            .checked_add(car_count)
            .ok_or(RankError::TotalOverflow { signal_id })?;
        self.hits[slot] += 1;
        Ok(())
    }

    pub fn total(&self, signal_id: u32) -> u64 {
        self.slot(signal_id).map_or(0, |s| self.totals[s])
    }

    pub fn hits(&self, signal_id: u32) -> u64 {
        self.slot(signal_id).map_or(0, |s| self.hits[s])
    }

    /// Adds `other`'s slots into this accumulator. Both must cover the same
    /// signals. On overflow this accumulator is left partly merged and
    /// should be discarded.
    pub fn merge(&mut self, other: &LocalAccumulator) -> Result<(), RankError> {
        for (slot, (mine, theirs)) in self.totals.iter_mut().zip(&other.totals).enumerate() {
            *mine = mine.checked_add(*theirs).ok_or(RankError::TotalOverflow {
                signal_id: slot as u32 + 1,
            })?;
        }
        for (mine, theirs) in self.hits.iter_mut().zip(&other.hits) {
            *mine = mine.saturating_add(*theirs);
        }
        Ok(())
    }

    /// `(signal_id, total, hits)` for every slot.
    pub fn slots(&self) -> impl Iterator<Item = (u32, u64, u64)> + '_ {
        self.totals
            .iter()
            .zip(&self.hits)
            .enumerate()
            .map(|(i, (total, hits))| (i as u32 + 1, *total, *hits))
    }

    fn slot(&self, signal_id: u32) -> Option<usize> {
        let slot = (signal_id as usize).checked_sub(1)?;
        (slot < self.signal_count()).then_some(slot)
    }
}

/// One participant's accumulators, one per timestamp group in canonical
/// order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalTally {
    signal_count: usize,
    accumulators: Vec<LocalAccumulator>,
}

impl LocalTally {
    pub fn new(signal_count: usize) -> Self {
        Self {
            signal_count,
            accumulators: Vec::new(),
        }
    }

    pub fn push(&mut self, accumulator: LocalAccumulator) {
        debug_assert_eq!(accumulator.signal_count(), self.signal_count);
        self.accumulators.push(accumulator);
    }

    pub fn signal_count(&self) -> usize {
        self.signal_count
    }

    pub fn len(&self) -> usize {
        self.accumulators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accumulators.is_empty()
    }

    pub fn accumulators(&self) -> &[LocalAccumulator] {
        &self.accumulators
    }

    /// Flattens to `[total, hits]` pairs, signal-major within each group.
    pub fn to_words(&self) -> Vec<u64> {
        let mut words = Vec::with_capacity(self.accumulators.len() * self.signal_count * 2);
        for acc in &self.accumulators {
            for (_, total, hits) in acc.slots() {
                words.push(total);
                words.push(hits);
            }
        }
        words
    }

    /// Rebuilds a tally from [`LocalTally::to_words`] output.
    pub fn from_words(
        words: &[u64],
        group_count: usize,
        signal_count: usize,
    ) -> Result<Self, RankError> {
        let expected = group_count * signal_count * 2;
        if words.len() != expected {
            return Err(RankError::fault(format!(
                "tally carries {} words, expected {expected} for {group_count} groups of {signal_count} signals",
                words.len()
            )));
        }

        let mut tally = LocalTally::new(signal_count);
        if signal_count == 0 {
            tally.accumulators = vec![LocalAccumulator::new(0); group_count];
            return Ok(tally);
        }
        for chunk in words.chunks(signal_count * 2) {
            let mut acc = LocalAccumulator::new(signal_count);
            for (slot, pair) in chunk.chunks(2).enumerate() {
                acc.totals[slot] = pair[0];
                acc.hits[slot] = pair[1];
            }
            tally.push(acc);
        }
        Ok(tally)
    }
}

/// One signal's place in a timestamp's ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankedEntry {
    pub signal_id: u32,
    pub total_car_count: u64,
}

/// The top-N signals for one timestamp, most congested first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampRanking {
    pub timestamp: String,
    pub entries: Vec<RankedEntry>,
}
