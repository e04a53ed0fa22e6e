use std::path::PathBuf;

use crate::aggregate::{DEFAULT_TOP_N, WorkSplit};
use crate::error::RankError;

/// Number of traffic signals known when none is configured.
pub const DEFAULT_SIGNAL_COUNT: u32 = 4;
/// Participant group size when none is configured.
pub const DEFAULT_PARTICIPANTS: usize = 4;

/// Everything a ranking run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    pub source_path: PathBuf,
    pub top_n: usize,
    pub signal_count: u32,
    pub participants: usize,
    pub split: WorkSplit,
}

impl RunConfig {
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            top_n: DEFAULT_TOP_N,
            signal_count: DEFAULT_SIGNAL_COUNT,
            participants: DEFAULT_PARTICIPANTS,
            split: WorkSplit::default(),
        }
    }

    pub fn with_top_n(mut self, top_n: usize) -> Self {
        self.top_n = top_n;
        self
    }

    pub fn with_signal_count(mut self, signal_count: u32) -> Self {
        self.signal_count = signal_count;
        self
    }

    pub fn with_participants(mut self, participants: usize) -> Self {
        self.participants = participants;
        self
    }

    pub fn with_split(mut self, split: WorkSplit) -> Self {
        self.split = split;
        self
    }

    /// Rejects settings no run can succeed with.
    pub fn validate(&self) -> Result<(), RankError> {
        if self.top_n == 0 {
            return Err(RankError::InvalidConfig("top_n must be at least 1".into()));
        }
        if self.signal_count == 0 {
            return Err(RankError::InvalidConfig(
                "signal_count must be at least 1".into(),
            ));
        }
        if self.participants == 0 {
            return Err(RankError::InvalidConfig(
                "participants must be at least 1".into(),
            ));
        }
        if self.source_path.as_os_str().is_empty() {
            return Err(RankError::InvalidConfig("source_path is empty".into()));
        }
        Ok(())
    }
}
