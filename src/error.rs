//! Error taxonomy shared by every stage of a ranking run.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Abort code broadcast when the root cannot open or read the source.
pub const ABORT_SOURCE_UNAVAILABLE: u64 = 1;
/// Abort code broadcast when the root hits a line it cannot parse.
pub const ABORT_MALFORMED_RECORD: u64 = 2;
/// Abort code for any other root-side failure before distribution.
pub const ABORT_OTHER: u64 = 3;

/// Every failure is fatal to the whole participant group; nothing is
/// recovered locally and no partial rankings are produced.
#[derive(Error, Debug)]
pub enum RankError {
    #[error("record source '{}' is unavailable: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed record on line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },

    #[error("collective communication failed: {0}")]
    CommunicationFault(String),

    #[error("root participant aborted the run (code {code}): {message}")]
    PeerAborted { code: u64, message: String },

    #[error("total car count for signal {signal_id} does not fit in 64 bits")]
    TotalOverflow { signal_id: u32 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl RankError {
    /// Shorthand for building a [`RankError::CommunicationFault`].
    pub fn fault(message: impl Into<String>) -> Self {
        RankError::CommunicationFault(message.into())
    }

    /// The status code the root broadcasts when this error stops ingestion.
    pub fn abort_code(&self) -> u64 {
        match self {
            RankError::SourceUnavailable { .. } => ABORT_SOURCE_UNAVAILABLE,
            RankError::MalformedRecord { .. } => ABORT_MALFORMED_RECORD,
            RankError::PeerAborted { code, .. } => *code,
            _ => ABORT_OTHER,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_codes_are_distinct_and_nonzero() {
        let unavailable = RankError::SourceUnavailable {
            path: PathBuf::from("missing.csv"),
            source: io::Error::new(io::ErrorKind::NotFound, "gone"),
        };
        let malformed = RankError::MalformedRecord {
            line: 2,
            reason: "bad".into(),
        };
        let fault = RankError::fault("peer hung up");

        assert_eq!(unavailable.abort_code(), ABORT_SOURCE_UNAVAILABLE);
        assert_eq!(malformed.abort_code(), ABORT_MALFORMED_RECORD);
        assert_eq!(fault.abort_code(), ABORT_OTHER);
        assert_ne!(unavailable.abort_code(), 0);
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = RankError::MalformedRecord {
            line: 7,
            reason: "signal_id 'abc' is not an integer".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed record on line 7: signal_id 'abc' is not an integer"
        );
    }
}
