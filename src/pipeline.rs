//! End-to-end ranking run: ingestion, distribution, local aggregation and
//! collection, executed by every member of a participant group.

use std::sync::Arc;
use tracing::{Instrument, debug, info, warn};

use crate::aggregate::{LocalTally, TimestampRanking, aggregate_local, collect};
use crate::config::RunConfig;
use crate::distribute::distribute;
use crate::error::RankError;
use crate::group::{LocalGroup, ProcessGroup, ROOT, Traced, gather_words};
use crate::parser::read_source;

/// Runs one participant's side of the protocol.
///
/// Only the root reads the source and only the root returns rankings;
/// every other participant returns `Ok(None)` once its tally is delivered.
pub async fn run_participant<G: ProcessGroup + ?Sized>(
    group: &G,
    config: &RunConfig,
) -> Result<Option<Vec<TimestampRanking>>, RankError> {
    let ingested = if group.rank() == ROOT {
        let path = config.source_path.clone();
        let signal_count = config.signal_count;
        let outcome = tokio::task::spawn_blocking(move || read_source(&path, signal_count))
            .await
            .unwrap_or_else(|e| Err(RankError::fault(format!("ingestion task failed: {e}"))));
        Some(outcome)
    } else {
        None
    };

    let groups = distribute(group, ingested).await?;

    let signal_count = config.signal_count as usize;
    let tally = aggregate_local(&groups, group.rank(), group.size(), config.split, signal_count)?;

    let Some(contributions) = gather_words(group, &tally.to_words()).await? else {
        return Ok(None);
    };

    let tallies = contributions
        .iter()
        .map(|words| LocalTally::from_words(words, groups.len(), signal_count))
        .collect::<Result<Vec<_>, _>>()?;

    collect(&groups, &tallies, config.split, config.top_n).map(Some)
}

/// Runs a whole ranking over an in-process group of `config.participants`
/// tokio tasks and returns the root's rankings.
///
/// Either every timestamp is ranked or the run fails; no partial results
/// are returned.
#[tracing::instrument(
    skip(config),
    fields(
        source = %config.source_path.display(),
        participants = config.participants,
        split = %config.split
    )
)]
pub async fn run(config: &RunConfig) -> Result<Vec<TimestampRanking>, RankError> {
    config.validate()?;
    let config = Arc::new(config.clone());

    let mut tasks = Vec::with_capacity(config.participants);
    for handle in LocalGroup::create(config.participants)? {
        let span = tracing::info_span!("participant", rank = handle.rank());
        let config = Arc::clone(&config);
        let task = tokio::spawn(
            async move {
                let group = Traced::new(handle);
                let outcome = run_participant(&group, &config).await;
                debug!(
                    collectives = group.calls(),
                    ok = outcome.is_ok(),
                    "Participant finished"
                );
                outcome
            }
            .instrument(span),
        );
        tasks.push(task);
    }

    let mut outcomes = Vec::with_capacity(tasks.len());
    for (rank, task) in tasks.into_iter().enumerate() {
        let outcome = task
            .await
            .unwrap_or_else(|e| Err(RankError::fault(format!("participant {rank} failed: {e}"))));
        outcomes.push(outcome);
    }

    let mut rankings = None;
    let mut errors = Vec::new();
    for (rank, outcome) in outcomes.into_iter().enumerate() {
        match outcome {
            Ok(Some(result)) => rankings = Some(result),
            Ok(None) => {}
            Err(e) => {
                warn!(rank, error = %e, "Participant failed");
                errors.push(e);
            }
        }
    }

    if let Some(err) = root_cause(errors) {
        return Err(err);
    }

    let rankings =
        rankings.ok_or_else(|| RankError::fault("root participant returned no rankings"))?;
    info!(timestamps = rankings.len(), "Ranking run complete");
    Ok(rankings)
}

/// Picks the error that explains a failed run. Faults and aborts are usually
/// echoes of a failure elsewhere, so a first-hand error wins when there is one.
fn root_cause(mut errors: Vec<RankError>) -> Option<RankError> {
    let first_hand = errors.iter().position(|e| {
        !matches!(
            e,
            RankError::CommunicationFault(_) | RankError::PeerAborted { .. }
        )
    });
    match first_hand {
        Some(i) => Some(errors.swap_remove(i)),
        None if errors.is_empty() => None,
        None => Some(errors.swap_remove(0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_cause_prefers_first_hand_errors() {
        let errors = vec![
            RankError::fault("participant 2 is unreachable"),
            RankError::PeerAborted {
                code: 2,
                message: "bad line".into(),
            },
            RankError::MalformedRecord {
                line: 4,
                reason: "bad line".into(),
            },
        ];
        assert!(matches!(
            root_cause(errors),
            Some(RankError::MalformedRecord { line: 4, .. })
        ));
    }

    #[test]
    fn test_root_cause_falls_back_to_first_error() {
        let errors = vec![RankError::fault("first"), RankError::fault("second")];
        match root_cause(errors) {
            Some(RankError::CommunicationFault(msg)) => assert_eq!(msg, "first"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(root_cause(Vec::new()).is_none());
    }

    #[tokio::test]
    async fn test_solo_participant_issues_one_collective_per_protocol_step() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("traffic.csv");
        std::fs::write(&path, "id,ts,count\n1,T1,3\n2,T1,4\n2,T2,1\n").unwrap();
        let config = RunConfig::new(&path).with_signal_count(2);

        let group = Traced::new(LocalGroup::create(1).unwrap().remove(0));
        let rankings = run_participant(&group, &config).await.unwrap().unwrap();

        assert_eq!(rankings.len(), 2);
        // status, group count, four per group, then the gather
        assert_eq!(group.calls(), 1 + 1 + 4 * 2 + 1);
    }

    #[tokio::test]
    async fn test_invalid_config_fails_before_spawning() {
        let config = RunConfig::new("traffic.csv").with_participants(0);
        assert!(matches!(run(&config).await, Err(RankError::InvalidConfig(_))));
    }
}
