//! Session save and load.
//!
//! Snapshots are opaque JSON blobs taken between rounds. Multi-replica
//! sessions cannot be saved.

use moneymatters_types::{AccountInvariantError, GameMode, Phase, Session};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("multi-replica sessions cannot be saved")]
    MultiReplica,
    #[error("cannot save while a turn is in progress (phase={phase:?})")]
    TurnInProgress { phase: Phase },
    #[error("could not encode session: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("could not decode session: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("active index {index} out of range (roster={len})")]
    ActiveIndex { index: usize, len: usize },
    #[error("account {index} is inconsistent: {source}")]
    Account {
        index: usize,
        #[source]
        source: AccountInvariantError,
    },
}

pub fn snapshot(session: &Session) -> Result<Vec<u8>, PersistenceError> {
    if session.mode == GameMode::MultiReplica {
        return Err(PersistenceError::MultiReplica);
    }
    if session.phase.is_turn_phase() {
        return Err(PersistenceError::TurnInProgress {
            phase: session.phase,
        });
    }
    let bytes = serde_json::to_vec(session).map_err(PersistenceError::Encode)?;
    info!(session = %session.id, bytes = bytes.len(), "session saved");
    Ok(bytes)
}

/// Decodes a snapshot and checks that every ledger still adds up.
pub fn restore(bytes: &[u8]) -> Result<Session, PersistenceError> {
    let session: Session = serde_json::from_slice(bytes).map_err(PersistenceError::Decode)?;
    if !session.roster.is_empty() && session.active_index >= session.roster.len() {
        return Err(PersistenceError::ActiveIndex {
            index: session.active_index,
            len: session.roster.len(),
        });
    }
    for (index, account) in session.roster.iter().enumerate() {
        account
            .validate_invariants()
            .map_err(|source| PersistenceError::Account { index, source })?;
    }
    info!(
        session = %session.id,
        round = session.completed_rounds,
        "session restored"
    );
    Ok(session)
}
