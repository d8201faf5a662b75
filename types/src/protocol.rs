//! Replica synchronization messages.
//!
//! The authority produces these; other replicas consume them. `MoneyState`
//! overwrites rather than accumulates, and `EventOutcome` is only applied while
//! the receiver is awaiting an outcome for that account, so both tolerate
//! duplicate delivery. Connectivity changes of non-authority accounts also
//! travel through the authority's stream so every replica applies them at the
//! same point of the round.

use serde::{Deserialize, Serialize};

/// Roster index of the account hosted by a replica.
pub type ReplicaId = usize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncMessage {
    /// Non-authority asks the authority to start the next round.
    RequestStartTurn,
    StartTurn {
        round: u32,
    },
    /// Draw result for one account; `event_id: None` means no event occurred.
    EventOutcome {
        round: u32,
        account_index: usize,
        event_id: Option<String>,
    },
    MoneyState {
        account_index: usize,
        balance: i64,
        earned: i64,
        spent: i64,
    },
    /// Sent to the authority as a request, then re-broadcast to every other replica.
    ChoiceResolved {
        round: u32,
        account_index: usize,
        choice_index: usize,
    },
    /// A choice-free event was dismissed. Same routing as `ChoiceResolved`.
    EventAcknowledged {
        round: u32,
        account_index: usize,
    },
    /// The account left; its remaining turns are skipped.
    AccountDisconnected {
        account_index: usize,
    },
    AccountReconnected {
        account_index: usize,
    },
    EndGame,
}

impl SyncMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            SyncMessage::RequestStartTurn => "request_start_turn",
            SyncMessage::StartTurn { .. } => "start_turn",
            SyncMessage::EventOutcome { .. } => "event_outcome",
            SyncMessage::MoneyState { .. } => "money_state",
            SyncMessage::ChoiceResolved { .. } => "choice_resolved",
            SyncMessage::EventAcknowledged { .. } => "event_acknowledged",
            SyncMessage::AccountDisconnected { .. } => "account_disconnected",
            SyncMessage::AccountReconnected { .. } => "account_reconnected",
            SyncMessage::EndGame => "end_game",
        }
    }
}

/// Message stamped with its sender and a per-sender sequence number.
///
/// Receivers drop any envelope whose `seq` is not greater than the last one
/// accepted from the same sender.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub sender: ReplicaId,
    pub seq: u64,
    pub message: SyncMessage,
}

impl Envelope {
    pub fn encode(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Recipient set for an outbound envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Every replica, including the sender.
    All,
    /// Every replica except the sender.
    Others,
    /// The current authority only.
    Authority,
}
