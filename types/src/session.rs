use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Account, AccountId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// One process draws and applies every outcome.
    Solo,
    /// One authority draws; every other replica applies broadcast outcomes.
    MultiReplica,
}

/// Session phase.
///
/// Within a round each account walks
/// `EarningIncome -> RandomEvent -> (PlayerDecision) -> TurnEnd` in order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Setup,
    RoleSelection,
    Playing,
    EarningIncome,
    RandomEvent,
    PlayerDecision,
    TurnEnd,
    GameOver,
}

impl Phase {
    /// Phases that belong to one account's turn.
    pub fn is_turn_phase(&self) -> bool {
        matches!(
            self,
            Phase::EarningIncome | Phase::RandomEvent | Phase::PlayerDecision | Phase::TurnEnd
        )
    }
}

/// Root aggregate for one match.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub mode: GameMode,
    /// Rounds fully played so far.
    pub completed_rounds: u32,
    pub round_limit: u32,
    pub phase: Phase,
    pub active_index: usize,
    pub roster: Vec<Account>,
    pub game_over: bool,
}

impl Session {
    pub fn new(id: Uuid, mode: GameMode, round_limit: u32) -> Self {
        Self {
            id,
            mode,
            completed_rounds: 0,
            round_limit,
            phase: Phase::Setup,
            active_index: 0,
            roster: Vec::new(),
            game_over: false,
        }
    }

    /// 1-based number of the round being (or about to be) played.
    pub fn current_round(&self) -> u32 {
        self.completed_rounds + 1
    }

    pub fn account(&self, index: usize) -> Option<&Account> {
        self.roster.get(index)
    }

    pub fn index_of(&self, id: AccountId) -> Option<usize> {
        self.roster.iter().position(|a| a.id == id)
    }

    pub fn connected_count(&self) -> usize {
        self.roster.iter().filter(|a| a.connected).count()
    }

    pub fn all_ready(&self) -> bool {
        !self.roster.is_empty() && self.roster.iter().all(|a| a.ready)
    }

    /// Accounts ordered by descending net worth. Ties keep roster order.
    pub fn ranking(&self) -> Vec<&Account> {
        let mut ranked: Vec<&Account> = self.roster.iter().collect();
        ranked.sort_by(|a, b| b.net_worth().cmp(&a.net_worth()));
        ranked
    }

    /// First account holding the strictly greatest net worth.
    pub fn winner(&self) -> Option<&Account> {
        let mut best: Option<&Account> = None;
        for account in &self.roster {
            match best {
                Some(current) if account.net_worth() <= current.net_worth() => {}
                _ => best = Some(account),
            }
        }
        best
    }
}
