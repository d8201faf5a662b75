//! Headless match runner.
//!
//! Plays a full match with scripted bots, either against a single local
//! orchestrator or across one replica task per participant talking over an
//! in-process [`ChannelHub`](moneymatters_execution::ChannelHub).

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use moneymatters_execution::{
    DrawSource, OutcomeSource, RegistryError, SessionRegistry, StartError, TurnError,
    TurnOrchestrator,
};
use moneymatters_types::{Account, AccountId, Catalog, CatalogError, GameConfig, GameMode, Session};
use thiserror::Error;
use uuid::Uuid;

mod bot;
pub use bot::{profession_for, Bot, Decision};
mod multi;
pub use multi::run_multi;
mod solo;
pub use solo::run_solo;
mod summary;
pub use summary::{Standing, Summary};

#[derive(Debug, Error)]
pub enum SimulatorError {
    #[error("could not start match: {0}")]
    Start(#[from] StartError),
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("invalid disconnect `{value}` (expected ROUND:INDEX)")]
    InvalidDisconnect { value: String },
    #[error("account {index} out of range (players={players})")]
    UnknownAccount { index: usize, players: usize },
    #[error("idle account {index} needs a decision timeout")]
    Stalled { index: usize },
    #[error("replica {replica} diverged from replica {reference}")]
    Diverged { replica: usize, reference: usize },
    #[error("replica task failed: {reason}")]
    ReplicaTask { reason: String },
    #[error("every participant left")]
    NoneLeft,
}

/// Account `index` leaves right before round `round` starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Disconnect {
    pub round: u32,
    pub index: usize,
}

impl FromStr for Disconnect {
    type Err = SimulatorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || SimulatorError::InvalidDisconnect {
            value: value.to_string(),
        };
        let (round, index) = value.split_once(':').ok_or_else(invalid)?;
        let round = round.trim().parse().map_err(|_| invalid())?;
        let index = index.trim().parse().map_err(|_| invalid())?;
        if round == 0 {
            return Err(invalid());
        }
        Ok(Self { round, index })
    }
}

/// Everything about a run that is not game configuration.
#[derive(Clone, Debug)]
pub struct MatchPlan {
    pub players: usize,
    pub mode: GameMode,
    pub seed: u64,
    pub disconnects: Vec<Disconnect>,
    /// Accounts whose bots never answer.
    pub idle: Vec<usize>,
    pub decision_timeout: Option<Duration>,
}

impl MatchPlan {
    pub fn validate(&self) -> Result<(), SimulatorError> {
        let check = |index: usize| {
            if index >= self.players {
                return Err(SimulatorError::UnknownAccount {
                    index,
                    players: self.players,
                });
            }
            Ok(())
        };
        for disconnect in &self.disconnects {
            check(disconnect.index)?;
        }
        for &index in &self.idle {
            check(index)?;
            if self.decision_timeout.is_none() {
                return Err(SimulatorError::Stalled { index });
            }
        }
        Ok(())
    }

    pub fn disconnects_before(&self, round: u32) -> impl Iterator<Item = usize> + '_ {
        self.disconnects
            .iter()
            .filter(move |d| d.round == round)
            .map(|d| d.index)
    }

    pub fn bots(&self) -> Vec<Bot> {
        (0..self.players)
            .map(|index| Bot::new(self.seed, index, self.idle.contains(&index)))
            .collect()
    }
}

pub fn account_id(index: usize) -> AccountId {
    index as AccountId + 1
}

/// Builds an orchestrator with one bot account per player, ready to play.
pub fn prepare(
    id: Uuid,
    config: &GameConfig,
    catalog: Arc<Catalog>,
    plan: &MatchPlan,
    source: OutcomeSource,
    draws: impl DrawSource + 'static,
) -> Result<TurnOrchestrator, SimulatorError> {
    let session = Session::new(id, plan.mode, config.round_limit);
    let mut orchestrator =
        TurnOrchestrator::new(session, Arc::clone(&catalog), config, source, Box::new(draws));
    orchestrator.begin_role_selection()?;
    for index in 0..plan.players {
        orchestrator.add(Account::new(account_id(index), format!("bot-{index}")))?;
        let profession = profession_for(&catalog, index)
            .ok_or(StartError::Catalog(CatalogError::NoProfessions))?;
        orchestrator.choose_profession(index, profession)?;
    }
    orchestrator.begin_play()?;
    Ok(orchestrator)
}
