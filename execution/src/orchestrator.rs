//! Turn orchestrator state machine.
//!
//! Drives one [`Session`] through its rounds. Each round visits the roster in
//! order and walks every connected account through:
//!
//! 1. **EarningIncome** - net salary is credited
//! 2. **RandomEvent** - at most one event is drawn (or received)
//! 3. **PlayerDecision** - only when an event occurred; the turn suspends here
//! 4. **TurnEnd** - the next account starts
//!
//! Disconnected accounts are skipped without salary or event but keep their
//! roster slot. After the last account the round counter advances and the
//! session either waits for the next explicit [`TurnOrchestrator::start_round`]
//! or moves to `GameOver`.
//!
//! ## Suspension
//!
//! The orchestrator never blocks. Operations return a [`RoundStatus`]; when it
//! reports `AwaitingDecision` the caller resumes the turn with
//! [`TurnOrchestrator::resolve_choice`] or [`TurnOrchestrator::acknowledge_event`].
//! A replica additionally suspends in `RandomEvent` (`AwaitingOutcome`) until the
//! authority's draw arrives through [`TurnOrchestrator::apply_outcome`].
//!
//! ## Notifications
//!
//! Every transition queues a [`TurnEvent`]. Presentation layers and the
//! synchronizer drain them with [`TurnOrchestrator::drain_events`].
//!
//! ## Usage
//!
//! ```rust,ignore
//! use moneymatters_execution::{OutcomeSource, SeededDraws, TurnOrchestrator};
//!
//! let mut orchestrator = TurnOrchestrator::new(
//!     session,
//!     catalog,
//!     &config,
//!     OutcomeSource::Local,
//!     Box::new(SeededDraws::new(7)),
//! );
//! orchestrator.begin_role_selection()?;
//! orchestrator.add(Account::new(1, "Ada"))?;
//! orchestrator.choose_profession(0, "doctor")?;
//! orchestrator.begin_play()?;
//!
//! let mut status = orchestrator.start_round();
//! while let RoundStatus::AwaitingDecision { account_index, .. } = status {
//!     status = orchestrator.resolve_choice(account_index, 0)
//!         .or_else(|_| orchestrator.acknowledge_event(account_index))?;
//! }
//! ```

use std::sync::Arc;

use moneymatters_types::{
    Account, AccountId, Catalog, CatalogError, FinancialEventDefinition, GameConfig, Phase,
    Session,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::economy::{self, Settlement};
use crate::registry::{RegistryError, RegistryEvent, SessionRegistry};
use crate::rng::DrawSource;
use crate::selector::EventSelector;

/// Where event outcomes come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeSource {
    /// Solo play: draw and apply in place.
    Local,
    /// Draw, surface the outcome for broadcast, and apply it through the shared path.
    Authority,
    /// Never draw; wait for the authority's outcome.
    Replica,
}

/// Refusal to leave setup. The session stays where it was.
#[derive(Debug, Error, PartialEq)]
pub enum StartError {
    #[error("cannot begin play from phase {phase:?}")]
    InvalidPhase { phase: Phase },
    #[error("roster is empty")]
    EmptyRoster,
    #[error("not enough players (have={have}, min={min})")]
    TooFewPlayers { have: usize, min: usize },
    #[error("round_limit must be > 0")]
    InvalidRoundLimit,
    #[error("account {index} has not chosen a profession")]
    NotReady { index: usize },
    #[error("invalid catalog: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TurnError {
    #[error("operation not allowed in phase {phase:?}")]
    InvalidPhase { phase: Phase },
    #[error("account index {index} out of range (roster={len})")]
    AccountOutOfRange { index: usize, len: usize },
    #[error("unknown profession {id}")]
    UnknownProfession { id: String },
    #[error("unknown event {id}")]
    UnknownEvent { id: String },
    #[error("not awaiting an outcome for account {index} in round {round}")]
    NotAwaitingOutcome { round: u32, index: usize },
    #[error("no decision pending for account {index}")]
    NoPendingDecision { index: usize },
    #[error("event {id} requires a choice")]
    ChoiceRequired { id: String },
    #[error("event {id} has no choice {index}")]
    ChoiceOutOfRange { id: String, index: usize },
    #[error("game is over")]
    GameOver,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    /// No round in progress and none played yet.
    Idle,
    /// Replica waiting for the authority's draw for this account.
    AwaitingOutcome { account_index: usize },
    /// The account's turn is suspended on an event.
    AwaitingDecision {
        account_index: usize,
        event_id: String,
    },
    /// The given 1-based round finished; waiting for the next start.
    RoundComplete { round: u32 },
    GameOver,
}

/// Notification queued on every observable transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEvent {
    PhaseChanged {
        phase: Phase,
        account_index: Option<usize>,
    },
    ProfessionChosen {
        account_index: usize,
        profession_id: String,
    },
    GameStarted {
        accounts: usize,
        round_limit: u32,
    },
    RoundStarted {
        round: u32,
    },
    AccountSkipped {
        account_index: usize,
    },
    SalaryPaid {
        account_index: usize,
        amount: i64,
    },
    /// Raised by an authority only, right after it draws.
    OutcomeDrawn {
        round: u32,
        account_index: usize,
        event_id: Option<String>,
    },
    EventTriggered {
        account_index: usize,
        event_id: String,
    },
    NoEvent {
        account_index: usize,
    },
    MoneyChanged {
        account_index: usize,
        balance: i64,
        earned: i64,
        spent: i64,
    },
    ChoiceResolved {
        round: u32,
        account_index: usize,
        choice_index: usize,
        amount: i64,
    },
    EventAcknowledged {
        round: u32,
        account_index: usize,
    },
    TurnCompleted {
        account_index: usize,
    },
    RoundCompleted {
        round: u32,
    },
    ReadyForNextRound {
        next_round: u32,
    },
    GameOver {
        winner: Option<usize>,
    },
    Registry(RegistryEvent),
}

/// Most recent outcome applied, kept for replay after an authority handoff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliedOutcome {
    pub round: u32,
    pub account_index: usize,
    pub event_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct PendingDecision {
    account_index: usize,
    event_id: String,
}

pub struct TurnOrchestrator {
    session: Session,
    catalog: Arc<Catalog>,
    selector: EventSelector,
    source: OutcomeSource,
    draws: Box<dyn DrawSource>,
    starting_cash: i64,
    min_players: usize,
    max_players: usize,
    in_progress: bool,
    pending: Option<PendingDecision>,
    last_outcome: Option<AppliedOutcome>,
    events: Vec<TurnEvent>,
}

impl TurnOrchestrator {
    pub fn new(
        session: Session,
        catalog: Arc<Catalog>,
        config: &GameConfig,
        source: OutcomeSource,
        draws: Box<dyn DrawSource>,
    ) -> Self {
        Self {
            session,
            catalog,
            selector: EventSelector::new(config.event_chance),
            source,
            draws,
            starting_cash: config.starting_cash,
            min_players: config.min_players,
            max_players: config.max_players,
            in_progress: false,
            pending: None,
            last_outcome: None,
            events: Vec::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn source(&self) -> OutcomeSource {
        self.source
    }

    pub fn set_source(&mut self, source: OutcomeSource) {
        self.source = source;
    }

    pub fn round_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn last_outcome(&self) -> Option<&AppliedOutcome> {
        self.last_outcome.as_ref()
    }

    /// Pending event for the suspended account, if any.
    pub fn pending_event(&self) -> Option<(usize, &FinancialEventDefinition)> {
        let pending = self.pending.as_ref()?;
        let event = self.catalog.event(&pending.event_id)?;
        Some((pending.account_index, event))
    }

    pub fn drain_events(&mut self) -> Vec<TurnEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn status(&self) -> RoundStatus {
        if self.session.game_over {
            return RoundStatus::GameOver;
        }
        if let Some(pending) = &self.pending {
            return RoundStatus::AwaitingDecision {
                account_index: pending.account_index,
                event_id: pending.event_id.clone(),
            };
        }
        if self.in_progress && self.session.phase == Phase::RandomEvent {
            return RoundStatus::AwaitingOutcome {
                account_index: self.session.active_index,
            };
        }
        if self.session.completed_rounds > 0 {
            return RoundStatus::RoundComplete {
                round: self.session.completed_rounds,
            };
        }
        RoundStatus::Idle
    }

    pub fn begin_role_selection(&mut self) -> Result<(), TurnError> {
        if self.session.phase != Phase::Setup {
            return Err(TurnError::InvalidPhase {
                phase: self.session.phase,
            });
        }
        self.set_phase(Phase::RoleSelection);
        Ok(())
    }

    pub fn choose_profession(
        &mut self,
        account_index: usize,
        profession_id: &str,
    ) -> Result<(), TurnError> {
        if !matches!(self.session.phase, Phase::Setup | Phase::RoleSelection) {
            return Err(TurnError::InvalidPhase {
                phase: self.session.phase,
            });
        }
        self.check_index(account_index)?;
        let catalog = Arc::clone(&self.catalog);
        let profession =
            catalog
                .profession(profession_id)
                .ok_or_else(|| TurnError::UnknownProfession {
                    id: profession_id.to_string(),
                })?;
        let account = &mut self.session.roster[account_index];
        account.assign_profession(profession, self.starting_cash);
        info!(
            account = account.id,
            profession = %profession.id,
            balance = account.balance,
            "profession chosen"
        );
        self.events.push(TurnEvent::ProfessionChosen {
            account_index,
            profession_id: profession.id.clone(),
        });
        Ok(())
    }

    /// Validates the setup and moves the session into play.
    pub fn begin_play(&mut self) -> Result<(), StartError> {
        if !matches!(self.session.phase, Phase::Setup | Phase::RoleSelection) {
            return Err(StartError::InvalidPhase {
                phase: self.session.phase,
            });
        }
        if self.session.round_limit == 0 {
            return Err(StartError::InvalidRoundLimit);
        }
        self.catalog.validate()?;
        if self.session.roster.is_empty() {
            return Err(StartError::EmptyRoster);
        }
        if self.session.roster.len() < self.min_players {
            return Err(StartError::TooFewPlayers {
                have: self.session.roster.len(),
                min: self.min_players,
            });
        }
        if let Some(index) = self
            .session
            .roster
            .iter()
            .position(|a| a.profession.is_none())
        {
            return Err(StartError::NotReady { index });
        }

        self.session.active_index = 0;
        self.set_phase(Phase::Playing);
        info!(
            session = %self.session.id,
            accounts = self.session.roster.len(),
            round_limit = self.session.round_limit,
            "game started"
        );
        self.events.push(TurnEvent::GameStarted {
            accounts: self.session.roster.len(),
            round_limit: self.session.round_limit,
        });
        Ok(())
    }

    /// Starts the next round. A no-op (logged) while a round is in progress,
    /// before play, after the game ended, or with an empty roster.
    pub fn start_round(&mut self) -> RoundStatus {
        if self.session.game_over {
            warn!("game is over, ignoring round start");
            return RoundStatus::GameOver;
        }
        if self.in_progress {
            warn!(
                round = self.session.current_round(),
                phase = ?self.session.phase,
                "round already in progress, ignoring start"
            );
            return self.status();
        }
        if self.session.phase != Phase::Playing {
            warn!(phase = ?self.session.phase, "play has not begun, ignoring round start");
            return self.status();
        }
        if self.session.roster.is_empty() {
            warn!("roster is empty, ignoring round start");
            return self.status();
        }
        if self.session.completed_rounds >= self.session.round_limit {
            warn!(
                limit = self.session.round_limit,
                "round limit reached, ignoring round start"
            );
            return self.status();
        }

        let round = self.session.current_round();
        self.in_progress = true;
        self.session.active_index = 0;
        info!(round, limit = self.session.round_limit, "round started");
        self.events.push(TurnEvent::RoundStarted { round });
        self.advance()
    }

    /// Applies a draw made elsewhere. Only valid while suspended in
    /// `RandomEvent` for this account and round; otherwise nothing changes.
    pub fn apply_outcome(
        &mut self,
        round: u32,
        account_index: usize,
        event_id: Option<&str>,
    ) -> Result<RoundStatus, TurnError> {
        if self.session.game_over {
            return Err(TurnError::GameOver);
        }
        self.check_index(account_index)?;
        if !self.in_progress
            || self.pending.is_some()
            || self.session.phase != Phase::RandomEvent
            || self.session.active_index != account_index
            || self.session.current_round() != round
        {
            return Err(TurnError::NotAwaitingOutcome {
                round,
                index: account_index,
            });
        }
        let catalog = Arc::clone(&self.catalog);
        let event = match event_id {
            Some(id) => Some(catalog.event(id).ok_or_else(|| TurnError::UnknownEvent {
                id: id.to_string(),
            })?),
            None => None,
        };
        Ok(self.settle_outcome(account_index, event))
    }

    /// Dismisses a choice-free event and resumes the round.
    pub fn acknowledge_event(&mut self, account_index: usize) -> Result<RoundStatus, TurnError> {
        let event = self.pending_for(account_index)?;
        if event.has_choice() {
            return Err(TurnError::ChoiceRequired { id: event.id.clone() });
        }
        Ok(self.release_decision(account_index))
    }

    /// Closes the pending decision without applying any choice.
    ///
    /// Used when the authority released a decision on its side, for instance
    /// because the deciding account disconnected.
    pub fn dismiss_decision(&mut self, account_index: usize) -> Result<RoundStatus, TurnError> {
        self.pending_for(account_index)?;
        Ok(self.release_decision(account_index))
    }

    /// Applies one of the pending event's choices and resumes the round.
    pub fn resolve_choice(
        &mut self,
        account_index: usize,
        choice_index: usize,
    ) -> Result<RoundStatus, TurnError> {
        let event = self.pending_for(account_index)?;
        let choice = event
            .choice(choice_index)
            .ok_or_else(|| TurnError::ChoiceOutOfRange {
                id: event.id.clone(),
                index: choice_index,
            })?;

        let round = self.session.current_round();
        let account = &mut self.session.roster[account_index];
        let amount = economy::resolve_choice(account, &event, choice, round);
        info!(
            account = account.id,
            event = %event.id,
            choice = %choice.label,
            amount,
            "choice resolved"
        );
        self.pending = None;
        self.events.push(TurnEvent::ChoiceResolved {
            round,
            account_index,
            choice_index,
            amount,
        });
        let changed = self.money_changed(account_index);
        self.events.push(changed);
        self.finish_turn();
        Ok(self.advance())
    }

    /// Settles a stalled decision with the least costly option.
    ///
    /// Choice events take the choice with the highest impact; choice-free events
    /// are acknowledged.
    pub fn expire_decision(&mut self) -> Result<RoundStatus, TurnError> {
        let Some((account_index, event)) = self.pending_event() else {
            return Err(TurnError::NoPendingDecision {
                index: self.session.active_index,
            });
        };
        let cheapest = event
            .choices
            .iter()
            .enumerate()
            .max_by_key(|(index, choice)| (choice.impact, std::cmp::Reverse(*index)))
            .map(|(index, _)| index);
        warn!(account_index, event = %event.id, ?cheapest, "decision timed out");
        match cheapest {
            Some(choice_index) => self.resolve_choice(account_index, choice_index),
            None => self.acknowledge_event(account_index),
        }
    }

    /// Overwrites an account's money from an authoritative snapshot.
    pub fn overwrite_money(
        &mut self,
        account_index: usize,
        balance: i64,
        earned: i64,
        spent: i64,
    ) -> Result<(), TurnError> {
        self.check_index(account_index)?;
        let account = &mut self.session.roster[account_index];
        if (account.balance, account.total_earned, account.total_spent) != (balance, earned, spent)
        {
            debug!(
                account = account.id,
                local_balance = account.balance,
                balance,
                "correcting money state from authority"
            );
        }
        account.overwrite_money(balance, earned, spent);
        Ok(())
    }

    pub fn mark_reconnected(&mut self, id: AccountId) -> Result<usize, RegistryError> {
        let index = self
            .session
            .index_of(id)
            .ok_or(RegistryError::UnknownAccount { id })?;
        let account = &mut self.session.roster[index];
        if !account.connected {
            account.connected = true;
            info!(account = id, index, "account reconnected");
            self.events
                .push(TurnEvent::Registry(RegistryEvent::Reconnected { id }));
        }
        Ok(index)
    }

    /// Takes over drawing. If the round is suspended awaiting an outcome that
    /// never arrived, the draw happens now; an account that has left meanwhile
    /// gets no event. A session that already played its last round is ended,
    /// since the previous authority may have left before announcing it.
    pub fn promote_to_authority(&mut self) -> RoundStatus {
        self.source = OutcomeSource::Authority;
        if self.in_progress && self.pending.is_none() && self.session.phase == Phase::RandomEvent
        {
            let index = self.session.active_index;
            let event = if self.session.roster[index].connected {
                info!(index, "drawing outcome after authority handoff");
                self.draw(index)
            } else {
                info!(index, "active account left, no event after authority handoff");
                self.events.push(TurnEvent::OutcomeDrawn {
                    round: self.session.current_round(),
                    account_index: index,
                    event_id: None,
                });
                None
            };
            let catalog = Arc::clone(&self.catalog);
            let event = event.as_deref().and_then(|id| catalog.event(id));
            self.settle_outcome(index, event);
        }
        if !self.in_progress
            && !self.session.game_over
            && self.session.phase == Phase::Playing
            && self.session.completed_rounds >= self.session.round_limit
        {
            info!(
                rounds = self.session.completed_rounds,
                "round limit reached before handoff, ending game"
            );
            return self.finish_game();
        }
        let abandoned = self
            .pending
            .as_ref()
            .map(|p| p.account_index)
            .filter(|&index| !self.session.roster[index].connected);
        match abandoned {
            Some(index) => self.release_abandoned(index),
            None => self.status(),
        }
    }

    /// Ends the match, recording the winner.
    pub fn finish_game(&mut self) -> RoundStatus {
        if self.session.game_over {
            return RoundStatus::GameOver;
        }
        self.in_progress = false;
        self.pending = None;
        self.session.game_over = true;
        self.set_phase(Phase::GameOver);
        let winner = self
            .session
            .winner()
            .and_then(|account| self.session.index_of(account.id));
        info!(
            rounds = self.session.completed_rounds,
            winner = ?winner,
            "game over"
        );
        self.events.push(TurnEvent::GameOver { winner });
        RoundStatus::GameOver
    }

    fn advance(&mut self) -> RoundStatus {
        while self.session.active_index < self.session.roster.len() {
            let index = self.session.active_index;
            if !self.session.roster[index].connected {
                info!(
                    index,
                    account = self.session.roster[index].id,
                    "skipping disconnected account"
                );
                self.events
                    .push(TurnEvent::AccountSkipped { account_index: index });
                self.session.active_index += 1;
                continue;
            }

            self.set_phase(Phase::EarningIncome);
            self.pay_salary(index);
            self.set_phase(Phase::RandomEvent);
            if self.source == OutcomeSource::Replica {
                return RoundStatus::AwaitingOutcome {
                    account_index: index,
                };
            }

            let event = self.draw(index);
            let catalog = Arc::clone(&self.catalog);
            let event = event.as_deref().and_then(|id| catalog.event(id));
            if let Some(status) = self.apply_drawn(index, event) {
                return status;
            }
        }
        self.complete_round()
    }

    /// Settles an outcome and continues the round when no decision is needed.
    fn settle_outcome(
        &mut self,
        index: usize,
        event: Option<&FinancialEventDefinition>,
    ) -> RoundStatus {
        match self.apply_drawn(index, event) {
            Some(status) => status,
            None => self.advance(),
        }
    }

    /// Shared outcome path for local draws, authority draws and received outcomes.
    /// Returns the suspended status when the event needs a decision.
    fn apply_drawn(
        &mut self,
        index: usize,
        event: Option<&FinancialEventDefinition>,
    ) -> Option<RoundStatus> {
        let round = self.session.current_round();
        self.last_outcome = Some(AppliedOutcome {
            round,
            account_index: index,
            event_id: event.map(|e| e.id.clone()),
        });

        let Some(event) = event else {
            debug!(index, round, "no event");
            self.events.push(TurnEvent::NoEvent {
                account_index: index,
            });
            self.finish_turn();
            return None;
        };

        self.session.roster[index].note_occurrence(&event.id);
        self.set_phase(Phase::PlayerDecision);
        self.events.push(TurnEvent::EventTriggered {
            account_index: index,
            event_id: event.id.clone(),
        });

        let catalog = Arc::clone(&self.catalog);
        let account = &mut self.session.roster[index];
        let profession = account
            .profession
            .as_deref()
            .and_then(|id| catalog.profession(id));
        let settlement = economy::settle_event(account, event, profession, round);
        info!(
            account = account.id,
            round,
            event = %event.id,
            ?settlement,
            "event triggered"
        );
        if let Settlement::Moved(_) = settlement {
            let changed = self.money_changed(index);
            self.events.push(changed);
        }

        self.pending = Some(PendingDecision {
            account_index: index,
            event_id: event.id.clone(),
        });
        Some(RoundStatus::AwaitingDecision {
            account_index: index,
            event_id: event.id.clone(),
        })
    }

    fn draw(&mut self, index: usize) -> Option<String> {
        let round = self.session.current_round();
        let event_id = self
            .selector
            .select(
                &self.catalog,
                &self.session.roster[index],
                round,
                self.draws.as_mut(),
            )
            .map(|event| event.id.clone());
        if self.source == OutcomeSource::Authority {
            self.events.push(TurnEvent::OutcomeDrawn {
                round,
                account_index: index,
                event_id: event_id.clone(),
            });
        }
        event_id
    }

    fn pay_salary(&mut self, index: usize) {
        let catalog = Arc::clone(&self.catalog);
        let round = self.session.current_round();
        let account = &mut self.session.roster[index];
        let Some(profession) = account
            .profession
            .as_deref()
            .and_then(|id| catalog.profession(id))
        else {
            warn!(account = account.id, "account has no profession, salary skipped");
            return;
        };
        let amount = economy::pay_salary(account, profession, round);
        self.events.push(TurnEvent::SalaryPaid {
            account_index: index,
            amount,
        });
        let changed = self.money_changed(index);
        self.events.push(changed);
    }

    fn finish_turn(&mut self) {
        let index = self.session.active_index;
        self.set_phase(Phase::TurnEnd);
        self.events.push(TurnEvent::TurnCompleted {
            account_index: index,
        });
        self.session.active_index += 1;
    }

    fn complete_round(&mut self) -> RoundStatus {
        let round = self.session.current_round();
        self.session.completed_rounds += 1;
        self.session.active_index = 0;
        self.in_progress = false;
        info!(round, "round complete");
        self.events.push(TurnEvent::RoundCompleted { round });

        if self.session.completed_rounds >= self.session.round_limit {
            if self.source == OutcomeSource::Replica {
                self.set_phase(Phase::Playing);
                debug!(round, "round limit reached, waiting for end of game");
                return RoundStatus::RoundComplete { round };
            }
            return self.finish_game();
        }

        self.set_phase(Phase::Playing);
        self.events.push(TurnEvent::ReadyForNextRound {
            next_round: round + 1,
        });
        RoundStatus::RoundComplete { round }
    }

    fn release_decision(&mut self, account_index: usize) -> RoundStatus {
        let round = self.session.current_round();
        self.pending = None;
        self.events.push(TurnEvent::EventAcknowledged {
            round,
            account_index,
        });
        self.finish_turn();
        self.advance()
    }

    /// Releases a decision whose account went away. No choice money moves.
    fn release_abandoned(&mut self, account_index: usize) -> RoundStatus {
        warn!(account_index, "releasing decision of disconnected account");
        self.release_decision(account_index)
    }

    fn pending_for(&self, account_index: usize) -> Result<FinancialEventDefinition, TurnError> {
        match self.pending_event() {
            Some((index, event)) if index == account_index => Ok(event.clone()),
            _ => Err(TurnError::NoPendingDecision {
                index: account_index,
            }),
        }
    }

    fn check_index(&self, index: usize) -> Result<(), TurnError> {
        if index >= self.session.roster.len() {
            return Err(TurnError::AccountOutOfRange {
                index,
                len: self.session.roster.len(),
            });
        }
        Ok(())
    }

    fn set_phase(&mut self, phase: Phase) {
        self.session.phase = phase;
        self.events.push(TurnEvent::PhaseChanged {
            phase,
            account_index: phase.is_turn_phase().then_some(self.session.active_index),
        });
    }

    fn money_changed(&self, index: usize) -> TurnEvent {
        let account = &self.session.roster[index];
        TurnEvent::MoneyChanged {
            account_index: index,
            balance: account.balance,
            earned: account.total_earned,
            spent: account.total_spent,
        }
    }
}

impl SessionRegistry for TurnOrchestrator {
    fn add(&mut self, account: Account) -> Result<usize, RegistryError> {
        if !matches!(self.session.phase, Phase::Setup | Phase::RoleSelection) {
            return Err(RegistryError::GameInProgress);
        }
        if self.session.roster.len() >= self.max_players {
            return Err(RegistryError::RosterFull {
                max: self.max_players,
            });
        }
        if self.session.index_of(account.id).is_some() {
            return Err(RegistryError::DuplicateAccount { id: account.id });
        }
        let id = account.id;
        let index = self.session.roster.len();
        info!(account = id, label = %account.label, index, "account joined");
        self.session.roster.push(account);
        self.events
            .push(TurnEvent::Registry(RegistryEvent::Joined { id, index }));
        Ok(index)
    }

    fn remove(&mut self, id: AccountId) -> Result<Account, RegistryError> {
        if !matches!(self.session.phase, Phase::Setup | Phase::RoleSelection) {
            return Err(RegistryError::GameInProgress);
        }
        let index = self
            .session
            .index_of(id)
            .ok_or(RegistryError::UnknownAccount { id })?;
        let account = self.session.roster.remove(index);
        info!(account = id, "account left");
        self.events
            .push(TurnEvent::Registry(RegistryEvent::Left { id }));
        Ok(account)
    }

    /// Flags an account as gone. Its remaining turns are skipped. When it
    /// holds the pending decision and this replica draws outcomes, the
    /// decision is released so the round can continue.
    fn mark_disconnected(&mut self, id: AccountId) -> Result<usize, RegistryError> {
        let index = self
            .session
            .index_of(id)
            .ok_or(RegistryError::UnknownAccount { id })?;
        let account = &mut self.session.roster[index];
        if !account.connected {
            return Ok(index);
        }
        account.connected = false;
        warn!(account = id, index, "account disconnected");
        self.events
            .push(TurnEvent::Registry(RegistryEvent::Disconnected { id }));

        let holds_decision = matches!(&self.pending, Some(p) if p.account_index == index);
        if holds_decision && self.source != OutcomeSource::Replica {
            self.release_abandoned(index);
        }
        Ok(index)
    }

    fn roster(&self) -> &[Account] {
        &self.session.roster
    }
}
