//! Money Matters execution layer.
//!
//! This crate contains the economic engine, the weighted event selector, the
//! turn orchestrator and the authority synchronizer that keeps replicas of a
//! multi-participant session in lockstep.
//!
//! ## Determinism requirements
//! - Only the authority (or a solo session) consumes random draws, and only
//!   through a [`DrawSource`].
//! - Salary and expense rounding is half-to-even, so every replica computes
//!   the same amounts from the same inputs.
//! - Roster order is the only iteration order that influences outcomes.
//!
//! ## Replica invariants
//! Replicas apply inbound messages through the same orchestrator calls the
//! authority uses locally. `MoneyState` overwrites and `EventOutcome` is only
//! accepted while awaiting it, so duplicate delivery leaves state unchanged.
//!
//! The primary entrypoints are [`TurnOrchestrator`] for solo play and
//! [`AuthoritySynchronizer`] for multi-replica play.
//!
//! ## Solo round (example)
//! ```rust,ignore
//! use std::sync::Arc;
//! use moneymatters_execution::{OutcomeSource, RoundStatus, SeededDraws, TurnOrchestrator};
//! use moneymatters_types::{Catalog, GameConfig, GameMode, Session};
//!
//! let config = GameConfig::default();
//! let session = Session::new(uuid::Uuid::new_v4(), GameMode::Solo, config.round_limit);
//! let mut orchestrator = TurnOrchestrator::new(
//!     session,
//!     Arc::new(Catalog::standard()),
//!     &config,
//!     OutcomeSource::Local,
//!     Box::new(SeededDraws::new(1)),
//! );
//! // 1) Fill the roster and pick professions, then begin play.
//! // 2) Start a round and resume every suspended decision until it completes.
//! let status = orchestrator.start_round();
//! assert!(!matches!(status, RoundStatus::AwaitingOutcome { .. }));
//! ```

pub mod economy;
pub mod orchestrator;
pub mod persistence;
pub mod registry;
pub mod rng;
pub mod selector;
pub mod sync;
pub mod transport;

#[cfg(test)]
mod fixtures;

pub use economy::{
    expense_amount, net_salary, pay_salary, process_expense, process_income, resolve_choice,
    settle_event, Settlement,
};
pub use orchestrator::{
    AppliedOutcome, OutcomeSource, RoundStatus, StartError, TurnError, TurnEvent,
    TurnOrchestrator,
};
pub use persistence::{restore, snapshot, PersistenceError};
pub use registry::{RegistryError, RegistryEvent, SessionRegistry};
pub use rng::{DrawSource, ScriptedDraws, SeededDraws};
pub use selector::EventSelector;
pub use sync::{AuthoritySynchronizer, Outbound, ProtocolError};
pub use transport::{ChannelHub, Inbox, Transport, TransportError};
