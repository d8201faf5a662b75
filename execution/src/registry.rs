//! Roster boundary backed by the external lobby.
//!
//! The lobby supplies identities and connectivity changes; the core only needs
//! these operations. Connectivity changes are pushed in as [`RegistryEvent`]s,
//! never polled.

use moneymatters_types::{Account, AccountId};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("roster is full (max={max})")]
    RosterFull { max: usize },
    #[error("account {id} already joined")]
    DuplicateAccount { id: AccountId },
    #[error("unknown account {id}")]
    UnknownAccount { id: AccountId },
    #[error("roster is locked once play has started")]
    GameInProgress,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    Joined { id: AccountId, index: usize },
    Left { id: AccountId },
    Disconnected { id: AccountId },
    Reconnected { id: AccountId },
}

pub trait SessionRegistry {
    /// Appends an account and returns its roster index.
    fn add(&mut self, account: Account) -> Result<usize, RegistryError>;

    /// Removes an account. Only allowed before play starts; afterwards
    /// departures are flagged with [`SessionRegistry::mark_disconnected`].
    fn remove(&mut self, id: AccountId) -> Result<Account, RegistryError>;

    fn mark_disconnected(&mut self, id: AccountId) -> Result<usize, RegistryError>;

    fn roster(&self) -> &[Account];
}
