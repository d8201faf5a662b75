use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ProfessionDefinition;

/// Participant identity supplied by the lobby collaborator.
pub type AccountId = u64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AccountInvariantError {
    #[error("balance diverged from ledger (expected={expected}, actual={actual})")]
    BalanceMismatch { expected: i64, actual: i64 },
    #[error("total_earned diverged from ledger (expected={expected}, actual={actual})")]
    EarnedMismatch { expected: i64, actual: i64 },
    #[error("total_spent diverged from ledger (expected={expected}, actual={actual})")]
    SpentMismatch { expected: i64, actual: i64 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Salary,
    Income,
    Expense,
    Investment,
    Bonus,
    Penalty,
}

/// Immutable ledger entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub description: String,
    pub amount: i64,
    pub kind: TransactionKind,
    /// 1-based round the entry was booked in. Zero for pre-game entries.
    pub round: u32,
    pub timestamp_ms: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub label: String,
    pub profession: Option<String>,
    pub starting_stake: i64,
    /// Training cost paid before the match; counted as spent but never ledgered.
    pub education_cost: i64,
    pub balance: i64,
    pub total_earned: i64,
    pub total_spent: i64,
    pub ready: bool,
    pub connected: bool,
    pub occurrences: BTreeMap<String, u32>,
    pub ledger: Vec<TransactionRecord>,
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

impl Account {
    pub fn new(id: AccountId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            profession: None,
            starting_stake: 0,
            education_cost: 0,
            balance: 0,
            total_earned: 0,
            total_spent: 0,
            ready: false,
            connected: true,
            occurrences: BTreeMap::new(),
            ledger: Vec::new(),
        }
    }

    /// Books one signed amount and updates balance and cumulative totals together.
    ///
    /// Positive amounts count toward `total_earned`, negative ones toward
    /// `total_spent`. A zero amount is still ledgered but moves neither total.
    pub fn record(
        &mut self,
        description: impl Into<String>,
        amount: i64,
        kind: TransactionKind,
        round: u32,
    ) -> &TransactionRecord {
        self.balance += amount;
        if amount > 0 {
            self.total_earned += amount;
        } else if amount < 0 {
            self.total_spent += amount.abs();
        }
        self.ledger.push(TransactionRecord {
            description: description.into(),
            amount,
            kind,
            round,
            timestamp_ms: now_ms(),
        });
        &self.ledger[self.ledger.len() - 1]
    }

    /// Resets the account's finances for a freshly chosen profession.
    ///
    /// The starting stake becomes the balance baseline. The signing bonus is
    /// ledgered; the education cost seeds `total_spent` directly.
    pub fn assign_profession(&mut self, profession: &ProfessionDefinition, starting_cash: i64) {
        self.profession = Some(profession.id.clone());
        self.starting_stake = starting_cash;
        self.education_cost = profession.education_cost_paid;
        self.balance = starting_cash;
        self.total_earned = 0;
        self.total_spent = profession.education_cost_paid;
        self.occurrences.clear();
        self.ledger.clear();
        if profession.starting_bonus != 0 {
            self.record(
                format!("{} signing bonus", profession.name),
                profession.starting_bonus,
                TransactionKind::Bonus,
                0,
            );
        }
        self.ready = true;
    }

    pub fn net_worth(&self) -> i64 {
        self.balance
    }

    pub fn total_profit(&self) -> i64 {
        self.total_earned - self.total_spent
    }

    pub fn occurrence_count(&self, event_id: &str) -> u32 {
        self.occurrences.get(event_id).copied().unwrap_or(0)
    }

    pub fn note_occurrence(&mut self, event_id: &str) {
        *self.occurrences.entry(event_id.to_string()).or_insert(0) += 1;
    }

    /// Overwrites the three monetary fields from an authoritative snapshot.
    pub fn overwrite_money(&mut self, balance: i64, earned: i64, spent: i64) {
        self.balance = balance;
        self.total_earned = earned;
        self.total_spent = spent;
    }

    pub fn validate_invariants(&self) -> Result<(), AccountInvariantError> {
        let sum: i64 = self.ledger.iter().map(|r| r.amount).sum();
        let expected = self.starting_stake + sum;
        if self.balance != expected {
            return Err(AccountInvariantError::BalanceMismatch {
                expected,
                actual: self.balance,
            });
        }
        let expected: i64 = self
            .ledger
            .iter()
            .filter(|r| r.amount > 0)
            .map(|r| r.amount)
            .sum();
        if self.total_earned != expected {
            return Err(AccountInvariantError::EarnedMismatch {
                expected,
                actual: self.total_earned,
            });
        }
        let expected: i64 = self.education_cost
            + self
                .ledger
                .iter()
                .filter(|r| r.amount < 0)
                .map(|r| r.amount.abs())
                .sum::<i64>();
        if self.total_spent != expected {
            return Err(AccountInvariantError::SpentMismatch {
                expected,
                actual: self.total_spent,
            });
        }
        Ok(())
    }
}
