//! Read-only profession and financial event catalog.
//!
//! The catalog is loaded once before a session starts and is never mutated
//! during play. Replicas resolve broadcast event identifiers against their own
//! copy, so every replica must load the same catalog.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

mod standard;

/// Salary band of a profession.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfessionTier {
    Low,
    Medium,
    High,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfessionDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub tier: ProfessionTier,
    /// Gross pay per round before growth and tax.
    pub monthly_salary: i64,
    /// Signing bonus credited when the profession is chosen.
    #[serde(default)]
    pub starting_bonus: i64,
    /// Fractional pay growth per elapsed round.
    #[serde(default)]
    pub salary_growth_rate: f64,
    /// Fraction of adjusted salary withheld, in `[0, 1]`.
    #[serde(default)]
    pub tax_rate: f64,
    /// Up-front training cost already paid before the match starts.
    #[serde(default)]
    pub education_cost_paid: i64,
    /// Multiplier applied to emergency expenses when insured. Values below 1 reduce cost.
    #[serde(default = "default_medical_expense_modifier")]
    pub medical_expense_modifier: f64,
    #[serde(default)]
    pub has_health_insurance: bool,
    #[serde(default)]
    pub has_retirement_plan: bool,
}

fn default_medical_expense_modifier() -> f64 {
    1.0
}

/// Category of a financial event; decides how its base amount is settled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    Expense,
    Income,
    Investment,
    Emergency,
    Opportunity,
    Lifestyle,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Expense => "expense",
            EventCategory::Income => "income",
            EventCategory::Investment => "investment",
            EventCategory::Emergency => "emergency",
            EventCategory::Opportunity => "opportunity",
            EventCategory::Lifestyle => "lifestyle",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventChoice {
    pub label: String,
    /// Signed monetary impact applied when this choice is taken.
    pub impact: i64,
    #[serde(default)]
    pub result_text: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialEventDefinition {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category: EventCategory,
    /// Signed amount settled directly. Ignored when the event offers choices.
    #[serde(default)]
    pub base_amount: i64,
    /// Relative draw weight.
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// First round (1-based) in which the event may be drawn.
    #[serde(default = "default_min_round")]
    pub min_round: u32,
    #[serde(default = "default_can_repeat")]
    pub can_repeat: bool,
    #[serde(default)]
    pub affected_by_profession_modifiers: bool,
    #[serde(default)]
    pub choices: Vec<EventChoice>,
}

fn default_weight() -> f64 {
    0.1
}

fn default_min_round() -> u32 {
    1
}

fn default_can_repeat() -> bool {
    true
}

impl FinancialEventDefinition {
    pub fn has_choice(&self) -> bool {
        !self.choices.is_empty()
    }

    pub fn choice(&self, index: usize) -> Option<&EventChoice> {
        self.choices.get(index)
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum CatalogError {
    #[error("catalog has no financial events")]
    NoEvents,
    #[error("catalog has no professions")]
    NoProfessions,
    #[error("duplicate profession id: {id}")]
    DuplicateProfession { id: String },
    #[error("duplicate event id: {id}")]
    DuplicateEvent { id: String },
    #[error("event {id} has invalid weight {weight}")]
    InvalidWeight { id: String, weight: f64 },
    #[error("profession {id} has {field} out of range: {value}")]
    RateOutOfRange {
        id: String,
        field: &'static str,
        value: f64,
    },
    #[error("event {id} choice {index} has an empty label")]
    UnlabeledChoice { id: String, index: usize },
}

/// Professions and events available to a session, in catalog order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub professions: Vec<ProfessionDefinition>,
    #[serde(default)]
    pub events: Vec<FinancialEventDefinition>,
}

impl Catalog {
    pub fn new(
        professions: Vec<ProfessionDefinition>,
        events: Vec<FinancialEventDefinition>,
    ) -> Self {
        Self {
            professions,
            events,
        }
    }

    /// The ten professions and twenty events shipped with the game.
    pub fn standard() -> Self {
        Self {
            professions: standard::professions(),
            events: standard::events(),
        }
    }

    pub fn profession(&self, id: &str) -> Option<&ProfessionDefinition> {
        self.professions.iter().find(|p| p.id == id)
    }

    pub fn event(&self, id: &str) -> Option<&FinancialEventDefinition> {
        self.events.iter().find(|e| e.id == id)
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.professions.is_empty() {
            return Err(CatalogError::NoProfessions);
        }
        if self.events.is_empty() {
            return Err(CatalogError::NoEvents);
        }

        let mut seen = BTreeSet::new();
        for profession in &self.professions {
            if !seen.insert(profession.id.as_str()) {
                return Err(CatalogError::DuplicateProfession {
                    id: profession.id.clone(),
                });
            }
            check_rate(&profession.id, "tax_rate", profession.tax_rate, 1.0)?;
            check_rate(
                &profession.id,
                "salary_growth_rate",
                profession.salary_growth_rate,
                f64::MAX,
            )?;
            check_rate(
                &profession.id,
                "medical_expense_modifier",
                profession.medical_expense_modifier,
                f64::MAX,
            )?;
        }

        let mut seen = BTreeSet::new();
        for event in &self.events {
            if !seen.insert(event.id.as_str()) {
                return Err(CatalogError::DuplicateEvent {
                    id: event.id.clone(),
                });
            }
            if !event.weight.is_finite() || event.weight < 0.0 {
                return Err(CatalogError::InvalidWeight {
                    id: event.id.clone(),
                    weight: event.weight,
                });
            }
            if let Some(index) = event.choices.iter().position(|c| c.label.trim().is_empty()) {
                return Err(CatalogError::UnlabeledChoice {
                    id: event.id.clone(),
                    index,
                });
            }
        }
        Ok(())
    }
}

fn check_rate(id: &str, field: &'static str, value: f64, max: f64) -> Result<(), CatalogError> {
    if !value.is_finite() || value < 0.0 || value > max {
        return Err(CatalogError::RateOutOfRange {
            id: id.to_string(),
            field,
            value,
        });
    }
    Ok(())
}
