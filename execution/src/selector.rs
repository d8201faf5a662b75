//! Weighted random event selection.
//!
//! Selection uses two independent draws: one decides whether any event occurs
//! this turn, the second picks among the eligible events in catalog order.

use moneymatters_types::{Account, Catalog, FinancialEventDefinition};
use tracing::debug;

use crate::rng::DrawSource;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EventSelector {
    event_chance: f64,
}

impl EventSelector {
    pub fn new(event_chance: f64) -> Self {
        Self { event_chance }
    }

    /// Events the account may draw in `round` (1-based), in catalog order.
    ///
    /// Non-repeatable events drop out once the account has encountered them.
    pub fn eligible_events<'a>(
        catalog: &'a Catalog,
        account: &Account,
        round: u32,
    ) -> Vec<&'a FinancialEventDefinition> {
        catalog
            .events
            .iter()
            .filter(|event| event.min_round <= round)
            .filter(|event| event.can_repeat || account.occurrence_count(&event.id) == 0)
            .collect()
    }

    /// Returns the first event whose cumulative weight reaches `roll`.
    ///
    /// `roll` is expected in `[0, total]`. Floating-point residue that leaves the
    /// roll above every cumulative sum falls back to the last eligible event.
    pub fn weighted_pick<'a>(
        eligible: &[&'a FinancialEventDefinition],
        roll: f64,
    ) -> Option<&'a FinancialEventDefinition> {
        let mut cumulative = 0.0;
        for event in eligible {
            cumulative += event.weight;
            if cumulative >= roll {
                return Some(event);
            }
        }
        eligible.last().copied()
    }

    /// Draws at most one event for `account` in `round`.
    pub fn select<'a>(
        &self,
        catalog: &'a Catalog,
        account: &Account,
        round: u32,
        draws: &mut dyn DrawSource,
    ) -> Option<&'a FinancialEventDefinition> {
        let occurrence = draws.next_unit();
        if occurrence > self.event_chance {
            debug!(account = account.id, round, occurrence, "no event this turn");
            return None;
        }

        let eligible = Self::eligible_events(catalog, account, round);
        if eligible.is_empty() {
            debug!(account = account.id, round, "no eligible events");
            return None;
        }

        let total: f64 = eligible.iter().map(|event| event.weight).sum();
        let roll = draws.next_unit() * total;
        let picked = Self::weighted_pick(&eligible, roll);
        if let Some(event) = picked {
            debug!(account = account.id, round, roll, total, event = %event.id, "event selected");
        }
        picked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rng::ScriptedDraws;
    use moneymatters_types::EventCategory;

    fn event(id: &str, weight: f64, min_round: u32, can_repeat: bool) -> FinancialEventDefinition {
        FinancialEventDefinition {
            id: id.to_string(),
            name: id.to_string(),
            description: String::new(),
            category: EventCategory::Expense,
            base_amount: -100,
            weight,
            min_round,
            can_repeat,
            affected_by_profession_modifiers: false,
            choices: Vec::new(),
        }
    }

    fn catalog(events: Vec<FinancialEventDefinition>) -> Catalog {
        Catalog::new(Catalog::standard().professions, events)
    }

    #[test]
    fn test_weighted_pick_walks_cumulative_weights() {
        let events = [event("a", 0.5, 1, true), event("b", 0.3, 1, true), event("c", 0.2, 1, true)];
        let eligible: Vec<&FinancialEventDefinition> = events.iter().collect();
        assert_eq!(EventSelector::weighted_pick(&eligible, 0.0).unwrap().id, "a");
        assert_eq!(EventSelector::weighted_pick(&eligible, 0.5).unwrap().id, "a");
        assert_eq!(EventSelector::weighted_pick(&eligible, 0.51).unwrap().id, "b");
        assert_eq!(EventSelector::weighted_pick(&eligible, 0.79).unwrap().id, "b");
        assert_eq!(EventSelector::weighted_pick(&eligible, 0.95).unwrap().id, "c");
    }

    #[test]
    fn test_weighted_pick_total_returns_last() {
        let events = [event("a", 0.5, 1, true), event("b", 0.3, 1, true), event("c", 0.2, 1, true)];
        let eligible: Vec<&FinancialEventDefinition> = events.iter().collect();
        let total: f64 = events.iter().map(|e| e.weight).sum();
        assert_eq!(EventSelector::weighted_pick(&eligible, total).unwrap().id, "c");
        assert_eq!(
            EventSelector::weighted_pick(&eligible, total + 1e-9).unwrap().id,
            "c"
        );
        assert!(EventSelector::weighted_pick(&[], 0.3).is_none());
    }

    #[test]
    fn test_eligibility_respects_min_round_and_repeat() {
        let catalog = catalog(vec![
            event("early", 1.0, 1, true),
            event("late", 1.0, 3, true),
            event("once", 1.0, 1, false),
        ]);
        let mut account = Account::new(1, "a");
        let ids = |events: Vec<&FinancialEventDefinition>| -> Vec<String> {
            events.into_iter().map(|e| e.id.clone()).collect()
        };

        assert_eq!(
            ids(EventSelector::eligible_events(&catalog, &account, 1)),
            vec!["early", "once"]
        );
        assert_eq!(
            ids(EventSelector::eligible_events(&catalog, &account, 3)),
            vec!["early", "late", "once"]
        );
        account.note_occurrence("once");
        account.note_occurrence("early");
        assert_eq!(
            ids(EventSelector::eligible_events(&catalog, &account, 3)),
            vec!["early", "late"]
        );
    }

    #[test]
    fn test_select_uses_two_draws() {
        let catalog = catalog(vec![event("a", 0.5, 1, true), event("b", 0.5, 1, true)]);
        let account = Account::new(1, "a");
        let selector = EventSelector::new(0.7);

        let mut draws = ScriptedDraws::new([0.7, 0.9]);
        assert_eq!(selector.select(&catalog, &account, 1, &mut draws).unwrap().id, "b");
        assert_eq!(draws.remaining(), 0);

        // Occurrence roll above the chance consumes only one draw.
        let mut draws = ScriptedDraws::new([0.71, 0.0]);
        assert!(selector.select(&catalog, &account, 1, &mut draws).is_none());
        assert_eq!(draws.remaining(), 1);
    }

    #[test]
    fn test_select_empty_eligible_set() {
        let catalog = catalog(vec![event("late", 1.0, 5, true)]);
        let account = Account::new(1, "a");
        let mut draws = ScriptedDraws::repeating(0.0);
        assert!(EventSelector::new(1.0)
            .select(&catalog, &account, 1, &mut draws)
            .is_none());
    }

    #[test]
    fn test_non_repeatable_never_returned_twice() {
        let catalog = catalog(vec![event("once", 10.0, 1, false), event("filler", 0.1, 1, true)]);
        let mut account = Account::new(1, "a");
        let selector = EventSelector::new(1.0);
        let mut draws = ScriptedDraws::repeating(0.0);
        let mut seen = 0;
        for round in 1..=20 {
            let picked = selector
                .select(&catalog, &account, round, &mut draws)
                .map(|e| e.id.clone())
                .unwrap();
            if picked == "once" {
                seen += 1;
            }
            account.note_occurrence(&picked);
        }
        assert_eq!(seen, 1);
    }
}
