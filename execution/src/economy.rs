//! Monetary transformations over a single account.
//!
//! Every step books exactly one ledger entry through [`Account::record`], which
//! moves balance and the cumulative totals together. Amounts are rounded
//! half-to-even so that replicas compute identical salaries.

use moneymatters_types::{
    Account, EventCategory, EventChoice, FinancialEventDefinition, ProfessionDefinition,
    TransactionKind,
};
use tracing::{debug, warn};

/// Outcome of settling a freshly drawn event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Settlement {
    /// The event moved this signed amount.
    Moved(i64),
    /// The event offers choices; nothing moves until one is picked.
    AwaitingChoice,
    /// A choice-free investment or lifestyle event. Nothing moves.
    NoMovement,
}

fn round_half_even(value: f64) -> i64 {
    value.round_ties_even() as i64
}

/// Salary after growth and tax.
///
/// `years_elapsed` counts completed rounds, so the first round pays the base salary.
pub fn net_salary(profession: &ProfessionDefinition, years_elapsed: u32) -> i64 {
    let growth = 1.0 + profession.salary_growth_rate * f64::from(years_elapsed);
    let adjusted = round_half_even(profession.monthly_salary as f64 * growth);
    round_half_even(adjusted as f64 * (1.0 - profession.tax_rate))
}

/// Credits the round's net salary. `round` is 1-based.
pub fn pay_salary(account: &mut Account, profession: &ProfessionDefinition, round: u32) -> i64 {
    let amount = net_salary(profession, round.saturating_sub(1));
    account.record(
        format!("{} salary", profession.name),
        amount,
        TransactionKind::Salary,
        round,
    );
    debug!(account = account.id, round, amount, "salary paid");
    amount
}

/// Positive cost of an expense or emergency, after any insurance adjustment.
pub fn expense_amount(
    event: &FinancialEventDefinition,
    profession: Option<&ProfessionDefinition>,
) -> i64 {
    let mut amount = event.base_amount.unsigned_abs() as f64;
    if let Some(profession) = profession {
        if event.affected_by_profession_modifiers
            && event.category == EventCategory::Emergency
            && profession.has_health_insurance
        {
            amount *= profession.medical_expense_modifier;
        }
    }
    round_half_even(amount)
}

/// Charges an expense. The balance may go negative.
pub fn process_expense(
    account: &mut Account,
    event: &FinancialEventDefinition,
    profession: Option<&ProfessionDefinition>,
    round: u32,
) -> i64 {
    let cost = expense_amount(event, profession);
    if account.balance < cost {
        warn!(
            account = account.id,
            balance = account.balance,
            cost,
            event = %event.id,
            "insufficient balance, account goes negative"
        );
    }
    account.record(event.name.clone(), -cost, TransactionKind::Expense, round);
    -cost
}

pub fn process_income(account: &mut Account, event: &FinancialEventDefinition, round: u32) -> i64 {
    account.record(
        event.name.clone(),
        event.base_amount,
        TransactionKind::Bonus,
        round,
    );
    event.base_amount
}

/// Applies the picked choice. Zero-impact choices are still ledgered.
pub fn resolve_choice(
    account: &mut Account,
    event: &FinancialEventDefinition,
    choice: &EventChoice,
    round: u32,
) -> i64 {
    let kind = match (choice.impact >= 0, event.category) {
        (true, _) => TransactionKind::Income,
        (false, EventCategory::Investment) => TransactionKind::Investment,
        (false, _) => TransactionKind::Expense,
    };
    account.record(
        format!("{}: {}", event.name, choice.label),
        choice.impact,
        kind,
        round,
    );
    choice.impact
}

/// Settles a drawn event according to its category.
pub fn settle_event(
    account: &mut Account,
    event: &FinancialEventDefinition,
    profession: Option<&ProfessionDefinition>,
    round: u32,
) -> Settlement {
    if event.has_choice() {
        return Settlement::AwaitingChoice;
    }
    match event.category {
        EventCategory::Expense | EventCategory::Emergency => {
            Settlement::Moved(process_expense(account, event, profession, round))
        }
        EventCategory::Income | EventCategory::Opportunity => {
            Settlement::Moved(process_income(account, event, round))
        }
        EventCategory::Investment | EventCategory::Lifestyle => {
            debug!(event = %event.id, category = event.category.as_str(), "event moves no money");
            Settlement::NoMovement
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use moneymatters_types::Catalog;
    use proptest::prelude::*;

    fn standard_profession(id: &str) -> ProfessionDefinition {
        Catalog::standard().profession(id).cloned().unwrap()
    }

    fn standard_event(id: &str) -> FinancialEventDefinition {
        Catalog::standard().event(id).cloned().unwrap()
    }

    fn funded(profession: &ProfessionDefinition) -> Account {
        let mut account = Account::new(1, "test");
        account.assign_profession(profession, 5000);
        account
    }

    #[test]
    fn test_net_salary_first_round() {
        // 7500 * 0.78 = 5850
        assert_eq!(net_salary(&standard_profession("engineer"), 0), 5850);
        // 2200 * 0.90 = 1980
        assert_eq!(net_salary(&standard_profession("street_sweeper"), 0), 1980);
    }

    #[test]
    fn test_net_salary_growth() {
        // round(8200 * 1.12) = 9184; round(9184 * 0.8) = 7347.2 -> 7347
        assert_eq!(net_salary(&standard_profession("programmer"), 2), 7347);
    }

    #[test]
    fn test_net_salary_rounds_half_to_even() {
        let mut profession = standard_profession("cashier");
        profession.monthly_salary = 5;
        profession.salary_growth_rate = 0.0;
        profession.tax_rate = 0.5;
        // 2.5 rounds to 2
        assert_eq!(net_salary(&profession, 0), 2);
        profession.monthly_salary = 7;
        // 3.5 rounds to 4
        assert_eq!(net_salary(&profession, 0), 4);
    }

    #[test]
    fn test_pay_salary_books_one_entry() {
        let doctor = standard_profession("doctor");
        let mut account = funded(&doctor);
        let before = account.ledger.len();
        let paid = pay_salary(&mut account, &doctor, 1);
        assert_eq!(paid, 8640);
        assert_eq!(account.ledger.len(), before + 1);
        assert_eq!(account.ledger[before].kind, TransactionKind::Salary);
        assert_eq!(account.ledger[before].round, 1);
        account.validate_invariants().unwrap();
    }

    #[test]
    fn test_medical_emergency_insurance_modifier() {
        let emergency = standard_event("medical_emergency");
        assert_eq!(expense_amount(&emergency, Some(&standard_profession("doctor"))), 1750);
        assert_eq!(expense_amount(&emergency, Some(&standard_profession("chef"))), 3500);
        assert_eq!(expense_amount(&emergency, None), 3500);

        // Modifier-insensitive emergencies pay full price even when insured.
        let pet = standard_event("pet_emergency");
        assert_eq!(expense_amount(&pet, Some(&standard_profession("doctor"))), 900);
    }

    #[test]
    fn test_expense_may_go_negative() {
        let sweeper = standard_profession("street_sweeper");
        let mut account = funded(&sweeper);
        account.balance = 100;
        account.starting_stake = 100;
        let delta = process_expense(&mut account, &standard_event("car_repair"), Some(&sweeper), 1);
        assert_eq!(delta, -1200);
        assert_eq!(account.balance, -1100);
        account.validate_invariants().unwrap();
    }

    #[test]
    fn test_settle_event_dispatch() {
        let teacher = standard_profession("teacher");
        let mut account = funded(&teacher);
        assert_eq!(
            settle_event(&mut account, &standard_event("surprise_bonus"), Some(&teacher), 2),
            Settlement::Moved(2500)
        );
        assert_eq!(
            settle_event(&mut account, &standard_event("side_hustle"), Some(&teacher), 2),
            Settlement::Moved(1500)
        );
        assert_eq!(
            settle_event(&mut account, &standard_event("birthday_party"), Some(&teacher), 2),
            Settlement::AwaitingChoice
        );

        let mut lifestyle = standard_event("gym_membership");
        lifestyle.choices.clear();
        let before = account.ledger.len();
        assert_eq!(
            settle_event(&mut account, &lifestyle, Some(&teacher), 2),
            Settlement::NoMovement
        );
        assert_eq!(account.ledger.len(), before);
    }

    #[test]
    fn test_resolve_choice_kinds() {
        let teacher = standard_profession("teacher");
        let mut account = funded(&teacher);
        let stock = standard_event("stock_investment");
        let (earned, spent) = (account.total_earned, account.total_spent);

        assert_eq!(resolve_choice(&mut account, &stock, &stock.choices[2], 2), 0);
        assert_eq!(account.ledger.last().unwrap().kind, TransactionKind::Income);
        assert_eq!((account.total_earned, account.total_spent), (earned, spent));

        assert_eq!(resolve_choice(&mut account, &stock, &stock.choices[0], 2), -2000);
        assert_eq!(account.ledger.last().unwrap().kind, TransactionKind::Investment);
        assert_eq!(account.total_spent, spent + 2000);

        let party = standard_event("birthday_party");
        resolve_choice(&mut account, &party, &party.choices[1], 2);
        assert_eq!(account.ledger.last().unwrap().kind, TransactionKind::Expense);
        account.validate_invariants().unwrap();
    }

    proptest! {
        /// Net salary never shrinks as rounds elapse when growth is non-negative.
        #[test]
        fn prop_net_salary_monotonic(
            salary in 0i64..50_000,
            growth in 0.0f64..0.2,
            tax in 0.0f64..=1.0,
            years in 0u32..200,
        ) {
            let mut profession = standard_profession("cashier");
            profession.monthly_salary = salary;
            profession.salary_growth_rate = growth;
            profession.tax_rate = tax;
            prop_assert!(net_salary(&profession, years + 1) >= net_salary(&profession, years));
        }
    }
}
