use super::*;
use proptest::prelude::*;
use uuid::Uuid;

fn programmer() -> ProfessionDefinition {
    Catalog::standard()
        .profession("programmer")
        .cloned()
        .expect("programmer in standard catalog")
}

#[test]
fn test_standard_catalog_is_valid() {
    let catalog = Catalog::standard();
    catalog.validate().expect("standard catalog validates");
    assert_eq!(catalog.professions.len(), 10);
    assert_eq!(catalog.events.len(), 20);
    assert_eq!(catalog.events.iter().filter(|e| e.has_choice()).count(), 7);
}

#[test]
fn test_catalog_rejects_duplicate_event() {
    let mut catalog = Catalog::standard();
    let duplicate = catalog.events[0].clone();
    catalog.events.push(duplicate);
    assert!(matches!(
        catalog.validate(),
        Err(CatalogError::DuplicateEvent { .. })
    ));
}

#[test]
fn test_catalog_rejects_negative_weight_and_bad_tax() {
    let mut catalog = Catalog::standard();
    catalog.events[3].weight = -0.5;
    assert!(matches!(
        catalog.validate(),
        Err(CatalogError::InvalidWeight { .. })
    ));

    let mut catalog = Catalog::standard();
    catalog.professions[0].tax_rate = 1.5;
    assert!(matches!(
        catalog.validate(),
        Err(CatalogError::RateOutOfRange {
            field: "tax_rate",
            ..
        })
    ));
}

#[test]
fn test_catalog_rejects_empty_events() {
    let catalog = Catalog::new(Catalog::standard().professions, Vec::new());
    assert_eq!(catalog.validate(), Err(CatalogError::NoEvents));
}

#[test]
fn test_assign_profession_seeds_ledger() {
    let mut account = Account::new(7, "Ada");
    account.assign_profession(&programmer(), 5000);
    assert_eq!(account.balance, 13_000);
    assert_eq!(account.total_earned, 8000);
    assert_eq!(account.total_spent, 50_000);
    assert_eq!(account.ledger.len(), 1);
    assert_eq!(account.ledger[0].kind, TransactionKind::Bonus);
    assert!(account.ready);
    account.validate_invariants().expect("valid invariants");
}

#[test]
fn test_zero_amount_is_ledgered_without_totals() {
    let mut account = Account::new(1, "Bo");
    account.assign_profession(&programmer(), 5000);
    let (earned, spent) = (account.total_earned, account.total_spent);
    account.record("Skip It", 0, TransactionKind::Expense, 1);
    assert_eq!(account.ledger.len(), 2);
    assert_eq!((account.total_earned, account.total_spent), (earned, spent));
}

#[test]
fn test_validate_invariants_detects_drift() {
    let mut account = Account::new(1, "Cy");
    account.assign_profession(&programmer(), 5000);
    account.balance += 1;
    assert!(matches!(
        account.validate_invariants(),
        Err(AccountInvariantError::BalanceMismatch { .. })
    ));
}

#[test]
fn test_ranking_and_winner() {
    let mut session = Session::new(Uuid::new_v4(), GameMode::Solo, 12);
    for (id, balance) in [(1, 300), (2, 900), (3, 900), (4, -50)] {
        let mut account = Account::new(id, format!("p{id}"));
        account.balance = balance;
        session.roster.push(account);
    }
    let ranked: Vec<AccountId> = session.ranking().iter().map(|a| a.id).collect();
    assert_eq!(ranked, vec![2, 3, 1, 4]);
    assert_eq!(session.winner().map(|a| a.id), Some(2));
}

#[test]
fn test_all_ready_requires_roster() {
    let mut session = Session::new(Uuid::new_v4(), GameMode::Solo, 3);
    assert!(!session.all_ready());
    session.roster.push(Account::new(1, "a"));
    assert!(!session.all_ready());
    session.roster[0].ready = true;
    assert!(session.all_ready());
}

#[test]
fn test_format_money() {
    assert_eq!(format_money(0, true), "$0");
    assert_eq!(format_money(999, false), "$999");
    assert_eq!(format_money(1234, false), "$1,234");
    assert_eq!(format_money(1234, true), "+$1,234");
    assert_eq!(format_money(-1_234_567, true), "-$1,234,567");
}

#[test]
fn test_config_defaults_from_empty_yaml() {
    let config = GameConfig::from_yaml("{}").expect("empty config parses");
    assert_eq!(config, GameConfig::default());
    assert_eq!(config.round_limit, 12);
    assert_eq!(config.starting_cash, 5000);
    assert!((config.event_chance - 0.7).abs() < f64::EPSILON);
}

#[test]
fn test_config_rejects_zero_rounds() {
    assert!(matches!(
        GameConfig::from_yaml("round_limit: 0"),
        Err(ConfigError::InvalidNonZero {
            field: "round_limit",
            ..
        })
    ));
    assert!(matches!(
        GameConfig::from_yaml("event_chance: 1.5"),
        Err(ConfigError::EventChanceOutOfRange { .. })
    ));
}

#[test]
fn test_config_inline_catalog() {
    let yaml = r#"
round_limit: 3
catalog:
  professions:
    - id: clerk
      name: Clerk
      tier: low
      monthly_salary: 2000
  events:
    - id: flat_tire
      name: Flat Tire
      category: expense
      base_amount: -1200
      weight: 1.0
"#;
    let config = GameConfig::from_yaml(yaml).expect("config parses");
    let catalog = config.catalog();
    assert_eq!(catalog.events.len(), 1);
    assert!(catalog.events[0].can_repeat);
    assert_eq!(catalog.events[0].min_round, 1);
    assert_eq!(catalog.professions[0].medical_expense_modifier, 1.0);
}

#[test]
fn test_envelope_wire_format() {
    let envelope = Envelope {
        sender: 0,
        seq: 4,
        message: SyncMessage::EventOutcome {
            round: 2,
            account_index: 1,
            event_id: None,
        },
    };
    let json: serde_json::Value = serde_json::from_slice(&envelope.encode().unwrap()).unwrap();
    assert_eq!(json["message"]["type"], "event_outcome");
    assert!(json["message"]["event_id"].is_null());
    assert_eq!(Envelope::decode(&envelope.encode().unwrap()).unwrap(), envelope);
    assert!(Envelope::decode(b"{\"sender\":0}").is_err());

    let gone = SyncMessage::AccountDisconnected { account_index: 2 };
    assert_eq!(gone.kind(), "account_disconnected");
    assert_eq!(serde_json::to_value(&gone).unwrap()["type"], "account_disconnected");
}

fn arb_entry() -> impl Strategy<Value = (i64, u8)> {
    (-5_000i64..5_000, 0u8..6)
}

fn kind_of(tag: u8) -> TransactionKind {
    match tag {
        0 => TransactionKind::Salary,
        1 => TransactionKind::Income,
        2 => TransactionKind::Expense,
        3 => TransactionKind::Investment,
        4 => TransactionKind::Bonus,
        _ => TransactionKind::Penalty,
    }
}

proptest! {
    /// Balance always equals the starting stake plus the ledger sum.
    #[test]
    fn prop_balance_matches_ledger(
        stake in 0i64..20_000,
        entries in prop::collection::vec(arb_entry(), 0..64),
    ) {
        let mut account = Account::new(1, "prop");
        account.assign_profession(&programmer(), stake);
        let mut earned = account.total_earned;
        let mut spent = account.total_spent;
        for (round, (amount, tag)) in entries.into_iter().enumerate() {
            account.record("entry", amount, kind_of(tag), round as u32 + 1);
            prop_assert!(account.total_earned >= earned);
            prop_assert!(account.total_spent >= spent);
            earned = account.total_earned;
            spent = account.total_spent;
        }
        let sum: i64 = account.ledger.iter().map(|r| r.amount).sum();
        prop_assert_eq!(account.balance, stake + sum);
        prop_assert!(account.validate_invariants().is_ok());
    }
}
