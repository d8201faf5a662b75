use std::fmt;

use moneymatters_types::{format_money, GameMode, Session};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Standing {
    pub rank: usize,
    pub label: String,
    pub profession: Option<String>,
    pub balance: i64,
    pub earned: i64,
    pub spent: i64,
    pub profit: i64,
    pub connected: bool,
}

/// Final result of a match, printable as text or JSON.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub session: String,
    pub mode: GameMode,
    pub seed: u64,
    pub rounds: u32,
    pub winner: Option<String>,
    pub standings: Vec<Standing>,
}

impl Summary {
    pub fn new(session: &Session, seed: u64) -> Self {
        let standings = session
            .ranking()
            .into_iter()
            .enumerate()
            .map(|(i, account)| Standing {
                rank: i + 1,
                label: account.label.clone(),
                profession: account.profession.clone(),
                balance: account.balance,
                earned: account.total_earned,
                spent: account.total_spent,
                profit: account.total_profit(),
                connected: account.connected,
            })
            .collect();
        Self {
            session: session.id.to_string(),
            mode: session.mode,
            seed,
            rounds: session.completed_rounds,
            winner: session.winner().map(|account| account.label.clone()),
            standings,
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:?} match {} finished after {} rounds (seed {})",
            self.mode, self.session, self.rounds, self.seed
        )?;
        for standing in &self.standings {
            writeln!(
                f,
                "{:>2}. {:<8} {:<16} {:>12}  earned {:>12}  spent {:>12}  profit {:>12}{}",
                standing.rank,
                standing.label,
                standing.profession.as_deref().unwrap_or("-"),
                format_money(standing.balance, false),
                format_money(standing.earned, false),
                format_money(standing.spent, false),
                format_money(standing.profit, true),
                if standing.connected { "" } else { "  (left)" },
            )?;
        }
        match &self.winner {
            Some(winner) => write!(f, "winner: {winner}"),
            None => write!(f, "no winner"),
        }
    }
}
