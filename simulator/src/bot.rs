use moneymatters_types::{Catalog, FinancialEventDefinition};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// What a bot does with its pending event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Acknowledge,
    Choose(usize),
}

/// Scripted participant. Idle bots never answer and rely on the decision timeout.
#[derive(Debug)]
pub struct Bot {
    rng: StdRng,
    idle: bool,
}

impl Bot {
    pub fn new(seed: u64, index: usize, idle: bool) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
            idle,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.idle
    }

    pub fn decide(&mut self, event: &FinancialEventDefinition) -> Option<Decision> {
        if self.idle {
            return None;
        }
        if event.has_choice() {
            return Some(Decision::Choose(self.rng.gen_range(0..event.choices.len())));
        }
        Some(Decision::Acknowledge)
    }
}

/// Professions handed out round-robin in catalog order.
pub fn profession_for(catalog: &Catalog, index: usize) -> Option<&str> {
    if catalog.professions.is_empty() {
        return None;
    }
    Some(catalog.professions[index % catalog.professions.len()].id.as_str())
}
