//! Shared builders for orchestrator and multi-replica tests.

use std::collections::VecDeque;
use std::sync::Arc;

use moneymatters_types::{
    Account, Catalog, EventCategory, EventChoice, Envelope, FinancialEventDefinition, GameConfig,
    GameMode, ReplicaId, Session, Target,
};
use uuid::Uuid;

use crate::orchestrator::{OutcomeSource, RoundStatus, TurnOrchestrator};
use crate::registry::{RegistryEvent, SessionRegistry};
use crate::rng::{DrawSource, SeededDraws};
use crate::sync::{AuthoritySynchronizer, Outbound};

pub const STARTING_CASH: i64 = 5000;

pub fn expense(id: &str, amount: i64, weight: f64) -> FinancialEventDefinition {
    FinancialEventDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        category: EventCategory::Expense,
        base_amount: amount,
        weight,
        min_round: 1,
        can_repeat: true,
        affected_by_profession_modifiers: false,
        choices: Vec::new(),
    }
}

pub fn choice_event(id: &str, impacts: &[i64]) -> FinancialEventDefinition {
    FinancialEventDefinition {
        id: id.to_string(),
        name: id.to_string(),
        description: String::new(),
        category: EventCategory::Lifestyle,
        base_amount: 0,
        weight: 1.0,
        min_round: 1,
        can_repeat: true,
        affected_by_profession_modifiers: false,
        choices: impacts
            .iter()
            .enumerate()
            .map(|(i, impact)| EventChoice {
                label: format!("option {i}"),
                impact: *impact,
                result_text: String::new(),
            })
            .collect(),
    }
}

pub fn catalog_with(events: Vec<FinancialEventDefinition>) -> Catalog {
    Catalog::new(Catalog::standard().professions, events)
}

pub fn config(round_limit: u32, event_chance: f64) -> GameConfig {
    GameConfig {
        round_limit,
        event_chance,
        starting_cash: STARTING_CASH,
        ..GameConfig::default()
    }
}

/// Orchestrator with one account per profession id, ready to play.
pub fn ready_orchestrator(
    catalog: Catalog,
    config: &GameConfig,
    mode: GameMode,
    source: OutcomeSource,
    draws: impl DrawSource + 'static,
    professions: &[&str],
) -> TurnOrchestrator {
    let session = Session::new(Uuid::nil(), mode, config.round_limit);
    let mut orchestrator = TurnOrchestrator::new(
        session,
        Arc::new(catalog),
        config,
        source,
        Box::new(draws),
    );
    orchestrator.begin_role_selection().unwrap();
    for (index, profession) in professions.iter().enumerate() {
        orchestrator
            .add(Account::new(index as u64 + 1, format!("player{index}")))
            .unwrap();
        orchestrator.choose_profession(index, profession).unwrap();
    }
    orchestrator.begin_play().unwrap();
    orchestrator.drain_events();
    orchestrator
}

/// Replicas wired through an in-memory ordered queue.
pub struct Mesh {
    pub replicas: Vec<AuthoritySynchronizer>,
    pub online: Vec<bool>,
    queue: VecDeque<(ReplicaId, Envelope)>,
    pub delivered: usize,
}

impl Mesh {
    pub fn new(catalog: Catalog, config: &GameConfig, professions: &[&str], seed: u64) -> Self {
        let catalog = Arc::new(catalog);
        let replicas = (0..professions.len())
            .map(|local| {
                let orchestrator = ready_orchestrator(
                    (*catalog).clone(),
                    config,
                    GameMode::MultiReplica,
                    OutcomeSource::Replica,
                    SeededDraws::new(seed),
                    professions,
                );
                AuthoritySynchronizer::new(local, 0, orchestrator)
            })
            .collect();
        Self {
            replicas,
            online: vec![true; professions.len()],
            queue: VecDeque::new(),
            delivered: 0,
        }
    }

    pub fn authority(&self) -> ReplicaId {
        (0..self.replicas.len())
            .find(|&r| self.online[r] && self.replicas[r].is_authority())
            .unwrap_or(0)
    }

    pub fn dispatch(&mut self, batch: Vec<Outbound>) {
        for outbound in batch {
            let sender = outbound.envelope.sender;
            let recipients: Vec<ReplicaId> = match outbound.target {
                Target::All => (0..self.replicas.len()).collect(),
                Target::Others => (0..self.replicas.len()).filter(|&r| r != sender).collect(),
                Target::Authority => vec![outbound.authority],
            };
            for recipient in recipients {
                if self.online[recipient] {
                    self.queue.push_back((recipient, outbound.envelope.clone()));
                }
            }
        }
    }

    /// Delivers until no message is in flight.
    pub fn run(&mut self) {
        while let Some((recipient, envelope)) = self.queue.pop_front() {
            if !self.online[recipient] {
                continue;
            }
            self.delivered += 1;
            let out = self.replicas[recipient].handle(envelope);
            self.dispatch(out);
        }
    }

    /// Lets every online replica with a local decision pending pick `choice`
    /// (or acknowledge), delivering in between. Returns when nothing is pending.
    pub fn settle(&mut self, choice: usize) {
        loop {
            self.run();
            let Some(replica) = (0..self.replicas.len()).find(|&r| {
                self.online[r]
                    && matches!(
                        self.replicas[r].status(),
                        RoundStatus::AwaitingDecision { account_index, .. } if account_index == r
                    )
            }) else {
                return;
            };
            let has_choice = self.replicas[replica]
                .orchestrator()
                .pending_event()
                .map(|(_, event)| event.has_choice())
                .unwrap_or(false);
            let out = if has_choice {
                self.replicas[replica].choose_local(choice)
            } else {
                self.replicas[replica].acknowledge_local_event()
            };
            self.dispatch(out);
        }
    }

    pub fn play_round(&mut self, requester: ReplicaId, choice: usize) {
        let out = self.replicas[requester].request_start_round();
        self.dispatch(out);
        self.settle(choice);
    }

    /// Delivers one lobby report to a single replica.
    pub fn notify(&mut self, replica: ReplicaId, event: RegistryEvent) {
        let out = self.replicas[replica].on_registry_event(event);
        self.dispatch(out);
    }

    /// Takes `replica` offline and reports the disconnect to everyone still online.
    pub fn disconnect(&mut self, replica: ReplicaId) {
        self.online[replica] = false;
        let id = self.replicas[replica].session().roster[replica].id;
        for r in 0..self.replicas.len() {
            if self.online[r] {
                let out = self.replicas[r].on_registry_event(RegistryEvent::Disconnected { id });
                self.dispatch(out);
            }
        }
    }

    pub fn assert_converged(&self) {
        let reference = self
            .online
            .iter()
            .position(|&o| o)
            .expect("at least one replica online");
        let expected = money_view(self.replicas[reference].session().roster.as_slice());
        for (r, replica) in self.replicas.iter().enumerate() {
            if self.online[r] {
                assert_eq!(
                    money_view(replica.session().roster.as_slice()),
                    expected,
                    "replica {r} diverged"
                );
                assert_eq!(
                    replica.session().completed_rounds,
                    self.replicas[reference].session().completed_rounds
                );
            }
        }
    }
}

pub fn money_view(roster: &[Account]) -> Vec<(i64, i64, i64, bool)> {
    roster
        .iter()
        .map(|a| (a.balance, a.total_earned, a.total_spent, a.connected))
        .collect()
}
