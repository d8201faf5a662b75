//! Multi-replica match over in-process channels.
//!
//! Each participant runs one task that owns its [`AuthoritySynchronizer`] and
//! processes its control queue and inbox one item at a time. The driver asks a
//! replica to start each round, then waits until every remaining replica has
//! reported the round complete before injecting departures or the next start.
//! Control items take priority over the inbox, so the authority orders a
//! departure before any round start that follows it, and the other replicas
//! learn of the authority's own departure before its successor's messages.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::try_join_all;
use moneymatters_execution::{
    AuthoritySynchronizer, ChannelHub, Inbox, Outbound, OutcomeSource, RegistryEvent, RoundStatus,
    SeededDraws, Transport,
};
use moneymatters_types::{AccountId, GameConfig, ReplicaId, Session};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{account_id, prepare, Bot, Decision, MatchPlan, SimulatorError};

#[derive(Debug)]
enum Control {
    StartRound,
    Disconnected { id: AccountId },
    Expire,
    Shutdown,
}

#[derive(Debug)]
struct Report {
    replica: ReplicaId,
    status: RoundStatus,
}

struct Replica {
    sync: AuthoritySynchronizer,
    bot: Bot,
    hub: Arc<ChannelHub>,
    reports: mpsc::UnboundedSender<Report>,
    /// Round of the last decision this replica sent, so it is not repeated
    /// while the authority's answer is in flight.
    decided_round: Option<u32>,
}

impl Replica {
    async fn run(
        mut self,
        mut inbox: Inbox,
        mut control: mpsc::UnboundedReceiver<Control>,
    ) -> Session {
        let local = self.sync.local();
        loop {
            let out = tokio::select! {
                biased;
                command = control.recv() => match command {
                    Some(Control::StartRound) => self.sync.request_start_round(),
                    Some(Control::Disconnected { id }) => self
                        .sync
                        .on_registry_event(RegistryEvent::Disconnected { id }),
                    Some(Control::Expire) => self.sync.expire_decision(),
                    Some(Control::Shutdown) | None => break,
                },
                bytes = inbox.recv() => match bytes {
                    Some(bytes) => self.sync.handle_bytes(&bytes),
                    None => break,
                },
            };
            self.send(&out);
            let decided = self.decide();
            self.send(&decided);

            for event in self.sync.drain_notifications() {
                debug!(replica = local, ?event, "turn event");
            }
            let report = Report {
                replica: local,
                status: self.sync.status(),
            };
            if self.reports.send(report).is_err() {
                break;
            }
        }
        debug!(replica = local, "replica stopped");
        self.sync.session().clone()
    }

    fn send(&self, batch: &[Outbound]) {
        if let Err(err) = self.hub.send_all(batch) {
            warn!(?err, replica = self.sync.local(), "delivery failed");
        }
    }

    /// Answers the local account's pending event, once per round.
    fn decide(&mut self) -> Vec<Outbound> {
        let local = self.sync.local();
        let round = self.sync.session().current_round();
        if self.decided_round == Some(round) {
            return Vec::new();
        }
        let decision = match self.sync.orchestrator().pending_event() {
            Some((index, event)) if index == local => self.bot.decide(event),
            _ => return Vec::new(),
        };
        let Some(decision) = decision else {
            return Vec::new();
        };
        self.decided_round = Some(round);
        match decision {
            Decision::Choose(choice) => self.sync.choose_local(choice),
            Decision::Acknowledge => self.sync.acknowledge_local_event(),
        }
    }
}

fn round_settled(status: &RoundStatus, round: u32, last: bool) -> bool {
    match status {
        RoundStatus::GameOver => true,
        RoundStatus::RoundComplete { round: done } => !last && *done == round,
        _ => false,
    }
}

/// Plays a whole match with one replica task per participant. Replica 0
/// starts as the authority. Returns the authority's final session after
/// checking that every remaining replica agrees on all money.
pub async fn run_multi(config: &GameConfig, plan: &MatchPlan) -> Result<Session, SimulatorError> {
    plan.validate()?;
    let catalog = Arc::new(config.catalog());
    let session_id = Uuid::new_v4();
    let (hub, inboxes) = ChannelHub::new(plan.players);
    let (reports_tx, mut reports) = mpsc::unbounded_channel();

    let mut controls = Vec::with_capacity(plan.players);
    let mut tasks = Vec::with_capacity(plan.players);
    for ((local, inbox), bot) in inboxes.into_iter().enumerate().zip(plan.bots()) {
        // Every replica starts as a follower; the synchronizer promotes replica 0.
        let orchestrator = prepare(
            session_id,
            config,
            Arc::clone(&catalog),
            plan,
            OutcomeSource::Replica,
            SeededDraws::new(plan.seed),
        )?;
        let replica = Replica {
            sync: AuthoritySynchronizer::new(local, 0, orchestrator),
            bot,
            hub: Arc::clone(&hub),
            reports: reports_tx.clone(),
            decided_round: None,
        };
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        controls.push(control_tx);
        tasks.push(tokio::spawn(replica.run(inbox, control_rx)));
    }
    drop(reports_tx);

    let mut online = vec![true; plan.players];
    let mut latest: BTreeMap<ReplicaId, RoundStatus> = BTreeMap::new();
    let command = |controls: &[mpsc::UnboundedSender<Control>], replica: ReplicaId, control| {
        if controls[replica].send(control).is_err() {
            warn!(replica, "replica task is gone");
        }
    };

    for round in 1..=config.round_limit {
        for index in plan.disconnects_before(round) {
            if !online[index] {
                continue;
            }
            online[index] = false;
            info!(round, index, "participant leaves");
            command(&controls, index, Control::Shutdown);
            for replica in (0..plan.players).filter(|&r| online[r]) {
                command(
                    &controls,
                    replica,
                    Control::Disconnected {
                        id: account_id(index),
                    },
                );
            }
        }
        let Some(authority) = online.iter().position(|&o| o) else {
            return Err(SimulatorError::NoneLeft);
        };

        // Round starts rotate through the remaining participants.
        let requester = (0..plan.players)
            .map(|offset| (round as usize - 1 + offset) % plan.players)
            .find(|&r| online[r])
            .unwrap_or(authority);
        info!(round, requester, authority, "requesting round start");
        command(&controls, requester, Control::StartRound);

        let last = round == config.round_limit;
        loop {
            let settled = (0..plan.players)
                .filter(|&r| online[r])
                .all(|r| matches!(latest.get(&r), Some(s) if round_settled(s, round, last)));
            if settled {
                break;
            }
            let report = match plan.decision_timeout {
                Some(limit) => match timeout(limit, reports.recv()).await {
                    Ok(report) => report,
                    Err(_) => {
                        warn!(round, authority, "decision timed out");
                        command(&controls, authority, Control::Expire);
                        continue;
                    }
                },
                None => reports.recv().await,
            };
            let Some(report) = report else {
                return Err(SimulatorError::ReplicaTask {
                    reason: "all replicas stopped".to_string(),
                });
            };
            latest.insert(report.replica, report.status);
        }
        if latest.get(&authority) == Some(&RoundStatus::GameOver) {
            break;
        }
    }

    for (replica, control) in controls.iter().enumerate() {
        if online[replica] && control.send(Control::Shutdown).is_err() {
            debug!(replica, "replica already stopped");
        }
    }
    let sessions = try_join_all(tasks)
        .await
        .map_err(|err| SimulatorError::ReplicaTask {
            reason: err.to_string(),
        })?;

    let reference = online.iter().position(|&o| o).ok_or(SimulatorError::NoneLeft)?;
    let money = |session: &Session| {
        session
            .roster
            .iter()
            .map(|a| (a.balance, a.total_earned, a.total_spent))
            .collect::<Vec<_>>()
    };
    let expected = money(&sessions[reference]);
    for (replica, session) in sessions.iter().enumerate() {
        if online[replica] && money(session) != expected {
            return Err(SimulatorError::Diverged { replica, reference });
        }
    }
    info!(replicas = online.iter().filter(|&&o| o).count(), "replicas converged");
    Ok(sessions[reference].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Disconnect;
    use moneymatters_types::{GameMode, Phase};
    use std::time::Duration;

    fn plan(players: usize, seed: u64) -> MatchPlan {
        MatchPlan {
            players,
            mode: GameMode::MultiReplica,
            seed,
            disconnects: Vec::new(),
            idle: Vec::new(),
            decision_timeout: None,
        }
    }

    #[tokio::test]
    async fn test_multi_match_converges() {
        let config = GameConfig {
            round_limit: 6,
            ..GameConfig::default()
        };
        let session = run_multi(&config, &plan(4, 17)).await.unwrap();
        assert_eq!(session.phase, Phase::GameOver);
        assert_eq!(session.completed_rounds, 6);
        for account in &session.roster {
            account.validate_invariants().unwrap();
        }
    }

    #[tokio::test]
    async fn test_multi_match_survives_authority_departure() {
        let config = GameConfig {
            round_limit: 5,
            ..GameConfig::default()
        };
        let mut plan = plan(3, 5);
        plan.disconnects.push(Disconnect { round: 3, index: 0 });
        let session = run_multi(&config, &plan).await.unwrap();
        assert!(session.game_over);
        assert!(!session.roster[0].connected);
        assert!(session.roster[0].ledger.iter().all(|r| r.round < 3));
    }

    #[tokio::test]
    async fn test_multi_match_skips_departed_participant() {
        let config = GameConfig {
            round_limit: 4,
            event_chance: 1.0,
            ..GameConfig::default()
        };
        let mut plan = plan(3, 21);
        plan.disconnects.push(Disconnect { round: 2, index: 1 });
        let session = run_multi(&config, &plan).await.unwrap();
        assert!(session.game_over);
        let departed = &session.roster[1];
        assert!(!departed.connected);
        assert!(departed.ledger.iter().all(|r| r.round < 2));
        assert!(session.roster[2].ledger.iter().any(|r| r.round == 4));
    }

    #[tokio::test]
    async fn test_idle_replica_expired_by_authority() {
        let config = GameConfig {
            round_limit: 3,
            event_chance: 1.0,
            ..GameConfig::default()
        };
        let mut plan = plan(3, 9);
        plan.idle.push(1);
        plan.decision_timeout = Some(Duration::from_millis(20));
        let session = run_multi(&config, &plan).await.unwrap();
        assert!(session.game_over);
    }
}
