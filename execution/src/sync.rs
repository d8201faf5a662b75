//! Authority-broadcast synchronization across replicas.
//!
//! Every replica runs its own [`TurnOrchestrator`]. Only the authority draws
//! events; it turns its orchestrator's notifications into [`SyncMessage`]s for
//! the other replicas, which apply them through the same orchestrator calls:
//!
//! | notification        | broadcast           |
//! |---------------------|---------------------|
//! | `RoundStarted`      | `StartTurn`         |
//! | `OutcomeDrawn`      | `EventOutcome`      |
//! | `MoneyChanged`      | `MoneyState`        |
//! | `ChoiceResolved`    | `ChoiceResolved`    |
//! | `EventAcknowledged` | `EventAcknowledged` |
//! | `GameOver`          | `EndGame`           |
//! | `Registry`          | `AccountDisconnected` / `AccountReconnected` |
//!
//! Replicas never start rounds, draw, resolve decisions, or end the game on
//! their own. Local requests go to the authority, which applies them and
//! broadcasts the result back to everyone else, so each effect is applied
//! exactly once per replica.
//!
//! The lobby reports connectivity changes to every replica independently, so a
//! replica holds a notice about a non-authority account until the authority's
//! stream orders it. Only the departure of the authority itself is applied
//! straight away, since nobody is left to order it; the replica that takes over
//! then applies the notices it was holding and announces them.
//!
//! Envelopes carry a per-sender sequence number; anything not newer than the
//! last accepted envelope from that sender is dropped. Malformed or
//! inapplicable messages are logged and dropped without touching local state.

use std::collections::BTreeMap;

use moneymatters_types::{AccountId, Envelope, Phase, ReplicaId, Session, SyncMessage, Target};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::orchestrator::{OutcomeSource, RoundStatus, TurnError, TurnEvent, TurnOrchestrator};
use crate::registry::{RegistryError, RegistryEvent, SessionRegistry};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("malformed envelope: {reason}")]
    Malformed { reason: String },
    #[error("{kind} from replica {sender}, which is not the authority")]
    NotFromAuthority { kind: &'static str, sender: ReplicaId },
    #[error("{kind} received by replica {local}, which is not the authority")]
    NotAuthority { kind: &'static str, local: ReplicaId },
    #[error("replica {sender} cannot act for account {account_index}")]
    ForeignAccount {
        sender: ReplicaId,
        account_index: usize,
    },
    #[error("stale {kind} for round {round} (current={current})")]
    StaleRound {
        kind: &'static str,
        round: u32,
        current: u32,
    },
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// Envelope ready for the transport.
///
/// `authority` is the sender's view of the current authority and resolves
/// [`Target::Authority`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Outbound {
    pub target: Target,
    pub authority: ReplicaId,
    pub envelope: Envelope,
}

pub struct AuthoritySynchronizer {
    local: ReplicaId,
    authority: ReplicaId,
    orchestrator: TurnOrchestrator,
    next_seq: u64,
    last_seen: BTreeMap<ReplicaId, u64>,
    last_started_round: u32,
    /// Lobby connectivity reports not yet ordered by the authority's stream.
    lobby: BTreeMap<AccountId, bool>,
    notifications: Vec<TurnEvent>,
}

impl AuthoritySynchronizer {
    pub fn new(local: ReplicaId, authority: ReplicaId, mut orchestrator: TurnOrchestrator) -> Self {
        let source = if local == authority {
            OutcomeSource::Authority
        } else {
            OutcomeSource::Replica
        };
        orchestrator.set_source(source);
        Self {
            local,
            authority,
            orchestrator,
            next_seq: 0,
            last_seen: BTreeMap::new(),
            last_started_round: 0,
            lobby: BTreeMap::new(),
            notifications: Vec::new(),
        }
    }

    pub fn local(&self) -> ReplicaId {
        self.local
    }

    pub fn authority(&self) -> ReplicaId {
        self.authority
    }

    pub fn is_authority(&self) -> bool {
        self.local == self.authority
    }

    pub fn orchestrator(&self) -> &TurnOrchestrator {
        &self.orchestrator
    }

    pub fn session(&self) -> &Session {
        self.orchestrator.session()
    }

    pub fn status(&self) -> RoundStatus {
        self.orchestrator.status()
    }

    /// True once the session reached its terminal phase.
    pub fn is_finished(&self) -> bool {
        self.session().phase == Phase::GameOver
    }

    /// Orchestrator notifications observed so far, for presentation.
    pub fn drain_notifications(&mut self) -> Vec<TurnEvent> {
        self.flush_local();
        std::mem::take(&mut self.notifications)
    }

    /// Starts the next round on the authority, or asks the authority to.
    pub fn request_start_round(&mut self) -> Vec<Outbound> {
        if self.is_authority() {
            self.orchestrator.start_round();
            return self.flush();
        }
        debug!(local = self.local, "requesting round start from authority");
        vec![self.outbound(Target::Authority, SyncMessage::RequestStartTurn)]
    }

    pub fn handle_bytes(&mut self, bytes: &[u8]) -> Vec<Outbound> {
        match Envelope::decode(bytes) {
            Ok(envelope) => self.handle(envelope),
            Err(err) => {
                let err = ProtocolError::Malformed {
                    reason: err.to_string(),
                };
                warn!(?err, local = self.local, "dropping message");
                Vec::new()
            }
        }
    }

    pub fn handle(&mut self, envelope: Envelope) -> Vec<Outbound> {
        let Envelope {
            sender,
            seq,
            message,
        } = envelope;
        if sender == self.local {
            return Vec::new();
        }
        let last = self.last_seen.entry(sender).or_insert(0);
        if seq <= *last {
            debug!(sender, seq, last = *last, "dropping stale or duplicate envelope");
            return Vec::new();
        }
        *last = seq;

        let kind = message.kind();
        if let Err(err) = self.apply(sender, message) {
            warn!(?err, sender, kind, local = self.local, "dropping message");
        }
        self.flush()
    }

    /// The local participant dismissed its choice-free event.
    pub fn acknowledge_local_event(&mut self) -> Vec<Outbound> {
        let round = self.session().current_round();
        match self.orchestrator.pending_event() {
            Some((index, event)) if index == self.local => {
                if event.has_choice() {
                    warn!(event = %event.id, "event requires a choice");
                    return Vec::new();
                }
            }
            _ => {
                warn!(local = self.local, "no local decision pending");
                return Vec::new();
            }
        }
        if self.is_authority() {
            if let Err(err) = self.orchestrator.acknowledge_event(self.local) {
                warn!(?err, "could not acknowledge event");
            }
            return self.flush();
        }
        vec![self.outbound(
            Target::Authority,
            SyncMessage::EventAcknowledged {
                round,
                account_index: self.local,
            },
        )]
    }

    /// The local participant picked a choice. Replicas forward it to the
    /// authority and apply it only when it comes back.
    pub fn choose_local(&mut self, choice_index: usize) -> Vec<Outbound> {
        let round = self.session().current_round();
        match self.orchestrator.pending_event() {
            Some((index, event)) if index == self.local => {
                if event.choice(choice_index).is_none() {
                    warn!(event = %event.id, choice_index, "no such choice");
                    return Vec::new();
                }
            }
            _ => {
                warn!(local = self.local, "no local decision pending");
                return Vec::new();
            }
        }
        if self.is_authority() {
            if let Err(err) = self.orchestrator.resolve_choice(self.local, choice_index) {
                warn!(?err, "could not resolve choice");
            }
            return self.flush();
        }
        vec![self.outbound(
            Target::Authority,
            SyncMessage::ChoiceResolved {
                round,
                account_index: self.local,
                choice_index,
            },
        )]
    }

    /// Authority only: settles a stalled decision with the least costly option.
    pub fn expire_decision(&mut self) -> Vec<Outbound> {
        if !self.is_authority() {
            return Vec::new();
        }
        if let Err(err) = self.orchestrator.expire_decision() {
            debug!(?err, "nothing to expire");
        }
        self.flush()
    }

    /// Applies a connectivity change reported by the lobby.
    ///
    /// The authority applies it and broadcasts it. Other replicas hold it until
    /// the authority's broadcast arrives, unless the authority itself left.
    pub fn on_registry_event(&mut self, event: RegistryEvent) -> Vec<Outbound> {
        match event {
            RegistryEvent::Disconnected { id } => {
                let Some(index) = self.session().index_of(id) else {
                    warn!(account = id, "ignoring disconnect of unknown account");
                    return Vec::new();
                };
                if index == self.authority && !self.is_authority() {
                    if let Err(err) = self.orchestrator.mark_disconnected(id) {
                        warn!(?err, "ignoring disconnect");
                        return Vec::new();
                    }
                    self.lobby.remove(&id);
                    let Some(next) = self.next_authority() else {
                        warn!("no connected replica left to take over");
                        return self.flush();
                    };
                    let mut out = self.flush();
                    out.extend(self.promote_to_authority(next));
                    return out;
                }
                self.connectivity(id, false)
            }
            RegistryEvent::Reconnected { id } => self.connectivity(id, true),
            RegistryEvent::Joined { .. } | RegistryEvent::Left { .. } => {
                debug!(?event, "roster changes are applied before play");
                Vec::new()
            }
        }
    }

    /// Hands authority to `next`.
    ///
    /// When `next` is this replica it replays the last outcome it applied and
    /// the active account's money, applies and announces the connectivity
    /// changes it was holding, then draws itself if the round is waiting on an
    /// outcome the old authority never sent.
    pub fn promote_to_authority(&mut self, next: ReplicaId) -> Vec<Outbound> {
        let previous = self.authority;
        self.authority = next;
        info!(previous, next, local = self.local, "authority handed off");
        if next != self.local {
            return self.flush();
        }

        self.flush_local();
        let mut out = Vec::new();
        let session = self.orchestrator.session();
        let round = session.current_round();
        let active = session.active_index;
        if self.orchestrator.round_in_progress() {
            if let Some(outcome) = self.orchestrator.last_outcome().cloned() {
                if outcome.round == round {
                    out.push(self.outbound(
                        Target::Others,
                        SyncMessage::EventOutcome {
                            round: outcome.round,
                            account_index: outcome.account_index,
                            event_id: outcome.event_id,
                        },
                    ));
                }
            }
            if let Some(message) = self.money_state(active) {
                out.push(self.outbound(Target::Others, message));
            }
        }

        // Other replicas may hold lobby notices the old authority never
        // ordered, so every departure is announced again along with the
        // reconnects held here.
        let rejoined: Vec<AccountId> = self
            .lobby
            .iter()
            .filter(|(_, connected)| **connected)
            .map(|(id, _)| *id)
            .collect();
        self.apply_lobby();
        self.flush_local();
        let mut announcements = Vec::new();
        for (account_index, account) in self.session().roster.iter().enumerate() {
            if !account.connected {
                announcements.push(SyncMessage::AccountDisconnected { account_index });
            } else if rejoined.contains(&account.id) {
                announcements.push(SyncMessage::AccountReconnected { account_index });
            }
        }
        for message in announcements {
            out.push(self.outbound(Target::Others, message));
        }

        self.orchestrator.promote_to_authority();
        out.extend(self.flush());
        out
    }

    fn apply(&mut self, sender: ReplicaId, message: SyncMessage) -> Result<(), ProtocolError> {
        let kind = message.kind();
        match message {
            SyncMessage::RequestStartTurn => {
                if !self.is_authority() {
                    return Err(ProtocolError::NotAuthority {
                        kind,
                        local: self.local,
                    });
                }
                self.orchestrator.start_round();
            }
            SyncMessage::StartTurn { round } => {
                self.require_from_authority(sender, kind)?;
                let current = self.session().current_round();
                if round <= self.last_started_round || round != current {
                    return Err(ProtocolError::StaleRound {
                        kind,
                        round,
                        current,
                    });
                }
                self.last_started_round = round;
                self.orchestrator.start_round();
            }
            SyncMessage::EventOutcome {
                round,
                account_index,
                event_id,
            } => {
                self.require_from_authority(sender, kind)?;
                self.orchestrator
                    .apply_outcome(round, account_index, event_id.as_deref())?;
            }
            SyncMessage::MoneyState {
                account_index,
                balance,
                earned,
                spent,
            } => {
                self.require_from_authority(sender, kind)?;
                self.orchestrator
                    .overwrite_money(account_index, balance, earned, spent)?;
            }
            SyncMessage::ChoiceResolved {
                round,
                account_index,
                choice_index,
            } => {
                self.require_actor(sender, account_index, kind)?;
                self.require_round(round, kind)?;
                self.orchestrator.resolve_choice(account_index, choice_index)?;
            }
            SyncMessage::EventAcknowledged {
                round,
                account_index,
            } => {
                self.require_actor(sender, account_index, kind)?;
                self.require_round(round, kind)?;
                if self.is_authority() {
                    self.orchestrator.acknowledge_event(account_index)?;
                } else {
                    self.orchestrator.dismiss_decision(account_index)?;
                }
            }
            SyncMessage::AccountDisconnected { account_index } => {
                self.require_from_authority(sender, kind)?;
                let id = self.account_id(account_index)?;
                self.lobby.remove(&id);
                self.orchestrator.mark_disconnected(id)?;
            }
            SyncMessage::AccountReconnected { account_index } => {
                self.require_from_authority(sender, kind)?;
                let id = self.account_id(account_index)?;
                self.lobby.remove(&id);
                self.orchestrator.mark_reconnected(id)?;
            }
            SyncMessage::EndGame => {
                self.require_from_authority(sender, kind)?;
                self.orchestrator.finish_game();
            }
        }
        Ok(())
    }

    /// Applies a lobby report on the authority, or holds it on a replica.
    fn connectivity(&mut self, id: AccountId, connected: bool) -> Vec<Outbound> {
        if !self.is_authority() {
            if self
                .session()
                .roster
                .iter()
                .any(|a| a.id == id && a.connected == connected)
            {
                self.lobby.remove(&id);
                return Vec::new();
            }
            debug!(
                account = id,
                connected,
                local = self.local,
                "holding connectivity change for the authority"
            );
            self.lobby.insert(id, connected);
            return Vec::new();
        }
        let result = if connected {
            self.orchestrator.mark_reconnected(id)
        } else {
            self.orchestrator.mark_disconnected(id)
        };
        if let Err(err) = result {
            warn!(?err, connected, "ignoring connectivity change");
        }
        self.flush()
    }

    /// Applies every held lobby report. Only done while taking over.
    fn apply_lobby(&mut self) {
        for (id, connected) in std::mem::take(&mut self.lobby) {
            let result = if connected {
                self.orchestrator.mark_reconnected(id)
            } else {
                self.orchestrator.mark_disconnected(id)
            };
            if let Err(err) = result {
                warn!(?err, connected, "dropping held connectivity change");
            }
        }
    }

    fn account_id(&self, account_index: usize) -> Result<AccountId, ProtocolError> {
        let roster = &self.session().roster;
        roster
            .get(account_index)
            .map(|account| account.id)
            .ok_or(ProtocolError::Turn(TurnError::AccountOutOfRange {
                index: account_index,
                len: roster.len(),
            }))
    }

    /// Requests reach the authority from the account's own replica; results
    /// reach replicas from the authority.
    fn require_actor(
        &self,
        sender: ReplicaId,
        account_index: usize,
        kind: &'static str,
    ) -> Result<(), ProtocolError> {
        if self.is_authority() {
            if sender != account_index {
                return Err(ProtocolError::ForeignAccount {
                    sender,
                    account_index,
                });
            }
            return Ok(());
        }
        self.require_from_authority(sender, kind)
    }

    fn require_from_authority(
        &self,
        sender: ReplicaId,
        kind: &'static str,
    ) -> Result<(), ProtocolError> {
        if sender != self.authority {
            return Err(ProtocolError::NotFromAuthority { kind, sender });
        }
        Ok(())
    }

    fn require_round(&self, round: u32, kind: &'static str) -> Result<(), ProtocolError> {
        let current = self.session().current_round();
        if round != current {
            return Err(ProtocolError::StaleRound {
                kind,
                round,
                current,
            });
        }
        Ok(())
    }

    /// Lowest connected index, counting held departures as gone.
    fn next_authority(&self) -> Option<ReplicaId> {
        self.session()
            .roster
            .iter()
            .position(|a| a.connected && self.lobby.get(&a.id) != Some(&false))
    }

    fn money_state(&self, account_index: usize) -> Option<SyncMessage> {
        let account = self.session().account(account_index)?;
        Some(SyncMessage::MoneyState {
            account_index,
            balance: account.balance,
            earned: account.total_earned,
            spent: account.total_spent,
        })
    }

    /// Moves orchestrator events into the notification buffer without broadcasting.
    fn flush_local(&mut self) {
        let events = self.orchestrator.drain_events();
        self.notifications.extend(events);
    }

    /// Drains orchestrator events; on the authority, turns them into broadcasts.
    fn flush(&mut self) -> Vec<Outbound> {
        let events = self.orchestrator.drain_events();
        let mut out = Vec::new();
        if self.is_authority() {
            for event in &events {
                let message = match event {
                    TurnEvent::RoundStarted { round } => {
                        self.last_started_round = *round;
                        SyncMessage::StartTurn { round: *round }
                    }
                    TurnEvent::OutcomeDrawn {
                        round,
                        account_index,
                        event_id,
                    } => SyncMessage::EventOutcome {
                        round: *round,
                        account_index: *account_index,
                        event_id: event_id.clone(),
                    },
                    TurnEvent::MoneyChanged {
                        account_index,
                        balance,
                        earned,
                        spent,
                    } => SyncMessage::MoneyState {
                        account_index: *account_index,
                        balance: *balance,
                        earned: *earned,
                        spent: *spent,
                    },
                    TurnEvent::ChoiceResolved {
                        round,
                        account_index,
                        choice_index,
                        ..
                    } => SyncMessage::ChoiceResolved {
                        round: *round,
                        account_index: *account_index,
                        choice_index: *choice_index,
                    },
                    TurnEvent::EventAcknowledged {
                        round,
                        account_index,
                    } => SyncMessage::EventAcknowledged {
                        round: *round,
                        account_index: *account_index,
                    },
                    TurnEvent::GameOver { .. } => SyncMessage::EndGame,
                    TurnEvent::Registry(RegistryEvent::Disconnected { id }) => {
                        let Some(account_index) = self.session().index_of(*id) else {
                            continue;
                        };
                        SyncMessage::AccountDisconnected { account_index }
                    }
                    TurnEvent::Registry(RegistryEvent::Reconnected { id }) => {
                        let Some(account_index) = self.session().index_of(*id) else {
                            continue;
                        };
                        SyncMessage::AccountReconnected { account_index }
                    }
                    _ => continue,
                };
                out.push(self.outbound(Target::Others, message));
            }
        }
        self.notifications.extend(events);
        out
    }

    fn outbound(&mut self, target: Target, message: SyncMessage) -> Outbound {
        self.next_seq += 1;
        Outbound {
            target,
            authority: self.authority,
            envelope: Envelope {
                sender: self.local,
                seq: self.next_seq,
                message,
            },
        }
    }
}
