use std::sync::Arc;

use moneymatters_execution::{OutcomeSource, RoundStatus, SeededDraws, SessionRegistry};
use moneymatters_types::{GameConfig, Session};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{account_id, prepare, Decision, MatchPlan, SimulatorError};

/// Plays a whole match against one local orchestrator.
///
/// Idle bots are expired as soon as they stall; there is no wall clock to wait on.
pub fn run_solo(config: &GameConfig, plan: &MatchPlan) -> Result<Session, SimulatorError> {
    plan.validate()?;
    let catalog = Arc::new(config.catalog());
    let mut orchestrator = prepare(
        Uuid::new_v4(),
        config,
        catalog,
        plan,
        OutcomeSource::Local,
        SeededDraws::new(plan.seed),
    )?;
    let mut bots = plan.bots();

    for round in 1..=config.round_limit {
        for index in plan.disconnects_before(round) {
            orchestrator.mark_disconnected(account_id(index))?;
        }
        if orchestrator.session().connected_count() == 0 {
            return Err(SimulatorError::NoneLeft);
        }

        let mut status = orchestrator.start_round();
        while let RoundStatus::AwaitingDecision { account_index, .. } = status {
            let decision = orchestrator
                .pending_event()
                .and_then(|(_, event)| bots[account_index].decide(event));
            status = match decision {
                Some(Decision::Choose(choice)) => {
                    orchestrator.resolve_choice(account_index, choice)?
                }
                Some(Decision::Acknowledge) => orchestrator.acknowledge_event(account_index)?,
                None => orchestrator.expire_decision()?,
            };
        }
        for event in orchestrator.drain_events() {
            debug!(?event, "turn event");
        }
        info!(round, ?status, "round finished");
        if status == RoundStatus::GameOver {
            break;
        }
    }
    Ok(orchestrator.session().clone())
}
