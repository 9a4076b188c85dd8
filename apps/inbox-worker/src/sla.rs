//! SLA engine: keeps one timer per conversation that waits for an agent reply.

use std::collections::HashMap;

use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::sla::{self, ConversationClock, SlaDecision, SlaPolicy, TimerState};
use inbox_storage::{
	conversations,
	models::{SlaCandidate, SlaPolicyRow, SlaTimerRow},
	sla as sla_store,
};

use crate::{Result, scheduler::WorkerState};

pub const SLA_BATCH: i64 = 500;

#[derive(Debug, Default, PartialEq)]
pub struct SlaSummary {
	pub timers: usize,
	pub breaches: usize,
	pub responses: usize,
}

pub async fn recompute_sla(state: &WorkerState, now: OffsetDateTime) -> Result<SlaSummary> {
	let candidates = conversations::list_sla_candidates(&state.db, SLA_BATCH).await?;
	let ids = candidates.iter().map(|candidate| candidate.id).collect::<Vec<_>>();
	let mut timers = sla_store::list_timers(&state.db, &ids)
		.await?
		.into_iter()
		.map(|row| (row.conversation_id, timer_state(row)))
		.collect::<HashMap<_, _>>();
	let mut policies: HashMap<Uuid, Vec<SlaPolicy>> = HashMap::new();
	let mut summary = SlaSummary::default();

	for candidate in &candidates {
		if !policies.contains_key(&candidate.tenant_id) {
			let rows = sla_store::list_policies(&state.db, candidate.tenant_id).await?;

			policies.insert(candidate.tenant_id, rows.into_iter().map(policy).collect());
		}

		let tenant_policies = policies.get(&candidate.tenant_id).map(Vec::as_slice).unwrap_or(&[]);
		let existing = timers.remove(&candidate.id);

		apply(state, candidate, existing, tenant_policies, now, &mut summary).await?;
	}

	if summary.breaches > 0 || summary.responses > 0 {
		tracing::info!(
			timers = summary.timers,
			breaches = summary.breaches,
			responses = summary.responses,
			"SLA timers recomputed."
		);
	}

	Ok(summary)
}

async fn apply(
	state: &WorkerState,
	candidate: &SlaCandidate,
	existing: Option<TimerState>,
	policies: &[SlaPolicy],
	now: OffsetDateTime,
	summary: &mut SlaSummary,
) -> Result<()> {
	let clock = ConversationClock {
		last_patient_message_at: candidate.last_patient_message_at,
		last_outbound_at: candidate.last_outbound_at,
		last_stage_moved_at: candidate.last_stage_moved_at,
	};
	let policy =
		sla::select_policy(policies, candidate.current_stage_id, candidate.contact_status.as_deref());

	match sla::evaluate(&clock, existing.as_ref(), policy, now) {
		SlaDecision::Answered { response } => {
			if existing.is_none() {
				return Ok(());
			}

			sla_store::delete_timer(&state.db, candidate.id).await?;

			if let Some(response) = response {
				sla_store::insert_response(
					&state.db,
					candidate.tenant_id,
					candidate.id,
					candidate.assigned_user_id,
					&response,
					now,
				)
				.await?;

				summary.responses += 1;
			}
		},
		SlaDecision::Waiting { timer, breached_now } => {
			if existing.as_ref() != Some(&timer) {
				sla_store::upsert_timer(&state.db, candidate.tenant_id, candidate.id, &timer, now)
					.await?;
			}

			summary.timers += 1;

			if breached_now {
				sla_store::insert_breach(
					&state.db,
					candidate.tenant_id,
					candidate.id,
					candidate.assigned_user_id,
					&timer,
					now,
				)
				.await?;

				summary.breaches += 1;

				tracing::warn!(
					conversation_id = %candidate.id,
					due_at = %timer.due_at,
					"SLA breached."
				);
			}
		},
	}

	Ok(())
}

fn timer_state(row: SlaTimerRow) -> TimerState {
	TimerState {
		started_at: row.started_at,
		due_at: row.due_at,
		breached_at: row.breached_at,
		policy_id: row.current_policy_id,
	}
}

fn policy(row: SlaPolicyRow) -> SlaPolicy {
	SlaPolicy {
		id: row.id,
		stage_id: row.stage_id,
		contact_status: row.contact_status,
		response_seconds: row.response_seconds,
		warning_threshold_percent: row.warning_threshold_percent,
	}
}
