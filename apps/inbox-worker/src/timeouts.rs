//! Timeout enforcer: auto-return and silence alerts for conversations held by an agent.

use time::OffsetDateTime;

use inbox_domain::{
	queue::{QueueEvent, QueueStatus},
	timeouts::{self, SilenceClock, TenantAlertSettings, TimeoutAction},
};
use inbox_storage::{conversations, models::TimeoutCandidate, notices};

use crate::{Result, scheduler::WorkerState};

pub const TIMEOUT_BATCH: i64 = 500;

#[derive(Debug, Default, PartialEq)]
pub struct TimeoutSummary {
	pub returned: usize,
	pub alerts: usize,
}

pub async fn enforce_timeouts(state: &WorkerState, now: OffsetDateTime) -> Result<TimeoutSummary> {
	let candidates = conversations::list_timeout_candidates(&state.db, TIMEOUT_BATCH).await?;
	let mut summary = TimeoutSummary::default();

	for candidate in &candidates {
		let clock = SilenceClock {
			last_patient_message_at: candidate.last_patient_message_at,
			last_outbound_at: candidate.last_outbound_at,
		};
		let settings = TenantAlertSettings {
			no_response_alert_minutes: candidate.no_response_alert_minutes,
			follow_up_alert_minutes: candidate.follow_up_alert_minutes,
		};
		let action = timeouts::evaluate(&clock, &settings, now);

		match action {
			TimeoutAction::None => {},
			TimeoutAction::AutoReturn { minutes } => {
				if auto_return(state, candidate, action, now).await? {
					summary.returned += 1;

					tracing::info!(
						conversation_id = %candidate.id,
						agent_id = %candidate.assigned_user_id,
						minutes,
						"Conversation returned to the queue."
					);
				}
			},
			TimeoutAction::NoResponseWarning { .. } | TimeoutAction::FollowUp { .. } => {
				if alert(state, candidate, action, now).await? {
					summary.alerts += 1;
				}
			},
		}
	}

	Ok(summary)
}

async fn auto_return(
	state: &WorkerState,
	candidate: &TimeoutCandidate,
	action: TimeoutAction,
	now: OffsetDateTime,
) -> Result<bool> {
	let next = QueueStatus::InProgress.transition(QueueEvent::AutoReturn)?;
	let returned = conversations::return_to_queue(
		&state.db,
		candidate.id,
		candidate.assigned_user_id,
		next,
		now,
	)
	.await?;

	if returned {
		notify(state, candidate, action, now).await?;
	}

	Ok(returned)
}

async fn alert(
	state: &WorkerState,
	candidate: &TimeoutCandidate,
	action: TimeoutAction,
	now: OffsetDateTime,
) -> Result<bool> {
	let last = notices::last_alert_at(&state.db, candidate.id, candidate.assigned_user_id).await?;

	if timeouts::within_dedup_window(last, now) {
		return Ok(false);
	}

	notify(state, candidate, action, now).await?;

	Ok(true)
}

async fn notify(
	state: &WorkerState,
	candidate: &TimeoutCandidate,
	action: TimeoutAction,
	now: OffsetDateTime,
) -> Result<()> {
	let (Some(kind), Some(text)) = (action.notice_kind(), action.notice_text()) else {
		return Ok(());
	};

	notices::insert_notice(
		&state.db,
		candidate.tenant_id,
		candidate.assigned_user_id,
		candidate.id,
		kind,
		&text,
		now,
	)
	.await?;

	Ok(())
}
