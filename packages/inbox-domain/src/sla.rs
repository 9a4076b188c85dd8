use time::{Duration, OffsetDateTime};
use uuid::Uuid;

/// Response window used when a tenant has no applicable policy.
pub const DEFAULT_RESPONSE_SECONDS: i64 = 300;

#[derive(Clone, Debug, PartialEq)]
pub struct SlaPolicy {
	pub id: Uuid,
	pub stage_id: Option<Uuid>,
	pub contact_status: Option<String>,
	pub response_seconds: i32,
	pub warning_threshold_percent: i32,
}

#[derive(Clone, Copy, Debug)]
pub struct ConversationClock {
	pub last_patient_message_at: OffsetDateTime,
	pub last_outbound_at: Option<OffsetDateTime>,
	pub last_stage_moved_at: Option<OffsetDateTime>,
}
impl ConversationClock {
	pub fn answered(&self) -> bool {
		self.last_outbound_at.map(|outbound| outbound >= self.last_patient_message_at).unwrap_or(false)
	}

	pub fn timer_start(&self) -> OffsetDateTime {
		match self.last_stage_moved_at {
			Some(moved) if moved > self.last_patient_message_at => moved,
			_ => self.last_patient_message_at,
		}
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct TimerState {
	pub started_at: OffsetDateTime,
	pub due_at: OffsetDateTime,
	pub breached_at: Option<OffsetDateTime>,
	pub policy_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ResponseEvent {
	pub started_at: OffsetDateTime,
	pub due_at: OffsetDateTime,
	pub response_seconds: i64,
	pub policy_id: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SlaDecision {
	/// The agent replied after the last patient message. Any timer must go.
	Answered { response: Option<ResponseEvent> },
	/// The conversation waits for an agent. `breached_now` is true only on the tick the deadline
	/// is first observed as missed.
	Waiting { timer: TimerState, breached_now: bool },
}

/// Picks the most specific policy: stage and status, then stage, then status, then the tenant
/// default.
pub fn select_policy<'a>(
	policies: &'a [SlaPolicy],
	stage_id: Option<Uuid>,
	contact_status: Option<&str>,
) -> Option<&'a SlaPolicy> {
	if let (Some(stage_id), Some(status)) = (stage_id, contact_status)
		&& let Some(policy) = policies.iter().find(|policy| {
			policy.stage_id == Some(stage_id) && policy.contact_status.as_deref() == Some(status)
		}) {
		return Some(policy);
	}
	if let Some(stage_id) = stage_id
		&& let Some(policy) = policies
			.iter()
			.find(|policy| policy.stage_id == Some(stage_id) && policy.contact_status.is_none())
	{
		return Some(policy);
	}
	if let Some(status) = contact_status
		&& let Some(policy) = policies.iter().find(|policy| {
			policy.stage_id.is_none() && policy.contact_status.as_deref() == Some(status)
		}) {
		return Some(policy);
	}

	policies.iter().find(|policy| policy.stage_id.is_none() && policy.contact_status.is_none())
}

pub fn evaluate(
	clock: &ConversationClock,
	existing: Option<&TimerState>,
	policy: Option<&SlaPolicy>,
	now: OffsetDateTime,
) -> SlaDecision {
	if clock.answered() {
		let response = match (existing, clock.last_outbound_at) {
			(Some(timer), Some(outbound)) => Some(ResponseEvent {
				started_at: timer.started_at,
				due_at: timer.due_at,
				response_seconds: (outbound - timer.started_at).whole_seconds().max(0),
				policy_id: timer.policy_id,
			}),
			_ => None,
		};

		return SlaDecision::Answered { response };
	}

	let started_at = clock.timer_start();
	let seconds = policy
		.map(|policy| i64::from(policy.response_seconds))
		.filter(|seconds| *seconds > 0)
		.unwrap_or(DEFAULT_RESPONSE_SECONDS);
	let due_at = started_at + Duration::seconds(seconds);
	// A restarted timer (stage move) clears the previous breach.
	let previously_breached = existing
		.filter(|timer| timer.started_at == started_at)
		.and_then(|timer| timer.breached_at);
	let breached_at = if now > due_at { Some(previously_breached.unwrap_or(now)) } else { None };
	let breached_now = breached_at.is_some() && previously_breached.is_none();

	SlaDecision::Waiting {
		timer: TimerState {
			started_at,
			due_at,
			breached_at,
			policy_id: policy.map(|policy| policy.id),
		},
		breached_now,
	}
}
