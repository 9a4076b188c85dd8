use time::{Duration, OffsetDateTime, macros::datetime};
use uuid::Uuid;

use inbox_domain::{
	sla::{self, ConversationClock, SlaDecision, SlaPolicy, TimerState},
	timeouts::{self, NoticeKind, SilenceClock, TenantAlertSettings, TimeoutAction},
};

fn policy(stage_id: Option<Uuid>, contact_status: Option<&str>, seconds: i32) -> SlaPolicy {
	SlaPolicy {
		id: Uuid::new_v4(),
		stage_id,
		contact_status: contact_status.map(str::to_string),
		response_seconds: seconds,
		warning_threshold_percent: 80,
	}
}

fn now() -> OffsetDateTime {
	datetime!(2026-03-01 12:00 UTC)
}

#[test]
fn policy_precedence_prefers_most_specific() {
	let stage = Uuid::new_v4();
	let policies = vec![
		policy(None, None, 900),
		policy(None, Some("lead"), 600),
		policy(Some(stage), None, 300),
		policy(Some(stage), Some("lead"), 120),
	];

	assert_eq!(sla::select_policy(&policies, Some(stage), Some("lead")).map(|p| p.response_seconds), Some(120));
	assert_eq!(sla::select_policy(&policies, Some(stage), Some("client")).map(|p| p.response_seconds), Some(300));
	assert_eq!(sla::select_policy(&policies, None, Some("lead")).map(|p| p.response_seconds), Some(600));
	assert_eq!(sla::select_policy(&policies, Some(Uuid::new_v4()), None).map(|p| p.response_seconds), Some(900));
	assert!(sla::select_policy(&policies[1..2], None, None).is_none());
}

#[test]
fn default_window_applies_without_policy() {
	let clock = ConversationClock {
		last_patient_message_at: now() - Duration::seconds(10),
		last_outbound_at: None,
		last_stage_moved_at: None,
	};
	let SlaDecision::Waiting { timer, breached_now } = sla::evaluate(&clock, None, None, now()) else {
		panic!("Expected a waiting conversation.");
	};

	assert_eq!(timer.due_at, clock.last_patient_message_at + Duration::seconds(300));
	assert!(!breached_now);
	assert_eq!(timer.breached_at, None);
}

#[test]
fn breach_is_reported_once() {
	let applied = policy(None, None, 60);
	let clock = ConversationClock {
		last_patient_message_at: now() - Duration::minutes(5),
		last_outbound_at: None,
		last_stage_moved_at: None,
	};
	let SlaDecision::Waiting { timer, breached_now } =
		sla::evaluate(&clock, None, Some(&applied), now())
	else {
		panic!("Expected a waiting conversation.");
	};

	assert!(breached_now);
	assert_eq!(timer.breached_at, Some(now()));

	let later = now() + Duration::seconds(30);
	let SlaDecision::Waiting { timer: next, breached_now } =
		sla::evaluate(&clock, Some(&timer), Some(&applied), later)
	else {
		panic!("Expected a waiting conversation.");
	};

	assert!(!breached_now);
	assert_eq!(next.breached_at, Some(now()));
}

#[test]
fn stage_move_restarts_the_timer() {
	let clock = ConversationClock {
		last_patient_message_at: now() - Duration::minutes(10),
		last_outbound_at: None,
		last_stage_moved_at: Some(now() - Duration::seconds(30)),
	};
	let stale = TimerState {
		started_at: clock.last_patient_message_at,
		due_at: clock.last_patient_message_at + Duration::seconds(300),
		breached_at: Some(now() - Duration::minutes(4)),
		policy_id: None,
	};
	let SlaDecision::Waiting { timer, breached_now } = sla::evaluate(&clock, Some(&stale), None, now())
	else {
		panic!("Expected a waiting conversation.");
	};

	assert_eq!(timer.started_at, now() - Duration::seconds(30));
	assert_eq!(timer.breached_at, None);
	assert!(!breached_now);
}

#[test]
fn answered_conversation_records_response_time() {
	let started = now() - Duration::minutes(3);
	let clock = ConversationClock {
		last_patient_message_at: started,
		last_outbound_at: Some(started + Duration::seconds(90)),
		last_stage_moved_at: None,
	};
	let timer = TimerState {
		started_at: started,
		due_at: started + Duration::seconds(300),
		breached_at: None,
		policy_id: None,
	};
	let SlaDecision::Answered { response } = sla::evaluate(&clock, Some(&timer), None, now()) else {
		panic!("Expected an answered conversation.");
	};

	assert_eq!(response.map(|event| event.response_seconds), Some(90));
	assert_eq!(
		sla::evaluate(&clock, None, None, now()),
		SlaDecision::Answered { response: None }
	);
}

#[test]
fn six_minutes_of_agent_silence_returns_conversation() {
	let clock = SilenceClock {
		last_patient_message_at: Some(now() - Duration::minutes(6)),
		last_outbound_at: Some(now() - Duration::minutes(20)),
	};
	let action = timeouts::evaluate(&clock, &TenantAlertSettings::default(), now());

	assert_eq!(action, TimeoutAction::AutoReturn { minutes: 6 });
	assert_eq!(action.notice_kind(), Some(NoticeKind::AutoReturn));
	assert_eq!(
		action.notice_text().as_deref(),
		Some("🔄 Conversa devolvida para a fila após 6 min sem resposta.")
	);
}

#[test]
fn warning_fires_before_auto_return_when_configured_lower() {
	let settings =
		TenantAlertSettings { no_response_alert_minutes: Some(2), follow_up_alert_minutes: None };
	let clock = SilenceClock {
		last_patient_message_at: Some(now() - Duration::minutes(3)),
		last_outbound_at: None,
	};

	assert_eq!(
		timeouts::evaluate(&clock, &settings, now()),
		TimeoutAction::NoResponseWarning { minutes: 3 }
	);
	assert_eq!(
		TimeoutAction::NoResponseWarning { minutes: 3 }.notice_text().as_deref(),
		Some("⚠️ Conversa sem resposta há 3 min.")
	);
	assert_eq!(
		timeouts::evaluate(&clock, &TenantAlertSettings::default(), now()),
		TimeoutAction::None
	);
}

#[test]
fn follow_up_after_client_silence() {
	let clock = SilenceClock {
		last_patient_message_at: Some(now() - Duration::hours(5)),
		last_outbound_at: Some(now() - Duration::minutes(150)),
	};
	let action = timeouts::evaluate(&clock, &TenantAlertSettings::default(), now());

	assert_eq!(action, TimeoutAction::FollowUp { minutes: 150 });
	assert_eq!(action.notice_text().as_deref(), Some("⚠️ Cliente sem resposta há 2h30min."));
	assert!(NoticeKind::FollowUp.is_alert());
	assert!(!NoticeKind::AutoReturn.is_alert());
}

#[test]
fn alert_settings_are_clamped() {
	let settings =
		TenantAlertSettings { no_response_alert_minutes: Some(500), follow_up_alert_minutes: Some(0) };

	assert_eq!(settings.no_response_minutes(), 60);
	assert_eq!(settings.follow_up_minutes(), 1);
}

#[test]
fn dedup_window() {
	assert!(timeouts::within_dedup_window(Some(now() - Duration::minutes(10)), now()));
	assert!(!timeouts::within_dedup_window(Some(now() - Duration::minutes(15)), now()));
	assert!(!timeouts::within_dedup_window(None, now()));
}
