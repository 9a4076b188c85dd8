use time::{Duration, OffsetDateTime};

/// Agent silence after which a conversation goes back to the queue.
pub const AUTO_RETURN_MINUTES: i64 = 5;
/// Minimum spacing between two alerts for the same conversation and agent.
pub const ALERT_DEDUP_WINDOW: Duration = Duration::minutes(15);

pub const DEFAULT_NO_RESPONSE_ALERT_MINUTES: i32 = 5;
pub const DEFAULT_FOLLOW_UP_ALERT_MINUTES: i32 = 120;

#[derive(Clone, Copy, Debug, Default)]
pub struct TenantAlertSettings {
	pub no_response_alert_minutes: Option<i32>,
	pub follow_up_alert_minutes: Option<i32>,
}
impl TenantAlertSettings {
	pub fn no_response_minutes(&self) -> i64 {
		i64::from(
			self.no_response_alert_minutes.unwrap_or(DEFAULT_NO_RESPONSE_ALERT_MINUTES).clamp(1, 60),
		)
	}

	pub fn follow_up_minutes(&self) -> i64 {
		i64::from(self.follow_up_alert_minutes.unwrap_or(DEFAULT_FOLLOW_UP_ALERT_MINUTES).max(1))
	}
}

#[derive(Clone, Copy, Debug)]
pub struct SilenceClock {
	pub last_patient_message_at: Option<OffsetDateTime>,
	pub last_outbound_at: Option<OffsetDateTime>,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoticeKind {
	AutoReturn,
	NoResponseWarning,
	FollowUp,
}
impl NoticeKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::AutoReturn => "auto_return",
			Self::NoResponseWarning => "no_response_warning",
			Self::FollowUp => "follow_up",
		}
	}

	/// Alerts share the dedup window; the auto-return notice is never deduplicated.
	pub fn is_alert(self) -> bool {
		!matches!(self, Self::AutoReturn)
	}
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TimeoutAction {
	None,
	AutoReturn { minutes: i64 },
	NoResponseWarning { minutes: i64 },
	FollowUp { minutes: i64 },
}
impl TimeoutAction {
	pub fn notice_kind(self) -> Option<NoticeKind> {
		match self {
			Self::None => None,
			Self::AutoReturn { .. } => Some(NoticeKind::AutoReturn),
			Self::NoResponseWarning { .. } => Some(NoticeKind::NoResponseWarning),
			Self::FollowUp { .. } => Some(NoticeKind::FollowUp),
		}
	}

	/// Agent-facing notice, in the same language as the rating texts sent to clients.
	pub fn notice_text(self) -> Option<String> {
		match self {
			Self::None => None,
			Self::AutoReturn { minutes } => Some(format!(
				"🔄 Conversa devolvida para a fila após {minutes} min sem resposta."
			)),
			Self::NoResponseWarning { minutes } =>
				Some(format!("⚠️ Conversa sem resposta há {minutes} min.")),
			Self::FollowUp { minutes } => {
				let hours = minutes / 60;
				let mins = minutes % 60;
				let elapsed =
					if hours > 0 { format!("{hours}h{mins}min") } else { format!("{mins}min") };

				Some(format!("⚠️ Cliente sem resposta há {elapsed}."))
			},
		}
	}
}

/// Decides the rule that fires for one assigned, in-progress conversation.
///
/// Agent silence and client silence are exclusive: whichever side spoke last decides which rule
/// is considered. Auto-return wins over the warning for the same silence.
pub fn evaluate(
	clock: &SilenceClock,
	settings: &TenantAlertSettings,
	now: OffsetDateTime,
) -> TimeoutAction {
	match (clock.last_patient_message_at, clock.last_outbound_at) {
		(Some(patient), outbound) if outbound.map(|outbound| outbound < patient).unwrap_or(true) => {
			let minutes = whole_minutes(now - patient);

			if minutes >= AUTO_RETURN_MINUTES {
				TimeoutAction::AutoReturn { minutes }
			} else if minutes >= settings.no_response_minutes() {
				TimeoutAction::NoResponseWarning { minutes }
			} else {
				TimeoutAction::None
			}
		},
		(patient, Some(outbound)) if patient.map(|patient| patient < outbound).unwrap_or(true) => {
			let minutes = whole_minutes(now - outbound);

			if minutes >= settings.follow_up_minutes() {
				TimeoutAction::FollowUp { minutes }
			} else {
				TimeoutAction::None
			}
		},
		_ => TimeoutAction::None,
	}
}

/// Whether a previous alert still suppresses a new one.
pub fn within_dedup_window(last_alert_at: Option<OffsetDateTime>, now: OffsetDateTime) -> bool {
	last_alert_at.map(|at| now - at < ALERT_DEDUP_WINDOW).unwrap_or(false)
}

fn whole_minutes(elapsed: Duration) -> i64 {
	elapsed.whole_minutes().max(0)
}
