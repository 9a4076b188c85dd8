use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct ClaimedJob {
	pub id: i64,
	pub tenant_id: Option<Uuid>,
	pub r#type: String,
	pub payload_json: Value,
	pub attempts: i32,
	pub max_attempts: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct JobRow {
	pub id: i64,
	pub status: String,
	pub attempts: i32,
	pub max_attempts: i32,
	pub run_at: OffsetDateTime,
	pub locked_at: Option<OffsetDateTime>,
	pub locked_by: Option<String>,
	pub last_error: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct WebhookEvent {
	pub id: i64,
	pub raw_json: Value,
}

#[derive(Debug, sqlx::FromRow)]
pub struct Contact {
	pub id: Uuid,
	pub status: String,
	pub display_name: Option<String>,
	pub profile_picture_url: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct OpenConversation {
	pub id: Uuid,
	pub assigned_user_id: Option<Uuid>,
	pub status_fila: String,
	pub current_stage_id: Option<Uuid>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct FinalizedConversation {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub finalized_at: OffsetDateTime,
}

/// An open conversation whose patient has written at least once.
#[derive(Debug, sqlx::FromRow)]
pub struct SlaCandidate {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub assigned_user_id: Option<Uuid>,
	pub current_stage_id: Option<Uuid>,
	pub last_patient_message_at: OffsetDateTime,
	pub last_outbound_at: Option<OffsetDateTime>,
	pub last_stage_moved_at: Option<OffsetDateTime>,
	pub contact_status: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SlaPolicyRow {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub stage_id: Option<Uuid>,
	pub contact_status: Option<String>,
	pub response_seconds: i32,
	pub warning_threshold_percent: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SlaTimerRow {
	pub conversation_id: Uuid,
	pub started_at: OffsetDateTime,
	pub due_at: OffsetDateTime,
	pub breached_at: Option<OffsetDateTime>,
	pub current_policy_id: Option<Uuid>,
}

/// An in-progress conversation held by an agent, with its tenant's alert settings.
#[derive(Debug, sqlx::FromRow)]
pub struct TimeoutCandidate {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub assigned_user_id: Uuid,
	pub last_patient_message_at: Option<OffsetDateTime>,
	pub last_outbound_at: Option<OffsetDateTime>,
	pub no_response_alert_minutes: Option<i32>,
	pub follow_up_alert_minutes: Option<i32>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RatingRequestCandidate {
	pub id: Uuid,
	pub tenant_id: Uuid,
	pub phone_e164: Option<String>,
	pub rating_message_enabled: bool,
	pub rating_message_template: Option<String>,
	/// Text of the latest outbound message, used to avoid asking twice.
	pub last_outbound_text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Channel {
	pub tenant_id: Uuid,
	pub phone_number_id: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct MediaAssetRef {
	pub id: Uuid,
	pub storage_path: String,
}

#[derive(Debug, sqlx::FromRow)]
pub struct RetentionPolicy {
	pub tenant_id: Uuid,
	pub access_log_days: i32,
	pub media_days: i32,
	pub webhook_event_days: i32,
	pub job_days: i32,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AgentProfile {
	pub user_id: Uuid,
	pub tenant_id: Uuid,
}

#[derive(Debug, sqlx::FromRow)]
pub struct TimelineRow {
	pub direction: String,
	pub sent_by_user_id: Option<Uuid>,
	pub created_at: OffsetDateTime,
}
