use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::sla::{ResponseEvent, TimerState};

use crate::{
	Result,
	db::Db,
	models::{SlaPolicyRow, SlaTimerRow},
};

pub async fn list_policies(db: &Db, tenant_id: Uuid) -> Result<Vec<SlaPolicyRow>> {
	let rows = sqlx::query_as::<_, SlaPolicyRow>(
		"\
SELECT id, tenant_id, stage_id, contact_status, response_seconds, warning_threshold_percent
FROM sla_policies
WHERE tenant_id = $1
ORDER BY created_at ASC, id ASC",
	)
	.bind(tenant_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn list_timers(db: &Db, conversation_ids: &[Uuid]) -> Result<Vec<SlaTimerRow>> {
	if conversation_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows = sqlx::query_as::<_, SlaTimerRow>(
		"\
SELECT conversation_id, started_at, due_at, breached_at, current_policy_id
FROM sla_timers
WHERE conversation_id = ANY($1)",
	)
	.bind(conversation_ids)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn upsert_timer(
	db: &Db,
	tenant_id: Uuid,
	conversation_id: Uuid,
	timer: &TimerState,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO sla_timers (
	conversation_id,
	tenant_id,
	started_at,
	due_at,
	breached_at,
	current_policy_id,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (conversation_id) DO UPDATE
SET
	started_at = EXCLUDED.started_at,
	due_at = EXCLUDED.due_at,
	breached_at = EXCLUDED.breached_at,
	current_policy_id = EXCLUDED.current_policy_id,
	updated_at = EXCLUDED.updated_at",
	)
	.bind(conversation_id)
	.bind(tenant_id)
	.bind(timer.started_at)
	.bind(timer.due_at)
	.bind(timer.breached_at)
	.bind(timer.policy_id)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn delete_timer(db: &Db, conversation_id: Uuid) -> Result<()> {
	sqlx::query("DELETE FROM sla_timers WHERE conversation_id = $1")
		.bind(conversation_id)
		.execute(&db.pool)
		.await?;

	Ok(())
}

pub async fn insert_breach(
	db: &Db,
	tenant_id: Uuid,
	conversation_id: Uuid,
	assigned_user_id: Option<Uuid>,
	timer: &TimerState,
	occurred_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO sla_events (
	tenant_id,
	conversation_id,
	assigned_user_id,
	type,
	started_at,
	due_at,
	occurred_at,
	policy_id
)
VALUES ($1, $2, $3, 'breach', $4, $5, $6, $7)",
	)
	.bind(tenant_id)
	.bind(conversation_id)
	.bind(assigned_user_id)
	.bind(timer.started_at)
	.bind(timer.due_at)
	.bind(occurred_at)
	.bind(timer.policy_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn insert_response(
	db: &Db,
	tenant_id: Uuid,
	conversation_id: Uuid,
	assigned_user_id: Option<Uuid>,
	response: &ResponseEvent,
	occurred_at: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
INSERT INTO sla_events (
	tenant_id,
	conversation_id,
	assigned_user_id,
	type,
	started_at,
	due_at,
	occurred_at,
	response_seconds,
	policy_id
)
VALUES ($1, $2, $3, 'response', $4, $5, $6, $7, $8)",
	)
	.bind(tenant_id)
	.bind(conversation_id)
	.bind(assigned_user_id)
	.bind(response.started_at)
	.bind(response.due_at)
	.bind(occurred_at)
	.bind(response.response_seconds)
	.bind(response.policy_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}
