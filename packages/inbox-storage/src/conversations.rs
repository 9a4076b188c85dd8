use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::queue::QueueStatus;

use crate::{
	Result,
	db::Db,
	models::{
		FinalizedConversation, OpenConversation, RatingRequestCandidate, SlaCandidate,
		TimeoutCandidate,
	},
};

pub async fn find_open(
	db: &Db,
	tenant_id: Uuid,
	contact_id: Uuid,
) -> Result<Option<OpenConversation>> {
	let row = sqlx::query_as::<_, OpenConversation>(
		"\
SELECT id, assigned_user_id, status_fila, current_stage_id
FROM conversations
WHERE tenant_id = $1
	AND contact_id = $2
	AND status_fila <> 'finalized'
ORDER BY created_at DESC
LIMIT 1",
	)
	.bind(tenant_id)
	.bind(contact_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// Returns the open conversation for a contact, creating one in the queue when none exists.
///
/// Concurrent creators race on the partial unique index; the loser reads the winner's row.
pub async fn find_or_create_open(
	db: &Db,
	tenant_id: Uuid,
	contact_id: Uuid,
	initial_stage_id: Option<Uuid>,
	now: OffsetDateTime,
) -> Result<OpenConversation> {
	if let Some(existing) = find_open(db, tenant_id, contact_id).await? {
		return Ok(existing);
	}

	let created = sqlx::query_as::<_, OpenConversation>(
		"\
INSERT INTO conversations (tenant_id, contact_id, status_fila, current_stage_id, created_at, updated_at)
VALUES ($1, $2, $3, $4, $5, $5)
ON CONFLICT (tenant_id, contact_id) WHERE status_fila <> 'finalized' DO NOTHING
RETURNING id, assigned_user_id, status_fila, current_stage_id",
	)
	.bind(tenant_id)
	.bind(contact_id)
	.bind(QueueStatus::AwaitingAgent.as_str())
	.bind(initial_stage_id)
	.bind(now)
	.fetch_optional(&db.pool)
	.await?;

	match created {
		Some(created) => Ok(created),
		None => find_open(db, tenant_id, contact_id).await?.ok_or_else(|| {
			crate::Error::NotFound(format!("open conversation for contact {contact_id}"))
		}),
	}
}

/// Stamps a patient message and applies the resulting queue status. Finalized rows are left alone.
pub async fn record_inbound(
	db: &Db,
	conversation_id: Uuid,
	status: QueueStatus,
	received_at: OffsetDateTime,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE conversations
SET
	status_fila = $2,
	last_inbound_at = GREATEST(last_inbound_at, $3),
	last_patient_message_at = GREATEST(last_patient_message_at, $3),
	updated_at = $4
WHERE id = $1 AND status_fila <> 'finalized'",
	)
	.bind(conversation_id)
	.bind(status.as_str())
	.bind(received_at)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn record_outbound(db: &Db, conversation_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
UPDATE conversations
SET last_outbound_at = $2, updated_at = $2
WHERE id = $1",
	)
	.bind(conversation_id)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Unassigns `agent_id` and moves the conversation back to the queue.
///
/// Returns `false` when the conversation changed hands or status since it was read.
pub async fn return_to_queue(
	db: &Db,
	conversation_id: Uuid,
	agent_id: Uuid,
	status: QueueStatus,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
UPDATE conversations
SET assigned_user_id = NULL, status_fila = $3, updated_at = $4
WHERE id = $1
	AND assigned_user_id = $2
	AND status_fila = 'in_progress'",
	)
	.bind(conversation_id)
	.bind(agent_id)
	.bind(status.as_str())
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}

pub async fn list_sla_candidates(db: &Db, limit: i64) -> Result<Vec<SlaCandidate>> {
	let rows = sqlx::query_as::<_, SlaCandidate>(
		"\
SELECT
	c.id,
	c.tenant_id,
	c.assigned_user_id,
	c.current_stage_id,
	c.last_patient_message_at,
	c.last_outbound_at,
	c.last_stage_moved_at,
	ct.status AS contact_status
FROM conversations c
LEFT JOIN contacts ct ON ct.id = c.contact_id
WHERE c.status_fila <> 'finalized'
	AND c.last_patient_message_at IS NOT NULL
ORDER BY c.last_patient_message_at ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn list_timeout_candidates(db: &Db, limit: i64) -> Result<Vec<TimeoutCandidate>> {
	let rows = sqlx::query_as::<_, TimeoutCandidate>(
		"\
SELECT
	c.id,
	c.tenant_id,
	c.assigned_user_id,
	c.last_patient_message_at,
	c.last_outbound_at,
	t.no_response_alert_minutes,
	t.follow_up_alert_minutes
FROM conversations c
LEFT JOIN tenants t ON t.id = c.tenant_id
WHERE c.status_fila = 'in_progress'
	AND c.assigned_user_id IS NOT NULL
ORDER BY c.updated_at ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// The contact's most recently finalized conversation that has no rating yet.
pub async fn latest_finalized_unrated(
	db: &Db,
	tenant_id: Uuid,
	contact_id: Uuid,
) -> Result<Option<FinalizedConversation>> {
	let row = sqlx::query_as::<_, FinalizedConversation>(
		"\
SELECT c.id, c.tenant_id, c.finalized_at
FROM conversations c
WHERE c.tenant_id = $1
	AND c.contact_id = $2
	AND c.status_fila = 'finalized'
	AND c.finalized_at IS NOT NULL
	AND NOT EXISTS (SELECT 1 FROM conversation_ratings r WHERE r.conversation_id = c.id)
ORDER BY c.finalized_at DESC
LIMIT 1",
	)
	.bind(tenant_id)
	.bind(contact_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// Conversations finalized since `since` that were neither rated nor asked for a rating.
pub async fn list_rating_request_candidates(
	db: &Db,
	since: OffsetDateTime,
	limit: i64,
) -> Result<Vec<RatingRequestCandidate>> {
	let rows = sqlx::query_as::<_, RatingRequestCandidate>(
		"\
SELECT
	c.id,
	c.tenant_id,
	ct.phone_e164,
	COALESCE(t.rating_message_enabled, true) AS rating_message_enabled,
	t.rating_message_template,
	(
		SELECT COALESCE(m.body_json->>'text', m.body_json->'template'->>'name')
		FROM messages m
		WHERE m.conversation_id = c.id AND m.direction = 'out'
		ORDER BY m.created_at DESC
		LIMIT 1
	) AS last_outbound_text
FROM conversations c
LEFT JOIN contacts ct ON ct.id = c.contact_id
LEFT JOIN tenants t ON t.id = c.tenant_id
WHERE c.status_fila = 'finalized'
	AND c.finalized_at >= $1
	AND c.rating_requested_at IS NULL
	AND NOT EXISTS (SELECT 1 FROM conversation_ratings r WHERE r.conversation_id = c.id)
ORDER BY c.finalized_at ASC
LIMIT $2",
	)
	.bind(since)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn mark_rating_requested_tx(
	tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
	conversation_id: Uuid,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query("UPDATE conversations SET rating_requested_at = $2 WHERE id = $1")
		.bind(conversation_id)
		.bind(now)
		.execute(&mut **tx)
		.await?;

	Ok(())
}
