use serde_json::{Value, json};
use sqlx::{Executor, Postgres};
use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::message_status::MessageStatus;

use crate::{Result, db::Db, models::TimelineRow};

/// An inbound message ready to be stored.
pub struct NewInboundMessage<'a> {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub kind: &'a str,
	pub body_json: &'a Value,
	pub meta_message_id: &'a str,
	pub created_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct StoredMessage {
	pub id: Uuid,
	pub inserted: bool,
}

/// Whether a message with this provider id is already stored.
pub async fn exists_by_meta_id(db: &Db, meta_message_id: &str) -> Result<bool> {
	let exists = sqlx::query_scalar(
		"SELECT EXISTS (SELECT 1 FROM messages WHERE meta_message_id = $1)",
	)
	.bind(meta_message_id)
	.fetch_one(&db.pool)
	.await?;

	Ok(exists)
}

/// Inserts an inbound message keyed by its provider id. Replays return the existing row.
pub async fn upsert_inbound(
	db: &Db,
	message: &NewInboundMessage<'_>,
	now: OffsetDateTime,
) -> Result<StoredMessage> {
	let stored = sqlx::query_as::<_, StoredMessage>(
		"\
INSERT INTO messages (
	tenant_id,
	conversation_id,
	direction,
	type,
	body_json,
	meta_message_id,
	status,
	created_at,
	updated_at
)
VALUES ($1, $2, 'in', $3, $4, $5, 'delivered', $6, $7)
ON CONFLICT (meta_message_id) DO UPDATE
SET updated_at = messages.updated_at
RETURNING id, (xmax = 0) AS inserted",
	)
	.bind(message.tenant_id)
	.bind(message.conversation_id)
	.bind(message.kind)
	.bind(message.body_json)
	.bind(message.meta_message_id)
	.bind(message.created_at)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(stored)
}

/// Records an accepted send. Later receipts may already have advanced the status.
///
/// A missing provider id leaves the stored `meta_message_id` untouched.
pub async fn mark_sent(
	db: &Db,
	message_id: Uuid,
	meta_message_id: Option<&str>,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE messages
SET
	meta_message_id = COALESCE($2, meta_message_id),
	status = CASE WHEN status IN ('queued', 'failed') THEN 'sent' ELSE status END,
	updated_at = $3
WHERE id = $1",
	)
	.bind(message_id)
	.bind(meta_message_id)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn mark_failed(db: &Db, message_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
UPDATE messages
SET status = 'failed', updated_at = $2
WHERE id = $1 AND status = 'queued'",
	)
	.bind(message_id)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Moves a message forward to `status`. Returns `false` for unknown ids and for regressions.
pub async fn advance_status(
	db: &Db,
	meta_message_id: &str,
	status: MessageStatus,
	now: OffsetDateTime,
) -> Result<bool> {
	let predecessors = status.predecessors();

	if predecessors.is_empty() {
		return Ok(false);
	}

	let result = sqlx::query(
		"\
UPDATE messages
SET status = $2, updated_at = $4
WHERE meta_message_id = $1 AND status = ANY($3)",
	)
	.bind(meta_message_id)
	.bind(status.as_str())
	.bind(predecessors.as_slice())
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

/// Full name of the agent who wrote the message, if any.
pub async fn author_full_name(db: &Db, message_id: Uuid) -> Result<Option<String>> {
	let name: Option<Option<String>> = sqlx::query_scalar(
		"\
SELECT p.full_name
FROM messages m
JOIN profiles p ON p.user_id = m.sent_by_user_id
WHERE m.id = $1",
	)
	.bind(message_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(name.flatten().filter(|name| !name.trim().is_empty()))
}

/// Shallow-merges `patch` into the message body.
pub async fn merge_body(
	db: &Db,
	message_id: Uuid,
	patch: &Value,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE messages
SET body_json = body_json || $2, updated_at = $3
WHERE id = $1",
	)
	.bind(message_id)
	.bind(patch)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn insert_outbound_text(
	db: &Db,
	tenant_id: Uuid,
	conversation_id: Uuid,
	text: &str,
	now: OffsetDateTime,
) -> Result<Uuid> {
	insert_outbound_text_exec(&db.pool, tenant_id, conversation_id, text, now).await
}

pub async fn insert_outbound_text_tx(
	tx: &mut sqlx::Transaction<'_, Postgres>,
	tenant_id: Uuid,
	conversation_id: Uuid,
	text: &str,
	now: OffsetDateTime,
) -> Result<Uuid> {
	insert_outbound_text_exec(&mut **tx, tenant_id, conversation_id, text, now).await
}

pub async fn fetch_status(db: &Db, message_id: Uuid) -> Result<Option<MessageStatus>> {
	let status: Option<String> = sqlx::query_scalar("SELECT status FROM messages WHERE id = $1")
		.bind(message_id)
		.fetch_optional(&db.pool)
		.await?;

	Ok(status.as_deref().and_then(MessageStatus::parse))
}

/// Messages in conversations held by an agent since `since`, oldest first.
pub async fn agent_timeline(
	db: &Db,
	tenant_id: Uuid,
	user_id: Uuid,
	since: OffsetDateTime,
) -> Result<Vec<TimelineRow>> {
	let rows = sqlx::query_as::<_, TimelineRow>(
		"\
SELECT m.direction, m.sent_by_user_id, m.created_at
FROM messages m
JOIN conversations c ON c.id = m.conversation_id
WHERE m.tenant_id = $1
	AND c.assigned_user_id = $2
	AND m.created_at >= $3
ORDER BY m.created_at ASC",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(since)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

async fn insert_outbound_text_exec<'e, E>(
	executor: E,
	tenant_id: Uuid,
	conversation_id: Uuid,
	text: &str,
	now: OffsetDateTime,
) -> Result<Uuid>
where
	E: Executor<'e, Database = Postgres>,
{
	let id: Uuid = sqlx::query_scalar(
		"\
INSERT INTO messages (tenant_id, conversation_id, direction, type, body_json, status, created_at, updated_at)
VALUES ($1, $2, 'out', 'text', $3, 'queued', $4, $4)
RETURNING id",
	)
	.bind(tenant_id)
	.bind(conversation_id)
	.bind(json!({ "text": text }))
	.bind(now)
	.fetch_one(executor)
	.await?;

	Ok(id)
}
