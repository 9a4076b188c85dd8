use serde_json::Value;
use time::OffsetDateTime;

use crate::{Result, db::Db, models::WebhookEvent};

/// Unprocessed events in arrival order.
pub async fn fetch_pending(db: &Db, limit: i64) -> Result<Vec<WebhookEvent>> {
	let rows = sqlx::query_as::<_, WebhookEvent>(
		"\
SELECT id, raw_json
FROM whatsapp_webhook_events
WHERE processed_at IS NULL
ORDER BY id ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// Marks an event consumed. `error` is recorded for events that could not be applied; they are not
/// retried either way.
pub async fn mark_processed(
	db: &Db,
	event_id: i64,
	error: Option<&str>,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE whatsapp_webhook_events
SET processed_at = $2, processing_error = $3
WHERE id = $1 AND processed_at IS NULL",
	)
	.bind(event_id)
	.bind(now)
	.bind(error)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn insert(db: &Db, raw_json: &Value) -> Result<i64> {
	let id: i64 =
		sqlx::query_scalar("INSERT INTO whatsapp_webhook_events (raw_json) VALUES ($1) RETURNING id")
			.bind(raw_json)
			.fetch_one(&db.pool)
			.await?;

	Ok(id)
}
