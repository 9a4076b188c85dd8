//! Per-tenant purges. Media rows are handled by [`crate::media`] because their blobs go first.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::RetentionPolicy};

pub async fn list_policies(db: &Db) -> Result<Vec<RetentionPolicy>> {
	let rows = sqlx::query_as::<_, RetentionPolicy>(
		"\
SELECT tenant_id, access_log_days, media_days, webhook_event_days, job_days
FROM retention_policies
ORDER BY tenant_id",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn delete_access_logs(
	db: &Db,
	tenant_id: Uuid,
	cutoff: OffsetDateTime,
) -> Result<u64> {
	let result = sqlx::query("DELETE FROM access_logs WHERE tenant_id = $1 AND created_at < $2")
		.bind(tenant_id)
		.bind(cutoff)
		.execute(&db.pool)
		.await?;

	Ok(result.rows_affected())
}

/// Webhook events carry no tenant column, so the purge is global. Pending events are kept.
pub async fn delete_processed_webhook_events(db: &Db, cutoff: OffsetDateTime) -> Result<u64> {
	let result = sqlx::query(
		"\
DELETE FROM whatsapp_webhook_events
WHERE processed_at IS NOT NULL AND received_at < $1",
	)
	.bind(cutoff)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}

pub async fn delete_finished_jobs(
	db: &Db,
	tenant_id: Uuid,
	cutoff: OffsetDateTime,
) -> Result<u64> {
	let result = sqlx::query(
		"\
DELETE FROM jobs
WHERE tenant_id = $1
	AND status IN ('done', 'failed')
	AND created_at < $2",
	)
	.bind(tenant_id)
	.bind(cutoff)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}
