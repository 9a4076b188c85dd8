//! Outbound job queue.
//!
//! A claimed job keeps `status = 'queued'` and carries a lease in `locked_at`/`locked_by`. Only the
//! lease holder moves it to a terminal state; an expired lease makes the job claimable again.

use serde_json::Value;
use sqlx::{Executor, Postgres};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
	Result,
	db::Db,
	models::{ClaimedJob, JobRow},
};

pub const CLAIM_LEASE_SECONDS: i64 = 300;
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Claims up to `limit` due jobs for `worker_id` in one statement and bumps their attempt count.
pub async fn claim_jobs(
	db: &Db,
	limit: i64,
	worker_id: &str,
	now: OffsetDateTime,
) -> Result<Vec<ClaimedJob>> {
	let lease_cutoff = now - Duration::seconds(CLAIM_LEASE_SECONDS);
	let mut jobs = sqlx::query_as::<_, ClaimedJob>(
		"\
WITH next AS (
	SELECT id
	FROM jobs
	WHERE status = 'queued'
		AND run_at <= $1
		AND (locked_at IS NULL OR locked_at < $2)
	ORDER BY run_at ASC, id ASC
	LIMIT $3
	FOR UPDATE SKIP LOCKED
)
UPDATE jobs
SET
	locked_at = $1,
	locked_by = $4,
	attempts = jobs.attempts + 1,
	updated_at = $1
FROM next
WHERE jobs.id = next.id
RETURNING
	jobs.id,
	jobs.tenant_id,
	jobs.type,
	jobs.payload_json,
	jobs.attempts,
	jobs.max_attempts",
	)
	.bind(now)
	.bind(lease_cutoff)
	.bind(limit)
	.bind(worker_id)
	.fetch_all(&db.pool)
	.await?;

	jobs.sort_by_key(|job| job.id);

	Ok(jobs)
}

pub async fn mark_done(db: &Db, job_id: i64, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
UPDATE jobs
SET
	status = 'done',
	locked_at = NULL,
	locked_by = NULL,
	last_error = NULL,
	updated_at = $2
WHERE id = $1 AND status = 'queued'",
	)
	.bind(job_id)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Releases the lease and schedules the next attempt.
pub async fn reschedule(
	db: &Db,
	job_id: i64,
	run_at: OffsetDateTime,
	error: &str,
	now: OffsetDateTime,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE jobs
SET
	run_at = $2,
	locked_at = NULL,
	locked_by = NULL,
	last_error = $3,
	updated_at = $4
WHERE id = $1 AND status = 'queued'",
	)
	.bind(job_id)
	.bind(run_at)
	.bind(error)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn mark_failed(db: &Db, job_id: i64, error: &str, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"\
UPDATE jobs
SET
	status = 'failed',
	locked_at = NULL,
	locked_by = NULL,
	last_error = $2,
	updated_at = $3
WHERE id = $1 AND status = 'queued'",
	)
	.bind(job_id)
	.bind(error)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}

pub async fn enqueue(
	db: &Db,
	tenant_id: Uuid,
	job_type: &str,
	payload: &Value,
	max_attempts: i32,
) -> Result<i64> {
	enqueue_exec(&db.pool, tenant_id, job_type, payload, max_attempts).await
}

pub async fn enqueue_tx(
	tx: &mut sqlx::Transaction<'_, Postgres>,
	tenant_id: Uuid,
	job_type: &str,
	payload: &Value,
	max_attempts: i32,
) -> Result<i64> {
	enqueue_exec(&mut **tx, tenant_id, job_type, payload, max_attempts).await
}

pub async fn fetch_job(db: &Db, job_id: i64) -> Result<Option<JobRow>> {
	let row = sqlx::query_as::<_, JobRow>(
		"\
SELECT
	id,
	status,
	attempts,
	max_attempts,
	run_at,
	locked_at,
	locked_by,
	last_error
FROM jobs
WHERE id = $1",
	)
	.bind(job_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

async fn enqueue_exec<'e, E>(
	executor: E,
	tenant_id: Uuid,
	job_type: &str,
	payload: &Value,
	max_attempts: i32,
) -> Result<i64>
where
	E: Executor<'e, Database = Postgres>,
{
	let id: i64 = sqlx::query_scalar(
		"\
INSERT INTO jobs (tenant_id, type, payload_json, max_attempts)
VALUES ($1, $2, $3, $4)
RETURNING id",
	)
	.bind(tenant_id)
	.bind(job_type)
	.bind(payload)
	.bind(max_attempts)
	.fetch_one(executor)
	.await?;

	Ok(id)
}
