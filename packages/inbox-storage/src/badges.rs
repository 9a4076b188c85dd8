use serde_json::Value;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, db::Db, models::AgentProfile};

pub async fn list_profiles(db: &Db, limit: i64) -> Result<Vec<AgentProfile>> {
	let rows = sqlx::query_as::<_, AgentProfile>(
		"\
SELECT user_id, tenant_id
FROM profiles
ORDER BY created_at ASC, user_id ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn earned_on(db: &Db, tenant_id: Uuid, user_id: Uuid, day: Date) -> Result<Vec<String>> {
	let keys: Vec<String> = sqlx::query_scalar(
		"\
SELECT badge_key
FROM agent_badges
WHERE tenant_id = $1 AND user_id = $2 AND earned_on = $3",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(day)
	.fetch_all(&db.pool)
	.await?;

	Ok(keys)
}

/// Conversations the agent finalized since `since`.
pub async fn finalized_count(
	db: &Db,
	tenant_id: Uuid,
	user_id: Uuid,
	since: OffsetDateTime,
) -> Result<i64> {
	let count: i64 = sqlx::query_scalar(
		"\
SELECT count(*)
FROM conversations
WHERE tenant_id = $1
	AND assigned_user_id = $2
	AND status_fila = 'finalized'
	AND finalized_at >= $3",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(since)
	.fetch_one(&db.pool)
	.await?;

	Ok(count)
}

/// The most recent ratings of conversations the agent handled.
pub async fn recent_ratings(
	db: &Db,
	tenant_id: Uuid,
	user_id: Uuid,
	limit: i64,
) -> Result<Vec<i16>> {
	let ratings: Vec<i16> = sqlx::query_scalar(
		"\
SELECT r.rating
FROM conversation_ratings r
JOIN conversations c ON c.id = r.conversation_id
WHERE r.tenant_id = $1 AND c.assigned_user_id = $2
ORDER BY r.created_at DESC
LIMIT $3",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(ratings)
}

/// Start dates of the agent's completed shifts since `since`.
pub async fn shift_days(
	db: &Db,
	tenant_id: Uuid,
	user_id: Uuid,
	since: OffsetDateTime,
) -> Result<Vec<Date>> {
	let days: Vec<Date> = sqlx::query_scalar(
		"\
SELECT (started_at AT TIME ZONE 'utc')::date
FROM agent_shifts
WHERE tenant_id = $1
	AND user_id = $2
	AND started_at >= $3
	AND ended_at IS NOT NULL",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(since)
	.fetch_all(&db.pool)
	.await?;

	Ok(days)
}

pub struct AwardedBadge<'a> {
	pub key: &'a str,
	pub name: &'a str,
	pub metadata: &'a Value,
}

/// Returns `false` when the badge was already awarded that day.
pub async fn award(
	db: &Db,
	tenant_id: Uuid,
	user_id: Uuid,
	badge: &AwardedBadge<'_>,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO agent_badges (tenant_id, user_id, badge_key, badge_name, metadata, earned_at, earned_on)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (tenant_id, user_id, badge_key, earned_on) DO NOTHING",
	)
	.bind(tenant_id)
	.bind(user_id)
	.bind(badge.key)
	.bind(badge.name)
	.bind(badge.metadata)
	.bind(now)
	.bind(now.date())
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}
