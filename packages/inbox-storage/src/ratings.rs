use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::rating::ParsedRating;

use crate::{Result, db::Db};

/// Stores the first rating of a conversation. Returns `false` when one already exists.
pub async fn insert_rating(
	db: &Db,
	tenant_id: Uuid,
	conversation_id: Uuid,
	rating: &ParsedRating,
	contact_phone: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO conversation_ratings (tenant_id, conversation_id, rating, comment, contact_phone, created_at)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (conversation_id) DO NOTHING",
	)
	.bind(tenant_id)
	.bind(conversation_id)
	.bind(i16::from(rating.rating))
	.bind(rating.comment.as_deref())
	.bind(contact_phone)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() == 1)
}
