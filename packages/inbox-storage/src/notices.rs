//! Internal notices addressed to agents.

use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::timeouts::NoticeKind;

use crate::{Result, db::Db};

pub async fn insert_notice(
	db: &Db,
	tenant_id: Uuid,
	to_user_id: Uuid,
	conversation_id: Uuid,
	kind: NoticeKind,
	text: &str,
	now: OffsetDateTime,
) -> Result<Uuid> {
	let id: Uuid = sqlx::query_scalar(
		"\
INSERT INTO internal_messages (tenant_id, from_user_id, to_user_id, conversation_id, kind, message, created_at)
VALUES ($1, NULL, $2, $3, $4, $5, $6)
RETURNING id",
	)
	.bind(tenant_id)
	.bind(to_user_id)
	.bind(conversation_id)
	.bind(kind.as_str())
	.bind(text)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(id)
}

/// When the agent last received any alert about this conversation.
pub async fn last_alert_at(
	db: &Db,
	conversation_id: Uuid,
	to_user_id: Uuid,
) -> Result<Option<OffsetDateTime>> {
	let kinds = [NoticeKind::NoResponseWarning.as_str(), NoticeKind::FollowUp.as_str()];
	let at: Option<OffsetDateTime> = sqlx::query_scalar(
		"\
SELECT max(created_at)
FROM internal_messages
WHERE conversation_id = $1
	AND to_user_id = $2
	AND kind = ANY($3)",
	)
	.bind(conversation_id)
	.bind(to_user_id)
	.bind(kinds.as_slice())
	.fetch_one(&db.pool)
	.await?;

	Ok(at)
}
