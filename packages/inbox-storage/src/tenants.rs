use uuid::Uuid;

use crate::{Result, db::Db, models::Channel};

/// Resolves the tenant that owns a provider phone number.
pub async fn channel_by_phone_number_id(
	db: &Db,
	phone_number_id: &str,
) -> Result<Option<Channel>> {
	let row = sqlx::query_as::<_, Channel>(
		"\
SELECT tenant_id, phone_number_id
FROM whatsapp_accounts
WHERE phone_number_id = $1",
	)
	.bind(phone_number_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// The tenant's sending channel. The oldest account wins when there are several.
pub async fn channel_for_tenant(db: &Db, tenant_id: Uuid) -> Result<Option<Channel>> {
	let row = sqlx::query_as::<_, Channel>(
		"\
SELECT tenant_id, phone_number_id
FROM whatsapp_accounts
WHERE tenant_id = $1
ORDER BY created_at ASC, id ASC
LIMIT 1",
	)
	.bind(tenant_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn list_channels(db: &Db) -> Result<Vec<Channel>> {
	let rows = sqlx::query_as::<_, Channel>(
		"\
SELECT tenant_id, phone_number_id
FROM whatsapp_accounts
ORDER BY tenant_id, created_at ASC",
	)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

/// First funnel stage of the tenant, used to seed new conversations.
pub async fn initial_stage_id(db: &Db, tenant_id: Uuid) -> Result<Option<Uuid>> {
	let id: Option<Uuid> = sqlx::query_scalar(
		"\
SELECT id
FROM funnel_stages
WHERE tenant_id = $1
ORDER BY sort_order ASC, id ASC
LIMIT 1",
	)
	.bind(tenant_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(id)
}
