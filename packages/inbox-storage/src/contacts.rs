use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::Contact};

/// Inserts or refreshes a contact without erasing known profile data.
///
/// Absent `display_name`/`profile_picture_url` keep the stored values, and an existing status is
/// never reset to `lead`.
pub async fn upsert_contact(
	db: &Db,
	tenant_id: Uuid,
	phone_e164: &str,
	display_name: Option<&str>,
	profile_picture_url: Option<&str>,
	now: OffsetDateTime,
) -> Result<Contact> {
	let row = sqlx::query_as::<_, Contact>(
		"\
INSERT INTO contacts (tenant_id, phone_e164, display_name, profile_picture_url, status, updated_at)
VALUES ($1, $2, $3, $4, 'lead', $5)
ON CONFLICT (tenant_id, phone_e164) DO UPDATE
SET
	display_name = COALESCE(EXCLUDED.display_name, contacts.display_name),
	profile_picture_url = COALESCE(EXCLUDED.profile_picture_url, contacts.profile_picture_url),
	updated_at = EXCLUDED.updated_at
RETURNING id, status, display_name, profile_picture_url",
	)
	.bind(tenant_id)
	.bind(phone_e164)
	.bind(display_name)
	.bind(profile_picture_url)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(row)
}
