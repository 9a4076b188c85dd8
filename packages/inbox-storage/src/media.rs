use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db, models::MediaAssetRef};

pub const RETENTION_BATCH: i64 = 100;

pub struct NewMediaAsset<'a> {
	pub tenant_id: Uuid,
	pub conversation_id: Option<Uuid>,
	pub message_id: Option<Uuid>,
	pub kind: &'a str,
	pub meta_media_id: Option<&'a str>,
	pub storage_path: &'a str,
	pub content_type: Option<&'a str>,
	pub size_bytes: i64,
	pub checksum: Option<&'a str>,
}

/// Records a stored blob. A second ingest of the same path refreshes the row and keeps its id.
pub async fn upsert_asset(
	db: &Db,
	asset: &NewMediaAsset<'_>,
	now: OffsetDateTime,
) -> Result<Uuid> {
	let id: Uuid = sqlx::query_scalar(
		"\
INSERT INTO media_assets (
	tenant_id,
	conversation_id,
	message_id,
	kind,
	meta_media_id,
	storage_path,
	content_type,
	size_bytes,
	checksum,
	created_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
ON CONFLICT (storage_path) DO UPDATE
SET
	message_id = COALESCE(EXCLUDED.message_id, media_assets.message_id),
	content_type = EXCLUDED.content_type,
	size_bytes = EXCLUDED.size_bytes,
	checksum = EXCLUDED.checksum,
	deleted_at = NULL
RETURNING id",
	)
	.bind(asset.tenant_id)
	.bind(asset.conversation_id)
	.bind(asset.message_id)
	.bind(asset.kind)
	.bind(asset.meta_media_id)
	.bind(asset.storage_path)
	.bind(asset.content_type)
	.bind(asset.size_bytes)
	.bind(asset.checksum)
	.bind(now)
	.fetch_one(&db.pool)
	.await?;

	Ok(id)
}

/// Live assets created before `cutoff`, oldest first.
pub async fn list_expired(
	db: &Db,
	tenant_id: Uuid,
	cutoff: OffsetDateTime,
	limit: i64,
) -> Result<Vec<MediaAssetRef>> {
	let rows = sqlx::query_as::<_, MediaAssetRef>(
		"\
SELECT id, storage_path
FROM media_assets
WHERE tenant_id = $1
	AND created_at < $2
	AND deleted_at IS NULL
ORDER BY created_at ASC
LIMIT $3",
	)
	.bind(tenant_id)
	.bind(cutoff)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn mark_deleted(db: &Db, asset_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE media_assets SET deleted_at = $2 WHERE id = $1 AND deleted_at IS NULL")
		.bind(asset_id)
		.bind(now)
		.execute(&db.pool)
		.await?;

	Ok(())
}
