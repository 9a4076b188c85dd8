use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{Result, db::Db};

pub const DEFAULT_LANGUAGE: &str = "pt_BR";

pub struct TemplateRecord<'a> {
	pub name: &'a str,
	pub language: Option<&'a str>,
	pub category: Option<&'a str>,
	pub approved_status: Option<&'a str>,
	pub components: Option<&'a Value>,
}

pub async fn upsert_template(
	db: &Db,
	tenant_id: Uuid,
	template: &TemplateRecord<'_>,
	now: OffsetDateTime,
) -> Result<()> {
	let components = template.components.cloned().unwrap_or_else(|| Value::Array(Vec::new()));

	sqlx::query(
		"\
INSERT INTO whatsapp_templates (
	tenant_id,
	name,
	language,
	category,
	approved_status,
	components_json,
	last_synced_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (tenant_id, name, language) DO UPDATE
SET
	category = EXCLUDED.category,
	approved_status = EXCLUDED.approved_status,
	components_json = EXCLUDED.components_json,
	last_synced_at = EXCLUDED.last_synced_at",
	)
	.bind(tenant_id)
	.bind(template.name)
	.bind(template.language.unwrap_or(DEFAULT_LANGUAGE))
	.bind(template.category)
	.bind(template.approved_status)
	.bind(components)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok(())
}
