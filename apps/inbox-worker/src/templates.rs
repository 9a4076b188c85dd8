//! Daily mirror of the provider's approved message templates.

use time::OffsetDateTime;

use inbox_providers::MessagingProvider;
use inbox_storage::{
	templates::{self, TemplateRecord},
	tenants,
};

use crate::{Result, scheduler::WorkerState};

/// Returns the number of templates written. A failing channel is logged and skipped.
pub async fn sync_templates(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	now: OffsetDateTime,
) -> Result<usize> {
	let channels = tenants::list_channels(&state.db).await?;
	let mut synced = 0;

	for channel in &channels {
		let remote = match provider.list_templates(&channel.phone_number_id).await {
			Ok(remote) => remote,
			Err(err) => {
				tracing::warn!(
					error = %err,
					tenant_id = %channel.tenant_id,
					phone_number_id = %channel.phone_number_id,
					"Template listing failed."
				);

				continue;
			},
		};

		for template in &remote {
			let record = TemplateRecord {
				name: &template.name,
				language: template.language.as_deref(),
				category: template.category.as_deref(),
				approved_status: template.status.as_deref(),
				components: template.components.as_ref(),
			};

			templates::upsert_template(&state.db, channel.tenant_id, &record, now).await?;

			synced += 1;
		}
	}

	tracing::info!(channels = channels.len(), templates = synced, "Template sync completed.");

	Ok(synced)
}
