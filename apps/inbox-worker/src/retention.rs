//! Daily purge of expired records and media.

use time::{Duration, OffsetDateTime};

use inbox_storage::{media, models::RetentionPolicy, retention};

use crate::{Result, scheduler::WorkerState};

/// Used for webhook events when no tenant has a policy.
pub const DEFAULT_WEBHOOK_EVENT_DAYS: i32 = 30;

#[derive(Debug, Default, PartialEq)]
pub struct RetentionSummary {
	pub access_logs: u64,
	pub webhook_events: u64,
	pub jobs: u64,
	pub media: u64,
}

pub async fn run_retention(state: &WorkerState, now: OffsetDateTime) -> Result<RetentionSummary> {
	let policies = retention::list_policies(&state.db).await?;
	let mut summary = RetentionSummary::default();

	for policy in &policies {
		summary.access_logs += retention::delete_access_logs(
			&state.db,
			policy.tenant_id,
			cutoff(now, policy.access_log_days),
		)
		.await?;
		summary.jobs +=
			retention::delete_finished_jobs(&state.db, policy.tenant_id, cutoff(now, policy.job_days))
				.await?;
		summary.media += purge_media(state, policy, now).await?;
	}

	summary.webhook_events = retention::delete_processed_webhook_events(
		&state.db,
		cutoff(now, webhook_event_days(&policies)),
	)
	.await?;

	tracing::info!(
		access_logs = summary.access_logs,
		webhook_events = summary.webhook_events,
		jobs = summary.jobs,
		media = summary.media,
		"Retention sweep completed."
	);

	Ok(summary)
}

async fn purge_media(state: &WorkerState, policy: &RetentionPolicy, now: OffsetDateTime) -> Result<u64> {
	let expired = media::list_expired(
		&state.db,
		policy.tenant_id,
		cutoff(now, policy.media_days),
		media::RETENTION_BATCH,
	)
	.await?;
	let mut purged = 0;

	for asset in &expired {
		if let Err(err) = state.blobs.delete(&asset.storage_path).await {
			tracing::warn!(
				error = %err,
				media_asset_id = %asset.id,
				"Failed to delete expired media blob."
			);

			continue;
		}

		media::mark_deleted(&state.db, asset.id, now).await?;

		purged += 1;
	}

	Ok(purged)
}

fn cutoff(now: OffsetDateTime, days: i32) -> OffsetDateTime {
	now - Duration::days(i64::from(days.max(1)))
}

/// Webhook events have no tenant, so the longest configured retention applies to all of them.
fn webhook_event_days(policies: &[RetentionPolicy]) -> i32 {
	policies
		.iter()
		.map(|policy| policy.webhook_event_days)
		.max()
		.unwrap_or(DEFAULT_WEBHOOK_EVENT_DAYS)
}
