//! Satisfaction ratings: asking for them after finalization and recording the replies.

use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use inbox_domain::{
	job::{JobPayload, SendText},
	rating,
};
use inbox_storage::{
	conversations, jobs, messages, models::RatingRequestCandidate, ratings as rating_store,
};

use crate::{Result, scheduler::WorkerState};

/// Conversations finalized longer ago than this are never asked.
pub const REQUEST_LOOKBACK: Duration = Duration::minutes(5);
pub const REQUEST_BATCH: i64 = 50;

/// Enqueues a rating request for every recently finalized, unrated conversation.
pub async fn send_rating_requests(state: &WorkerState, now: OffsetDateTime) -> Result<usize> {
	let candidates = conversations::list_rating_request_candidates(
		&state.db,
		now - REQUEST_LOOKBACK,
		REQUEST_BATCH,
	)
	.await?;
	let mut sent = 0;

	for candidate in &candidates {
		let Some(text) = request_text(candidate) else {
			continue;
		};
		let Some(phone_e164) = candidate.phone_e164.as_deref() else {
			continue;
		};
		let mut tx = state.db.pool.begin().await?;
		let message_id = messages::insert_outbound_text_tx(
			&mut tx,
			candidate.tenant_id,
			candidate.id,
			&text,
			now,
		)
		.await?;
		let payload = JobPayload::SendText(SendText {
			tenant_id: candidate.tenant_id,
			conversation_id: candidate.id,
			contact_phone_e164: phone_e164.to_string(),
			text,
			message_id,
		});

		jobs::enqueue_tx(
			&mut tx,
			candidate.tenant_id,
			payload.job_type(),
			&payload.to_value(),
			jobs::DEFAULT_MAX_ATTEMPTS,
		)
		.await?;
		conversations::mark_rating_requested_tx(&mut tx, candidate.id, now).await?;
		tx.commit().await?;

		sent += 1;

		tracing::info!(conversation_id = %candidate.id, "Rating request enqueued.");
	}

	Ok(sent)
}

/// The text to send, or `None` when the tenant disabled requests or one was already sent.
pub fn request_text(candidate: &RatingRequestCandidate) -> Option<String> {
	if !candidate.rating_message_enabled {
		return None;
	}
	if candidate.last_outbound_text.as_deref().is_some_and(rating::looks_like_rating_request) {
		return None;
	}

	let text = candidate
		.rating_message_template
		.as_deref()
		.map(str::trim)
		.filter(|template| !template.is_empty())
		.unwrap_or(rating::DEFAULT_RATING_REQUEST);

	Some(text.to_string())
}

/// Records `text` as the rating of the contact's latest finalized conversation, if it is one.
///
/// Returns `true` when a new rating was stored.
pub async fn record_rating_reply(
	state: &WorkerState,
	tenant_id: Uuid,
	contact_id: Uuid,
	contact_phone: &str,
	text: &str,
	now: OffsetDateTime,
) -> Result<bool> {
	let Some(parsed) = rating::parse_rating(text) else {
		return Ok(false);
	};
	let Some(conversation) =
		conversations::latest_finalized_unrated(&state.db, tenant_id, contact_id).await?
	else {
		return Ok(false);
	};

	if !rating::within_rating_window(conversation.finalized_at, now) {
		return Ok(false);
	}

	let stored = rating_store::insert_rating(
		&state.db,
		tenant_id,
		conversation.id,
		&parsed,
		contact_phone,
		now,
	)
	.await?;

	if stored {
		tracing::info!(
			conversation_id = %conversation.id,
			rating = parsed.rating,
			"Conversation rating recorded."
		);
	}

	Ok(stored)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate() -> RatingRequestCandidate {
		RatingRequestCandidate {
			id: Uuid::new_v4(),
			tenant_id: Uuid::new_v4(),
			phone_e164: Some("+5511999990000".to_string()),
			rating_message_enabled: true,
			rating_message_template: None,
			last_outbound_text: Some("Até logo!".to_string()),
		}
	}

	#[test]
	fn uses_tenant_template_or_default() {
		let mut with_template = candidate();

		with_template.rating_message_template = Some("Nos dê uma nota de 1 a 5.".to_string());

		assert_eq!(request_text(&candidate()).as_deref(), Some(rating::DEFAULT_RATING_REQUEST));
		assert_eq!(request_text(&with_template).as_deref(), Some("Nos dê uma nota de 1 a 5."));
	}

	#[test]
	fn skips_disabled_tenants_and_repeated_requests() {
		let mut disabled = candidate();
		let mut already_asked = candidate();

		disabled.rating_message_enabled = false;
		already_asked.last_outbound_text = Some("Como você avalia o atendimento?".to_string());

		assert_eq!(request_text(&disabled), None);
		assert_eq!(request_text(&already_asked), None);
	}
}
