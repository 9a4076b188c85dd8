//! Inbound ingestor: applies stored webhook events in arrival order.
//!
//! Every event is marked processed exactly once. Events that cannot be applied carry their error
//! text; store failures abort the batch and leave the event pending for the next tick.

use serde_json::{Value, json};
use time::OffsetDateTime;

use inbox_domain::{
	job,
	message_status::MessageStatus,
	queue::{QueueEvent, QueueStatus},
};
use inbox_providers::webhook::{self, ChangeValue, Envelope, InboundMessage, StatusUpdate};
use inbox_storage::{
	contacts, conversations,
	messages::{self, NewInboundMessage},
	models::Channel,
	tenants, webhook_events,
};

use crate::{
	Error, Result,
	media::{self, MessageTarget},
	ratings,
	scheduler::WorkerState,
};

/// Processes one batch of pending events. Returns the number of events consumed.
pub async fn process_pending_webhook_events(
	state: &WorkerState,
	now: OffsetDateTime,
) -> Result<usize> {
	let events = webhook_events::fetch_pending(&state.db, state.settings.inbound_batch).await?;

	for event in &events {
		match process_event(state, &event.raw_json, now).await {
			Ok(()) => {
				webhook_events::mark_processed(&state.db, event.id, None, now).await?;
			},
			Err(Error::InvalidEvent(message)) => {
				tracing::warn!(event_id = event.id, error = %message, "Webhook event rejected.");

				webhook_events::mark_processed(&state.db, event.id, Some(&message), now).await?;
			},
			Err(err) => return Err(err),
		}
	}

	Ok(events.len())
}

async fn process_event(state: &WorkerState, raw: &Value, now: OffsetDateTime) -> Result<()> {
	let envelope = Envelope::parse(raw)
		.map_err(|err| Error::InvalidEvent(format!("invalid_envelope: {err}")))?;

	for change in envelope.changes() {
		if change.messages.is_empty() && change.statuses.is_empty() {
			continue;
		}

		let phone_number_id = change
			.phone_number_id()
			.ok_or_else(|| Error::InvalidEvent("missing_phone_number_id".to_string()))?;
		let channel = resolve_channel(state, phone_number_id, now).await?;

		for update in &change.statuses {
			apply_status(state, update, now).await?;
		}

		ingest_messages(state, &channel, change, now).await?;
	}

	Ok(())
}

async fn resolve_channel(
	state: &WorkerState,
	phone_number_id: &str,
	now: OffsetDateTime,
) -> Result<Channel> {
	let channel = state
		.channels
		.get_or_load(phone_number_id.to_string(), now, || {
			tenants::channel_by_phone_number_id(&state.db, phone_number_id)
		})
		.await?;

	channel.ok_or_else(|| Error::InvalidEvent(format!("unknown_phone_number_id: {phone_number_id}")))
}

async fn apply_status(state: &WorkerState, update: &StatusUpdate, now: OffsetDateTime) -> Result<()> {
	let (Some(meta_message_id), Some(raw_status)) = (update.id.as_deref(), update.status.as_deref())
	else {
		return Ok(());
	};
	let Some(status) = MessageStatus::parse(raw_status) else {
		tracing::debug!(status = raw_status, "Ignoring unknown delivery status.");

		return Ok(());
	};
	let advanced = messages::advance_status(&state.db, meta_message_id, status, now).await?;

	if !advanced {
		tracing::debug!(
			meta_message_id,
			status = status.as_str(),
			"Delivery status did not advance the message."
		);
	}

	Ok(())
}

async fn ingest_messages(
	state: &WorkerState,
	channel: &Channel,
	change: &ChangeValue,
	now: OffsetDateTime,
) -> Result<()> {
	let profiles = change.profiles();

	for raw in &change.messages {
		let Some(inbound) = InboundMessage::parse(raw) else {
			tracing::debug!("Skipping inbound message without sender or id.");

			continue;
		};

		// Replays must not touch the contact or reopen a conversation.
		if messages::exists_by_meta_id(&state.db, inbound.id).await? {
			tracing::debug!(meta_message_id = inbound.id, "Skipping already stored inbound message.");

			continue;
		}

		let profile = profiles.get(inbound.from).copied().unwrap_or_default();
		let phone_e164 = job::e164_from_wa_id(inbound.from);
		let contact = contacts::upsert_contact(
			&state.db,
			channel.tenant_id,
			&phone_e164,
			profile.display_name,
			profile.picture_url,
			now,
		)
		.await?;
		let initial_stage_id = initial_stage(state, channel, now).await?;
		let conversation = conversations::find_or_create_open(
			&state.db,
			channel.tenant_id,
			contact.id,
			initial_stage_id,
			now,
		)
		.await?;
		let current = QueueStatus::parse(&conversation.status_fila).ok_or_else(|| {
			Error::Message(format!("Unknown queue status {:?}.", conversation.status_fila))
		})?;
		let next = current.transition(QueueEvent::InboundMessage {
			assigned: conversation.assigned_user_id.is_some(),
		})?;
		let received_at = inbound
			.timestamp
			.and_then(|seconds| OffsetDateTime::from_unix_timestamp(seconds).ok())
			.unwrap_or(now);
		let context = inbound.context();
		let body_json = json!({
			"meta": { "phone_number_id": channel.phone_number_id },
			"message": inbound.raw,
			"context": context,
		});
		let stored = messages::upsert_inbound(
			&state.db,
			&NewInboundMessage {
				tenant_id: channel.tenant_id,
				conversation_id: conversation.id,
				kind: inbound.kind(),
				body_json: &body_json,
				meta_message_id: inbound.id,
				created_at: received_at,
			},
			now,
		)
		.await?;

		// A concurrent ingest stored it first.
		if !stored.inserted {
			continue;
		}

		conversations::record_inbound(&state.db, conversation.id, next, received_at, now).await?;

		tracing::info!(
			tenant_id = %channel.tenant_id,
			conversation_id = %conversation.id,
			message_id = %stored.id,
			kind = inbound.kind(),
			"Inbound message stored."
		);

		let target = MessageTarget {
			tenant_id: channel.tenant_id,
			conversation_id: conversation.id,
			message_id: stored.id,
		};

		fetch_attachments(state, target, &inbound, context.as_ref(), now).await;

		if inbound.kind() == "text"
			&& let Some(text) = inbound.text_body()
		{
			ratings::record_rating_reply(
				state,
				channel.tenant_id,
				contact.id,
				&phone_e164,
				text,
				now,
			)
			.await?;
		}
	}

	Ok(())
}

async fn initial_stage(
	state: &WorkerState,
	channel: &Channel,
	now: OffsetDateTime,
) -> Result<Option<uuid::Uuid>> {
	let stage = state
		.initial_stages
		.get_or_load(channel.tenant_id, now, || async {
			tenants::initial_stage_id(&state.db, channel.tenant_id).await.map(Some)
		})
		.await?;

	Ok(stage.flatten())
}

/// Media and ad downloads never fail the event; the message is already stored.
async fn fetch_attachments(
	state: &WorkerState,
	target: MessageTarget,
	inbound: &InboundMessage<'_>,
	context: Option<&Value>,
	now: OffsetDateTime,
) {
	let Some(provider) = state.provider() else {
		return;
	};

	if let Some(media_ref) = inbound.media()
		&& let Err(err) = media::ingest_inbound_media(state, provider, target, &media_ref, now).await
	{
		tracing::warn!(
			error = %err,
			message_id = %target.message_id,
			media_id = %media_ref.id,
			"Inbound media download failed."
		);
	}

	if let Some(url) = context.and_then(webhook::ad_image_url)
		&& let Err(err) = media::ingest_ad_image(state, provider, target, &url, now).await
	{
		tracing::warn!(
			error = %err,
			message_id = %target.message_id,
			"Ad image download failed."
		);
	}
}
