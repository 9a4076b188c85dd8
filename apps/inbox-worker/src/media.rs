//! Media plumbing shared by the ingestor and the dispatcher.

use std::{path::Path, process::Stdio};

use serde_json::json;
use time::OffsetDateTime;
use tokio::process::Command;
use uuid::Uuid;

use inbox_providers::{
	MessagingProvider,
	webhook::{self, MediaRef},
};
use inbox_storage::{
	media::{self, NewMediaAsset},
	messages,
};

use crate::{Error, Result, scheduler::WorkerState};

pub const OPUS_MIME: &str = "audio/ogg";

/// Where an inbound message's attachment lives.
#[derive(Clone, Copy, Debug)]
pub struct MessageTarget {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub message_id: Uuid,
}

/// Downloads an inbound attachment, stores it and links the asset to the message.
pub async fn ingest_inbound_media(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	target: MessageTarget,
	media_ref: &MediaRef,
	now: OffsetDateTime,
) -> Result<Uuid> {
	let fetched = provider.fetch_media(&media_ref.id).await?;
	let content_type = fetched.mime_type.clone().or_else(|| media_ref.mime_type.clone());
	let storage_path = format!("{}/{}/{}", target.tenant_id, target.conversation_id, media_ref.id);

	state.blobs.put(&storage_path, &fetched.bytes).await?;

	let asset_id = media::upsert_asset(
		&state.db,
		&NewMediaAsset {
			tenant_id: target.tenant_id,
			conversation_id: Some(target.conversation_id),
			message_id: Some(target.message_id),
			kind: webhook::media_kind_for_mime(content_type.as_deref()),
			meta_media_id: Some(&media_ref.id),
			storage_path: &storage_path,
			content_type: content_type.as_deref(),
			size_bytes: fetched.bytes.len() as i64,
			checksum: media_ref.sha256.as_deref(),
		},
		now,
	)
	.await?;

	messages::merge_body(&state.db, target.message_id, &json!({ "media_asset_id": asset_id }), now)
		.await?;

	tracing::info!(
		message_id = %target.message_id,
		media_asset_id = %asset_id,
		bytes = fetched.bytes.len(),
		"Inbound media stored."
	);

	Ok(asset_id)
}

/// Downloads the creative of the ad that started the conversation.
pub async fn ingest_ad_image(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	target: MessageTarget,
	url: &str,
	now: OffsetDateTime,
) -> Result<Uuid> {
	let fetched = provider.fetch_url(url, webhook::is_provider_host(url)).await?;
	let meta_media_id = format!("ad_{}", target.message_id);
	let storage_path = format!("{}/{}/{meta_media_id}", target.tenant_id, target.conversation_id);

	state.blobs.put(&storage_path, &fetched.bytes).await?;

	let asset_id = media::upsert_asset(
		&state.db,
		&NewMediaAsset {
			tenant_id: target.tenant_id,
			conversation_id: Some(target.conversation_id),
			message_id: Some(target.message_id),
			kind: "image",
			meta_media_id: Some(&meta_media_id),
			storage_path: &storage_path,
			content_type: fetched.mime_type.as_deref(),
			size_bytes: fetched.bytes.len() as i64,
			checksum: None,
		},
		now,
	)
	.await?;
	let patch = json!({
		"_downloaded_ad_image": {
			"media_asset_id": asset_id,
			"storage_path": storage_path,
			"source_url": url,
		}
	});

	messages::merge_body(&state.db, target.message_id, &patch, now).await?;

	Ok(asset_id)
}

/// Re-encodes audio as mono 32 kbit/s Opus in an OGG container.
pub async fn transcode_to_opus(ffmpeg: &Path, input: &[u8]) -> Result<Vec<u8>> {
	let dir = tempfile::tempdir()?;
	let input_path = dir.path().join("input");
	let output_path = dir.path().join("output.ogg");

	tokio::fs::write(&input_path, input).await?;

	let output = Command::new(ffmpeg)
		.arg("-i")
		.arg(&input_path)
		.args(["-c:a", "libopus", "-b:a", "32k", "-ac", "1", "-vn", "-f", "ogg", "-y"])
		.arg(&output_path)
		.stdin(Stdio::null())
		.kill_on_drop(true)
		.output()
		.await?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr);
		let start = stderr.char_indices().rev().nth(299).map(|(idx, _)| idx).unwrap_or(0);

		return Err(Error::Message(format!(
			"ffmpeg exited with {}: {}",
			output.status,
			stderr[start..].trim()
		)));
	}

	let transcoded = tokio::fs::read(&output_path).await?;

	if transcoded.is_empty() {
		return Err(Error::Message("ffmpeg produced an empty file.".to_string()));
	}

	Ok(transcoded)
}

/// File extension for an upload, taken from the content subtype.
pub fn extension_for_mime(mime_type: &str) -> &str {
	mime_type
		.split(';')
		.next()
		.and_then(|essence| essence.split('/').nth(1))
		.map(str::trim)
		.filter(|subtype| !subtype.is_empty())
		.unwrap_or("bin")
}
