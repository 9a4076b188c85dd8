//! Outbound dispatcher: drains `jobs` toward the provider.

use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use inbox_domain::{
	backoff,
	job::{self, DecodeError, JobPayload, MediaType, SendMedia},
	redact,
};
use inbox_providers::{MediaUpload, MessagingProvider, message};
use inbox_storage::{conversations, jobs, messages, models::ClaimedJob, tenants};

use crate::{Result, circuit::CircuitBreaker, media, scheduler::WorkerState};

/// Why a job did not complete.
#[derive(Debug)]
pub enum JobFailure {
	/// Retrying cannot help.
	Permanent(String),
	/// Retry with backoff. `provider` marks failures that count against the circuit.
	Transient { message: String, provider: bool },
}
impl JobFailure {
	fn message(&self) -> &str {
		match self {
			Self::Permanent(message) | Self::Transient { message, .. } => message,
		}
	}
}
impl From<DecodeError> for JobFailure {
	fn from(err: DecodeError) -> Self {
		Self::Permanent(err.to_string())
	}
}
impl From<inbox_providers::Error> for JobFailure {
	fn from(err: inbox_providers::Error) -> Self {
		if err.is_transient() {
			Self::Transient { message: err.to_string(), provider: true }
		} else {
			Self::Permanent(err.to_string())
		}
	}
}
impl From<inbox_storage::Error> for JobFailure {
	fn from(err: inbox_storage::Error) -> Self {
		match err {
			inbox_storage::Error::NotFound(_) | inbox_storage::Error::InvalidArgument(_) =>
				Self::Permanent(err.to_string()),
			_ => Self::Transient { message: err.to_string(), provider: false },
		}
	}
}

/// Claims and sends one batch. Returns the number of claimed jobs.
pub async fn process_outbound_jobs(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	circuit: &mut CircuitBreaker,
	now: OffsetDateTime,
) -> Result<usize> {
	if circuit.is_open(now) {
		return Ok(0);
	}

	let claimed =
		jobs::claim_jobs(&state.db, state.settings.outbound_batch, &state.settings.worker_id, now)
			.await?;

	for job in &claimed {
		match dispatch(state, provider, job).await {
			Ok(sent) => {
				complete(state, &sent, now).await?;
				jobs::mark_done(&state.db, job.id, now).await?;
				circuit.record_success();

				tracing::info!(
					job_id = job.id,
					job_type = %job.r#type,
					provider_message_id = sent.provider_message_id.as_deref().unwrap_or("-"),
					"Outbound job sent."
				);
			},
			Err(failure) => {
				if matches!(failure, JobFailure::Transient { provider: true, .. })
					&& circuit.record_failure(now)
				{
					tracing::warn!(
						failures = circuit.failures(),
						"Provider circuit opened after consecutive transient failures."
					);
				}

				settle_failure(state, job, &failure, now).await?;
			},
		}
	}

	Ok(claimed.len())
}

/// Outcome of a successful send.
#[derive(Debug)]
struct Sent {
	conversation_id: Uuid,
	message_id: Option<Uuid>,
	provider_message_id: Option<String>,
}

async fn dispatch(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	job: &ClaimedJob,
) -> Result<Sent, JobFailure> {
	let payload = JobPayload::decode(&job.r#type, &job.payload_json)?;
	let channel = tenants::channel_for_tenant(&state.db, payload.tenant_id())
		.await?
		.ok_or_else(|| JobFailure::Permanent("whatsapp_account_not_found".to_string()))?;
	let recipient = job::recipient_from_e164(payload.contact_phone_e164());
	let body = match &payload {
		JobPayload::SendText(text) => {
			let author = messages::author_full_name(&state.db, text.message_id).await?;

			message::text_body(recipient, &prefix_with_author(author.as_deref(), &text.text))
		},
		JobPayload::SendTemplate(template) => message::template_body(
			recipient,
			&template.template_name,
			&template.language,
			&template.components,
		),
		JobPayload::SendMedia(send) =>
			media_message(state, provider, &channel.phone_number_id, recipient, send).await?,
		JobPayload::SendReaction(reaction) => message::reaction_body(
			recipient,
			&reaction.target_meta_message_id,
			&reaction.emoji,
		),
	};
	let provider_message_id = provider.send_message(&channel.phone_number_id, &body).await?;

	Ok(Sent {
		conversation_id: payload.conversation_id(),
		message_id: payload.message_id(),
		provider_message_id,
	})
}

/// Uploads the stored blob and builds the message that references the upload.
async fn media_message(
	state: &WorkerState,
	provider: &dyn MessagingProvider,
	phone_number_id: &str,
	recipient: &str,
	send: &SendMedia,
) -> Result<Value, JobFailure> {
	let mut bytes = state.blobs.get(&send.storage_path).await?;
	let mut mime_type = send
		.mime_type
		.clone()
		.filter(|mime| !mime.trim().is_empty())
		.unwrap_or_else(|| send.media_type.fallback_mime().to_string());

	if send.media_type == MediaType::Audio
		&& let Some(ffmpeg) = state.settings.ffmpeg_path.as_deref()
	{
		match media::transcode_to_opus(ffmpeg, &bytes).await {
			Ok(transcoded) => {
				bytes = transcoded;
				mime_type = media::OPUS_MIME.to_string();
			},
			Err(err) => {
				tracing::warn!(
					error = %err,
					media_asset_id = %send.media_asset_id,
					"Audio transcoding failed. Sending the original file."
				);
			},
		}
	}

	let upload = MediaUpload {
		file_name: format!("media.{}", media::extension_for_mime(&mime_type)),
		bytes,
		mime_type,
	};
	let handle = provider.upload_media(phone_number_id, upload).await?;

	Ok(message::media_body(recipient, send.media_type.as_str(), &handle, send.caption.as_deref()))
}

async fn complete(state: &WorkerState, sent: &Sent, now: OffsetDateTime) -> Result<()> {
	if let Some(message_id) = sent.message_id {
		messages::mark_sent(&state.db, message_id, sent.provider_message_id.as_deref(), now).await?;
	}

	conversations::record_outbound(&state.db, sent.conversation_id, now).await?;

	Ok(())
}

async fn settle_failure(
	state: &WorkerState,
	job: &ClaimedJob,
	failure: &JobFailure,
	now: OffsetDateTime,
) -> Result<()> {
	let error = redact::sanitize_error_text(failure.message());
	let retry = matches!(failure, JobFailure::Transient { .. }) && job.attempts < job.max_attempts;

	if retry {
		let run_at = now + backoff::retry_delay(job.attempts);

		jobs::reschedule(&state.db, job.id, run_at, &error, now).await?;

		tracing::warn!(
			job_id = job.id,
			attempts = job.attempts,
			run_at = %run_at,
			error = %error,
			"Outbound job failed. Retrying."
		);

		return Ok(());
	}

	jobs::mark_failed(&state.db, job.id, &error, now).await?;

	// The message row is linked through the payload; undecodable payloads have none to update.
	if let Some(message_id) = linked_message_id(job) {
		messages::mark_failed(&state.db, message_id, now).await?;
	}

	tracing::error!(
		job_id = job.id,
		job_type = %job.r#type,
		attempts = job.attempts,
		error = %error,
		"Outbound job failed permanently."
	);

	Ok(())
}

fn linked_message_id(job: &ClaimedJob) -> Option<Uuid> {
	job.payload_json
		.get("message_id")
		.and_then(Value::as_str)
		.and_then(|raw| Uuid::parse_str(raw).ok())
}

/// Prefixes outbound text with the agent's name unless the agent already typed it.
pub fn prefix_with_author(full_name: Option<&str>, text: &str) -> String {
	match full_name.map(str::trim).filter(|name| !name.is_empty()) {
		Some(name) if !text.starts_with(&format!("{name}:")) => format!("{name}:\n\n{text}"),
		_ => text.to_string(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn prefixes_agent_name_once() {
		assert_eq!(prefix_with_author(Some("Ana"), "Olá"), "Ana:\n\nOlá");
		assert_eq!(prefix_with_author(Some("Ana"), "Ana: Olá"), "Ana: Olá");
		assert_eq!(prefix_with_author(Some("  "), "Olá"), "Olá");
		assert_eq!(prefix_with_author(None, "Olá"), "Olá");
	}

	#[test]
	fn classifies_storage_failures() {
		let missing = JobFailure::from(inbox_storage::Error::NotFound("blob".to_string()));
		let io = JobFailure::from(inbox_storage::Error::Io(std::io::Error::other("disk")));

		assert!(matches!(missing, JobFailure::Permanent(_)));
		assert!(matches!(io, JobFailure::Transient { provider: false, .. }));
	}

	#[test]
	fn reads_linked_message_from_raw_payload() {
		let id = Uuid::new_v4();
		let job = ClaimedJob {
			id: 1,
			tenant_id: None,
			r#type: "wa_send_text".to_string(),
			payload_json: serde_json::json!({ "message_id": id.to_string() }),
			attempts: 1,
			max_attempts: 3,
		};

		assert_eq!(linked_message_id(&job), Some(id));
	}
}
