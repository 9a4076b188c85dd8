//! Outbound job payloads.
//!
//! Jobs are stored with a string `type` and a JSON payload. They are decoded exactly once, right
//! after the claim, into [`JobPayload`]. Anything that fails to decode is a permanent failure: a
//! malformed payload will not become well-formed on retry.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use uuid::Uuid;

pub const SEND_TEXT: &str = "wa_send_text";
pub const SEND_TEMPLATE: &str = "wa_send_template";
pub const SEND_MEDIA: &str = "wa_send_media";
pub const SEND_REACTION: &str = "wa_react";

const MIN_PHONE_CHARS: usize = 8;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
	#[error("unknown_job_type: {0}")]
	UnknownType(String),
	#[error("invalid_payload for {job_type}: {message}")]
	InvalidPayload { job_type: &'static str, message: String },
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
	Image,
	Audio,
	Video,
	Document,
}
impl MediaType {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Image => "image",
			Self::Audio => "audio",
			Self::Video => "video",
			Self::Document => "document",
		}
	}

	/// Content type assumed when the producer did not record one.
	pub fn fallback_mime(self) -> &'static str {
		match self {
			Self::Image => "image/jpeg",
			Self::Audio => "audio/ogg",
			Self::Video => "video/mp4",
			Self::Document => "application/pdf",
		}
	}
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SendText {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub contact_phone_e164: String,
	pub text: String,
	pub message_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SendTemplate {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub contact_phone_e164: String,
	pub template_name: String,
	pub language: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub components: Vec<Value>,
	pub message_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SendMedia {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub contact_phone_e164: String,
	pub media_type: MediaType,
	pub media_asset_id: Uuid,
	pub storage_path: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub caption: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub mime_type: Option<String>,
	pub message_id: Uuid,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct SendReaction {
	pub tenant_id: Uuid,
	pub conversation_id: Uuid,
	pub contact_phone_e164: String,
	pub target_meta_message_id: String,
	pub emoji: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JobPayload {
	SendText(SendText),
	SendTemplate(SendTemplate),
	SendMedia(SendMedia),
	SendReaction(SendReaction),
}
impl JobPayload {
	pub fn decode(job_type: &str, payload: &Value) -> Result<Self, DecodeError> {
		let decoded = match job_type {
			SEND_TEXT => Self::SendText(decode_as(SEND_TEXT, payload)?),
			SEND_TEMPLATE => Self::SendTemplate(decode_as(SEND_TEMPLATE, payload)?),
			SEND_MEDIA => Self::SendMedia(decode_as(SEND_MEDIA, payload)?),
			SEND_REACTION => Self::SendReaction(decode_as(SEND_REACTION, payload)?),
			other => return Err(DecodeError::UnknownType(other.to_string())),
		};

		decoded.validate()?;

		Ok(decoded)
	}

	pub fn job_type(&self) -> &'static str {
		match self {
			Self::SendText(_) => SEND_TEXT,
			Self::SendTemplate(_) => SEND_TEMPLATE,
			Self::SendMedia(_) => SEND_MEDIA,
			Self::SendReaction(_) => SEND_REACTION,
		}
	}

	pub fn to_value(&self) -> Value {
		let encoded = match self {
			Self::SendText(payload) => serde_json::to_value(payload),
			Self::SendTemplate(payload) => serde_json::to_value(payload),
			Self::SendMedia(payload) => serde_json::to_value(payload),
			Self::SendReaction(payload) => serde_json::to_value(payload),
		};

		// Plain structs with string keys always serialize.
		encoded.unwrap_or(Value::Null)
	}

	pub fn tenant_id(&self) -> Uuid {
		match self {
			Self::SendText(payload) => payload.tenant_id,
			Self::SendTemplate(payload) => payload.tenant_id,
			Self::SendMedia(payload) => payload.tenant_id,
			Self::SendReaction(payload) => payload.tenant_id,
		}
	}

	pub fn conversation_id(&self) -> Uuid {
		match self {
			Self::SendText(payload) => payload.conversation_id,
			Self::SendTemplate(payload) => payload.conversation_id,
			Self::SendMedia(payload) => payload.conversation_id,
			Self::SendReaction(payload) => payload.conversation_id,
		}
	}

	/// The local message row that tracks this send. Reactions have none.
	pub fn message_id(&self) -> Option<Uuid> {
		match self {
			Self::SendText(payload) => Some(payload.message_id),
			Self::SendTemplate(payload) => Some(payload.message_id),
			Self::SendMedia(payload) => Some(payload.message_id),
			Self::SendReaction(_) => None,
		}
	}

	pub fn contact_phone_e164(&self) -> &str {
		match self {
			Self::SendText(payload) => &payload.contact_phone_e164,
			Self::SendTemplate(payload) => &payload.contact_phone_e164,
			Self::SendMedia(payload) => &payload.contact_phone_e164,
			Self::SendReaction(payload) => &payload.contact_phone_e164,
		}
	}

	fn validate(&self) -> Result<(), DecodeError> {
		let job_type = self.job_type();
		let invalid =
			|message: &str| DecodeError::InvalidPayload { job_type, message: message.to_string() };

		if self.contact_phone_e164().trim().chars().count() < MIN_PHONE_CHARS {
			return Err(invalid("contact_phone_e164 is too short."));
		}

		match self {
			Self::SendText(payload) if payload.text.is_empty() => Err(invalid("text is empty.")),
			Self::SendTemplate(payload) if payload.template_name.is_empty() =>
				Err(invalid("template_name is empty.")),
			Self::SendTemplate(payload) if payload.language.is_empty() =>
				Err(invalid("language is empty.")),
			Self::SendMedia(payload) if payload.storage_path.trim().is_empty() =>
				Err(invalid("storage_path is empty.")),
			Self::SendReaction(payload) if payload.target_meta_message_id.is_empty() =>
				Err(invalid("target_meta_message_id is empty.")),
			Self::SendReaction(payload) if payload.emoji.is_empty() =>
				Err(invalid("emoji is empty.")),
			_ => Ok(()),
		}
	}
}

/// Strips the leading `+` the provider does not accept in recipient fields.
pub fn recipient_from_e164(phone_e164: &str) -> &str {
	phone_e164.strip_prefix('+').unwrap_or(phone_e164)
}

/// Inverse of [`recipient_from_e164`] for provider-assigned sender ids.
pub fn e164_from_wa_id(wa_id: &str) -> String {
	let trimmed = wa_id.trim();

	if trimmed.starts_with('+') { trimmed.to_string() } else { format!("+{trimmed}") }
}

fn decode_as<T>(job_type: &'static str, payload: &Value) -> Result<T, DecodeError>
where
	T: DeserializeOwned,
{
	T::deserialize(payload)
		.map_err(|err| DecodeError::InvalidPayload { job_type, message: err.to_string() })
}
