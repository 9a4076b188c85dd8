//! Webhook envelope as delivered by the provider.
//!
//! Only the shape the ingestor relies on is typed. Individual messages stay raw JSON so they can be
//! stored verbatim, with [`InboundMessage`] as a typed view over them.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
pub struct Envelope {
	#[serde(default)]
	pub entry: Vec<Entry>,
}
impl Envelope {
	pub fn parse(raw: &Value) -> serde_json::Result<Self> {
		Self::deserialize(raw)
	}

	pub fn changes(&self) -> impl Iterator<Item = &ChangeValue> {
		self.entry.iter().flat_map(|entry| entry.changes.iter()).map(|change| &change.value)
	}
}

#[derive(Debug, Deserialize)]
pub struct Entry {
	pub changes: Vec<Change>,
}

#[derive(Debug, Deserialize)]
pub struct Change {
	#[serde(default)]
	pub value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChangeValue {
	#[serde(default)]
	pub metadata: Option<Metadata>,
	#[serde(default)]
	pub contacts: Vec<WebhookContact>,
	#[serde(default)]
	pub messages: Vec<Value>,
	#[serde(default)]
	pub statuses: Vec<StatusUpdate>,
}
impl ChangeValue {
	pub fn phone_number_id(&self) -> Option<&str> {
		self.metadata.as_ref().and_then(|metadata| metadata.phone_number_id.as_deref())
	}

	/// Profile data keyed by the sender's provider id.
	pub fn profiles(&self) -> HashMap<&str, ContactProfileView<'_>> {
		self.contacts
			.iter()
			.filter_map(|contact| {
				let wa_id = contact.wa_id.as_deref()?;
				let profile = contact.profile.as_ref();

				Some((
					wa_id,
					ContactProfileView {
						display_name: profile.and_then(|profile| profile.name.as_deref()),
						picture_url: profile
							.and_then(|profile| profile.picture.as_ref())
							.and_then(|picture| picture.url.as_deref()),
					},
				))
			})
			.collect()
	}
}

#[derive(Debug, Deserialize)]
pub struct Metadata {
	#[serde(default)]
	pub phone_number_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookContact {
	#[serde(default)]
	pub wa_id: Option<String>,
	#[serde(default)]
	pub profile: Option<ContactProfile>,
}

#[derive(Debug, Deserialize)]
pub struct ContactProfile {
	#[serde(default)]
	pub name: Option<String>,
	#[serde(default)]
	pub picture: Option<ProfilePicture>,
}

#[derive(Debug, Deserialize)]
pub struct ProfilePicture {
	#[serde(default)]
	pub url: Option<String>,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct ContactProfileView<'a> {
	pub display_name: Option<&'a str>,
	pub picture_url: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
	#[serde(default)]
	pub id: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub recipient_id: Option<String>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MediaRef {
	pub id: String,
	#[serde(default)]
	pub mime_type: Option<String>,
	#[serde(default)]
	pub sha256: Option<String>,
}

const MIN_MEDIA_ID_CHARS: usize = 5;
const MEDIA_KEYS: [&str; 5] = ["image", "audio", "document", "video", "sticker"];

/// Typed view over one raw inbound message.
#[derive(Clone, Debug)]
pub struct InboundMessage<'a> {
	pub raw: &'a Value,
	pub from: &'a str,
	pub id: &'a str,
	/// Provider timestamp in unix seconds.
	pub timestamp: Option<i64>,
}
impl<'a> InboundMessage<'a> {
	/// Returns `None` for messages without a sender or id; those are skipped.
	pub fn parse(raw: &'a Value) -> Option<Self> {
		let from = raw.get("from").and_then(Value::as_str).filter(|from| !from.is_empty())?;
		let id = raw.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
		let timestamp = match raw.get("timestamp") {
			Some(Value::String(seconds)) => seconds.trim().parse().ok(),
			Some(Value::Number(number)) => number.as_i64(),
			_ => None,
		};

		Some(Self { raw, from, id, timestamp })
	}

	pub fn kind(&self) -> &'static str {
		let raw = self.raw;

		if raw.get("type").and_then(Value::as_str) == Some("reaction") || raw.get("reaction").is_some()
		{
			"reaction"
		} else if self.text_body().is_some() {
			"text"
		} else if raw.get("image").is_some() {
			"image"
		} else if raw.get("audio").is_some() {
			"audio"
		} else if raw.get("document").is_some() {
			"document"
		} else if raw.get("video").is_some() {
			"video"
		} else if raw.get("sticker").is_some() {
			"sticker"
		} else if raw.get("location").is_some() {
			"location"
		} else {
			"text"
		}
	}

	pub fn text_body(&self) -> Option<&'a str> {
		self.raw.get("text").and_then(|text| text.get("body")).and_then(Value::as_str)
	}

	/// The first attached media reference, if it is well-formed.
	pub fn media(&self) -> Option<MediaRef> {
		let value = MEDIA_KEYS.iter().find_map(|key| self.raw.get(*key))?;
		let media = MediaRef::deserialize(value).ok()?;

		(media.id.chars().count() >= MIN_MEDIA_ID_CHARS).then_some(media)
	}

	/// Reply or ad context, with the click-to-chat referral folded in.
	pub fn context(&self) -> Option<Value> {
		let referral = self.raw.get("referral");

		match self.raw.get("context") {
			Some(Value::Object(context)) => {
				let mut merged = context.clone();
				let referral =
					referral.or_else(|| context.get("referral")).cloned().unwrap_or(Value::Null);

				merged.insert("referral".to_string(), referral);

				Some(Value::Object(merged))
			},
			_ => referral.map(|referral| json!({ "referral": referral })),
		}
	}
}

/// Storage kind for a media content type.
pub fn media_kind_for_mime(mime_type: Option<&str>) -> &'static str {
	match mime_type {
		Some(mime) if mime.starts_with("image/") => "image",
		Some(mime) if mime.starts_with("audio/") => "audio",
		Some(mime) if mime.starts_with("video/") => "video",
		_ => "document",
	}
}

/// Finds the creative image attached to an ad or catalog context.
pub fn ad_image_url(context: &Value) -> Option<String> {
	// Each source is tried in turn as long as the previous one is absent.
	if let Some(url) = string_at(context, &["referred_product", "image_url"]) {
		return Some(url);
	}
	if let Some(image) = value_at(context, &["referred_product", "image"]) {
		return image_ref(image);
	}
	if let Some(url) = string_at(context, &["ad", "image_url"]) {
		return Some(url);
	}
	if let Some(image) = value_at(context, &["ad", "image"]) {
		return image_ref(image);
	}

	let fallbacks: [&[&str]; 5] = [
		&["message", "image", "url"],
		&["header", "image", "url"],
		&["referral", "image_url"],
		&["referral", "thumbnail_url"],
		&["referral", "video_url"],
	];

	fallbacks.into_iter().find_map(|path| string_at(context, path)).filter(|url| !url.is_empty())
}

/// Provider-hosted URLs need the bearer token; third-party CDNs must not receive it.
pub fn is_provider_host(url: &str) -> bool {
	url.contains("whatsapp.net") || url.contains("facebook.com")
}

fn value_at<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
	path.iter().try_fold(root, |value, key| value.get(*key))
}

fn string_at(root: &Value, path: &[&str]) -> Option<String> {
	value_at(root, path).and_then(Value::as_str).map(str::to_string)
}

fn image_ref(value: &Value) -> Option<String> {
	match value {
		Value::String(url) => Some(url.clone()),
		Value::Object(object) => object
			.get("url")
			.or_else(|| object.get("link"))
			.and_then(Value::as_str)
			.map(str::to_string),
		_ => None,
	}
}
