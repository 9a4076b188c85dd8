//! Request bodies and response parsing for the Graph messages endpoints.

use serde_json::{Map, Value, json};

use crate::{Error, RemoteTemplate, Result};

const PRODUCT: &str = "whatsapp";

/// `recipient` is the E.164 number without the leading `+`.
pub fn text_body(recipient: &str, body: &str) -> Value {
	json!({
		"messaging_product": PRODUCT,
		"to": recipient,
		"type": "text",
		"text": { "body": body },
	})
}

pub fn template_body(recipient: &str, name: &str, language: &str, components: &[Value]) -> Value {
	let mut template = Map::new();

	template.insert("name".to_string(), Value::String(name.to_string()));
	template.insert("language".to_string(), json!({ "code": language }));

	if !components.is_empty() {
		template.insert("components".to_string(), Value::Array(components.to_vec()));
	}

	json!({
		"messaging_product": PRODUCT,
		"to": recipient,
		"type": "template",
		"template": template,
	})
}

/// `kind` is one of `image`, `audio`, `video` or `document` and doubles as the payload key.
pub fn media_body(recipient: &str, kind: &str, media_id: &str, caption: Option<&str>) -> Value {
	let mut media = Map::new();

	media.insert("id".to_string(), Value::String(media_id.to_string()));

	if let Some(caption) = caption.filter(|caption| !caption.is_empty()) {
		media.insert("caption".to_string(), Value::String(caption.to_string()));
	}

	let mut body = Map::new();

	body.insert("messaging_product".to_string(), Value::String(PRODUCT.to_string()));
	body.insert("recipient_type".to_string(), Value::String("individual".to_string()));
	body.insert("to".to_string(), Value::String(recipient.to_string()));
	body.insert("type".to_string(), Value::String(kind.to_string()));
	body.insert(kind.to_string(), Value::Object(media));

	Value::Object(body)
}

pub fn reaction_body(recipient: &str, message_id: &str, emoji: &str) -> Value {
	json!({
		"messaging_product": PRODUCT,
		"recipient_type": "individual",
		"to": recipient,
		"type": "reaction",
		"reaction": { "message_id": message_id, "emoji": emoji },
	})
}

/// Reads `messages[0].id` from a send response. An accepted send without an id yields `None`.
pub fn parse_message_id(json: &Value) -> Option<String> {
	json.get("messages")
		.and_then(|messages| messages.get(0))
		.and_then(|message| message.get("id"))
		.and_then(Value::as_str)
		.filter(|id| !id.is_empty())
		.map(str::to_string)
}

pub fn parse_media_id(json: &Value) -> Result<String> {
	json.get("id").and_then(Value::as_str).map(str::to_string).ok_or_else(|| {
		Error::InvalidResponse { message: "Media upload response is missing id.".to_string() }
	})
}

/// Reads the `{url, mime_type}` pair returned when resolving a media id.
pub fn parse_media_location(json: &Value) -> Result<(String, Option<String>)> {
	let url = json.get("url").and_then(Value::as_str).ok_or_else(|| Error::InvalidResponse {
		message: "Media lookup response is missing url.".to_string(),
	})?;
	let mime_type = json.get("mime_type").and_then(Value::as_str).map(str::to_string);

	Ok((url.to_string(), mime_type))
}

pub fn parse_templates(json: Value) -> Result<Vec<RemoteTemplate>> {
	let Some(data) = json.get("data") else {
		return Ok(Vec::new());
	};

	Ok(serde_json::from_value(data.clone())?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn template_omits_empty_components() {
		let body = template_body("5511999990000", "welcome", "pt_BR", &[]);

		assert_eq!(
			body,
			json!({
				"messaging_product": "whatsapp",
				"to": "5511999990000",
				"type": "template",
				"template": { "name": "welcome", "language": { "code": "pt_BR" } },
			})
		);
	}

	#[test]
	fn media_body_uses_kind_as_key() {
		let body = media_body("5511999990000", "audio", "h-1", None);

		assert_eq!(body["audio"], json!({ "id": "h-1" }));
		assert_eq!(body["recipient_type"], "individual");

		let body = media_body("5511999990000", "image", "h-2", Some("look"));

		assert_eq!(body["image"], json!({ "id": "h-2", "caption": "look" }));
	}

	#[test]
	fn reads_message_id() {
		let json = json!({ "messages": [{ "id": "wamid.1" }] });

		assert_eq!(parse_message_id(&json).as_deref(), Some("wamid.1"));
		assert_eq!(parse_message_id(&json!({ "messages": [] })), None);
		assert_eq!(parse_message_id(&Value::Null), None);
	}
}
