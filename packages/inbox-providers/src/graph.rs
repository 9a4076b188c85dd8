use std::time::Duration;

use reqwest::{
	Client, Response,
	header::CONTENT_TYPE,
	multipart::{Form, Part},
};
use serde_json::Value;

use crate::{
	BoxFuture, Error, FetchedMedia, MediaUpload, MessagingProvider, RemoteTemplate, Result,
	message,
};

/// Graph API client bound to one API version and access token.
#[derive(Clone, Debug)]
pub struct GraphClient {
	client: Client,
	api_root: String,
	access_token: String,
}
impl GraphClient {
	pub fn new(cfg: &inbox_config::Provider) -> Result<Self> {
		let access_token = cfg.access_token.clone().ok_or_else(|| Error::InvalidConfig {
			message: "provider.access_token is required to call the provider.".to_string(),
		})?;
		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
		let api_root = format!("{}/{}", cfg.api_base.trim_end_matches('/'), cfg.api_version);

		Ok(Self { client, api_root, access_token })
	}

	async fn post_message(&self, phone_number_id: &str, body: &Value) -> Result<Option<String>> {
		let res = self
			.client
			.post(format!("{}/{phone_number_id}/messages", self.api_root))
			.headers(crate::auth_headers(&self.access_token)?)
			.json(body)
			.send()
			.await?;
		let status = res.status();
		let text = res.text().await.unwrap_or_default();

		if !status.is_success() {
			return Err(Error::Http { status: status.as_u16(), body: text });
		}

		// The send is final once accepted; a body we cannot read only loses the id.
		Ok(serde_json::from_str::<Value>(&text)
			.ok()
			.and_then(|json| message::parse_message_id(&json)))
	}

	async fn post_media(&self, phone_number_id: &str, upload: MediaUpload) -> Result<String> {
		let part = Part::bytes(upload.bytes)
			.file_name(upload.file_name)
			.mime_str(&upload.mime_type)?;
		let form = Form::new()
			.text("messaging_product", "whatsapp")
			.text("type", upload.mime_type.clone())
			.part("file", part);
		let res = self
			.client
			.post(format!("{}/{phone_number_id}/media", self.api_root))
			.headers(crate::auth_headers(&self.access_token)?)
			.multipart(form)
			.send()
			.await?;
		let json = read_json(res).await?;

		message::parse_media_id(&json)
	}

	async fn get_media(&self, media_id: &str) -> Result<FetchedMedia> {
		let res = self
			.client
			.get(format!("{}/{media_id}", self.api_root))
			.headers(crate::auth_headers(&self.access_token)?)
			.send()
			.await?;
		let json = read_json(res).await?;
		let (url, mime_type) = message::parse_media_location(&json)?;
		let mut fetched = self.get_url(&url, true).await?;

		if mime_type.is_some() {
			fetched.mime_type = mime_type;
		}

		Ok(fetched)
	}

	async fn get_url(&self, url: &str, authenticated: bool) -> Result<FetchedMedia> {
		let mut req = self.client.get(url);

		if authenticated {
			req = req.headers(crate::auth_headers(&self.access_token)?);
		}

		let res = req.send().await?;
		let status = res.status();

		if !status.is_success() {
			let body = res.text().await.unwrap_or_default();

			return Err(Error::Http { status: status.as_u16(), body });
		}

		let mime_type = res
			.headers()
			.get(CONTENT_TYPE)
			.and_then(|value| value.to_str().ok())
			.map(str::to_string);
		let bytes = res.bytes().await?.to_vec();

		Ok(FetchedMedia { bytes, mime_type })
	}

	async fn get_templates(&self, phone_number_id: &str) -> Result<Vec<RemoteTemplate>> {
		let res = self
			.client
			.get(format!("{}/{phone_number_id}/message_templates", self.api_root))
			.query(&[("limit", "100")])
			.headers(crate::auth_headers(&self.access_token)?)
			.send()
			.await?;
		let json = read_json(res).await?;

		message::parse_templates(json)
	}
}

impl MessagingProvider for GraphClient {
	fn send_message<'a>(
		&'a self,
		phone_number_id: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, Result<Option<String>>> {
		Box::pin(self.post_message(phone_number_id, body))
	}

	fn upload_media<'a>(
		&'a self,
		phone_number_id: &'a str,
		upload: MediaUpload,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(self.post_media(phone_number_id, upload))
	}

	fn fetch_media<'a>(&'a self, media_id: &'a str) -> BoxFuture<'a, Result<FetchedMedia>> {
		Box::pin(self.get_media(media_id))
	}

	fn fetch_url<'a>(
		&'a self,
		url: &'a str,
		authenticated: bool,
	) -> BoxFuture<'a, Result<FetchedMedia>> {
		Box::pin(self.get_url(url, authenticated))
	}

	fn list_templates<'a>(
		&'a self,
		phone_number_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<RemoteTemplate>>> {
		Box::pin(self.get_templates(phone_number_id))
	}
}

async fn read_json(res: Response) -> Result<Value> {
	let status = res.status();

	if !status.is_success() {
		let body = res.text().await.unwrap_or_default();

		return Err(Error::Http { status: status.as_u16(), body });
	}

	Ok(res.json().await?)
}
