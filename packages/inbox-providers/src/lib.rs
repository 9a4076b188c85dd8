pub mod error;
pub mod graph;
pub mod message;
pub mod webhook;

pub use error::{Error, Result};
pub use graph::GraphClient;

use std::{future::Future, pin::Pin};

use reqwest::header::{AUTHORIZATION, HeaderMap};
use serde::Deserialize;
use serde_json::Value;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A file sent to the provider's media endpoint.
#[derive(Clone, Debug)]
pub struct MediaUpload {
	pub bytes: Vec<u8>,
	pub file_name: String,
	pub mime_type: String,
}

#[derive(Clone, Debug)]
pub struct FetchedMedia {
	pub bytes: Vec<u8>,
	pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RemoteTemplate {
	pub name: String,
	#[serde(default)]
	pub language: Option<String>,
	#[serde(default)]
	pub category: Option<String>,
	#[serde(default)]
	pub status: Option<String>,
	#[serde(default)]
	pub components: Option<Value>,
}

/// Everything the worker needs from the messaging provider.
pub trait MessagingProvider
where
	Self: Send + Sync,
{
	/// Posts a message body and returns the provider message id.
	///
	/// Any 2xx answer is an accepted send, even when the response carries no id.
	fn send_message<'a>(
		&'a self,
		phone_number_id: &'a str,
		body: &'a Value,
	) -> BoxFuture<'a, Result<Option<String>>>;

	/// Uploads a file and returns the media handle to reference in a message.
	fn upload_media<'a>(
		&'a self,
		phone_number_id: &'a str,
		upload: MediaUpload,
	) -> BoxFuture<'a, Result<String>>;

	/// Resolves a provider media id and downloads its bytes.
	fn fetch_media<'a>(&'a self, media_id: &'a str) -> BoxFuture<'a, Result<FetchedMedia>>;

	/// Downloads an arbitrary URL, attaching credentials only when `authenticated` is set.
	fn fetch_url<'a>(
		&'a self,
		url: &'a str,
		authenticated: bool,
	) -> BoxFuture<'a, Result<FetchedMedia>>;

	fn list_templates<'a>(
		&'a self,
		phone_number_id: &'a str,
	) -> BoxFuture<'a, Result<Vec<RemoteTemplate>>>;
}

pub fn auth_headers(access_token: &str) -> Result<HeaderMap> {
	let mut headers = HeaderMap::new();

	headers.insert(AUTHORIZATION, format!("Bearer {access_token}").parse()?);

	Ok(headers)
}
