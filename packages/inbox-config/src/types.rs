use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub provider: Provider,
	#[serde(default)]
	pub worker: Worker,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
	/// Optional. Identifier written to `jobs.locked_by`; defaults to `<HOSTNAME>:<pid>`.
	#[serde(default)]
	pub worker_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub media: Media,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Media {
	pub root: PathBuf,
	#[serde(default = "default_bucket")]
	pub bucket: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
	#[serde(default = "default_api_base")]
	pub api_base: String,
	#[serde(default = "default_api_version")]
	pub api_version: String,
	/// Optional. Without a token only inbound ingestion, SLA and timeout rules run.
	#[serde(default)]
	pub access_token: Option<String>,
	#[serde(default = "default_timeout_ms")]
	pub timeout_ms: u64,
}
impl Provider {
	pub fn has_credentials(&self) -> bool {
		self.access_token.is_some()
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Worker {
	pub poll_interval_ms: u64,
	pub inbound_batch: u32,
	pub outbound_batch: u32,
	/// Optional. Path to an ffmpeg binary used to transcode outbound audio.
	pub ffmpeg_path: Option<PathBuf>,
}
impl Default for Worker {
	fn default() -> Self {
		Self {
			poll_interval_ms: 250,
			inbound_batch: 25,
			outbound_batch: 25,
			ffmpeg_path: Some(PathBuf::from("ffmpeg")),
		}
	}
}

fn default_bucket() -> String {
	"whatsapp-media".to_string()
}

fn default_api_base() -> String {
	"https://graph.facebook.com".to_string()
}

fn default_api_version() -> String {
	"v21.0".to_string()
}

fn default_timeout_ms() -> u64 {
	15_000
}
