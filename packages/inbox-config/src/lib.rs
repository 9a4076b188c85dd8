mod error;
mod types;

pub use error::{Error, Result};
pub use types::{Config, Media, Postgres, Provider, Service, Storage, Worker};

use std::{env, fs, path::Path};

pub const ENV_POLL_MS: &str = "INBOX_WORKER_POLL_MS";
pub const ENV_API_VERSION: &str = "INBOX_PROVIDER_API_VERSION";
pub const ENV_ACCESS_TOKEN: &str = "INBOX_PROVIDER_ACCESS_TOKEN";

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg = parse(&raw, path)?;

	apply_overrides(&mut cfg, |name| env::var(name).ok())?;
	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn parse(raw: &str, path: &Path) -> Result<Config> {
	toml::from_str(raw).map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })
}

/// Applies the environment overrides on top of the file values.
///
/// `lookup` is the variable source; [`load`] passes the process environment.
pub fn apply_overrides<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(raw) = lookup(ENV_POLL_MS) {
		cfg.worker.poll_interval_ms = raw.trim().parse().map_err(|_| Error::InvalidOverride {
			name: ENV_POLL_MS,
			message: format!("expected a positive integer, got {raw:?}."),
		})?;
	}
	if let Some(raw) = lookup(ENV_API_VERSION) {
		cfg.provider.api_version = raw;
	}
	if let Some(raw) = lookup(ENV_ACCESS_TOKEN) {
		cfg.provider.access_token = Some(raw);
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.media.bucket.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.media.bucket must be non-empty.".to_string(),
		});
	}
	if cfg.storage.media.bucket.contains(['/', '\\']) || cfg.storage.media.bucket == ".." {
		return Err(Error::Validation {
			message: "storage.media.bucket must be a single path segment.".to_string(),
		});
	}

	for (label, value) in
		[("provider.api_base", &cfg.provider.api_base), ("provider.api_version", &cfg.provider.api_version)]
	{
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.provider.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "provider.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "worker.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.worker.inbound_batch == 0 || cfg.worker.outbound_batch == 0 {
		return Err(Error::Validation {
			message: "worker.inbound_batch and worker.outbound_batch must be greater than zero."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.provider.access_token.as_deref().map(|token| token.trim().is_empty()).unwrap_or(false) {
		cfg.provider.access_token = None;
	}
	if cfg.service.worker_id.as_deref().map(|id| id.trim().is_empty()).unwrap_or(false) {
		cfg.service.worker_id = None;
	}
	if cfg.worker.ffmpeg_path.as_deref().map(|path| path.as_os_str().is_empty()).unwrap_or(false)
	{
		cfg.worker.ffmpeg_path = None;
	}

	cfg.provider.api_base = cfg.provider.api_base.trim_end_matches('/').to_string();
}
