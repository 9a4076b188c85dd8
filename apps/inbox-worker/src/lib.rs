pub mod badges;
pub mod cache;
pub mod circuit;
pub mod inbound;
pub mod media;
pub mod outbound;
pub mod ratings;
pub mod retention;
pub mod scheduler;
pub mod sla;
pub mod templates;
pub mod timeouts;

mod error;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use inbox_providers::{GraphClient, MessagingProvider};
use inbox_storage::{blob::BlobStore, db::Db};
use scheduler::{WorkerSettings, WorkerState};

#[derive(Debug, Parser)]
#[command(
	version = inbox_cli::VERSION,
	rename_all = "kebab",
	styles = inbox_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = inbox_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let provider: Option<Arc<dyn MessagingProvider>> = if config.provider.has_credentials() {
		Some(Arc::new(GraphClient::new(&config.provider)?))
	} else {
		tracing::warn!(
			"Provider access token is not configured. Outbound delivery, rating requests and template sync are disabled."
		);

		None
	};
	let settings = WorkerSettings::from_config(&config);
	let state = WorkerState::new(db, BlobStore::new(&config.storage.media), provider, settings);
	let shutdown = install_signal_handler()?;

	tracing::info!(worker_id = %state.settings.worker_id, "Worker started.");

	scheduler::run_worker(state, shutdown).await
}

/// Cancels the returned token on SIGINT or SIGTERM.
fn install_signal_handler() -> color_eyre::Result<CancellationToken> {
	let token = CancellationToken::new();
	let cancel = token.clone();

	#[cfg(unix)]
	let mut sigterm =
		tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

	tokio::spawn(async move {
		#[cfg(unix)]
		tokio::select! {
			_ = tokio::signal::ctrl_c() => tracing::info!("Received SIGINT. Shutting down."),
			_ = sigterm.recv() => tracing::info!("Received SIGTERM. Shutting down."),
		}

		#[cfg(not(unix))]
		{
			let _ = tokio::signal::ctrl_c().await;

			tracing::info!("Received Ctrl+C. Shutting down.");
		}

		cancel.cancel();
	});

	Ok(token)
}
