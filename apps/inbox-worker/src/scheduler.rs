//! The tick loop.
//!
//! One tick runs every component in a fixed order. Tick failures feed a [`TickBreaker`] that
//! backs the loop off; provider failures feed the dispatcher's own [`CircuitBreaker`].

use std::{path::PathBuf, sync::Arc, time::Duration as StdDuration};

use time::{Date, Duration, OffsetDateTime};
use tokio::time as tokio_time;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use inbox_providers::MessagingProvider;
use inbox_storage::{blob::BlobStore, db::Db, models::Channel};

use crate::{
	Result, badges,
	cache::{DEFAULT_TTL, TtlCache},
	circuit::{CircuitBreaker, TickBreaker},
	inbound, outbound, ratings, retention, sla, templates, timeouts,
};

/// Longest single sleep while the tick breaker is open, so shutdown stays responsive.
const MAX_BREAKER_WAIT: Duration = Duration::seconds(5);

#[derive(Clone, Debug)]
pub struct WorkerSettings {
	pub worker_id: String,
	pub poll_interval: StdDuration,
	pub inbound_batch: i64,
	pub outbound_batch: i64,
	pub ffmpeg_path: Option<PathBuf>,
}
impl WorkerSettings {
	pub fn from_config(config: &inbox_config::Config) -> Self {
		Self {
			worker_id: config
				.service
				.worker_id
				.clone()
				.unwrap_or_else(inbox_cli::default_worker_id),
			poll_interval: StdDuration::from_millis(config.worker.poll_interval_ms),
			inbound_batch: i64::from(config.worker.inbound_batch),
			outbound_batch: i64::from(config.worker.outbound_batch),
			ffmpeg_path: config.worker.ffmpeg_path.clone(),
		}
	}
}

/// Everything a tick reads. Owned by the scheduler and lent to each component.
pub struct WorkerState {
	pub db: Db,
	pub blobs: BlobStore,
	pub provider: Option<Arc<dyn MessagingProvider>>,
	pub settings: WorkerSettings,
	/// Channel by provider phone number id.
	pub channels: TtlCache<String, Channel>,
	/// Lowest funnel stage by tenant. Tenants without stages cache `None`.
	pub initial_stages: TtlCache<Uuid, Option<Uuid>>,
}
impl WorkerState {
	pub fn new(
		db: Db,
		blobs: BlobStore,
		provider: Option<Arc<dyn MessagingProvider>>,
		settings: WorkerSettings,
	) -> Self {
		Self {
			db,
			blobs,
			provider,
			settings,
			channels: TtlCache::new(DEFAULT_TTL),
			initial_stages: TtlCache::new(DEFAULT_TTL),
		}
	}

	pub fn provider(&self) -> Option<&dyn MessagingProvider> {
		self.provider.as_deref()
	}
}

/// Lets a task run at most once per UTC day.
#[derive(Debug, Default)]
pub struct DailyGate {
	last_run_on: Option<Date>,
}
impl DailyGate {
	/// Returns `true` the first time it is called on a given day.
	pub fn begin(&mut self, today: Date) -> bool {
		if self.last_run_on == Some(today) {
			return false;
		}

		self.last_run_on = Some(today);

		true
	}
}

#[derive(Debug, Default, PartialEq)]
pub struct TickReport {
	pub inbound_events: usize,
	pub outbound_jobs: usize,
	pub rating_requests: usize,
	pub sla: sla::SlaSummary,
	pub timeouts: timeouts::TimeoutSummary,
}
impl TickReport {
	fn is_idle(&self) -> bool {
		*self == Self::default()
	}
}

pub struct Scheduler {
	pub state: WorkerState,
	pub circuit: CircuitBreaker,
	pub breaker: TickBreaker,
	retention_gate: DailyGate,
	templates_gate: DailyGate,
	badges_gate: DailyGate,
}
impl Scheduler {
	pub fn new(state: WorkerState) -> Self {
		Self {
			state,
			circuit: CircuitBreaker::default(),
			breaker: TickBreaker::default(),
			retention_gate: DailyGate::default(),
			templates_gate: DailyGate::default(),
			badges_gate: DailyGate::default(),
		}
	}

	pub async fn tick(&mut self, now: OffsetDateTime) -> Result<TickReport> {
		let state = &self.state;
		let mut report = TickReport {
			inbound_events: inbound::process_pending_webhook_events(state, now).await?,
			..Default::default()
		};

		if let Some(provider) = state.provider() {
			report.outbound_jobs =
				outbound::process_outbound_jobs(state, provider, &mut self.circuit, now).await?;
			report.rating_requests = ratings::send_rating_requests(state, now).await?;
		}

		report.sla = sla::recompute_sla(state, now).await?;
		report.timeouts = timeouts::enforce_timeouts(state, now).await?;

		let today = now.date();

		// Gates close before the task runs; a failed daily task waits for the next day.
		if self.retention_gate.begin(today) {
			retention::run_retention(state, now).await?;
		}
		if let Some(provider) = state.provider()
			&& self.templates_gate.begin(today)
		{
			templates::sync_templates(state, provider, now).await?;
		}
		if self.badges_gate.begin(today) {
			badges::evaluate_badges(state, now).await?;
		}

		Ok(report)
	}
}

pub async fn run_worker(state: WorkerState, shutdown: CancellationToken) -> color_eyre::Result<()> {
	let poll_interval = state.settings.poll_interval;
	let mut scheduler = Scheduler::new(state);

	while !shutdown.is_cancelled() {
		let now = OffsetDateTime::now_utc();

		if let Some(remaining) = scheduler.breaker.remaining(now) {
			if !sleep_or_cancel(&shutdown, to_std_duration(remaining.min(MAX_BREAKER_WAIT))).await {
				break;
			}

			continue;
		}

		match scheduler.tick(now).await {
			Ok(report) => {
				scheduler.breaker.record_success();

				if !report.is_idle() {
					tracing::debug!(?report, "Worker tick completed.");
				}
			},
			Err(err) => {
				let backoff = scheduler.breaker.record_failure(now);

				if scheduler.breaker.should_log(now) {
					tracing::error!(
						error = %err,
						failures = scheduler.breaker.failures(),
						backoff_ms = backoff.whole_milliseconds() as u64,
						"Worker tick failed."
					);
				}
			},
		}

		if !sleep_or_cancel(&shutdown, poll_interval).await {
			break;
		}
	}

	tracing::info!("Worker stopped.");

	Ok(())
}

/// Returns `false` when shutdown was requested during the sleep.
async fn sleep_or_cancel(shutdown: &CancellationToken, duration: StdDuration) -> bool {
	tokio::select! {
		_ = shutdown.cancelled() => false,
		_ = tokio_time::sleep(duration) => true,
	}
}

fn to_std_duration(duration: Duration) -> StdDuration {
	let millis = duration.whole_milliseconds();

	if millis <= 0 {
		return StdDuration::from_millis(0);
	}

	StdDuration::from_millis(millis as u64)
}
