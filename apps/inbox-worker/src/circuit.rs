//! Process-local failure gates.

use time::{Duration, OffsetDateTime};

pub const PROVIDER_FAILURE_THRESHOLD: u32 = 5;
pub const PROVIDER_COOLDOWN: Duration = Duration::seconds(30);

pub const TICK_MAX_FAILURES: u32 = 10;
pub const TICK_BASE_BACKOFF: Duration = Duration::seconds(1);
pub const TICK_MAX_BACKOFF: Duration = Duration::seconds(30);
pub const TICK_LOG_INTERVAL: Duration = Duration::seconds(5);

/// Gate in front of the provider. Opens after consecutive transient failures.
#[derive(Debug)]
pub struct CircuitBreaker {
	failures: u32,
	open_until: Option<OffsetDateTime>,
	threshold: u32,
	cooldown: Duration,
}
impl CircuitBreaker {
	pub fn new(threshold: u32, cooldown: Duration) -> Self {
		Self { failures: 0, open_until: None, threshold: threshold.max(1), cooldown }
	}

	pub fn failures(&self) -> u32 {
		self.failures
	}

	pub fn is_open(&self, now: OffsetDateTime) -> bool {
		self.open_until.map(|until| now < until).unwrap_or(false)
	}

	pub fn record_success(&mut self) {
		self.failures = 0;
		self.open_until = None;
	}

	/// Returns `true` when this failure opened the gate.
	pub fn record_failure(&mut self, now: OffsetDateTime) -> bool {
		self.failures = self.failures.saturating_add(1);

		if self.failures >= self.threshold && !self.is_open(now) {
			self.open_until = Some(now + self.cooldown);

			return true;
		}

		false
	}
}
impl Default for CircuitBreaker {
	fn default() -> Self {
		Self::new(PROVIDER_FAILURE_THRESHOLD, PROVIDER_COOLDOWN)
	}
}

/// Backoff for the scheduler itself when whole ticks fail.
#[derive(Debug, Default)]
pub struct TickBreaker {
	failures: u32,
	open_until: Option<OffsetDateTime>,
	last_logged_at: Option<OffsetDateTime>,
}
impl TickBreaker {
	pub fn failures(&self) -> u32 {
		self.failures
	}

	/// Time left before the next tick may run.
	pub fn remaining(&self, now: OffsetDateTime) -> Option<Duration> {
		self.open_until.map(|until| until - now).filter(|left| left.is_positive())
	}

	pub fn record_success(&mut self) {
		self.failures = 0;
		self.open_until = None;
	}

	/// Opens the gate for the backoff of the new failure count and returns that backoff.
	pub fn record_failure(&mut self, now: OffsetDateTime) -> Duration {
		self.failures = (self.failures + 1).min(TICK_MAX_FAILURES);

		let backoff = Self::backoff(self.failures);

		self.open_until = Some(now + backoff);

		backoff
	}

	/// Whether a failure log line may be written now. Claims the slot when it may.
	pub fn should_log(&mut self, now: OffsetDateTime) -> bool {
		match self.last_logged_at {
			Some(at) if now - at < TICK_LOG_INTERVAL => false,
			_ => {
				self.last_logged_at = Some(now);

				true
			},
		}
	}

	pub fn backoff(failures: u32) -> Duration {
		let exp = (failures.max(1) - 1).min(16);
		let multiplier = 1_i32 << exp;

		TICK_BASE_BACKOFF.saturating_mul(multiplier).min(TICK_MAX_BACKOFF)
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	const NOW: OffsetDateTime = datetime!(2026-03-02 12:00 UTC);

	#[test]
	fn opens_after_threshold_and_closes_after_cooldown() {
		let mut breaker = CircuitBreaker::default();

		for _ in 0..4 {
			assert!(!breaker.record_failure(NOW));
		}

		assert!(!breaker.is_open(NOW));
		assert!(breaker.record_failure(NOW));
		assert!(breaker.is_open(NOW + Duration::seconds(29)));
		assert!(!breaker.is_open(NOW + Duration::seconds(30)));
	}

	#[test]
	fn success_resets_failures() {
		let mut breaker = CircuitBreaker::default();

		breaker.record_failure(NOW);
		breaker.record_failure(NOW);
		breaker.record_success();

		assert_eq!(breaker.failures(), 0);
		assert!(!breaker.is_open(NOW));
	}

	#[test]
	fn tick_backoff_doubles_up_to_the_cap() {
		assert_eq!(TickBreaker::backoff(1), Duration::seconds(1));
		assert_eq!(TickBreaker::backoff(2), Duration::seconds(2));
		assert_eq!(TickBreaker::backoff(5), Duration::seconds(16));
		assert_eq!(TickBreaker::backoff(6), Duration::seconds(30));
		assert_eq!(TickBreaker::backoff(40), Duration::seconds(30));
	}

	#[test]
	fn tick_failures_are_capped_and_logs_throttled() {
		let mut breaker = TickBreaker::default();

		for _ in 0..15 {
			breaker.record_failure(NOW);
		}

		assert_eq!(breaker.failures(), TICK_MAX_FAILURES);
		assert_eq!(breaker.remaining(NOW), Some(Duration::seconds(30)));
		assert!(breaker.should_log(NOW));
		assert!(!breaker.should_log(NOW + Duration::seconds(4)));
		assert!(breaker.should_log(NOW + Duration::seconds(5)));

		breaker.record_success();

		assert_eq!(breaker.remaining(NOW), None);
	}
}
