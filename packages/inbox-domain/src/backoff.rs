use rand::Rng;
use time::Duration;

pub const BASE_BACKOFF_MS: i64 = 500;
pub const MAX_BACKOFF_MS: i64 = 60_000;
pub const MAX_JITTER_MS: i64 = 250;

/// Deterministic part of the retry delay.
///
/// `attempts` is the attempt count recorded by the claim, so the first failure sees `1` and waits
/// [`BASE_BACKOFF_MS`]. Values below one are treated as one.
pub fn base_delay(attempts: i32) -> Duration {
	let exp = (attempts.max(1) as u32 - 1).min(16);
	let base = BASE_BACKOFF_MS.saturating_mul(1_i64 << exp);

	Duration::milliseconds(base.min(MAX_BACKOFF_MS))
}

pub fn delay_with_jitter(attempts: i32, jitter_ms: i64) -> Duration {
	base_delay(attempts) + Duration::milliseconds(jitter_ms.clamp(0, MAX_JITTER_MS - 1))
}

pub fn retry_delay(attempts: i32) -> Duration {
	let jitter = rand::thread_rng().gen_range(0..MAX_JITTER_MS);

	delay_with_jitter(attempts, jitter)
}
