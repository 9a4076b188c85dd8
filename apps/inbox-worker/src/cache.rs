use std::{future::Future, hash::Hash, sync::Mutex};

use ahash::AHashMap;
use time::{Duration, OffsetDateTime};

pub const DEFAULT_TTL: Duration = Duration::minutes(10);

/// Read-through cache with a fixed time-to-live and explicit invalidation.
///
/// Misses are not cached, so a record created after a lookup is seen on the next one.
#[derive(Debug)]
pub struct TtlCache<K, V> {
	ttl: Duration,
	entries: Mutex<AHashMap<K, (OffsetDateTime, V)>>,
}
impl<K, V> TtlCache<K, V>
where
	K: Eq + Hash,
	V: Clone,
{
	pub fn new(ttl: Duration) -> Self {
		Self { ttl, entries: Mutex::new(AHashMap::new()) }
	}

	pub fn get(&self, key: &K, now: OffsetDateTime) -> Option<V> {
		let mut entries = self.entries.lock().unwrap_or_else(|err| err.into_inner());

		match entries.get(key) {
			Some((stored_at, value)) if now - *stored_at < self.ttl => Some(value.clone()),
			Some(_) => {
				entries.remove(key);

				None
			},
			None => None,
		}
	}

	pub fn insert(&self, key: K, value: V, now: OffsetDateTime) {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).insert(key, (now, value));
	}

	pub fn invalidate(&self, key: &K) {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).remove(key);
	}

	pub fn clear(&self) {
		self.entries.lock().unwrap_or_else(|err| err.into_inner()).clear();
	}

	/// Returns the cached value or loads, stores and returns a fresh one.
	pub async fn get_or_load<F, Fut, E>(
		&self,
		key: K,
		now: OffsetDateTime,
		load: F,
	) -> Result<Option<V>, E>
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Option<V>, E>>,
	{
		if let Some(value) = self.get(&key, now) {
			return Ok(Some(value));
		}

		let loaded = load().await?;

		if let Some(value) = &loaded {
			self.insert(key, value.clone(), now);
		}

		Ok(loaded)
	}
}

#[cfg(test)]
mod tests {
	use time::macros::datetime;

	use super::*;

	const NOW: OffsetDateTime = datetime!(2026-03-02 12:00 UTC);

	#[test]
	fn entries_expire_after_ttl() {
		let cache = TtlCache::new(Duration::minutes(10));

		cache.insert("1001", 7, NOW);

		assert_eq!(cache.get(&"1001", NOW + Duration::minutes(9)), Some(7));
		assert_eq!(cache.get(&"1001", NOW + Duration::minutes(10)), None);
	}

	#[test]
	fn invalidate_drops_one_key() {
		let cache = TtlCache::new(DEFAULT_TTL);

		cache.insert("a", 1, NOW);
		cache.insert("b", 2, NOW);
		cache.invalidate(&"a");

		assert_eq!(cache.get(&"a", NOW), None);
		assert_eq!(cache.get(&"b", NOW), Some(2));

		cache.clear();

		assert_eq!(cache.get(&"b", NOW), None);
	}

	#[tokio::test]
	async fn loads_once_and_skips_misses() {
		let cache: TtlCache<&str, u32> = TtlCache::new(DEFAULT_TTL);
		let first: Result<_, ()> = cache.get_or_load("a", NOW, || async { Ok(Some(1)) }).await;
		let second: Result<_, ()> = cache.get_or_load("a", NOW, || async { Ok(Some(2)) }).await;
		let missing: Result<_, ()> = cache.get_or_load("b", NOW, || async { Ok(None) }).await;

		assert_eq!(first, Ok(Some(1)));
		assert_eq!(second, Ok(Some(1)));
		assert_eq!(missing, Ok(None));
		assert_eq!(cache.get(&"b", NOW), None);
	}
}
