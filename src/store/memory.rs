//! Thread-safe in-memory [`RateLimitStore`] implementation for single-instance deployments.

// self
use crate::{
	_prelude::*,
	identity::ClientKey,
	rate_limit::{RateLimitWindow, WindowRule},
	store::{HitOutcome, RateLimitStore, StoreFuture},
};

type WindowMap = Arc<Mutex<HashMap<ClientKey, RateLimitWindow>>>;

/// Keeps windows in-process behind one lock so every hit is a single critical section.
#[derive(Clone, Debug, Default)]
pub struct MemoryRateLimitStore(WindowMap);
impl MemoryRateLimitStore {
	/// Number of tracked client windows.
	pub fn len(&self) -> usize {
		self.0.lock().len()
	}

	/// Whether no client window is tracked.
	pub fn is_empty(&self) -> bool {
		self.0.lock().is_empty()
	}

	fn hit_now(
		map: &WindowMap,
		key: &ClientKey,
		rule: &WindowRule,
		now: OffsetDateTime,
	) -> HitOutcome {
		let mut guard = map.lock();

		match guard.get_mut(key) {
			Some(window) => window.record(rule, now),
			None => {
				let window = RateLimitWindow::open(now);
				let outcome = HitOutcome::Admitted { count: window.count, window_start: now };

				guard.insert(key.clone(), window);

				outcome
			},
		}
	}

	fn sweep_now(map: &WindowMap, rule: &WindowRule, now: OffsetDateTime) -> usize {
		let mut guard = map.lock();
		let before = guard.len();

		guard.retain(|_, window| !window.is_idle_at(rule, now));

		before - guard.len()
	}
}
impl RateLimitStore for MemoryRateLimitStore {
	fn hit<'a>(
		&'a self,
		key: &'a ClientKey,
		rule: &'a WindowRule,
		now: OffsetDateTime,
	) -> StoreFuture<'a, HitOutcome> {
		Box::pin(async move { Ok(Self::hit_now(&self.0, key, rule, now)) })
	}

	fn window<'a>(&'a self, key: &'a ClientKey) -> StoreFuture<'a, Option<RateLimitWindow>> {
		Box::pin(async move { Ok(self.0.lock().get(key).cloned()) })
	}

	fn sweep<'a>(&'a self, rule: &'a WindowRule, now: OffsetDateTime) -> StoreFuture<'a, usize> {
		Box::pin(async move { Ok(Self::sweep_now(&self.0, rule, now)) })
	}
}
