//! Fixed-window counter shared by every [`RateLimitStore`](crate::store::RateLimitStore).

// self
use crate::{_prelude::*, rate_limit::WindowRule, store::HitOutcome};

/// Per-client request counter for the current window.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitWindow {
	/// Requests admitted in the current window; never exceeds the ceiling.
	pub count: u32,
	/// When the current window opened.
	pub window_start: OffsetDateTime,
	/// Last admitted or rejected request, used for idle collection.
	pub last_seen: OffsetDateTime,
}
impl RateLimitWindow {
	/// Opens a window that already counts the request observed at `now`.
	pub fn open(now: OffsetDateTime) -> Self {
		Self { count: 1, window_start: now, last_seen: now }
	}

	/// Whether the window's age has reached the configured duration.
	pub fn is_expired_at(&self, rule: &WindowRule, now: OffsetDateTime) -> bool {
		now - self.window_start >= rule.window
	}

	/// Whether the window is expired and untouched for at least the idle expiry.
	pub fn is_idle_at(&self, rule: &WindowRule, now: OffsetDateTime) -> bool {
		self.is_expired_at(rule, now) && now - self.last_seen >= rule.idle_expiry
	}

	/// Time left until the window resets, clamped to `[0, window]`.
	pub fn retry_after(&self, rule: &WindowRule, now: OffsetDateTime) -> Duration {
		match self.window_start.checked_add(rule.window) {
			Some(reset) => (reset - now).clamp(Duration::ZERO, rule.window),
			None => rule.window,
		}
	}

	/// Applies one request to the window in place.
	///
	/// Callers must hold whatever lock serializes access to this window.
	pub fn record(&mut self, rule: &WindowRule, now: OffsetDateTime) -> HitOutcome {
		if self.is_expired_at(rule, now) {
			*self = Self::open(now);

			return HitOutcome::Admitted { count: self.count, window_start: self.window_start };
		}

		self.last_seen = now;

		if self.count < rule.ceiling {
			self.count += 1;

			HitOutcome::Admitted { count: self.count, window_start: self.window_start }
		} else {
			HitOutcome::Rejected { window_start: self.window_start }
		}
	}
}
