//! Per-client admission control over fixed windows.
//!
//! [`RateLimiter`] is the only component holding state across requests. It owns an injected
//! [`RateLimitStore`] and exposes a single question: may this client send one more request
//! right now? The store serializes each key's read-increment-write; the limiter never holds a
//! lock once the decision is returned, so callers are free to await the upstream call.

mod window;

pub use window::RateLimitWindow;

// self
use crate::{
	_prelude::*,
	error::ConfigError,
	identity::ClientKey,
	obs,
	store::{HitOutcome, MemoryRateLimitStore, RateLimitStore},
};

/// Rate-limit settings as they appear in configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
	/// Requests admitted per client per window.
	pub ceiling: u32,
	/// Window length in seconds.
	pub window_secs: u64,
	/// Seconds an expired window may sit untouched before it is collected.
	pub idle_expiry_secs: u64,
}
impl RateLimitConfig {
	/// Longest accepted window or idle expiry: 366 days.
	pub const MAX_DURATION_SECS: u64 = 366 * 24 * 60 * 60;

	/// Checks that the settings describe a usable limiter.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.ceiling == 0 {
			return Err(ConfigError::ZeroValue { field: "rate_limit.ceiling" });
		}

		for (field, value) in [
			("rate_limit.window_secs", self.window_secs),
			("rate_limit.idle_expiry_secs", self.idle_expiry_secs),
		] {
			if value == 0 {
				return Err(ConfigError::ZeroValue { field });
			}
			if value > Self::MAX_DURATION_SECS {
				return Err(ConfigError::TooLarge { field, max: Self::MAX_DURATION_SECS });
			}
		}

		Ok(())
	}

	/// Converts the settings into the rule stores evaluate.
	pub fn rule(&self) -> WindowRule {
		WindowRule {
			ceiling: self.ceiling,
			window: secs(self.window_secs),
			idle_expiry: secs(self.idle_expiry_secs),
		}
	}
}
impl Default for RateLimitConfig {
	fn default() -> Self {
		Self { ceiling: 20, window_secs: 60, idle_expiry_secs: 600 }
	}
}

/// Window parameters evaluated by [`RateLimitStore`] implementations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowRule {
	/// Requests admitted per window.
	pub ceiling: u32,
	/// Window length.
	pub window: Duration,
	/// Idle time after which an expired window may be dropped.
	pub idle_expiry: Duration,
}

/// Answer returned by [`RateLimiter::admit`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed.
	Admitted {
		/// Requests still available in the current window.
		remaining: u32,
	},
	/// The window is full.
	Rejected {
		/// Time until the window resets.
		retry_after: Duration,
	},
}
impl RateLimitDecision {
	/// Whether the request was admitted.
	pub fn is_admitted(&self) -> bool {
		matches!(self, Self::Admitted { .. })
	}
}

/// Explicitly injected admission controller.
pub struct RateLimiter {
	store: Arc<dyn RateLimitStore>,
	rule: WindowRule,
	last_sweep: Mutex<Option<OffsetDateTime>>,
}
impl RateLimiter {
	/// Creates a limiter over the given store.
	pub fn new(store: Arc<dyn RateLimitStore>, config: &RateLimitConfig) -> Self {
		Self { store, rule: config.rule(), last_sweep: Mutex::new(None) }
	}

	/// Creates a limiter backed by a fresh [`MemoryRateLimitStore`].
	pub fn in_memory(config: &RateLimitConfig) -> Self {
		Self::new(Arc::new(MemoryRateLimitStore::default()), config)
	}

	/// Returns the evaluated window rule.
	pub fn rule(&self) -> &WindowRule {
		&self.rule
	}

	/// Admits or rejects one request for `key` at the current wall-clock time.
	pub async fn admit(&self, key: &ClientKey) -> Result<RateLimitDecision> {
		self.admit_at(key, OffsetDateTime::now_utc()).await
	}

	/// Admits or rejects one request for `key` as observed at `now`.
	pub async fn admit_at(
		&self,
		key: &ClientKey,
		now: OffsetDateTime,
	) -> Result<RateLimitDecision> {
		if self.sweep_due(now) {
			let swept = self.store.sweep(&self.rule, now).await;

			obs::trace_sweep(&swept);
		}

		let outcome = self.store.hit(key, &self.rule, now).await?;
		let decision = match outcome {
			HitOutcome::Admitted { count, .. } =>
				RateLimitDecision::Admitted { remaining: self.rule.ceiling.saturating_sub(count) },
			HitOutcome::Rejected { window_start } => {
				let window = RateLimitWindow {
					count: self.rule.ceiling,
					window_start,
					last_seen: now,
				};

				RateLimitDecision::Rejected { retry_after: window.retry_after(&self.rule, now) }
			},
		};

		Ok(decision)
	}

	fn sweep_due(&self, now: OffsetDateTime) -> bool {
		let mut last = self.last_sweep.lock();

		match *last {
			Some(previous) if now - previous < self.rule.idle_expiry => false,
			Some(_) => {
				*last = Some(now);

				true
			},
			None => {
				*last = Some(now);

				false
			},
		}
	}
}
impl Debug for RateLimiter {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RateLimiter").field("rule", &self.rule).finish()
	}
}

fn secs(value: u64) -> Duration {
	Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}
