//! Exponential backoff with jitter for transient upstream failures.

// std
use std::time::Duration as StdDuration;
// crates.io
use rand::Rng;
// self
use crate::{_prelude::*, error::ConfigError};

/// Retry bound and backoff shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Additional attempts after the first one.
	pub max_retries: u32,
	/// Delay before the first retry, in milliseconds.
	pub base_delay_ms: u64,
	/// Upper bound for any single delay, in milliseconds.
	pub max_delay_ms: u64,
	/// Fraction of each delay that is randomized, in `[0, 1]`.
	pub jitter: f64,
}
impl RetryPolicy {
	/// Policy that performs exactly one attempt.
	pub fn no_retry() -> Self {
		Self { max_retries: 0, ..Self::default() }
	}

	/// Checks that the policy is usable.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if !(0.0..=1.0).contains(&self.jitter) {
			return Err(ConfigError::InvalidBounds { field: "provider.retry.jitter" });
		}
		if self.base_delay_ms > self.max_delay_ms {
			return Err(ConfigError::InvalidBounds { field: "provider.retry.delay_ms" });
		}

		Ok(())
	}

	/// Un-jittered delay before retry number `retry` (1-based).
	pub fn base_delay_for(&self, retry: u32) -> StdDuration {
		let exponent = retry.saturating_sub(1).min(20);
		let millis = self.base_delay_ms.saturating_mul(1_u64 << exponent).min(self.max_delay_ms);

		StdDuration::from_millis(millis)
	}

	/// Jittered delay before retry number `retry` (1-based).
	///
	/// The result lies in `[base * (1 - jitter), base]`, so jitter only ever shortens a delay.
	pub fn delay_for(&self, retry: u32) -> StdDuration {
		let base = self.base_delay_for(retry);

		if self.jitter <= 0.0 || base.is_zero() {
			return base;
		}

		let spread = base.mul_f64(self.jitter);
		let cut = rand::rng().random_range(0.0..=1.0);

		base.saturating_sub(spread.mul_f64(cut))
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self { max_retries: 2, base_delay_ms: 200, max_delay_ms: 2_000, jitter: 0.5 }
	}
}
