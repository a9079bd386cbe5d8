//! Storage contracts and the built-in in-memory backend for rate-limit windows.
//!
//! A single proxy instance can use [`MemoryRateLimitStore`]. Deployments running several
//! instances must plug in a store every instance can reach, otherwise each one enforces its
//! own, looser ceiling.

pub mod memory;

pub use memory::MemoryRateLimitStore;

// self
use crate::{
	_prelude::*,
	identity::ClientKey,
	rate_limit::{RateLimitWindow, WindowRule},
};

/// Boxed future returned by [`RateLimitStore`] operations.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Storage backend contract for per-client rate-limit windows.
pub trait RateLimitStore
where
	Self: Send + Sync,
{
	/// Records one request for `key` and reports whether it fits the window.
	///
	/// The read, the expiry check, the increment, and the write must form a single atomic
	/// unit per key: two concurrent hits against a window with one free slot must never both
	/// come back [`HitOutcome::Admitted`]. Rejected hits still refresh the window's
	/// `last_seen` timestamp but never change its count.
	fn hit<'a>(
		&'a self,
		key: &'a ClientKey,
		rule: &'a WindowRule,
		now: OffsetDateTime,
	) -> StoreFuture<'a, HitOutcome>;

	/// Fetches the current window for `key`, if one exists.
	fn window<'a>(&'a self, key: &'a ClientKey) -> StoreFuture<'a, Option<RateLimitWindow>>;

	/// Drops windows that are expired and have been idle for at least `rule.idle_expiry`.
	///
	/// Returns how many windows were removed.
	fn sweep<'a>(&'a self, rule: &'a WindowRule, now: OffsetDateTime) -> StoreFuture<'a, usize>;
}

/// Result of a [`RateLimitStore::hit`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HitOutcome {
	/// The request fits; `count` includes it.
	Admitted {
		/// Requests admitted in the window so far.
		count: u32,
		/// Start of the window that admitted the request.
		window_start: OffsetDateTime,
	},
	/// The window is full.
	Rejected {
		/// Start of the full window.
		window_start: OffsetDateTime,
	},
}

/// Error type produced by [`RateLimitStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// std
	use std::error::Error as StdError;
	// self
	use super::*;
	use crate::error::{Error, ErrorKind};

	#[test]
	fn store_error_converts_into_proxy_error_with_source() {
		let store_error = StoreError::Backend { message: "database unreachable".into() };
		let proxy_error: Error = store_error.clone().into();

		assert!(matches!(proxy_error, Error::Storage(_)));
		assert_eq!(proxy_error.kind(), ErrorKind::Internal);
		assert!(proxy_error.to_string().contains("database unreachable"));

		let source = StdError::source(&proxy_error)
			.expect("Proxy error should expose the original store error as its source.");

		assert_eq!(source.to_string(), store_error.to_string());
	}

	#[test]
	fn hit_outcome_can_be_serialized() {
		let window_start = OffsetDateTime::UNIX_EPOCH;
		let outcome = HitOutcome::Rejected { window_start };
		let payload =
			serde_json::to_string(&outcome).expect("HitOutcome should serialize to JSON.");
		let round_trip: HitOutcome =
			serde_json::from_str(&payload).expect("Serialized outcome should deserialize.");

		assert_eq!(round_trip, outcome);
	}
}
