//! Optional observability helpers for the proxy pipeline.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to wrap every request in a span named `ai_proxy.request` carrying the
//!   `client` and `stage` fields, and to emit events on state transitions, retries, store sweeps,
//!   and internal faults.
//! - Enable `metrics` to increment `ai_proxy_request_total` (labeled by `outcome`) and
//!   `ai_proxy_upstream_attempt_total` (labeled by `result`).
//!
//! Without either feature every helper compiles down to a no-op.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Outcome labels recorded for each proxied request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestOutcome {
	/// Entry to [`ProxyService::handle`](crate::proxy::ProxyService::handle).
	Attempt,
	/// Upstream produced a completion.
	Succeeded,
	/// Validation rejected the payload.
	Rejected,
	/// The client's window was full.
	RateLimited,
	/// Upstream or internal failure.
	Failed,
}
impl RequestOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			RequestOutcome::Attempt => "attempt",
			RequestOutcome::Succeeded => "succeeded",
			RequestOutcome::Rejected => "rejected",
			RequestOutcome::RateLimited => "rate_limited",
			RequestOutcome::Failed => "failed",
		}
	}
}
impl Display for RequestOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
