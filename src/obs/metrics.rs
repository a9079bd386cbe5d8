// self
use crate::{obs::RequestOutcome, provider::ProviderFailureKind};

/// Records a request outcome via the global metrics recorder (when enabled).
pub fn record_request_outcome(outcome: RequestOutcome) {
	#[cfg(feature = "metrics")]
	{
		metrics::counter!("ai_proxy_request_total", "outcome" => outcome.as_str()).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = outcome;
	}
}

/// Records one upstream attempt; `None` means the attempt succeeded.
pub fn record_upstream_attempt(failure: Option<ProviderFailureKind>) {
	#[cfg(feature = "metrics")]
	{
		let result = failure.map_or("success", ProviderFailureKind::as_str);

		metrics::counter!("ai_proxy_upstream_attempt_total", "result" => result).increment(1);
	}

	#[cfg(not(feature = "metrics"))]
	{
		let _ = failure;
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_noop_without_a_global_recorder() {
		record_request_outcome(RequestOutcome::RateLimited);
		record_upstream_attempt(None);
		record_upstream_attempt(Some(ProviderFailureKind::Throttled));
	}
}
