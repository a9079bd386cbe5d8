//! Deadline-bounded upstream calls with bounded retries.
//!
//! Every attempt of one [`ProviderClient::call`] shares a single deadline. Transient failures
//! are retried up to [`RetryPolicy::max_retries`] times with jittered exponential backoff;
//! non-transient failures return immediately. When the deadline expires mid-attempt, or the
//! next backoff would cross it, the call is abandoned and reported as a timeout.

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::time::Instant;
// self
use crate::{
	_prelude::*,
	obs,
	provider::{
		CompletionProvider, ProviderConfig, ProviderFailure, ProviderFailureKind, ProviderOutput,
		ProviderResult, RetryPolicy,
	},
	request::AiRequest,
};

/// Retrying wrapper around a [`CompletionProvider`].
pub struct ProviderClient<P>
where
	P: ?Sized + CompletionProvider,
{
	provider: Arc<P>,
	retry: RetryPolicy,
	attempt_timeout: Option<StdDuration>,
}
impl<P> ProviderClient<P>
where
	P: ?Sized + CompletionProvider,
{
	/// Creates a client using the retry and attempt settings from `config`.
	pub fn new(provider: Arc<P>, config: &ProviderConfig) -> Self {
		Self {
			provider,
			retry: config.retry.clone(),
			attempt_timeout: config.attempt_timeout(),
		}
	}

	/// Returns the wrapped provider.
	pub fn provider(&self) -> &Arc<P> {
		&self.provider
	}

	/// Calls the provider until it succeeds, fails permanently, exhausts the retry bound, or
	/// runs out of `timeout`.
	pub async fn call(&self, request: &AiRequest, timeout: StdDuration) -> ProviderResult {
		let started = Instant::now();
		let deadline = started + timeout;
		let mut attempts = 0_u32;

		loop {
			let remaining = deadline.saturating_duration_since(Instant::now());

			if remaining.is_zero() {
				return Err(deadline_exceeded(attempts));
			}

			let budget = self.attempt_timeout.map_or(remaining, |limit| limit.min(remaining));

			attempts += 1;

			let failure =
				match tokio::time::timeout(budget, self.provider.complete(request)).await {
					Ok(Ok(completion)) => {
						obs::record_upstream_attempt(None);

						return Ok(ProviderOutput {
							text: completion.text,
							latency_ms: millis(started.elapsed()),
							model: completion.model,
						});
					},
					Ok(Err(failure)) => failure.with_attempts(attempts),
					Err(_) if budget < remaining => ProviderFailure::new(
						ProviderFailureKind::Timeout,
						format!("Attempt exceeded {} ms", budget.as_millis()),
					)
					.with_attempts(attempts),
					Err(_) => {
						obs::record_upstream_attempt(Some(ProviderFailureKind::Timeout));

						return Err(deadline_exceeded(attempts));
					},
				};

			obs::record_upstream_attempt(Some(failure.kind));

			if !failure.retryable || attempts > self.retry.max_retries {
				return Err(failure);
			}

			let delay = self.backoff(attempts, &failure);

			if Instant::now() + delay >= deadline {
				return Err(deadline_exceeded(attempts));
			}

			obs::trace_retry(attempts, &failure, delay);
			tokio::time::sleep(delay).await;
		}
	}

	fn backoff(&self, retry: u32, failure: &ProviderFailure) -> StdDuration {
		let delay = self.retry.delay_for(retry);
		let hinted = failure.retry_after.and_then(|hint| StdDuration::try_from(hint).ok());

		hinted.map_or(delay, |hint| delay.max(hint))
	}
}
impl<P> Debug for ProviderClient<P>
where
	P: ?Sized + CompletionProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProviderClient")
			.field("retry", &self.retry)
			.field("attempt_timeout", &self.attempt_timeout)
			.finish()
	}
}

fn deadline_exceeded(attempts: u32) -> ProviderFailure {
	ProviderFailure::new(ProviderFailureKind::Timeout, "Overall upstream deadline exceeded")
		.with_attempts(attempts)
}

fn millis(duration: StdDuration) -> u64 {
	u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
