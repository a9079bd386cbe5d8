//! Per-request orchestration: validate, admit, call upstream, build the envelope.
//!
//! [`ProxyService`] keeps no state between requests; the shared window map lives behind the
//! injected [`RateLimiter`]. Admission is decided and released before the upstream call starts,
//! so a slow provider never blocks other callers' accounting.

// std
use std::{any::Any, panic::AssertUnwindSafe, time::Duration as StdDuration};
// crates.io
use futures::FutureExt;
// self
use crate::{
	_prelude::*,
	config::ProxyConfig,
	envelope::ResponseEnvelope,
	error::{ConfigError, ErrorKind},
	identity::ClientKey,
	obs::{self, RequestOutcome, RequestSpan},
	provider::{CompletionProvider, ProviderClient, ProviderOutput},
	rate_limit::{RateLimitDecision, RateLimiter},
	request::RequestValidator,
};

/// Lifecycle of a single proxied request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequestState {
	/// Bytes arrived at the boundary.
	Received,
	/// Payload is being checked.
	Validating,
	/// Payload failed validation; terminal.
	Rejected,
	/// Quota is being consulted.
	Admitting,
	/// Quota exhausted; terminal.
	RateLimited,
	/// Upstream call in progress.
	Calling,
	/// Upstream produced a completion; terminal.
	Succeeded,
	/// Upstream or internal failure; terminal.
	Failed,
}
impl RequestState {
	/// Whether the request can no longer change state.
	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Rejected | Self::RateLimited | Self::Succeeded | Self::Failed)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Received => "received",
			Self::Validating => "validating",
			Self::Rejected => "rejected",
			Self::Admitting => "admitting",
			Self::RateLimited => "rate_limited",
			Self::Calling => "calling",
			Self::Succeeded => "succeeded",
			Self::Failed => "failed",
		}
	}

	fn terminal_for(kind: ErrorKind) -> Self {
		match kind {
			ErrorKind::Validation => Self::Rejected,
			ErrorKind::RateLimitExceeded => Self::RateLimited,
			ErrorKind::UpstreamTimeout | ErrorKind::UpstreamError | ErrorKind::Internal =>
				Self::Failed,
		}
	}

	fn outcome(self) -> RequestOutcome {
		match self {
			Self::Rejected => RequestOutcome::Rejected,
			Self::RateLimited => RequestOutcome::RateLimited,
			Self::Succeeded => RequestOutcome::Succeeded,
			Self::Failed => RequestOutcome::Failed,
			Self::Received | Self::Validating | Self::Admitting | Self::Calling =>
				RequestOutcome::Attempt,
		}
	}
}
impl Display for RequestState {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Envelope plus the transport hints a host HTTP layer needs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProxyReply {
	/// Body to serialize.
	pub envelope: ResponseEnvelope,
	/// Suggested HTTP status: 200 on success, the envelope code otherwise.
	pub http_status: u16,
	/// Suggested `Retry-After` for rate-limited replies.
	pub retry_after: Option<Duration>,
	/// Terminal state the request reached.
	pub state: RequestState,
}
impl ProxyReply {
	/// Reply for a successful upstream call.
	pub fn success(output: &ProviderOutput) -> Self {
		Self {
			envelope: ResponseEnvelope::success(output),
			http_status: 200,
			retry_after: None,
			state: RequestState::Succeeded,
		}
	}

	/// Reply for any failure, classified through [`Error::kind`].
	pub fn failure(error: &Error) -> Self {
		let kind = error.kind();

		Self {
			envelope: ResponseEnvelope::failure(error),
			http_status: kind.code(),
			retry_after: error.retry_after(),
			state: RequestState::terminal_for(kind),
		}
	}

	/// `Retry-After` header value in whole seconds, rounded up.
	pub fn retry_after_secs(&self) -> Option<u64> {
		self.retry_after.map(|retry_after| {
			let millis = u64::try_from(retry_after.whole_milliseconds()).unwrap_or(0);

			millis.div_ceil(1_000)
		})
	}
}

/// Stateless orchestrator over a validator, an injected limiter, and a provider client.
pub struct ProxyService<P>
where
	P: ?Sized + CompletionProvider,
{
	validator: RequestValidator,
	limiter: Arc<RateLimiter>,
	provider: ProviderClient<P>,
	timeout: StdDuration,
}
impl<P> ProxyService<P>
where
	P: ?Sized + CompletionProvider,
{
	/// Wires a service from validated configuration and its collaborators.
	///
	/// The limiter is shared so several services (or proxy routes) can enforce one quota.
	pub fn new(
		config: &ProxyConfig,
		limiter: Arc<RateLimiter>,
		provider: Arc<P>,
	) -> Result<Self, ConfigError> {
		config.validate()?;

		Ok(Self {
			validator: RequestValidator::new(config.validation.clone()),
			limiter,
			provider: ProviderClient::new(provider, &config.provider),
			timeout: config.provider.timeout(),
		})
	}

	/// Wires a service with a private in-memory limiter.
	pub fn in_memory(config: &ProxyConfig, provider: Arc<P>) -> Result<Self, ConfigError> {
		let limiter = Arc::new(RateLimiter::in_memory(&config.rate_limit));

		Self::new(config, limiter, provider)
	}

	/// Shared limiter.
	pub fn limiter(&self) -> &Arc<RateLimiter> {
		&self.limiter
	}

	/// Upstream client.
	pub fn provider(&self) -> &ProviderClient<P> {
		&self.provider
	}

	/// Handles one inbound request for `client`.
	///
	/// Always produces a reply; every failure, including store faults and panics raised by
	/// the provider or store, is mapped to a failure envelope.
	pub async fn handle(&self, client: &ClientKey, payload: &[u8]) -> ProxyReply {
		let span = RequestSpan::new(client);

		obs::record_request_outcome(RequestOutcome::Attempt);

		let reply = span
			.instrument(async {
				let result = AssertUnwindSafe(self.run(&span, client, payload))
					.catch_unwind()
					.await
					.unwrap_or_else(|panic| {
						Err(Error::internal(format!(
							"panicked while {}: {}",
							span.stage(),
							panic_message(panic.as_ref())
						)))
					});

				match result {
					Ok(output) => ProxyReply::success(&output),
					Err(e) => {
						if e.kind() == ErrorKind::Internal {
							obs::trace_fault(&e);
						}

						ProxyReply::failure(&e)
					},
				}
			})
			.await;

		span.enter(reply.state);
		obs::record_request_outcome(reply.state.outcome());

		reply
	}

	async fn run(
		&self,
		span: &RequestSpan,
		client: &ClientKey,
		payload: &[u8],
	) -> Result<ProviderOutput> {
		span.enter(RequestState::Received);
		span.enter(RequestState::Validating);

		let request = self.validator.validate(payload)?;

		span.enter(RequestState::Admitting);

		if let RateLimitDecision::Rejected { retry_after } = self.limiter.admit(client).await? {
			return Err(Error::RateLimited { retry_after });
		}

		span.enter(RequestState::Calling);

		Ok(self.provider.call(&request, self.timeout).await?)
	}
}
impl<P> Debug for ProxyService<P>
where
	P: ?Sized + CompletionProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ProxyService")
			.field("validator", &self.validator)
			.field("limiter", &self.limiter)
			.field("provider", &self.provider)
			.field("timeout", &self.timeout)
			.finish()
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	if let Some(message) = panic.downcast_ref::<&str>() {
		message
	} else if let Some(message) = panic.downcast_ref::<String>() {
		message
	} else {
		"non-string panic payload"
	}
}
