// std
use std::time::Duration as StdDuration;
// self
use crate::{
	_prelude::*, identity::ClientKey, provider::ProviderFailure, proxy::RequestState,
	store::StoreError,
};

/// Type alias that resolves to an instrumented future when tracing is enabled.
#[cfg(feature = "tracing")]
pub type InstrumentedRequest<F> = tracing::instrument::Instrumented<F>;
/// Passthrough future type when tracing is disabled.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedRequest<F> = F;

/// Span wrapping one proxied request.
///
/// The `stage` field follows the request through its [`RequestState`]s, so events emitted
/// inside the span always carry the stage they happened in.
#[derive(Debug)]
pub struct RequestSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
	stage: Mutex<RequestState>,
}
impl RequestSpan {
	/// Creates a span tagged with the caller's key, starting in [`RequestState::Received`].
	pub fn new(client: &ClientKey) -> Self {
		let stage = RequestState::Received;

		#[cfg(feature = "tracing")]
		{
			let span = tracing::info_span!(
				"ai_proxy.request",
				client = client.as_str(),
				stage = stage.as_str()
			);

			Self { span, stage: Mutex::new(stage) }
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = client;

			Self { stage: Mutex::new(stage) }
		}
	}

	/// Moves the span to `state`, recording it on the `stage` field and emitting a transition
	/// event.
	pub fn enter(&self, state: RequestState) {
		*self.stage.lock() = state;

		#[cfg(feature = "tracing")]
		self.span.record("stage", state.as_str());

		trace_transition(state);
	}

	/// Stage the request last entered.
	pub fn stage(&self) -> RequestState {
		*self.stage.lock()
	}

	/// Instruments an async block without holding a guard across `.await` points.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedRequest<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			use tracing::Instrument;

			fut.instrument(self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}
}

/// Emits a debug event when a request enters `state`.
pub fn trace_transition(state: RequestState) {
	#[cfg(feature = "tracing")]
	{
		tracing::debug!(state = state.as_str(), terminal = state.is_terminal(), "Request state.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = state;
	}
}

/// Emits a warning before retry number `attempt` sleeps for `delay`.
pub fn trace_retry(attempt: u32, failure: &ProviderFailure, delay: StdDuration) {
	#[cfg(feature = "tracing")]
	{
		tracing::warn!(
			attempt,
			kind = failure.kind.as_str(),
			status = failure.status,
			delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
			"Transient upstream failure; retrying."
		);
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = (attempt, failure, delay);
	}
}

/// Emits an error event for faults that surface as internal errors.
pub fn trace_fault(error: &Error) {
	#[cfg(feature = "tracing")]
	{
		tracing::error!(kind = error.kind().as_str(), error = %error, "Request failed internally.");
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = error;
	}
}

/// Reports the result of an idle-window sweep.
pub fn trace_sweep(result: &Result<usize, StoreError>) {
	#[cfg(feature = "tracing")]
	{
		match result {
			Ok(removed) => tracing::debug!(removed, "Swept idle rate-limit windows."),
			Err(e) => tracing::warn!(error = %e, "Rate-limit sweep failed."),
		}
	}
	#[cfg(not(feature = "tracing"))]
	{
		let _ = result;
	}
}
