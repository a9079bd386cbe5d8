//! Consumer-side wrapper that debounces, cancels, and interprets proxy calls.
//!
//! [`ClientRequestWrapper`] is a small state machine (`Idle`, `Pending`, `InFlight`) driven by a
//! generation counter published through a [`tokio::sync::watch`] channel. Every
//! [`invoke`](ClientRequestWrapper::invoke) bumps the generation synchronously, which
//! invalidates whatever earlier invocation is still waiting or running;
//! [`cancel`](ClientRequestWrapper::cancel) moves straight back to `Idle` and invalidates the
//! current one. Only the invocation that is still current when its call resolves delivers a
//! result, so at most one result per burst ever reaches the caller.

mod outcome;

pub use outcome::*;

// std
use std::time::Duration as StdDuration;
// crates.io
use tokio::sync::watch::{Receiver, Sender};
// self
use crate::{
	_prelude::*,
	identity::ClientKey,
	provider::CompletionProvider,
	proxy::{ProxyReply, ProxyService},
};

/// Boxed future returned by [`ProxyTransport::send`].
pub type TransportFuture = Pin<Box<dyn Future<Output = ProxyReply> + Send>>;

/// Boxed future returned by [`ClientRequestWrapper::invoke`].
pub type DeliveryFuture = Pin<Box<dyn Future<Output = Delivery> + Send>>;

/// Way of reaching a proxy from the caller's side.
///
/// Transports never fail: a transport that cannot reach the proxy must produce a failure
/// envelope itself so the wrapper only ever interprets [`ProxyReply`] values.
pub trait ProxyTransport
where
	Self: Send + Sync,
{
	/// Sends one request and resolves to the proxy's reply.
	fn send(&self, request: PromptRequest) -> TransportFuture;
}

/// Caller-side request; unset fields fall back to the proxy's defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRequest {
	/// Prompt text.
	pub prompt: String,
	/// Optional completion token budget.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub max_tokens: Option<u32>,
	/// Optional sampling temperature.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub temperature: Option<f64>,
}
impl PromptRequest {
	/// Creates a request with proxy defaults for every optional field.
	pub fn new(prompt: impl Into<String>) -> Self {
		Self { prompt: prompt.into(), max_tokens: None, temperature: None }
	}

	/// Sets `maxTokens`.
	pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = Some(max_tokens);

		self
	}

	/// Sets `temperature`.
	pub fn with_temperature(mut self, temperature: f64) -> Self {
		self.temperature = Some(temperature);

		self
	}
}

/// In-process transport calling a [`ProxyService`] as a fixed client.
pub struct LocalTransport<P>
where
	P: ?Sized + CompletionProvider,
{
	service: Arc<ProxyService<P>>,
	client: ClientKey,
}
impl<P> LocalTransport<P>
where
	P: ?Sized + CompletionProvider,
{
	/// Sends every request to `service` on behalf of `client`.
	pub fn new(service: Arc<ProxyService<P>>, client: ClientKey) -> Self {
		Self { service, client }
	}
}
impl<P> ProxyTransport for LocalTransport<P>
where
	P: 'static + ?Sized + CompletionProvider,
{
	fn send(&self, request: PromptRequest) -> TransportFuture {
		let service = self.service.clone();
		let client = self.client.clone();

		Box::pin(async move {
			match serde_json::to_vec(&request) {
				Ok(body) => service.handle(&client, &body).await,
				Err(e) => ProxyReply::failure(&Error::internal(e.to_string())),
			}
		})
	}
}
impl<P> Debug for LocalTransport<P>
where
	P: ?Sized + CompletionProvider,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LocalTransport").field("client", &self.client).finish()
	}
}

/// Observable state of a [`ClientRequestWrapper`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WrapperState {
	/// Nothing scheduled.
	Idle,
	/// Waiting for the debounce delay to elapse.
	Pending,
	/// The outbound call is running.
	InFlight,
}

#[derive(Clone, Copy, Debug)]
struct Signal {
	generation: u64,
	cancelled_through: u64,
	state: WrapperState,
}
impl Signal {
	fn verdict(&self, generation: u64) -> Option<Delivery> {
		if self.cancelled_through >= generation {
			Some(Delivery::Cancelled)
		} else if self.generation != generation {
			Some(Delivery::Superseded)
		} else {
			None
		}
	}
}

/// Debouncing, cancelable caller of a [`ProxyTransport`].
pub struct ClientRequestWrapper<T>
where
	T: ?Sized + ProxyTransport,
{
	transport: Arc<T>,
	debounce: StdDuration,
	signal: Arc<Sender<Signal>>,
}
impl<T> ClientRequestWrapper<T>
where
	T: 'static + ?Sized + ProxyTransport,
{
	/// Debounce delay applied unless overridden.
	pub const DEFAULT_DEBOUNCE: StdDuration = StdDuration::from_millis(200);

	/// Wraps `transport` with the default debounce delay.
	pub fn new(transport: Arc<T>) -> Self {
		let (signal, _) = tokio::sync::watch::channel(Signal {
			generation: 0,
			cancelled_through: 0,
			state: WrapperState::Idle,
		});

		Self { transport, debounce: Self::DEFAULT_DEBOUNCE, signal: Arc::new(signal) }
	}

	/// Overrides the debounce delay.
	pub fn with_debounce(mut self, debounce: StdDuration) -> Self {
		self.debounce = debounce;

		self
	}

	/// Configured debounce delay.
	pub fn debounce(&self) -> StdDuration {
		self.debounce
	}

	/// Current state of the latest invocation.
	pub fn state(&self) -> WrapperState {
		self.signal.borrow().state
	}

	/// Schedules `request` after the debounce delay.
	///
	/// The returned future must be polled (awaited or spawned) to make progress, but the
	/// invalidation of earlier invocations happens immediately, before this method returns.
	pub fn invoke(&self, request: PromptRequest) -> DeliveryFuture {
		let mut generation = 0;

		self.signal.send_modify(|signal| {
			signal.generation += 1;
			signal.state = WrapperState::Pending;
			generation = signal.generation;
		});

		let mut receiver = self.signal.subscribe();
		let signal = self.signal.clone();
		let transport = self.transport.clone();
		let debounce = self.debounce;

		Box::pin(async move {
			tokio::select! {
				biased;
				verdict = invalidated(&mut receiver, generation) => return verdict,
				_ = tokio::time::sleep(debounce) => {},
			}

			if let Some(verdict) = transition(&signal, generation, WrapperState::InFlight) {
				return verdict;
			}

			let reply = tokio::select! {
				biased;
				verdict = invalidated(&mut receiver, generation) => return verdict,
				reply = transport.send(request) => reply,
			};

			match transition(&signal, generation, WrapperState::Idle) {
				Some(verdict) => verdict,
				None => Delivery::Completed(Outcome::interpret(reply.envelope, reply.retry_after)),
			}
		})
	}

	/// Cancels the current invocation, whether it is pending or in flight.
	///
	/// Returns `false` (and changes nothing) when no invocation is outstanding, including when
	/// the last one already resolved.
	pub fn cancel(&self) -> bool {
		self.signal.send_if_modified(|signal| {
			if signal.state == WrapperState::Idle {
				return false;
			}

			signal.cancelled_through = signal.generation;
			signal.state = WrapperState::Idle;

			true
		})
	}
}
impl<T> Debug for ClientRequestWrapper<T>
where
	T: ?Sized + ProxyTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientRequestWrapper")
			.field("debounce", &self.debounce)
			.field("signal", &*self.signal.borrow())
			.finish()
	}
}

// Moves `generation` to `next` if it is still current; otherwise reports why it is not.
// State-only changes do not wake other invocations.
fn transition(signal: &Sender<Signal>, generation: u64, next: WrapperState) -> Option<Delivery> {
	let mut verdict = None;

	signal.send_if_modified(|current| {
		verdict = current.verdict(generation);

		if verdict.is_none() {
			current.state = next;
		}

		false
	});

	verdict
}

async fn invalidated(receiver: &mut Receiver<Signal>, generation: u64) -> Delivery {
	loop {
		let verdict = receiver.borrow_and_update().verdict(generation);

		if let Some(verdict) = verdict {
			return verdict;
		}
		if receiver.changed().await.is_err() {
			return Delivery::Cancelled;
		}
	}
}
