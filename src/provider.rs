//! Upstream AI capability (trait) and the deadline-bounded client that calls it.
//!
//! [`CompletionProvider`] is the proxy's only dependency on a vendor. Implementations turn
//! an [`AiRequest`] into a [`Completion`] or a classified [`ProviderFailure`]; the
//! classification decides whether [`ProviderClient`] retries. `scripted` ships an in-process
//! provider for demos and tests, `http` (feature `reqwest`) one that speaks the common
//! chat-completions JSON shape.

pub mod client;
#[cfg(feature = "reqwest")] pub mod http;
pub mod retry;
pub mod scripted;
pub mod secret;

pub use client::*;
#[cfg(feature = "reqwest")] pub use http::*;
pub use retry::*;
pub use scripted::*;
pub use secret::*;

// std
use std::time::Duration as StdDuration;
// self
use crate::{_prelude::*, error::ConfigError, request::AiRequest};

/// Boxed future returned by [`CompletionProvider::complete`].
pub type ProviderFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Completion, ProviderFailure>> + 'a + Send>>;

/// Outcome of [`ProviderClient::call`]: the success payload or the final classified failure.
pub type ProviderResult = Result<ProviderOutput, ProviderFailure>;

/// Upstream capability performing a single completion attempt.
///
/// Implementations must not retry internally and must never place credentials in
/// [`Completion`] or [`ProviderFailure`] values.
pub trait CompletionProvider
where
	Self: Send + Sync,
{
	/// Performs one upstream attempt.
	fn complete<'a>(&'a self, request: &'a AiRequest) -> ProviderFuture<'a>;
}

/// Raw result of one successful attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
	/// Generated text.
	pub text: String,
	/// Model that produced the text.
	pub model: String,
}

/// Success payload returned by [`ProviderClient::call`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProviderOutput {
	/// Generated text.
	pub text: String,
	/// Wall time of the whole call, retries included.
	pub latency_ms: u64,
	/// Model that produced the text.
	pub model: String,
}

/// Canonical upstream failure categories.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProviderFailureKind {
	/// The attempt or the overall deadline ran out.
	Timeout,
	/// Connection-level failure (DNS, TCP, TLS, reset).
	Network,
	/// Upstream answered with a 5xx-equivalent.
	Unavailable,
	/// Upstream throttled the proxy itself.
	Throttled,
	/// Upstream rejected the request as invalid (4xx-equivalent).
	Rejected,
	/// Upstream answered successfully but the payload was unusable.
	InvalidResponse,
}
impl ProviderFailureKind {
	/// Whether a retry is likely to succeed.
	pub const fn is_transient(self) -> bool {
		matches!(self, Self::Timeout | Self::Network | Self::Unavailable | Self::Throttled)
	}

	/// Classifies an HTTP status returned by the upstream.
	pub fn from_status(status: u16) -> Self {
		match status {
			408 | 504 => Self::Timeout,
			429 => Self::Throttled,
			500..=599 => Self::Unavailable,
			400..=499 => Self::Rejected,
			_ => Self::InvalidResponse,
		}
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Timeout => "timeout",
			Self::Network => "network",
			Self::Unavailable => "unavailable",
			Self::Throttled => "throttled",
			Self::Rejected => "rejected",
			Self::InvalidResponse => "invalid_response",
		}
	}
}
impl Display for ProviderFailureKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Classified upstream failure.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("{kind} failure after {attempts} attempt(s): {message}")]
pub struct ProviderFailure {
	/// Failure category.
	pub kind: ProviderFailureKind,
	/// Diagnostic message for logs; never forwarded to clients.
	pub message: String,
	/// Whether the failure is transient.
	pub retryable: bool,
	/// Upstream HTTP status, when one was received.
	pub status: Option<u16>,
	/// Upstream Retry-After hint, when supplied.
	pub retry_after: Option<Duration>,
	/// Attempts made when this failure became final.
	pub attempts: u32,
}
impl ProviderFailure {
	/// Creates a failure whose retryability follows `kind`.
	pub fn new(kind: ProviderFailureKind, message: impl Into<String>) -> Self {
		Self {
			kind,
			message: message.into(),
			retryable: kind.is_transient(),
			status: None,
			retry_after: None,
			attempts: 1,
		}
	}

	/// Classifies an upstream HTTP status.
	pub fn from_status(status: u16) -> Self {
		Self::new(
			ProviderFailureKind::from_status(status),
			format!("Upstream answered HTTP {status}"),
		)
		.with_status(status)
	}

	/// Records the upstream HTTP status.
	pub fn with_status(mut self, status: u16) -> Self {
		self.status = Some(status);

		self
	}

	/// Records an upstream Retry-After hint.
	pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
		self.retry_after = Some(retry_after);

		self
	}

	/// Records how many attempts were made.
	pub fn with_attempts(mut self, attempts: u32) -> Self {
		self.attempts = attempts;

		self
	}
}

/// Upstream call settings as they appear in configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
	/// Overall deadline shared by every attempt, in milliseconds.
	pub timeout_ms: u64,
	/// Optional bound on a single attempt, in milliseconds.
	pub attempt_timeout_ms: Option<u64>,
	/// Backoff and retry bound for transient failures.
	pub retry: RetryPolicy,
}
impl ProviderConfig {
	/// Overall deadline.
	pub fn timeout(&self) -> StdDuration {
		StdDuration::from_millis(self.timeout_ms)
	}

	/// Per-attempt bound, if configured.
	pub fn attempt_timeout(&self) -> Option<StdDuration> {
		self.attempt_timeout_ms.map(StdDuration::from_millis)
	}

	/// Checks that the settings describe a usable client.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.timeout_ms == 0 {
			return Err(ConfigError::ZeroValue { field: "provider.timeout_ms" });
		}
		if self.attempt_timeout_ms == Some(0) {
			return Err(ConfigError::ZeroValue { field: "provider.attempt_timeout_ms" });
		}

		self.retry.validate()
	}
}
impl Default for ProviderConfig {
	fn default() -> Self {
		Self { timeout_ms: 30_000, attempt_timeout_ms: None, retry: RetryPolicy::default() }
	}
}
