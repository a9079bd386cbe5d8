//! Proxy-level error types shared across validation, rate limiting, providers, and stores.

// self
use crate::{
	_prelude::*,
	provider::{ProviderFailure, ProviderFailureKind},
	request::ValidationError,
	store::StoreError,
};

/// Proxy-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical proxy error exposed by public APIs.
///
/// Every failure source funnels into this enum so the envelope builder only ever needs
/// [`Error::kind`] and [`Error::public_message`].
#[derive(Debug, ThisError)]
pub enum Error {
	/// Inbound payload failed validation.
	#[error(transparent)]
	Validation(#[from] ValidationError),
	/// The client exhausted its quota for the current window.
	#[error("Rate limit exceeded; retry after {} ms.", retry_after.whole_milliseconds())]
	RateLimited {
		/// Time remaining until the client's window resets.
		retry_after: Duration,
	},
	/// Transient upstream failures persisted past the retry bound or the deadline.
	#[error("Upstream provider did not succeed after {attempts} attempt(s): {last}.")]
	UpstreamTimeout {
		/// Attempts made before giving up.
		attempts: u32,
		/// Classification of the last observed failure.
		last: ProviderFailureKind,
	},
	/// Upstream rejected the request or answered with something unusable.
	#[error("Upstream provider failed: {0}.")]
	Upstream(ProviderFailure),
	/// Rate-limit store failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		StoreError,
	),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Anything else that went wrong inside the proxy.
	#[error("Internal fault: {message}.")]
	Internal {
		/// Diagnostic message; never sent to clients.
		message: String,
	},
}
impl Error {
	/// Wraps an unexpected fault.
	pub fn internal(message: impl Into<String>) -> Self {
		Self::Internal { message: message.into() }
	}

	/// Returns the fixed failure classification for this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::Validation(_) => ErrorKind::Validation,
			Self::RateLimited { .. } => ErrorKind::RateLimitExceeded,
			Self::UpstreamTimeout { .. } => ErrorKind::UpstreamTimeout,
			Self::Upstream(_) => ErrorKind::UpstreamError,
			Self::Storage(_) | Self::Config(_) | Self::Internal { .. } => ErrorKind::Internal,
		}
	}

	/// Retry hint carried by rate-limit rejections.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after } => Some(*retry_after),
			_ => None,
		}
	}

	/// Message safe to show to an untrusted caller.
	///
	/// Upstream bodies, provider identifiers, and store internals never appear here; they
	/// stay in [`Display`] output which is meant for logs.
	pub fn public_message(&self) -> String {
		match self {
			Self::Validation(err) => err.to_string(),
			Self::RateLimited { retry_after } => format!(
				"Too many requests. Retry after {} second(s).",
				ceil_seconds(*retry_after)
			),
			Self::UpstreamTimeout { .. } =>
				"The AI provider did not respond in time. Please try again.".into(),
			Self::Upstream(_) => "The AI provider could not complete the request.".into(),
			Self::Storage(_) | Self::Config(_) | Self::Internal { .. } =>
				"The request could not be processed due to an internal error.".into(),
		}
	}
}
impl From<ProviderFailure> for Error {
	fn from(failure: ProviderFailure) -> Self {
		if failure.retryable {
			Self::UpstreamTimeout { attempts: failure.attempts, last: failure.kind }
		} else {
			Self::Upstream(failure)
		}
	}
}

/// Exhaustive failure classification with a fixed wire code per kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
	/// Payload failed validation.
	Validation,
	/// Quota exhausted for the current window.
	RateLimitExceeded,
	/// Upstream kept failing transiently or ran out of time.
	UpstreamTimeout,
	/// Upstream failed in a non-transient way.
	UpstreamError,
	/// Unexpected fault inside the proxy.
	Internal,
}
impl ErrorKind {
	/// All kinds, in code order.
	pub const ALL: [ErrorKind; 5] = [
		ErrorKind::Validation,
		ErrorKind::RateLimitExceeded,
		ErrorKind::Internal,
		ErrorKind::UpstreamError,
		ErrorKind::UpstreamTimeout,
	];

	/// Numeric code placed in failure envelopes.
	pub const fn code(self) -> u16 {
		match self {
			ErrorKind::Validation => 400,
			ErrorKind::RateLimitExceeded => 429,
			ErrorKind::UpstreamTimeout => 504,
			ErrorKind::UpstreamError => 502,
			ErrorKind::Internal => 500,
		}
	}

	/// Reverses [`ErrorKind::code`].
	pub fn from_code(code: u16) -> Option<Self> {
		Self::ALL.into_iter().find(|kind| kind.code() == code)
	}

	/// Whether a caller may reasonably retry the same request later.
	pub const fn is_recoverable(self) -> bool {
		matches!(
			self,
			ErrorKind::RateLimitExceeded | ErrorKind::UpstreamTimeout | ErrorKind::UpstreamError
		)
	}

	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			ErrorKind::Validation => "validation",
			ErrorKind::RateLimitExceeded => "rate_limit_exceeded",
			ErrorKind::UpstreamTimeout => "upstream_timeout",
			ErrorKind::UpstreamError => "upstream_error",
			ErrorKind::Internal => "internal",
		}
	}
}
impl Display for ErrorKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Configuration and validation failures raised while assembling the proxy.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Environment variable is present but unparsable.
	#[error("Environment variable `{key}` has an invalid value `{value}`.")]
	InvalidEnv {
		/// Variable name.
		key: &'static str,
		/// Raw value that failed to parse.
		value: String,
	},
	/// A limit that must be positive was zero.
	#[error("The `{field}` setting must be greater than zero.")]
	ZeroValue {
		/// Offending setting.
		field: &'static str,
	},
	/// Lower bound exceeds the upper bound.
	#[error("The `{field}` bounds are inverted or not finite.")]
	InvalidBounds {
		/// Offending setting.
		field: &'static str,
	},
	/// A duration setting is longer than the proxy supports.
	#[error("The `{field}` setting exceeds its maximum of {max} second(s).")]
	TooLarge {
		/// Offending setting.
		field: &'static str,
		/// Largest accepted value in seconds.
		max: u64,
	},
	/// Default value falls outside its own bounds.
	#[error("The default for `{field}` lies outside its configured bounds.")]
	DefaultOutOfBounds {
		/// Offending setting.
		field: &'static str,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

fn ceil_seconds(duration: Duration) -> i64 {
	let millis = u128::try_from(duration.whole_milliseconds()).unwrap_or(0);

	i64::try_from(millis.div_ceil(1_000)).unwrap_or(i64::MAX)
}
