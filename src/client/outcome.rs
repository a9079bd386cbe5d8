// self
use crate::{
	_prelude::*,
	envelope::{EnvelopeMeta, ResponseEnvelope},
	error::ErrorKind,
};

/// What an invocation of [`ClientRequestWrapper`](crate::client::ClientRequestWrapper)
/// resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Delivery {
	/// The call ran and its result is delivered.
	Completed(Outcome),
	/// A newer invocation replaced this one; nothing is delivered.
	Superseded,
	/// `cancel()` ran before this invocation resolved; nothing is delivered.
	Cancelled,
}
impl Delivery {
	/// Returns the outcome, if this invocation delivered one.
	pub fn into_outcome(self) -> Option<Outcome> {
		match self {
			Self::Completed(outcome) => Some(outcome),
			Self::Superseded | Self::Cancelled => None,
		}
	}
}

/// UI-facing interpretation of a [`ResponseEnvelope`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
	/// Text to render.
	Success {
		/// Generated text.
		text: String,
		/// Timing and model metadata.
		meta: EnvelopeMeta,
	},
	/// Worth offering a retry (rate limits, upstream trouble).
	Recoverable {
		/// Message to show.
		message: String,
		/// Envelope code.
		code: u16,
		/// How long to wait before retrying, when the proxy said so.
		retry_after: Option<Duration>,
	},
	/// Retrying the same input will not help.
	NonRecoverable {
		/// Message to show.
		message: String,
		/// Envelope code.
		code: u16,
	},
}
impl Outcome {
	/// Interprets an envelope plus the out-of-band retry hint.
	///
	/// Codes outside the proxy's fixed set are treated as non-recoverable.
	pub fn interpret(envelope: ResponseEnvelope, retry_after: Option<Duration>) -> Self {
		match envelope {
			ResponseEnvelope::Success { text, meta } => Self::Success { text, meta },
			ResponseEnvelope::Failure { error, code } =>
				if ErrorKind::from_code(code).is_some_and(ErrorKind::is_recoverable) {
					Self::Recoverable { message: error, code, retry_after }
				} else {
					Self::NonRecoverable { message: error, code }
				},
		}
	}

	/// Whether the call produced text.
	pub fn is_success(&self) -> bool {
		matches!(self, Self::Success { .. })
	}

	/// Whether a retry affordance should be offered.
	pub fn is_recoverable(&self) -> bool {
		matches!(self, Self::Recoverable { .. })
	}
}
