//! The single wire contract returned for every proxied request.
//!
//! A [`ResponseEnvelope`] serializes to exactly one of two JSON objects:
//!
//! ```json
//! { "ok": true,  "text": "...", "meta": { "latencyMs": 812, "model": "..." } }
//! { "ok": false, "error": "...", "code": 429 }
//! ```
//!
//! Decoding rejects anything else, including objects that mix fields from both shapes.

// self
use crate::{_prelude::*, error::ErrorKind, provider::ProviderOutput};

/// Success metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct EnvelopeMeta {
	/// Wall time spent on the upstream call, retries included.
	pub latency_ms: u64,
	/// Model that produced the text.
	pub model: String,
}

/// Normalized proxy response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub enum ResponseEnvelope {
	/// `{ ok: true, text, meta }`.
	Success {
		/// Generated text.
		text: String,
		/// Timing and model metadata.
		meta: EnvelopeMeta,
	},
	/// `{ ok: false, error, code }`.
	Failure {
		/// Human-readable message, free of upstream or credential details.
		error: String,
		/// Numeric classification, see [`ErrorKind::code`].
		code: u16,
	},
}
impl ResponseEnvelope {
	/// Maps a successful upstream call.
	pub fn success(output: &ProviderOutput) -> Self {
		Self::Success {
			text: output.text.clone(),
			meta: EnvelopeMeta { latency_ms: output.latency_ms, model: output.model.clone() },
		}
	}

	/// Maps any proxy failure through its fixed [`ErrorKind`] code.
	pub fn failure(error: &Error) -> Self {
		Self::Failure { error: error.public_message(), code: error.kind().code() }
	}

	/// Value of the `ok` discriminator.
	pub fn is_ok(&self) -> bool {
		matches!(self, Self::Success { .. })
	}

	/// Failure classification, when the code is one the proxy emits.
	pub fn error_kind(&self) -> Option<ErrorKind> {
		match self {
			Self::Success { .. } => None,
			Self::Failure { code, .. } => ErrorKind::from_code(*code),
		}
	}

	/// Encodes the envelope as JSON.
	pub fn to_json(&self) -> Result<String, EnvelopeError> {
		serde_json::to_string(self).map_err(|e| EnvelopeError::Encode { message: e.to_string() })
	}

	/// Decodes an envelope, rejecting any shape other than the two defined ones.
	pub fn from_json(raw: &[u8]) -> Result<Self, EnvelopeError> {
		let de = &mut serde_json::Deserializer::from_slice(raw);

		serde_path_to_error::deserialize(de).map_err(|e| EnvelopeError::Decode {
			path: e.path().to_string(),
			message: e.inner().to_string(),
		})
	}
}

/// Envelope encoding and decoding failures.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum EnvelopeError {
	/// Serialization failed.
	#[error("Envelope could not be encoded: {message}.")]
	Encode {
		/// Serializer message.
		message: String,
	},
	/// Payload is not a valid envelope.
	#[error("Envelope could not be decoded at `{path}`: {message}.")]
	Decode {
		/// JSON path of the offending value.
		path: String,
		/// Deserializer message.
		message: String,
	},
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct WireEnvelope {
	ok: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	text: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	meta: Option<EnvelopeMeta>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	code: Option<u16>,
}
impl From<ResponseEnvelope> for WireEnvelope {
	fn from(envelope: ResponseEnvelope) -> Self {
		match envelope {
			ResponseEnvelope::Success { text, meta } => Self {
				ok: true,
				text: Some(text),
				meta: Some(meta),
				error: None,
				code: None,
			},
			ResponseEnvelope::Failure { error, code } => Self {
				ok: false,
				text: None,
				meta: None,
				error: Some(error),
				code: Some(code),
			},
		}
	}
}
impl TryFrom<WireEnvelope> for ResponseEnvelope {
	type Error = &'static str;

	fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
		match wire {
			WireEnvelope { ok: true, text: Some(text), meta: Some(meta), error: None, code: None } =>
				Ok(Self::Success { text, meta }),
			WireEnvelope { ok: false, text: None, meta: None, error: Some(error), code: Some(code) } =>
				Ok(Self::Failure { error, code }),
			WireEnvelope { ok: true, .. } =>
				Err("success envelopes carry exactly `text` and `meta`"),
			WireEnvelope { ok: false, .. } =>
				Err("failure envelopes carry exactly `error` and `code`"),
		}
	}
}
