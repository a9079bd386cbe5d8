//! Inbound request model and its validator.
//!
//! `validator` turns raw wire bytes into an [`AiRequest`] or the first violated
//! constraint as a [`ValidationError`]. Nothing in this module touches quota or the network.

pub mod validator;

pub use validator::*;

// self
use crate::{_prelude::*, error::ConfigError};

/// A validated, sanitized request ready for admission and the upstream call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiRequest {
	/// Sanitized, trimmed prompt text.
	pub prompt: String,
	/// Completion token budget.
	pub max_tokens: u32,
	/// Sampling temperature.
	pub temperature: f64,
}

/// Bounds applied by [`RequestValidator`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationLimits {
	/// Maximum prompt length in characters, checked before and after sanitization.
	pub max_prompt_chars: usize,
	/// Inclusive upper bound for `maxTokens`; the lower bound is always 1.
	pub max_tokens_ceiling: u32,
	/// `maxTokens` applied when the field is absent.
	pub default_max_tokens: u32,
	/// Inclusive lower bound for `temperature`.
	pub min_temperature: f64,
	/// Inclusive upper bound for `temperature`.
	pub max_temperature: f64,
	/// `temperature` applied when the field is absent.
	pub default_temperature: f64,
}
impl ValidationLimits {
	/// Default maximum prompt length.
	pub const DEFAULT_MAX_PROMPT_CHARS: usize = 4_000;
	/// Default `maxTokens` ceiling.
	pub const DEFAULT_MAX_TOKENS_CEILING: u32 = 4_096;

	/// Checks that the limits are internally consistent.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.max_prompt_chars == 0 {
			return Err(ConfigError::ZeroValue { field: "max_prompt_chars" });
		}
		if self.max_tokens_ceiling == 0 {
			return Err(ConfigError::ZeroValue { field: "max_tokens_ceiling" });
		}
		if !(1..=self.max_tokens_ceiling).contains(&self.default_max_tokens) {
			return Err(ConfigError::DefaultOutOfBounds { field: "max_tokens" });
		}
		if !self.min_temperature.is_finite()
			|| !self.max_temperature.is_finite()
			|| self.min_temperature > self.max_temperature
		{
			return Err(ConfigError::InvalidBounds { field: "temperature" });
		}
		if !(self.min_temperature..=self.max_temperature).contains(&self.default_temperature) {
			return Err(ConfigError::DefaultOutOfBounds { field: "temperature" });
		}

		Ok(())
	}
}
impl Default for ValidationLimits {
	fn default() -> Self {
		Self {
			max_prompt_chars: Self::DEFAULT_MAX_PROMPT_CHARS,
			max_tokens_ceiling: Self::DEFAULT_MAX_TOKENS_CEILING,
			default_max_tokens: 512,
			min_temperature: 0.0,
			max_temperature: 2.0,
			default_temperature: 0.7,
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn default_limits_are_consistent() {
		ValidationLimits::default().validate().expect("Default limits should validate.");
	}

	#[test]
	fn inconsistent_limits_are_rejected() {
		let limits = ValidationLimits { default_max_tokens: 0, ..Default::default() };

		assert!(matches!(
			limits.validate(),
			Err(ConfigError::DefaultOutOfBounds { field: "max_tokens" })
		));

		let limits =
			ValidationLimits { min_temperature: 1.5, max_temperature: 1.0, ..Default::default() };

		assert!(matches!(limits.validate(), Err(ConfigError::InvalidBounds { .. })));
	}

	#[test]
	fn requests_serialize_with_wire_names() {
		let request =
			AiRequest { prompt: "hello".into(), max_tokens: 64, temperature: 0.5 };
		let json = serde_json::to_value(&request).expect("Request should serialize.");

		assert_eq!(json["maxTokens"], 64);
		assert_eq!(json["temperature"], 0.5);
	}
}
