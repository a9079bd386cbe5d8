//! Structural and semantic checks applied to inbound payloads.

// crates.io
use serde_json::{Map, Value};
// self
use crate::{
	_prelude::*,
	request::{AiRequest, ValidationLimits},
};

/// First constraint an inbound payload violated.
#[derive(Clone, Debug, PartialEq, ThisError)]
pub enum ValidationError {
	/// The body is not a JSON object.
	#[error("Request body is not a valid JSON object at `{path}`: {message}.")]
	Malformed {
		/// Location of the parse failure.
		path: String,
		/// Parser message.
		message: String,
	},
	/// `prompt` is absent or null.
	#[error("The `prompt` field is required.")]
	MissingPrompt,
	/// `prompt` is not a string.
	#[error("The `prompt` field must be a string.")]
	PromptNotText,
	/// `prompt` is blank (before or after sanitization).
	#[error("The `prompt` field must not be empty.")]
	EmptyPrompt,
	/// `prompt` exceeds the character bound.
	#[error("The `prompt` field exceeds {max} characters (got {actual}).")]
	PromptTooLong {
		/// Maximum permitted characters.
		max: usize,
		/// Observed characters.
		actual: usize,
	},
	/// `maxTokens` is not an integer.
	#[error("The `maxTokens` field must be an integer.")]
	MaxTokensNotInteger,
	/// `maxTokens` is outside `[1, max]`.
	#[error("The `maxTokens` field must be between 1 and {max}.")]
	MaxTokensOutOfRange {
		/// Inclusive ceiling.
		max: u32,
	},
	/// `temperature` is not a number.
	#[error("The `temperature` field must be a number.")]
	TemperatureNotNumber,
	/// `temperature` is outside its bounds.
	#[error("The `temperature` field must be between {min} and {max}.")]
	TemperatureOutOfRange {
		/// Inclusive lower bound.
		min: f64,
		/// Inclusive upper bound.
		max: f64,
	},
}

/// Pure validator producing [`AiRequest`] values.
#[derive(Clone, Debug, Default)]
pub struct RequestValidator {
	limits: ValidationLimits,
}
impl RequestValidator {
	/// Creates a validator enforcing `limits`.
	pub fn new(limits: ValidationLimits) -> Self {
		Self { limits }
	}

	/// Returns the enforced limits.
	pub fn limits(&self) -> &ValidationLimits {
		&self.limits
	}

	/// Parses and validates a raw JSON body.
	pub fn validate(&self, payload: &[u8]) -> Result<AiRequest, ValidationError> {
		let mut de = serde_json::Deserializer::from_slice(payload);
		let object: Map<String, Value> =
			serde_path_to_error::deserialize(&mut de).map_err(|err| ValidationError::Malformed {
				path: err.path().to_string(),
				message: err.inner().to_string(),
			})?;

		de.end().map_err(|err| ValidationError::Malformed {
			path: ".".into(),
			message: err.to_string(),
		})?;

		self.validate_object(&object)
	}

	/// Validates an already-parsed JSON value.
	pub fn validate_value(&self, value: &Value) -> Result<AiRequest, ValidationError> {
		match value {
			Value::Object(object) => self.validate_object(object),
			other => Err(ValidationError::Malformed {
				path: ".".into(),
				message: format!("expected an object, found {}", json_type(other)),
			}),
		}
	}

	fn validate_object(&self, object: &Map<String, Value>) -> Result<AiRequest, ValidationError> {
		let raw_prompt = self.check_prompt(object.get("prompt"))?;
		let max_tokens = self.check_max_tokens(object.get("maxTokens"))?;
		let temperature = self.check_temperature(object.get("temperature"))?;
		let prompt = sanitize(raw_prompt);

		self.check_prompt_text(&prompt)?;

		Ok(AiRequest { prompt: prompt.trim().to_owned(), max_tokens, temperature })
	}

	fn check_prompt<'a>(&self, value: Option<&'a Value>) -> Result<&'a str, ValidationError> {
		let text = match value {
			None | Some(Value::Null) => return Err(ValidationError::MissingPrompt),
			Some(Value::String(text)) => text.as_str(),
			Some(_) => return Err(ValidationError::PromptNotText),
		};

		self.check_prompt_text(text)?;

		Ok(text)
	}

	fn check_prompt_text(&self, text: &str) -> Result<(), ValidationError> {
		if text.trim().is_empty() {
			return Err(ValidationError::EmptyPrompt);
		}

		let actual = text.chars().count();

		if actual > self.limits.max_prompt_chars {
			return Err(ValidationError::PromptTooLong { max: self.limits.max_prompt_chars, actual });
		}

		Ok(())
	}

	fn check_max_tokens(&self, value: Option<&Value>) -> Result<u32, ValidationError> {
		let ceiling = self.limits.max_tokens_ceiling;
		let number = match value {
			None | Some(Value::Null) => return Ok(self.limits.default_max_tokens),
			Some(Value::Number(number)) => number,
			Some(_) => return Err(ValidationError::MaxTokensNotInteger),
		};

		if let Some(unsigned) = number.as_u64() {
			return u32::try_from(unsigned)
				.ok()
				.filter(|tokens| (1..=ceiling).contains(tokens))
				.ok_or(ValidationError::MaxTokensOutOfRange { max: ceiling });
		}
		if number.as_i64().is_some() {
			return Err(ValidationError::MaxTokensOutOfRange { max: ceiling });
		}

		Err(ValidationError::MaxTokensNotInteger)
	}

	fn check_temperature(&self, value: Option<&Value>) -> Result<f64, ValidationError> {
		let (min, max) = (self.limits.min_temperature, self.limits.max_temperature);
		let temperature = match value {
			None | Some(Value::Null) => return Ok(self.limits.default_temperature),
			Some(Value::Number(number)) =>
				number.as_f64().ok_or(ValidationError::TemperatureNotNumber)?,
			Some(_) => return Err(ValidationError::TemperatureNotNumber),
		};

		if (min..=max).contains(&temperature) {
			Ok(temperature)
		} else {
			Err(ValidationError::TemperatureOutOfRange { min, max })
		}
	}
}

/// Strips control characters, keeping line breaks and tabs.
pub fn sanitize(text: &str) -> String {
	text.chars().filter(|c| !c.is_control() || matches!(c, '\n' | '\t')).collect()
}

fn json_type(value: &Value) -> &'static str {
	match value {
		Value::Null => "null",
		Value::Bool(_) => "a boolean",
		Value::Number(_) => "a number",
		Value::String(_) => "a string",
		Value::Array(_) => "an array",
		Value::Object(_) => "an object",
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	fn validator() -> RequestValidator {
		RequestValidator::new(ValidationLimits {
			max_prompt_chars: 16,
			max_tokens_ceiling: 1_000,
			..Default::default()
		})
	}

	fn validate(value: Value) -> Result<AiRequest, ValidationError> {
		let bytes = serde_json::to_vec(&value).expect("Fixture should serialize.");

		validator().validate(&bytes)
	}

	#[test]
	fn applies_defaults_for_absent_fields() {
		let request = validate(json!({ "prompt": "  hi there " }))
			.expect("Minimal payload should validate.");

		assert_eq!(request.prompt, "hi there");
		assert_eq!(request.max_tokens, 512);
		assert_eq!(request.temperature, 0.7);

		let request = validate(json!({ "prompt": "hi", "maxTokens": null, "temperature": null }))
			.expect("Null optionals should be treated as absent.");

		assert_eq!(request.max_tokens, 512);
	}

	#[test]
	fn accepts_in_bound_fields() {
		let request = validate(json!({ "prompt": "hi", "maxTokens": 1_000, "temperature": 2.0 }))
			.expect("Boundary values should validate.");

		assert_eq!(request.max_tokens, 1_000);
		assert_eq!(request.temperature, 2.0);

		let request = validate(json!({ "prompt": "hi", "maxTokens": 1, "temperature": 0 }))
			.expect("Lower boundary values should validate.");

		assert_eq!(request.max_tokens, 1);
		assert_eq!(request.temperature, 0.0);
	}

	#[test]
	fn rejects_structurally_broken_bodies() {
		assert!(matches!(
			validator().validate(b"{\"prompt\": "),
			Err(ValidationError::Malformed { .. })
		));
		assert!(matches!(
			validator().validate(b"[\"hi\"]"),
			Err(ValidationError::Malformed { .. })
		));
		assert!(matches!(
			validator().validate(b"{\"prompt\":\"hi\"} trailing"),
			Err(ValidationError::Malformed { .. })
		));
		assert!(matches!(
			validator().validate_value(&json!("hi")),
			Err(ValidationError::Malformed { .. })
		));
	}

	#[test]
	fn reports_prompt_violations() {
		assert_eq!(validate(json!({})), Err(ValidationError::MissingPrompt));
		assert_eq!(validate(json!({ "prompt": 7 })), Err(ValidationError::PromptNotText));
		assert_eq!(validate(json!({ "prompt": " \n\t " })), Err(ValidationError::EmptyPrompt));
		assert_eq!(
			validate(json!({ "prompt": "x".repeat(17) })),
			Err(ValidationError::PromptTooLong { max: 16, actual: 17 })
		);
	}

	#[test]
	fn reports_the_first_violation_in_order() {
		assert_eq!(
			validate(json!({ "prompt": "", "maxTokens": "many", "temperature": 9 })),
			Err(ValidationError::EmptyPrompt)
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "maxTokens": 0, "temperature": 9 })),
			Err(ValidationError::MaxTokensOutOfRange { max: 1_000 })
		);
	}

	#[test]
	fn reports_token_and_temperature_violations() {
		assert_eq!(
			validate(json!({ "prompt": "hi", "maxTokens": 12.5 })),
			Err(ValidationError::MaxTokensNotInteger)
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "maxTokens": "12" })),
			Err(ValidationError::MaxTokensNotInteger)
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "maxTokens": -3 })),
			Err(ValidationError::MaxTokensOutOfRange { max: 1_000 })
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "maxTokens": 5_000_000_000_u64 })),
			Err(ValidationError::MaxTokensOutOfRange { max: 1_000 })
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "temperature": "warm" })),
			Err(ValidationError::TemperatureNotNumber)
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "temperature": 2.01 })),
			Err(ValidationError::TemperatureOutOfRange { min: 0.0, max: 2.0 })
		);
		assert_eq!(
			validate(json!({ "prompt": "hi", "temperature": -0.1 })),
			Err(ValidationError::TemperatureOutOfRange { min: 0.0, max: 2.0 })
		);
	}

	#[test]
	fn sanitization_strips_controls_and_rechecks() {
		let request = validate(json!({ "prompt": "a\u{0007}b\r\nc\td\u{001b}" }))
			.expect("Prompt with control characters should validate.");

		assert_eq!(request.prompt, "ab\nc\td");
		assert_eq!(
			validate(json!({ "prompt": "\u{0000}\u{0001}\u{0002}" })),
			Err(ValidationError::EmptyPrompt)
		);
	}

	#[test]
	fn length_is_counted_in_characters() {
		let request = validate(json!({ "prompt": "é".repeat(16) }))
			.expect("Sixteen two-byte characters should fit a sixteen character bound.");

		assert_eq!(request.prompt.chars().count(), 16);
	}
}
