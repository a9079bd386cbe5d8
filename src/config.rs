//! Proxy-wide configuration assembled from serde sources or the process environment.

// self
use crate::{
	_prelude::*, error::ConfigError, provider::ProviderConfig, rate_limit::RateLimitConfig,
	request::ValidationLimits,
};

/// Everything a [`ProxyService`](crate::proxy::ProxyService) needs besides its collaborators.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
	/// Request bounds.
	pub validation: ValidationLimits,
	/// Per-client admission settings.
	pub rate_limit: RateLimitConfig,
	/// Upstream deadline and retry settings.
	pub provider: ProviderConfig,
}
impl ProxyConfig {
	/// Loads defaults overridden by `AI_PROXY_*` process environment variables.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::from_env_with(|key| std::env::var(key).ok())
	}

	/// Loads defaults overridden by whatever `lookup` returns for each `AI_PROXY_*` key.
	///
	/// Unset keys keep their defaults, set but unparsable keys fail with
	/// [`ConfigError::InvalidEnv`], and the merged result is validated before it is returned.
	pub fn from_env_with<F>(lookup: F) -> Result<Self, ConfigError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let mut config = Self::default();
		let validation = &mut config.validation;
		let rate_limit = &mut config.rate_limit;
		let provider = &mut config.provider;

		env_override(&lookup, "AI_PROXY_MAX_PROMPT_CHARS", &mut validation.max_prompt_chars)?;
		env_override(&lookup, "AI_PROXY_MAX_TOKENS_CEILING", &mut validation.max_tokens_ceiling)?;
		env_override(&lookup, "AI_PROXY_DEFAULT_MAX_TOKENS", &mut validation.default_max_tokens)?;
		env_override(&lookup, "AI_PROXY_MIN_TEMPERATURE", &mut validation.min_temperature)?;
		env_override(&lookup, "AI_PROXY_MAX_TEMPERATURE", &mut validation.max_temperature)?;
		env_override(&lookup, "AI_PROXY_DEFAULT_TEMPERATURE", &mut validation.default_temperature)?;
		env_override(&lookup, "AI_PROXY_RATE_LIMIT_CEILING", &mut rate_limit.ceiling)?;
		env_override(&lookup, "AI_PROXY_RATE_LIMIT_WINDOW_SECS", &mut rate_limit.window_secs)?;
		env_override(&lookup, "AI_PROXY_RATE_LIMIT_IDLE_SECS", &mut rate_limit.idle_expiry_secs)?;
		env_override(&lookup, "AI_PROXY_PROVIDER_TIMEOUT_MS", &mut provider.timeout_ms)?;
		env_override(&lookup, "AI_PROXY_RETRY_BOUND", &mut provider.retry.max_retries)?;
		env_override(&lookup, "AI_PROXY_RETRY_BASE_DELAY_MS", &mut provider.retry.base_delay_ms)?;
		env_override(&lookup, "AI_PROXY_RETRY_MAX_DELAY_MS", &mut provider.retry.max_delay_ms)?;

		if let Some(millis) = env_value(&lookup, "AI_PROXY_PROVIDER_ATTEMPT_TIMEOUT_MS")? {
			provider.attempt_timeout_ms = Some(millis);
		}

		config.validate()?;

		Ok(config)
	}

	/// Checks every section.
	pub fn validate(&self) -> Result<(), ConfigError> {
		self.validation.validate()?;
		self.rate_limit.validate()?;
		self.provider.validate()
	}
}

fn env_override<F, T>(lookup: &F, key: &'static str, slot: &mut T) -> Result<(), ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	if let Some(value) = env_value(lookup, key)? {
		*slot = value;
	}

	Ok(())
}

fn env_value<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
	F: Fn(&str) -> Option<String>,
	T: FromStr,
{
	let Some(raw) = lookup(key) else {
		return Ok(None);
	};

	raw.trim().parse().map(Some).map_err(|_| ConfigError::InvalidEnv { key, value: raw })
}
