//! In-process [`CompletionProvider`] that replays scripted outcomes.
//!
//! Useful for local development (it echoes prompts once the script runs out) and for tests
//! that need to count upstream calls or inject transient failures.

// std
use std::{
	collections::VecDeque,
	sync::atomic::{AtomicUsize, Ordering},
	time::Duration as StdDuration,
};
// self
use crate::{
	_prelude::*,
	provider::{Completion, CompletionProvider, ProviderFailure, ProviderFuture},
	request::AiRequest,
};

#[derive(Clone, Debug)]
struct Step {
	delay: StdDuration,
	outcome: Result<String, ProviderFailure>,
}

/// Provider that pops one scripted step per call and records every prompt it sees.
#[derive(Debug)]
pub struct ScriptedProvider {
	model: String,
	script: Mutex<VecDeque<Step>>,
	fallback: Option<Step>,
	calls: AtomicUsize,
	prompts: Mutex<VecDeque<String>>,
}
impl ScriptedProvider {
	/// Number of most recent prompts kept by [`ScriptedProvider::prompts`].
	pub const PROMPT_LOG_LIMIT: usize = 64;

	/// Creates an empty script for `model`; unscripted calls echo the prompt.
	pub fn new(model: impl Into<String>) -> Self {
		Self {
			model: model.into(),
			script: Mutex::new(VecDeque::new()),
			fallback: None,
			calls: AtomicUsize::new(0),
			prompts: Mutex::new(VecDeque::new()),
		}
	}

	/// Queues a successful reply.
	pub fn then_reply(self, text: impl Into<String>) -> Self {
		self.then_delayed(StdDuration::ZERO, Ok(text.into()))
	}

	/// Queues a failure.
	pub fn then_fail(self, failure: ProviderFailure) -> Self {
		self.then_delayed(StdDuration::ZERO, Err(failure))
	}

	/// Queues an outcome that resolves only after `delay`.
	pub fn then_delayed(
		self,
		delay: StdDuration,
		outcome: Result<String, ProviderFailure>,
	) -> Self {
		self.script.lock().push_back(Step { delay, outcome });

		self
	}

	/// Outcome used for every call once the script is exhausted.
	pub fn otherwise(
		mut self,
		delay: StdDuration,
		outcome: Result<String, ProviderFailure>,
	) -> Self {
		self.fallback = Some(Step { delay, outcome });

		self
	}

	/// Number of attempts received so far.
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Most recent prompts received, oldest first, capped at [`Self::PROMPT_LOG_LIMIT`].
	pub fn prompts(&self) -> Vec<String> {
		self.prompts.lock().iter().cloned().collect()
	}

	fn next_step(&self, prompt: &str) -> Step {
		self.calls.fetch_add(1, Ordering::SeqCst);
		{
			let mut prompts = self.prompts.lock();

			if prompts.len() == Self::PROMPT_LOG_LIMIT {
				prompts.pop_front();
			}

			prompts.push_back(prompt.to_owned());
		}

		let scripted = self.script.lock().pop_front();

		scripted.or_else(|| self.fallback.clone()).unwrap_or_else(|| Step {
			delay: StdDuration::ZERO,
			outcome: Ok(format!("echo: {prompt}")),
		})
	}
}
impl CompletionProvider for ScriptedProvider {
	fn complete<'a>(&'a self, request: &'a AiRequest) -> ProviderFuture<'a> {
		let step = self.next_step(&request.prompt);

		Box::pin(async move {
			if !step.delay.is_zero() {
				tokio::time::sleep(step.delay).await;
			}

			step.outcome.map(|text| Completion { text, model: self.model.clone() })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;
	use crate::provider::ProviderFailureKind;

	fn request(prompt: &str) -> AiRequest {
		AiRequest { prompt: prompt.into(), max_tokens: 16, temperature: 0.0 }
	}

	#[tokio::test]
	async fn replays_script_then_echoes() {
		let provider = ScriptedProvider::new("stub-model")
			.then_fail(ProviderFailure::new(ProviderFailureKind::Network, "reset"))
			.then_reply("scripted");
		let first = provider.complete(&request("one")).await;
		let second = provider.complete(&request("two")).await;
		let third = provider.complete(&request("three")).await;

		assert!(matches!(first, Err(ref failure) if failure.kind == ProviderFailureKind::Network));
		assert_eq!(
			second,
			Ok(Completion { text: "scripted".into(), model: "stub-model".into() })
		);
		assert_eq!(third.map(|completion| completion.text), Ok("echo: three".into()));
		assert_eq!(provider.calls(), 3);
		assert_eq!(provider.prompts(), vec!["one", "two", "three"]);
	}

	#[tokio::test]
	async fn fallback_repeats_forever() {
		let provider = ScriptedProvider::new("stub-model").otherwise(
			StdDuration::ZERO,
			Err(ProviderFailure::new(ProviderFailureKind::Unavailable, "503")),
		);

		for _ in 0..3 {
			assert!(provider.complete(&request("x")).await.is_err());
		}

		assert_eq!(provider.calls(), 3);
	}

	#[tokio::test]
	async fn prompt_log_keeps_only_recent_prompts() {
		let provider = ScriptedProvider::new("stub-model");
		let total = ScriptedProvider::PROMPT_LOG_LIMIT + 6;

		for i in 0..total {
			let _ = provider.complete(&request(&format!("p{i}"))).await;
		}

		let prompts = provider.prompts();

		assert_eq!(provider.calls(), total);
		assert_eq!(prompts.len(), ScriptedProvider::PROMPT_LOG_LIMIT);
		assert_eq!(prompts.first().map(String::as_str), Some("p6"));
		assert_eq!(prompts.last(), Some(&format!("p{}", total - 1)));
	}
}
