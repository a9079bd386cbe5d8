// std
use std::{sync::Arc, time::Duration as StdDuration};
// self
use ai_proxy::{
	config::ProxyConfig,
	envelope::ResponseEnvelope,
	identity::ClientKey,
	provider::{
		CompletionProvider, ProviderConfig, ProviderFailure, ProviderFailureKind, ProviderFuture,
		RetryPolicy, ScriptedProvider,
	},
	proxy::{ProxyService, RequestState},
	rate_limit::RateLimitConfig,
	request::{AiRequest, ValidationLimits},
};

struct PanickingProvider;
impl CompletionProvider for PanickingProvider {
	fn complete<'a>(&'a self, request: &'a AiRequest) -> ProviderFuture<'a> {
		Box::pin(async move {
			if !request.prompt.is_empty() {
				panic!("provider bug: secret-internal-detail");
			}

			Err(ProviderFailure::new(ProviderFailureKind::InvalidResponse, "empty prompt"))
		})
	}
}

fn client() -> ClientKey {
	ClientKey::from_peer([203, 0, 113, 7].into())
}

fn config(ceiling: u32, window_secs: u64) -> ProxyConfig {
	ProxyConfig {
		validation: ValidationLimits { max_prompt_chars: 32, ..Default::default() },
		rate_limit: RateLimitConfig { ceiling, window_secs, idle_expiry_secs: 600 },
		provider: ProviderConfig {
			timeout_ms: 1_000,
			attempt_timeout_ms: None,
			retry: RetryPolicy {
				max_retries: 2,
				base_delay_ms: 10,
				max_delay_ms: 40,
				jitter: 0.0,
			},
		},
	}
}

fn service(
	provider: &Arc<ScriptedProvider>,
	config: &ProxyConfig,
) -> ProxyService<ScriptedProvider> {
	ProxyService::in_memory(config, provider.clone()).expect("Proxy service fixture should build.")
}

#[tokio::test]
async fn over_long_prompt_is_rejected_without_upstream_call() {
	let provider = Arc::new(ScriptedProvider::new("stub"));
	let service = service(&provider, &config(1, 60));
	let payload = format!(r#"{{"prompt":"{}"}}"#, "x".repeat(33));
	let reply = service.handle(&client(), payload.as_bytes()).await;

	assert_eq!(reply.http_status, 400);
	assert_eq!(reply.state, RequestState::Rejected);
	assert_eq!(provider.calls(), 0);

	let admitted = service.handle(&client(), br#"{"prompt":"short"}"#).await;

	assert_eq!(admitted.http_status, 200, "Rejected payloads must not consume quota.");
}

#[tokio::test]
async fn malformed_and_out_of_range_payloads_are_400s() {
	let provider = Arc::new(ScriptedProvider::new("stub"));
	let service = service(&provider, &config(10, 60));
	let payloads: [&[u8]; 7] = [
		b"not json",
		br#"{"maxTokens":10}"#,
		br#"{"prompt":42}"#,
		br#"{"prompt":"ok","maxTokens":0}"#,
		br#"{"prompt":"ok","maxTokens":1.5}"#,
		br#"{"prompt":"ok","temperature":9}"#,
		br#"{"prompt":"\u0000\u0001"}"#,
	];

	for payload in payloads {
		let reply = service.handle(&client(), payload).await;

		assert!(
			matches!(reply.envelope, ResponseEnvelope::Failure { code: 400, .. }),
			"{} should be rejected.",
			String::from_utf8_lossy(payload)
		);
	}

	assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn request_past_the_ceiling_is_rate_limited_until_the_window_resets() {
	let provider = Arc::new(ScriptedProvider::new("stub"));
	let service = service(&provider, &config(3, 1));

	for _ in 0..3 {
		assert_eq!(service.handle(&client(), br#"{"prompt":"hi"}"#).await.http_status, 200);
	}

	let limited = service.handle(&client(), br#"{"prompt":"hi"}"#).await;

	assert_eq!(limited.http_status, 429);
	assert_eq!(limited.state, RequestState::RateLimited);
	assert!(limited.retry_after_secs().is_some_and(|secs| secs <= 1));
	assert_eq!(provider.calls(), 3);

	let other = ClientKey::from_peer([203, 0, 113, 8].into());

	assert_eq!(service.handle(&other, br#"{"prompt":"hi"}"#).await.http_status, 200);

	tokio::time::sleep(StdDuration::from_millis(1_100)).await;

	assert_eq!(service.handle(&client(), br#"{"prompt":"hi"}"#).await.http_status, 200);
	assert_eq!(provider.calls(), 5);
}

#[tokio::test]
async fn transient_failures_are_retried_transparently() {
	let provider = Arc::new(
		ScriptedProvider::new("stub")
			.then_fail(ProviderFailure::from_status(503))
			.then_fail(ProviderFailure::new(ProviderFailureKind::Network, "reset"))
			.then_reply("third time lucky"),
	);
	let service = service(&provider, &config(10, 60));
	let reply = service.handle(&client(), br#"{"prompt":"hi"}"#).await;

	assert_eq!(reply.http_status, 200);
	assert!(matches!(
		reply.envelope,
		ResponseEnvelope::Success { ref text, .. } if text == "third time lucky"
	));
	assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_as_one_504() {
	let provider = Arc::new(
		ScriptedProvider::new("stub")
			.otherwise(StdDuration::ZERO, Err(ProviderFailure::from_status(502))),
	);
	let service = service(&provider, &config(10, 60));
	let reply = service.handle(&client(), br#"{"prompt":"hi"}"#).await;

	assert_eq!(reply.http_status, 504);
	assert_eq!(reply.state, RequestState::Failed);
	assert_eq!(provider.calls(), 3);
}

#[tokio::test]
async fn non_transient_failures_are_not_retried_or_leaked() {
	let provider = Arc::new(ScriptedProvider::new("stub").then_fail(ProviderFailure::new(
		ProviderFailureKind::Rejected,
		"key sk-live-abc123 lacks access to org-77",
	)));
	let service = service(&provider, &config(10, 60));
	let reply = service.handle(&client(), br#"{"prompt":"hi"}"#).await;
	let wire = reply.envelope.to_json().expect("Envelope should encode.");

	assert_eq!(reply.http_status, 502);
	assert_eq!(provider.calls(), 1);
	assert!(!wire.contains("sk-live"));
	assert!(!wire.contains("org-77"));
}

#[tokio::test(start_paused = true)]
async fn slow_upstream_hits_the_deadline() {
	let provider = Arc::new(
		ScriptedProvider::new("stub").then_delayed(StdDuration::from_secs(5), Ok("late".into())),
	);
	let service = service(&provider, &config(10, 60));
	let started = tokio::time::Instant::now();
	let reply = service.handle(&client(), br#"{"prompt":"hi"}"#).await;

	assert_eq!(reply.http_status, 504);
	assert!(started.elapsed() < StdDuration::from_secs(2));
	assert_eq!(provider.calls(), 1);
}

#[tokio::test]
async fn replies_round_trip_through_the_wire() {
	let provider = Arc::new(ScriptedProvider::new("stub"));
	let service = service(&provider, &config(1, 60));

	let payloads: [&[u8]; 3] = [br#"{"prompt":"hello"}"#, br#"{"prompt":"hello"}"#, b"{}"];

	for payload in payloads {
		let reply = service.handle(&client(), payload).await;
		let wire = reply.envelope.to_json().expect("Envelope should encode.");
		let decoded =
			ResponseEnvelope::from_json(wire.as_bytes()).expect("Envelope should decode.");

		assert_eq!(decoded, reply.envelope);
	}
}

#[tokio::test]
async fn provider_panic_becomes_internal_error_envelope() {
	let service = ProxyService::in_memory(&config(5, 60), Arc::new(PanickingProvider))
		.expect("Proxy service fixture should build.");
	let reply = service.handle(&client(), br#"{"prompt":"hello"}"#).await;

	assert_eq!(reply.http_status, 500);
	assert_eq!(reply.state, RequestState::Failed);
	assert_eq!(reply.retry_after, None);

	let ResponseEnvelope::Failure { error, code } = reply.envelope else {
		panic!("Panics must produce a failure envelope.");
	};

	assert_eq!(code, 500);
	assert!(!error.contains("secret-internal-detail"), "Panic payloads must not leak: {error}.");

	let again = service.handle(&client(), br#"{"prompt":"hello again"}"#).await;

	assert_eq!(again.http_status, 500, "The service must stay usable after a panic.");
}
