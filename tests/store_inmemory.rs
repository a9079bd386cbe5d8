// std
use std::sync::Arc;
// crates.io
use time::{Duration, macros::datetime};
// self
use ai_proxy::{
	identity::ClientKey,
	rate_limit::{RateLimitConfig, RateLimitDecision, RateLimiter, WindowRule},
	store::{HitOutcome, MemoryRateLimitStore, RateLimitStore},
};

fn key(value: &str) -> ClientKey {
	ClientKey::new(value).expect("Client key fixture should be valid.")
}

fn rule(ceiling: u32) -> WindowRule {
	WindowRule { ceiling, window: Duration::seconds(60), idle_expiry: Duration::seconds(120) }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_hits_never_over_admit() {
	let store = Arc::new(MemoryRateLimitStore::default());
	let client = key("ip:192.0.2.10");
	let now = datetime!(2025-11-10 12:00 UTC);
	let mut handles = Vec::new();

	for _ in 0..64 {
		let store = store.clone();
		let client = client.clone();

		handles.push(tokio::spawn(async move {
			store.hit(&client, &rule(10), now).await.expect("Memory store hit should succeed.")
		}));
	}

	let mut admitted = 0;

	for handle in handles {
		if matches!(handle.await.expect("Hit task should not panic."), HitOutcome::Admitted { .. })
		{
			admitted += 1;
		}
	}

	assert_eq!(admitted, 10);

	let window = store
		.window(&client)
		.await
		.expect("Window lookup should succeed.")
		.expect("Window should exist after hits.");

	assert_eq!(window.count, 10);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_limiter_admissions_respect_the_ceiling_per_key() {
	let limiter = Arc::new(RateLimiter::in_memory(&RateLimitConfig {
		ceiling: 5,
		window_secs: 60,
		idle_expiry_secs: 600,
	}));
	let mut handles = Vec::new();

	for index in 0..40 {
		let limiter = limiter.clone();
		let client = key(if index % 2 == 0 { "ip:192.0.2.1" } else { "ip:192.0.2.2" });

		handles.push(tokio::spawn(async move {
			limiter.admit(&client).await.expect("Admission should not fail.")
		}));
	}

	let mut admitted = 0;

	for handle in handles {
		if handle.await.expect("Admission task should not panic.").is_admitted() {
			admitted += 1;
		}
	}

	assert_eq!(admitted, 10, "Each of the two keys gets exactly its own ceiling.");
}

#[tokio::test]
async fn keys_are_independent_and_idle_windows_are_swept() {
	let store = MemoryRateLimitStore::default();
	let busy = key("ip:192.0.2.20");
	let quiet = key("session:quiet");
	let start = datetime!(2025-11-10 12:00 UTC);
	let rule = rule(1);

	assert!(matches!(
		store.hit(&busy, &rule, start).await.expect("First hit should succeed."),
		HitOutcome::Admitted { count: 1, .. }
	));
	assert!(matches!(
		store.hit(&busy, &rule, start).await.expect("Second hit should succeed."),
		HitOutcome::Rejected { .. }
	));
	assert!(matches!(
		store.hit(&quiet, &rule, start).await.expect("Other key should succeed."),
		HitOutcome::Admitted { count: 1, .. }
	));

	let later = start + Duration::seconds(90);

	store.hit(&busy, &rule, later).await.expect("Refreshing hit should succeed.");

	let removed = store
		.sweep(&rule, start + Duration::seconds(200))
		.await
		.expect("Sweep should succeed.");

	assert_eq!(removed, 1);
	assert_eq!(store.len(), 1);
	assert!(store.window(&quiet).await.expect("Lookup should succeed.").is_none());
	assert!(store.window(&busy).await.expect("Lookup should succeed.").is_some());
}

#[tokio::test]
async fn rejection_reports_time_until_reset() {
	let limiter = RateLimiter::in_memory(&RateLimitConfig {
		ceiling: 1,
		window_secs: 30,
		idle_expiry_secs: 600,
	});
	let client = key("ip:192.0.2.30");
	let start = datetime!(2025-11-10 12:00 UTC);

	limiter.admit_at(&client, start).await.expect("First admission should succeed.");

	let decision = limiter
		.admit_at(&client, start + Duration::seconds(12))
		.await
		.expect("Second admission should return a decision.");

	assert_eq!(decision, RateLimitDecision::Rejected { retry_after: Duration::seconds(18) });
}
