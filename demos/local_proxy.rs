//! Runs the proxy in-process against a scripted provider.
//!
//! 1. Load [`ProxyConfig`] from `AI_PROXY_*` variables (defaults otherwise).
//! 2. Send a few raw payloads through [`ProxyService::handle`] and print each envelope with the
//!    status and `Retry-After` a host HTTP layer would set.
//! 3. Drive a [`ClientRequestWrapper`] the way a UI would: a burst of keystrokes, then a cancel.

// std
use std::{sync::Arc, time::Duration as StdDuration};
// crates.io
use color_eyre::Result;
// self
use ai_proxy::{
	client::{ClientRequestWrapper, LocalTransport, PromptRequest},
	config::ProxyConfig,
	identity::ClientKey,
	provider::{ProviderFailure, ScriptedProvider},
	proxy::ProxyService,
};

#[tokio::main]
async fn main() -> Result<()> {
	color_eyre::install()?;

	let mut config = ProxyConfig::from_env()?;

	config.rate_limit.ceiling = config.rate_limit.ceiling.min(4);

	let provider = Arc::new(
		ScriptedProvider::new("scripted-demo")
			.then_fail(ProviderFailure::from_status(503))
			.then_reply("Hello from the scripted provider."),
	);
	let service = Arc::new(ProxyService::in_memory(&config, provider.clone())?);
	let client = ClientKey::from_peer([127, 0, 0, 1].into());
	let payloads: [&[u8]; 6] = [
		br#"{"prompt":"Say hello","maxTokens":32}"#,
		br#"{"prompt":"   "}"#,
		br#"{"prompt":"Again","temperature":0.2}"#,
		br#"{"prompt":"And again"}"#,
		br#"{"prompt":"One more"}"#,
		br#"{"prompt":"Over the limit"}"#,
	];

	for payload in payloads {
		let reply = service.handle(&client, payload).await;

		println!(
			"{} {} retry_after={:?} -> {}",
			reply.http_status,
			reply.state,
			reply.retry_after_secs(),
			reply.envelope.to_json()?
		);
	}

	let wrapper = ClientRequestWrapper::new(Arc::new(LocalTransport::new(
		service,
		ClientKey::from_session("demo-session"),
	)));
	let mut pending = Vec::new();

	for prefix in ["W", "Wr", "Wri", "Writ", "Write a haiku"] {
		pending.push(tokio::spawn(wrapper.invoke(PromptRequest::new(prefix))));
		tokio::time::sleep(StdDuration::from_millis(50)).await;
	}
	for handle in pending {
		println!("debounced: {:?}", handle.await?);
	}

	let cancelled = tokio::spawn(wrapper.invoke(PromptRequest::new("never sent")));

	wrapper.cancel();

	println!("cancelled: {:?}", cancelled.await?);
	println!("upstream calls: {}", provider.calls());

	Ok(())
}
