//! Reqwest-backed provider speaking the common chat-completions JSON shape.

// crates.io
use reqwest::{
	header::{HeaderMap, RETRY_AFTER},
	redirect::Policy,
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::ConfigError,
	provider::{
		ApiKey, Completion, CompletionProvider, ProviderFailure, ProviderFailureKind,
		ProviderFuture,
	},
	request::AiRequest,
};

/// [`CompletionProvider`] that POSTs to a chat-completions endpoint with bearer auth.
///
/// Each call is exactly one HTTP request; retries and deadlines belong to
/// [`ProviderClient`](crate::provider::ProviderClient). Redirects are never followed so the
/// API key cannot be forwarded to a different host.
#[derive(Clone)]
pub struct HttpProvider {
	client: ReqwestClient,
	endpoint: Url,
	api_key: ApiKey,
	model: String,
}
impl HttpProvider {
	/// Builds a provider with a dedicated reqwest client.
	pub fn new(
		endpoint: Url,
		api_key: ApiKey,
		model: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder().redirect(Policy::none()).build()?;

		Ok(Self::with_client(client, endpoint, api_key, model))
	}

	/// Wraps an existing reqwest [`ReqwestClient`]; configure it to skip redirects.
	pub fn with_client(
		client: ReqwestClient,
		endpoint: Url,
		api_key: ApiKey,
		model: impl Into<String>,
	) -> Self {
		Self { client, endpoint, api_key, model: model.into() }
	}

	/// Endpoint receiving completion requests.
	pub fn endpoint(&self) -> &Url {
		&self.endpoint
	}

	async fn send(&self, request: &AiRequest) -> Result<Completion, ProviderFailure> {
		let body = ChatRequest {
			model: &self.model,
			messages: [ChatMessage { role: "user", content: &request.prompt }],
			max_tokens: request.max_tokens,
			temperature: request.temperature,
		};
		let response = self
			.client
			.post(self.endpoint.clone())
			.bearer_auth(self.api_key.expose())
			.json(&body)
			.send()
			.await
			.map_err(transport_failure)?;
		let status = response.status();

		if !status.is_success() {
			let mut failure = ProviderFailure::from_status(status.as_u16());

			if let Some(retry_after) = parse_retry_after(response.headers()) {
				failure = failure.with_retry_after(retry_after);
			}

			return Err(failure);
		}

		let bytes = response.bytes().await.map_err(transport_failure)?;
		let de = &mut serde_json::Deserializer::from_slice(&bytes);
		let parsed: ChatResponse = serde_path_to_error::deserialize(de).map_err(|e| {
			ProviderFailure::new(
				ProviderFailureKind::InvalidResponse,
				format!("Unexpected response body at {}: {}", e.path(), e.inner()),
			)
			.with_status(status.as_u16())
		})?;
		let text = parsed
			.choices
			.into_iter()
			.next()
			.and_then(|choice| choice.message.content)
			.ok_or_else(|| {
				ProviderFailure::new(
					ProviderFailureKind::InvalidResponse,
					"Response carried no message content",
				)
				.with_status(status.as_u16())
			})?;

		Ok(Completion { text, model: parsed.model.unwrap_or_else(|| self.model.clone()) })
	}
}
impl CompletionProvider for HttpProvider {
	fn complete<'a>(&'a self, request: &'a AiRequest) -> ProviderFuture<'a> {
		Box::pin(self.send(request))
	}
}
impl Debug for HttpProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("HttpProvider")
			.field("endpoint", &self.endpoint.as_str())
			.field("api_key", &self.api_key)
			.field("model", &self.model)
			.finish()
	}
}

#[derive(Serialize)]
struct ChatRequest<'a> {
	model: &'a str,
	messages: [ChatMessage<'a>; 1],
	max_tokens: u32,
	temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
	role: &'static str,
	content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
	#[serde(default)]
	model: Option<String>,
	choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
	message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
	#[serde(default)]
	content: Option<String>,
}

fn transport_failure(e: ReqwestError) -> ProviderFailure {
	let kind = if e.is_timeout() { ProviderFailureKind::Timeout } else { ProviderFailureKind::Network };
	let failure = ProviderFailure::new(kind, e.to_string());

	match e.status() {
		Some(status) => failure.with_status(status.as_u16()),
		None => failure,
	}
}

fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let raw = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u32>() {
		return Some(Duration::seconds(secs.into()));
	}
	if let Some(moment) = parse_http_date(raw) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

// HTTP dates use the `GMT` zone name; normalize it to a numeric offset before parsing.
fn parse_http_date(raw: &str) -> Option<OffsetDateTime> {
	OffsetDateTime::parse(raw, &Rfc2822).ok().or_else(|| {
		let numeric = format!("{} +0000", raw.strip_suffix(" GMT")?);

		OffsetDateTime::parse(&numeric, &Rfc2822).ok()
	})
}
