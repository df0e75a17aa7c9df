//! REST seams to the session, intent, and stop services.

use std::fmt;

use async_trait::async_trait;
use lastmile_protocol::{ErrorBody, Intent, IntentCreate, LocationSnapshot, MatchCard, Session, SessionCreate, StopCandidate};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::credentials::Credentials;
use crate::session::SessionAction;
use crate::{Error, Result};

#[async_trait]
pub trait SessionService: Send + Sync {
	/// Non-terminal sessions the current user participates in.
	async fn list_sessions(&self) -> Result<Vec<Session>>;

	async fn create_session(&self, request: SessionCreate) -> Result<Session>;

	/// Apply a lifecycle action. The response omits route endpoints.
	async fn transition(&self, session_id: i64, action: SessionAction) -> Result<Session>;

	async fn locations(&self, session_id: i64) -> Result<LocationSnapshot>;
}

#[async_trait]
pub trait IntentService: Send + Sync {
	async fn list_intents(&self) -> Result<Vec<Intent>>;

	async fn create_intent(&self, request: &IntentCreate) -> Result<Intent>;

	async fn delete_intent(&self, intent_id: i64) -> Result<()>;

	async fn matches(&self, intent_id: i64) -> Result<Vec<MatchCard>>;

	async fn stops(&self) -> Result<Vec<StopCandidate>>;
}

/// reqwest-backed implementation of both services.
///
/// Every request carries the current bearer credential when one is present.
#[derive(Clone)]
pub struct HttpClient {
	http: reqwest::Client,
	base: String,
	credentials: Credentials,
}

impl fmt::Debug for HttpClient {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("HttpClient").field("base", &self.base).finish_non_exhaustive()
	}
}

impl HttpClient {
	pub fn new(config: &ClientConfig, credentials: Credentials) -> Result<Self> {
		Url::parse(&config.api_url)?;
		let http = reqwest::Client::builder()
			.timeout(config.request_timeout())
			.build()
			.map_err(|e| Error::Config(format!("Failed to create HTTP client: {e}")))?;
		Ok(Self {
			http,
			base: config.api_url.trim_end_matches('/').to_string(),
			credentials,
		})
	}

	fn url(&self, path: &str) -> Result<Url> {
		Ok(Url::parse(&format!("{}/{}", self.base, path.trim_start_matches('/')))?)
	}

	fn request(&self, method: Method, url: Url) -> RequestBuilder {
		let builder = self.http.request(method, url);
		match self.credentials.current() {
			Some(token) => builder.bearer_auth(token),
			None => builder,
		}
	}

	async fn send(&self, builder: RequestBuilder) -> Result<Response> {
		let response = builder.send().await?;
		let status = response.status();
		debug!(target = "lastmile.http", url = %response.url().path(), status = status.as_u16(), "response");

		if status == StatusCode::UNAUTHORIZED {
			return Err(Error::Unauthorized);
		}
		if !status.is_success() {
			let body = response.text().await.unwrap_or_default();
			return Err(Error::Request {
				status: status.as_u16(),
				detail: error_detail(status, &body),
			});
		}
		Ok(response)
	}

	async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T> {
		let response = self.send(builder).await?;
		let bytes = response.bytes().await?;
		Ok(serde_json::from_slice(&bytes)?)
	}
}

/// Human-readable detail from an error response body.
fn error_detail(status: StatusCode, body: &str) -> String {
	match serde_json::from_str::<ErrorBody>(body) {
		Ok(parsed) => match parsed.message() {
			Some(message) => message.to_string(),
			None => parsed.detail.to_string(),
		},
		Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
	}
}

#[async_trait]
impl SessionService for HttpClient {
	async fn list_sessions(&self) -> Result<Vec<Session>> {
		self.json(self.request(Method::GET, self.url("sessions/me")?)).await
	}

	async fn create_session(&self, request: SessionCreate) -> Result<Session> {
		self.json(self.request(Method::POST, self.url("sessions")?).json(&request)).await
	}

	async fn transition(&self, session_id: i64, action: SessionAction) -> Result<Session> {
		let url = self.url(&format!("sessions/{session_id}/{}", action.as_str()))?;
		self.json(self.request(Method::POST, url)).await
	}

	async fn locations(&self, session_id: i64) -> Result<LocationSnapshot> {
		let url = self.url(&format!("sessions/{session_id}/locations"))?;
		self.json(self.request(Method::GET, url)).await
	}
}

#[async_trait]
impl IntentService for HttpClient {
	async fn list_intents(&self) -> Result<Vec<Intent>> {
		self.json(self.request(Method::GET, self.url("intents")?)).await
	}

	async fn create_intent(&self, request: &IntentCreate) -> Result<Intent> {
		self.json(self.request(Method::POST, self.url("intents")?).json(request)).await
	}

	async fn delete_intent(&self, intent_id: i64) -> Result<()> {
		self.send(self.request(Method::DELETE, self.url(&format!("intents/{intent_id}"))?)).await?;
		Ok(())
	}

	async fn matches(&self, intent_id: i64) -> Result<Vec<MatchCard>> {
		let mut url = self.url("intents/matches")?;
		url.query_pairs_mut().append_pair("intent_id", &intent_id.to_string());
		self.json(self.request(Method::GET, url)).await
	}

	async fn stops(&self) -> Result<Vec<StopCandidate>> {
		self.json(self.request(Method::GET, self.url("stops")?)).await
	}
}
