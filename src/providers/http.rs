//! HTTP invoker for Apify-style actor APIs.
//!
//! Runs an actor synchronously and returns its dataset items:
//! `POST {base_url}/v2/acts/{actor}/run-sync-get-dataset-items?timeout={secs}`
//! with the params as JSON body. Actor ids use `~` as the path separator
//! (`owner~name`); a `/` in the operation tag is translated.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use super::traits::ActorInvoker;
use crate::server::config::{ACTOR_TOKEN_ENV, Config};
use crate::types::Payload;
use crate::{HeimdallError, Result};

/// Default base URL of the actor API.
pub const DEFAULT_BASE_URL: &str = "https://api.apify.com";

/// Extra time granted to the HTTP request beyond the actor's own timeout,
/// so the server gets to report its timeout before the client gives up.
const TRANSPORT_GRACE: Duration = Duration::from_secs(5);

/// Longest error-body excerpt kept in [`HeimdallError::ExternalFailure`].
const BODY_EXCERPT_CHARS: usize = 200;

/// Client for a synchronous actor-run API.
#[derive(Clone)]
pub struct HttpActorInvoker {
    token: String,
    http: Client,
    base_url: String,
}

impl HttpActorInvoker {
    /// Create an invoker against [`DEFAULT_BASE_URL`].
    pub fn new(token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(token, DEFAULT_BASE_URL)
    }

    /// Create an invoker with a custom base URL (for testing with wiremock).
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder().build().map_err(|e| {
            HeimdallError::Configuration(format!("failed to build HTTP client: {e}"))
        })?;
        Ok(Self {
            token: token.into(),
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create an invoker from the `[actor]` section, with the token taken
    /// from [`ACTOR_TOKEN_ENV`].
    pub fn from_config(config: &Config) -> Result<Self> {
        let token = Config::actor_token().ok_or_else(|| {
            HeimdallError::Configuration(format!("{ACTOR_TOKEN_ENV} is not set"))
        })?;
        Self::with_base_url(token, &config.actor.base_url)
    }

    fn run_url(&self, operation_tag: &str) -> String {
        format!(
            "{}/v2/acts/{}/run-sync-get-dataset-items",
            self.base_url,
            operation_tag.replace('/', "~")
        )
    }
}

#[async_trait]
impl ActorInvoker for HttpActorInvoker {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(
        &self,
        operation_tag: &str,
        params: &Value,
        timeout: Duration,
    ) -> Result<Payload> {
        let response = self
            .http
            .post(self.run_url(operation_tag))
            .bearer_auth(&self.token)
            .query(&[("timeout", timeout.as_secs())])
            .timeout(timeout + TRANSPORT_GRACE)
            .json(params)
            .send()
            .await
            .map_err(|e| transport_error(e, timeout))?;

        let status = response.status();
        if status == StatusCode::REQUEST_TIMEOUT {
            return Err(HeimdallError::ExternalTimeout { timeout });
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HeimdallError::ExternalFailure(format!(
                "actor {operation_tag} returned {status}: {}",
                excerpt(&body)
            )));
        }

        response
            .json::<Payload>()
            .await
            .map_err(|e| transport_error(e, timeout))
    }
}

fn transport_error(err: reqwest::Error, timeout: Duration) -> HeimdallError {
    if err.is_timeout() {
        HeimdallError::ExternalTimeout { timeout }
    } else {
        HeimdallError::ExternalFailure(err.to_string())
    }
}

fn excerpt(body: &str) -> String {
    match body.char_indices().nth(BODY_EXCERPT_CHARS) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
