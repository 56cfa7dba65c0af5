//! HTTP plumbing shared by the provider implementations.

use std::time::Duration;

use reqwest::{Client, Response};
use url::Url;

use flowsmith_shared::{FlowsmithError, Result};

/// User-Agent string for oracle requests.
const USER_AGENT: &str = concat!("Flowsmith/", env!("CARGO_PKG_VERSION"));

/// How much of an error body to keep in messages.
const ERROR_BODY_LIMIT: usize = 200;

/// Build a reqwest client with appropriate settings.
pub(crate) fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .build()
        .map_err(|e| FlowsmithError::Oracle(format!("failed to build HTTP client: {e}")))
}

/// Validate `base_url` and append `path`.
pub(crate) fn endpoint(base_url: &str, path: &str) -> Result<String> {
    let base = Url::parse(base_url)
        .map_err(|e| FlowsmithError::config(format!("invalid provider base URL '{base_url}': {e}")))?;
    Ok(format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    ))
}

/// Require the API key on a request for a provider that needs one.
pub(crate) fn require_key<'a>(provider: &str, api_key: Option<&'a str>) -> Result<&'a str> {
    api_key.ok_or_else(|| {
        FlowsmithError::config(format!("no API key configured for provider '{provider}'"))
    })
}

/// Turn a non-success response into an oracle error, otherwise decode JSON.
pub(crate) async fn read_json(provider: &str, response: Response) -> Result<serde_json::Value> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        return Err(FlowsmithError::Oracle(format!(
            "{provider}: HTTP {status}: {excerpt}"
        )));
    }

    response
        .json()
        .await
        .map_err(|e| FlowsmithError::Oracle(format!("{provider}: unreadable response body: {e}")))
}

/// Map a transport error, calling out timeouts.
pub(crate) fn transport_error(provider: &str, error: reqwest::Error) -> FlowsmithError {
    if error.is_timeout() {
        FlowsmithError::Oracle(format!("{provider}: request timed out"))
    } else {
        FlowsmithError::Oracle(format!("{provider}: {error}"))
    }
}
