//! # REST Remote Store
//!
//! [`RemoteStore`](super::RemoteStore) and [`VersionStore`](super::VersionStore)
//! backed by the envzip HTTP API.
//!
//! Uses reqwest with rustls (no OpenSSL dependencies). Requests carry the API
//! key as a bearer token and the project key in `X-Project-Key`.
//!
//! Status mapping:
//! - 404 → [`StoreError::NotFound`]
//! - 408, 429, 5xx and transport failures → [`StoreError::Unavailable`]
//! - any other non-success status → [`StoreError::Rejected`]
//!
//! Realtime delivery is emulated by polling; see `polling`.

mod documents;
mod operations;
mod polling;

pub use documents::*;

use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::config::{RuntimeConfig, SyncConfig};
use crate::error::{StoreError, StoreResult};
use crate::observability::metrics;

/// HTTP client for the envzip API
#[derive(Clone)]
pub struct RestRemoteStore {
    http_client: Client,
    base_url: Url,
    project_key: String,
    api_key: Zeroizing<String>,
    poll_interval: Duration,
    backoff_min_secs: u64,
    backoff_max_secs: u64,
}

impl std::fmt::Debug for RestRemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestRemoteStore")
            .field("base_url", &self.base_url.as_str())
            .field("project_key", &self.project_key)
            .finish_non_exhaustive()
    }
}

impl RestRemoteStore {
    /// Create a client for the endpoint and credentials in `config`
    pub fn new(config: &SyncConfig, runtime: &RuntimeConfig) -> StoreResult<Self> {
        let base_url = Url::parse(&config.remote_endpoint).map_err(|e| {
            StoreError::Rejected(format!(
                "invalid remote endpoint '{}': {e}",
                config.remote_endpoint
            ))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(StoreError::Rejected(format!(
                "remote endpoint '{}' cannot be used as a base URL",
                config.remote_endpoint
            )));
        }

        let http_client = Client::builder()
            .timeout(runtime.request_timeout())
            .user_agent(concat!("envzip/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        info!("Using remote store at {}", base_url);

        Ok(Self {
            http_client,
            base_url,
            project_key: config.project_key.clone(),
            api_key: config.api_key.clone(),
            poll_interval: runtime.remote_poll_interval(),
            backoff_min_secs: runtime.backoff_min_secs,
            backoff_max_secs: runtime.backoff_max_secs,
        })
    }

    /// Endpoint URL for the given path segments (each segment is percent-encoded)
    pub(crate) fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Build a request with authentication headers
    pub(crate) fn make_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(self.api_key.as_str())
            .header("X-Project-Key", &self.project_key)
            .header("Accept", "application/json")
    }

    /// Send a request and decode the JSON response body
    ///
    /// `target` names the resource for a 404 response.
    pub(crate) async fn execute<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        target: Option<(&'static str, &str)>,
    ) -> StoreResult<T> {
        let response = self.send(operation, request, target).await?;
        response.json::<T>().await.map_err(|e| {
            metrics::increment_remote_operation_errors(operation);
            StoreError::Encoding(e.to_string())
        })
    }

    /// Send a request whose response body is not needed
    pub(crate) async fn execute_empty(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        target: Option<(&'static str, &str)>,
    ) -> StoreResult<()> {
        self.send(operation, request, target).await.map(|_| ())
    }

    async fn send(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        target: Option<(&'static str, &str)>,
    ) -> StoreResult<reqwest::Response> {
        metrics::record_remote_operation(operation);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                metrics::increment_remote_operation_errors(operation);
                return Err(StoreError::Unavailable(e.to_string()));
            }
        };

        let status = response.status();
        if status.is_success() {
            debug!("{} → {}", operation, status);
            return Ok(response);
        }

        metrics::increment_remote_operation_errors(operation);
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, target))
    }
}

/// Map a non-success HTTP status to a store error
fn status_error(status: StatusCode, body: &str, target: Option<(&'static str, &str)>) -> StoreError {
    let detail = serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .filter(|e| !e.message.is_empty())
        .map(|e| match e.code {
            Some(code) => format!("{} ({code})", e.message),
            None => e.message,
        })
        .unwrap_or_else(|| body.trim().to_string());

    match status {
        StatusCode::NOT_FOUND => match target {
            Some((kind, id)) => StoreError::NotFound {
                kind,
                id: id.to_string(),
            },
            None => StoreError::Rejected(format!("HTTP {status}: {detail}")),
        },
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(format!("HTTP {status}: {detail}"))
        }
        s if s.is_server_error() => StoreError::Unavailable(format!("HTTP {status}: {detail}")),
        _ => StoreError::Rejected(format!("HTTP {status}: {detail}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Stage;
    use std::path::Path;

    fn store(endpoint: &str) -> RestRemoteStore {
        let text = format!(
            "api_key=k\nproject_key=p\nlocal_env_path=.env\nstage=dev\nremote_endpoint={endpoint}\n"
        );
        let config = SyncConfig::parse(&text, Path::new(".")).unwrap();
        RestRemoteStore::new(&config, &RuntimeConfig::default()).unwrap()
    }

    #[test]
    fn test_url_appends_encoded_segments() {
        let store = store("http://localhost:8787/v1/");
        let url = store.url(&["projects", "my proj", "stages", Stage::Staging.as_str(), "entries"]);
        assert_eq!(
            url.as_str(),
            "http://localhost:8787/v1/projects/my%20proj/stages/staging/entries"
        );
    }

    #[test]
    fn test_status_mapping() {
        let err = status_error(StatusCode::NOT_FOUND, "", Some(("entry", "e1")));
        assert!(matches!(err, StoreError::NotFound { kind: "entry", .. }));

        let err = status_error(StatusCode::SERVICE_UNAVAILABLE, "down", None);
        assert!(err.is_transient());

        let err = status_error(
            StatusCode::CONFLICT,
            r#"{"message":"duplicate key","code":"key_exists"}"#,
            None,
        );
        match err {
            StoreError::Rejected(msg) => assert!(msg.contains("duplicate key (key_exists)")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_debug_hides_api_key() {
        let store = store("https://api.example.com/v1");
        assert!(!format!("{store:?}").contains("api_key"));
    }
}
