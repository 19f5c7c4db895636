//! Search engine client
//!
//! Thin HTTP client for an Elasticsearch-compatible cluster. Requests rotate
//! across the configured hosts and are retried per [`RetryPolicy`].

pub mod retry;

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bedrock_core::SearchSettings;
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::SearchError;

pub use retry::RetryPolicy;

/// Search engine client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SearchClient {
    inner: Arc<SearchClientInner>,
}

struct SearchClientInner {
    client: Client,
    hosts: Vec<Url>,
    credentials: Option<(String, String)>,
    policy: RetryPolicy,
    next_host: AtomicUsize,
}

impl fmt::Debug for SearchClientInner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchClient")
            .field("hosts", &self.hosts)
            .field("username", &self.credentials.as_ref().map(|(user, _)| user))
            .field("policy", &self.policy)
            .finish()
    }
}

fn parse_host(host: &str) -> Result<Url, SearchError> {
    let mut url = Url::parse(host).map_err(|source| SearchError::InvalidHost {
        host: host.to_string(),
        source,
    })?;
    // keep any path prefix when joining request paths
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

impl SearchClient {
    /// Build a client bound to `settings`. Does not contact the cluster.
    pub fn new(settings: SearchSettings) -> Result<Self, SearchError> {
        let hosts = settings
            .effective_hosts()
            .iter()
            .map(|h| parse_host(h))
            .collect::<Result<Vec<_>, _>>()?;

        let client = Client::builder().build().map_err(SearchError::Build)?;

        let credentials = if settings.username.is_empty() {
            None
        } else {
            Some((settings.username.clone(), settings.password.clone()))
        };

        let policy = RetryPolicy::new(settings.max_retries, settings.retry_statuses.iter().copied());

        info!(
            hosts = hosts.len(),
            max_retries = policy.max_retries(),
            authenticated = credentials.is_some(),
            "search engine client configured"
        );

        Ok(Self {
            inner: Arc::new(SearchClientInner {
                client,
                hosts,
                credentials,
                policy,
                next_host: AtomicUsize::new(0),
            }),
        })
    }

    pub fn hosts(&self) -> &[Url] {
        &self.inner.hosts
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    fn next_url(&self, path: &str) -> Result<Url, SearchError> {
        let i = self.inner.next_host.fetch_add(1, Ordering::Relaxed) % self.inner.hosts.len();
        let host = &self.inner.hosts[i];
        host.join(path.trim_start_matches('/'))
            .map_err(|source| SearchError::InvalidHost {
                host: host.to_string(),
                source,
            })
    }

    /// Send a request, retrying retryable statuses on the next host.
    ///
    /// Returns the final response whatever its status; once the retry budget
    /// is spent the caller sees the last retryable status.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Response, SearchError> {
        let mut retries = 0;
        loop {
            let url = self.next_url(path)?;
            debug!(%method, %url, retries, "search request");

            let mut request = self.inner.client.request(method.clone(), url);
            if let Some((ref username, ref password)) = self.inner.credentials {
                request = request.basic_auth(username, Some(password));
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request.send().await?;
            let status = response.status();

            if !self.inner.policy.should_retry(status, retries) {
                return Ok(response);
            }

            retries += 1;
            warn!(
                %status,
                retry = retries,
                max_retries = self.inner.policy.max_retries(),
                "retryable search engine status"
            );
        }
    }

    /// Send a request and decode a successful JSON body.
    ///
    /// # Errors
    ///
    /// [`SearchError::Status`] for any non-2xx final status.
    pub async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, SearchError> {
        let response = self.send(method, path, body).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Status { status, body });
        }

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(SearchError::Decode)
    }

    /// Liveness probe (`HEAD /`).
    pub async fn ping(&self) -> Result<(), SearchError> {
        let response = self.send(Method::HEAD, "/", None).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(SearchError::Status {
                status,
                body: String::new(),
            })
        }
    }

    /// Cluster info (`GET /`).
    pub async fn info(&self) -> Result<Value, SearchError> {
        self.perform(Method::GET, "/", None).await
    }

    pub async fn index_exists(&self, index: &str) -> Result<bool, SearchError> {
        let response = self.send(Method::HEAD, index, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            status => Err(SearchError::Status {
                status,
                body: String::new(),
            }),
        }
    }
}
