// # HTTP Pool Source
//
// This crate provides an HTTPS-based reload mechanism for the trustnet
// system.
//
// ## Purpose
//
// Providers that publish their address space as a JSON document (search
// crawlers, payment processors, CDNs) are refreshed by fetching that
// document and handing the engine a freshly built pool. A source may
// carry separate IPv4 and IPv6 endpoints; each becomes its own
// independent reload task, so one family's outage never blocks the
// other from updating.
//
// ## Document shape
//
// ```json
// { "addresses": ["198.51.100.1"], "ranges": ["203.0.113.0/24"] }
// ```
//
// ## Policy ownership
//
// Retry and timeout policy live HERE, inside the mechanism. The engine
// awaits each task to settlement and imposes no deadline of its own, so
// a source that wants backoff must bring it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use trustnet_core::provider::{AddressPool, PoolUpdate, ReloadTask};
use trustnet_core::{Error, Result};

/// Default HTTP timeout for feed requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default number of retries after the initial attempt
const DEFAULT_MAX_RETRIES: usize = 2;

/// Default delay between attempts
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Address family a fetch task refreshes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    V4,
    V6,
}

impl Family {
    fn label(self) -> &'static str {
        match self {
            Family::V4 => "ipv4",
            Family::V6 => "ipv6",
        }
    }
}

/// HTTPS source of address-pool documents
///
/// Builder for the reload tasks of one provider. Endpoints are optional
/// per family; a source with both configured yields two tasks.
///
/// # Example
///
/// ```rust,no_run
/// use trustnet_provider_http::HttpPoolSource;
/// use trustnet_core::ProviderSpec;
///
/// let source = HttpPoolSource::new()
///     .with_ipv4_url("https://provider.example/ips-v4.json")
///     .with_ipv6_url("https://provider.example/ips-v6.json");
///
/// let spec = ProviderSpec::new("searchbot").with_reload_tasks(source.tasks());
/// ```
pub struct HttpPoolSource {
    ipv4_url: Option<String>,
    ipv6_url: Option<String>,
    max_retries: usize,
    retry_delay: Duration,
    client: reqwest::Client,
}

impl HttpPoolSource {
    /// Create a source with no endpoints and default policy
    pub fn new() -> Self {
        Self {
            ipv4_url: None,
            ipv6_url: None,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY,
            client: reqwest::Client::builder()
                .timeout(DEFAULT_HTTP_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Set the IPv4 document endpoint
    pub fn with_ipv4_url(mut self, url: impl Into<String>) -> Self {
        self.ipv4_url = Some(url.into());
        self
    }

    /// Set the IPv6 document endpoint
    pub fn with_ipv6_url(mut self, url: impl Into<String>) -> Self {
        self.ipv6_url = Some(url.into());
        self
    }

    /// Override the retry policy
    pub fn with_retry(mut self, max_retries: usize, retry_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay;
        self
    }

    /// Build the independent reload tasks, one per configured endpoint
    pub fn tasks(&self) -> Vec<Arc<dyn ReloadTask>> {
        let mut tasks: Vec<Arc<dyn ReloadTask>> = Vec::new();
        if let Some(url) = &self.ipv4_url {
            tasks.push(Arc::new(self.fetch_task(url.clone(), Family::V4)));
        }
        if let Some(url) = &self.ipv6_url {
            tasks.push(Arc::new(self.fetch_task(url.clone(), Family::V6)));
        }
        tasks
    }

    fn fetch_task(&self, url: String, family: Family) -> FetchPoolTask {
        FetchPoolTask {
            client: self.client.clone(),
            url,
            family,
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
        }
    }
}

impl Default for HttpPoolSource {
    fn default() -> Self {
        Self::new()
    }
}

/// One family's fetch: GET the document, parse it, retry transient
/// failures with bounded linear backoff
struct FetchPoolTask {
    client: reqwest::Client,
    url: String,
    family: Family,
    max_retries: usize,
    retry_delay: Duration,
}

impl FetchPoolTask {
    async fn fetch(&self) -> Result<AddressPool> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::provider("http", format!("request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::provider(
                "http",
                format!("HTTP error: {}", response.status()),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::provider("http", format!("body read failed: {}", e)))?;

        let pool: AddressPool = serde_json::from_str(&body)?;
        debug!(
            url = %self.url,
            addresses = pool.addresses.len(),
            ranges = pool.ranges.len(),
            "fetched address-pool document"
        );
        Ok(pool)
    }
}

#[async_trait]
impl ReloadTask for FetchPoolTask {
    fn label(&self) -> &str {
        self.family.label()
    }

    async fn run(&self) -> Result<PoolUpdate> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            match self.fetch().await {
                Ok(pool) => {
                    return Ok(match self.family {
                        Family::V4 => PoolUpdate::Ipv4(pool),
                        Family::V6 => PoolUpdate::Ipv6(pool),
                    });
                }
                Err(e) => {
                    warn!(url = %self.url, attempt, error = %e, "pool fetch attempt failed");
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(last_error
            .unwrap_or_else(|| Error::provider("http", format!("fetch failed: {}", self.url))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_follow_configured_endpoints() {
        let source = HttpPoolSource::new();
        assert!(source.tasks().is_empty());

        let source = HttpPoolSource::new().with_ipv4_url("https://example.test/v4.json");
        let tasks = source.tasks();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].label(), "ipv4");

        let source = HttpPoolSource::new()
            .with_ipv4_url("https://example.test/v4.json")
            .with_ipv6_url("https://example.test/v6.json");
        let labels: Vec<_> = source.tasks().iter().map(|t| t.label().to_string()).collect();
        assert_eq!(labels, vec!["ipv4", "ipv6"]);
    }

    #[test]
    fn document_parses_into_a_pool() {
        let pool: AddressPool = serde_json::from_str(
            r#"{ "addresses": ["198.51.100.1"], "ranges": ["203.0.113.0/24"] }"#,
        )
        .unwrap();
        assert_eq!(pool.addresses, vec!["198.51.100.1".to_string()]);
        assert_eq!(pool.ranges, vec!["203.0.113.0/24".to_string()]);
    }

    #[test]
    fn document_fields_are_optional() {
        let pool: AddressPool =
            serde_json::from_str(r#"{ "ranges": ["203.0.113.0/24"] }"#).unwrap();
        assert!(pool.addresses.is_empty());
        assert_eq!(pool.ranges.len(), 1);
    }

    #[tokio::test]
    async fn invalid_endpoint_reports_provider_error() {
        // Malformed URL fails at request build time; no I/O happens.
        let source = HttpPoolSource::new()
            .with_ipv4_url("not a url")
            .with_retry(0, Duration::from_millis(1));
        let tasks = source.tasks();

        let err = tasks[0].run().await.unwrap_err();
        assert!(matches!(err, Error::Provider { .. }));
    }
}
