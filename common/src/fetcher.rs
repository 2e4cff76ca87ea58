// Upstream queue-status fetcher
//
// Each call may leave through a different egress identity: with a proxy configured,
// a fresh client is built per call with a random session id in the proxy username.

use crate::config::{ProxyConfig, UpstreamConfig};
use crate::errors::FetchError;
use crate::models::QueueStatus;
use async_trait::async_trait;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use std::time::Duration;

/// Source of queue-status snapshots
#[async_trait]
pub trait QueueFetcher: Send + Sync {
    async fn fetch(&self) -> Result<QueueStatus, FetchError>;
}

/// Proxy URL template with a per-call random session id
#[derive(Debug, Clone)]
pub struct ProxyTemplate {
    username: String,
    password: String,
    address: String,
    port: String,
}

impl ProxyTemplate {
    pub fn new(config: &ProxyConfig) -> Self {
        Self {
            username: config.username.clone(),
            password: config.password.clone(),
            address: config.address.clone(),
            port: config.port.clone(),
        }
    }

    /// Build the proxy URL for a given session id
    pub fn url_for_session(&self, session_id: u32) -> String {
        let session = session_id.to_string();
        let username = self
            .username
            .replace("{session}", &session)
            .replacen("%s", &session, 1);
        format!(
            "http://{}:{}@{}:{}",
            username, self.password, self.address, self.port
        )
    }

    /// Build the proxy URL for a fresh random session id in `[0, 1_000_000)`
    pub fn random_url(&self) -> String {
        let session_id = rand::thread_rng().gen_range(0..1_000_000);
        self.url_for_session(session_id)
    }
}

/// Replace the password of a proxy URL with `***` for logging
pub fn mask_proxy_url(proxy_url: &str) -> String {
    match Url::parse(proxy_url) {
        Ok(mut url) => {
            if url.password().is_some() {
                // Only fails for cannot-be-a-base URLs, which never carry credentials
                let _ = url.set_password(Some("***"));
            }
            url.to_string()
        }
        Err(_) => "invalid-proxy-url".to_string(),
    }
}

/// HTTP fetcher for the DUW queue-status endpoint
pub struct HttpQueueFetcher {
    url: String,
    timeout: Duration,
    headers: HeaderMap,
    proxy: Option<ProxyTemplate>,
    direct_client: Client,
}

impl HttpQueueFetcher {
    pub fn new(config: &UpstreamConfig) -> Result<Self, FetchError> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let headers = default_headers(&config.user_agent)?;

        let direct_client = Client::builder()
            .timeout(timeout)
            .default_headers(headers.clone())
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self {
            url: config.url.clone(),
            timeout,
            headers,
            proxy: config.proxy.as_ref().map(ProxyTemplate::new),
            direct_client,
        })
    }

    fn client_for_call(&self) -> Result<Client, FetchError> {
        let Some(template) = &self.proxy else {
            return Ok(self.direct_client.clone());
        };

        let proxy_url = template.random_url();
        tracing::info!(proxy = %mask_proxy_url(&proxy_url), "Using proxy");

        let proxy =
            reqwest::Proxy::all(&proxy_url).map_err(|e| FetchError::Proxy(e.to_string()))?;

        Client::builder()
            .timeout(self.timeout)
            .default_headers(self.headers.clone())
            .proxy(proxy)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))
    }
}

fn default_headers(user_agent: &str) -> Result<HeaderMap, FetchError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        USER_AGENT,
        HeaderValue::from_str(user_agent)
            .map_err(|e| FetchError::Client(format!("Invalid user agent: {}", e)))?,
    );
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/html, */*"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    Ok(headers)
}

#[async_trait]
impl QueueFetcher for HttpQueueFetcher {
    #[tracing::instrument(skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<QueueStatus, FetchError> {
        let client = self.client_for_call()?;

        let response = client.get(&self.url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::UnexpectedStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let queue_status: QueueStatus =
            serde_json::from_slice(&body).map_err(|e| FetchError::Decode(e.to_string()))?;

        tracing::debug!(
            locations = queue_status.result.len(),
            observations = queue_status.len(),
            "Queue status fetched"
        );
        Ok(queue_status)
    }
}
