use crate::core::errors::ExchangeError;
use crate::core::kernel::rate_limiter::RateLimiter;
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tracing::{instrument, trace};

/// REST client trait for making rate-limited HTTP requests
///
/// Exchanges that speak JSON over POST (both Hyperliquid endpoints do) only
/// need these two calls. Every call consumes one token from the client's
/// shared rate limiter before touching the network.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Make a POST request
    ///
    /// # Arguments
    /// * `endpoint` - The API endpoint path
    /// * `body` - Request body as JSON value
    ///
    /// # Returns
    /// The response body as a JSON value
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ExchangeError>;

    /// Make a POST request with strongly-typed response
    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, ExchangeError>;
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
    /// Token-bucket capacity per rolling minute
    pub requests_per_minute: u32,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url,
            exchange_name,
            timeout_seconds: 30,
            user_agent: "LotusX/1.0".to_string(),
            requests_per_minute: crate::core::config::DEFAULT_REQUESTS_PER_MINUTE,
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl RestClientBuilder {
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            limiter: None,
        }
    }

    /// Share an existing limiter instead of creating one from the config
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Build the REST client
    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let limiter = match self.limiter {
            Some(limiter) => limiter,
            None => {
                let capacity = NonZeroU32::new(self.config.requests_per_minute).ok_or_else(|| {
                    ExchangeError::invalid("requests_per_minute must be greater than zero")
                })?;
                Arc::new(RateLimiter::per_minute(capacity))
            }
        };

        // one pooled client, reused for every call
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| ExchangeError::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            limiter,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    limiter: Arc<RateLimiter>,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("limiter", &self.limiter)
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn new(base_url: String, exchange_name: String) -> Result<Self, ExchangeError> {
        RestClientBuilder::new(RestClientConfig::new(base_url, exchange_name)).build()
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn build_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), endpoint)
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        if status.is_success() {
            serde_json::from_str(&response_text).map_err(|e| {
                ExchangeError::decode(format!("Failed to parse JSON response: {}", e))
            })
        } else {
            Err(ExchangeError::RequestError {
                status: status.as_u16(),
                body: response_text,
            })
        }
    }

    #[instrument(skip(self, body), fields(exchange = %self.config.exchange_name, endpoint = %endpoint))]
    async fn make_request(&self, endpoint: &str, body: Vec<u8>) -> Result<Value, ExchangeError> {
        self.limiter.acquire().await;

        let response = self
            .client
            .post(self.build_url(endpoint))
            .header("Content-Type", "application/json")
            .body(body)
            .send()
            .await
            .map_err(ExchangeError::from)?;

        self.handle_response(response).await
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    async fn post(&self, endpoint: &str, body: &Value) -> Result<Value, ExchangeError> {
        let body_bytes = serde_json::to_vec(body).map_err(|e| {
            ExchangeError::encoding(format!("Failed to serialize request body: {}", e))
        })?;

        self.make_request(endpoint, body_bytes).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Value,
    ) -> Result<T, ExchangeError> {
        self.post(endpoint, body).await.and_then(|value| {
            serde_json::from_value(value)
                .map_err(|e| ExchangeError::decode(format!("Failed to deserialize JSON: {}", e)))
        })
    }
}
