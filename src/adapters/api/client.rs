//! Gateway HTTP Client - Rate-limited REST API Client
//!
//! Wraps reqwest with a token-bucket rate limiter, concurrency cap,
//! retries, and HMAC authentication for all marketplace gateway
//! interactions.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::MarketplaceConfig;

use super::auth::GatewayAuth;
use super::types::{ApiError, RateLimitInfo};

/// Configuration for the gateway HTTP client.
#[derive(Debug, Clone)]
pub struct GatewayClientConfig {
  /// Base URL for the gateway API.
  pub base_url: String,
  /// Request timeout.
  pub timeout: Duration,
  /// Requests allowed per minute (token bucket).
  pub max_per_minute: u32,
  /// Maximum concurrent requests.
  pub max_concurrent: usize,
  /// Maximum retries on transient errors.
  pub max_retries: u32,
  /// Base delay between retries (exponential backoff).
  pub retry_base_delay: Duration,
}

impl GatewayClientConfig {
  pub fn from_config(config: &MarketplaceConfig) -> Self {
    Self {
      base_url: config.base_url.clone(),
      timeout: Duration::from_secs(config.timeout_seconds),
      max_per_minute: config.max_requests_per_minute,
      max_concurrent: config.max_concurrent_requests,
      max_retries: config.retry_max,
      retry_base_delay: Duration::from_millis(config.retry_base_delay_ms),
    }
  }
}

/// Prefer the gateway's structured error message when the body parses
/// as its error shape; otherwise surface the raw body.
fn error_detail(body: String) -> String {
  serde_json::from_str::<ApiError>(&body)
    .map(|e| e.error)
    .unwrap_or(body)
}

/// Rate-limited HTTP client for the marketplace gateway API.
pub struct GatewayClient {
  /// Underlying HTTP client.
  http: Client,
  /// Authentication manager.
  auth: Arc<GatewayAuth>,
  /// Client configuration.
  config: GatewayClientConfig,
  /// Token-bucket limiter for the per-minute quota.
  limiter: DefaultDirectRateLimiter,
  /// Concurrency limiter.
  semaphore: Arc<Semaphore>,
  /// Last known rate limit info from response headers.
  last_rate_limit: tokio::sync::RwLock<Option<RateLimitInfo>>,
}

impl GatewayClient {
  /// Create a new gateway client.
  pub fn new(auth: Arc<GatewayAuth>, config: GatewayClientConfig) -> Result<Self> {
    let http = Client::builder()
      .timeout(config.timeout)
      .pool_max_idle_per_host(5)
      .build()
      .context("Failed to build HTTP client")?;

    let quota = NonZeroU32::new(config.max_per_minute)
      .context("max_requests_per_minute must be positive")?;
    let limiter = RateLimiter::direct(Quota::per_minute(quota));
    let semaphore = Arc::new(Semaphore::new(config.max_concurrent));

    Ok(Self {
      http,
      auth,
      config,
      limiter,
      semaphore,
      last_rate_limit: tokio::sync::RwLock::new(None),
    })
  }

  /// Execute a GET request with auth headers and rate limiting.
  pub async fn get(&self, path: &str) -> Result<Response> {
    let url = format!("{}{}", self.config.base_url, path);
    let request = self.http.get(&url);
    self.execute_with_retry(request, "GET", path, "").await
  }

  /// Execute a POST request with auth headers and rate limiting.
  pub async fn post(&self, path: &str, body: &str) -> Result<Response> {
    let url = format!("{}{}", self.config.base_url, path);
    let request = self
      .http
      .post(&url)
      .header("Content-Type", "application/json")
      .body(body.to_string());
    self.execute_with_retry(request, "POST", path, body).await
  }

  /// Execute a DELETE request with auth headers and rate limiting.
  pub async fn delete(&self, path: &str) -> Result<Response> {
    let url = format!("{}{}", self.config.base_url, path);
    let request = self.http.delete(&url);
    self.execute_with_retry(request, "DELETE", path, "").await
  }

  /// Execute request with authentication, rate limiting, and retries.
  ///
  /// The signature is recomputed per attempt so retried requests carry
  /// a fresh timestamp.
  async fn execute_with_retry(
    &self,
    request: RequestBuilder,
    method: &str,
    path: &str,
    body: &str,
  ) -> Result<Response> {
    let _permit = self
      .semaphore
      .acquire()
      .await
      .context("Semaphore closed")?;

    let mut last_error = None;

    for attempt in 0..=self.config.max_retries {
      if attempt > 0 {
        let delay = self.config.retry_base_delay * 2u32.pow(attempt - 1);
        debug!(attempt, delay_ms = delay.as_millis(), "Retrying request");
        sleep(delay).await;
      }

      // Wait out the per-minute quota before each attempt.
      self.limiter.until_ready().await;

      let timestamp = GatewayAuth::timestamp();
      let signature = self.auth.sign(&timestamp, method, path, body);

      let req = request
        .try_clone()
        .context("Failed to clone request")?
        .header("X-API-KEY", self.auth.api_key())
        .header("X-TIMESTAMP", &timestamp)
        .header("X-SIGNATURE", signature);

      match req.send().await {
        Ok(response) => {
          self.update_rate_limit(&response).await;

          match response.status() {
            StatusCode::OK | StatusCode::CREATED => return Ok(response),
            StatusCode::TOO_MANY_REQUESTS => {
              warn!("Rate limited by gateway, backing off");
              sleep(Duration::from_secs(2)).await;
              last_error = Some(anyhow::anyhow!("Rate limited"));
              continue;
            }
            status if status.is_server_error() => {
              warn!(status = %status, "Server error, retrying");
              last_error = Some(anyhow::anyhow!("Server error: {status}"));
              continue;
            }
            status => {
              let body = response.text().await.unwrap_or_default();
              return Err(anyhow::anyhow!("API error {status}: {}", error_detail(body)));
            }
          }
        }
        Err(e) => {
          warn!(error = %e, attempt, "Request failed");
          last_error = Some(e.into());
          continue;
        }
      }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Max retries exceeded")))
  }

  /// Extract and cache rate limit info from response headers.
  async fn update_rate_limit(&self, response: &Response) {
    let remaining = response
      .headers()
      .get("x-ratelimit-remaining")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse().ok())
      .unwrap_or(self.config.max_per_minute);

    let reset = response
      .headers()
      .get("x-ratelimit-reset")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse().ok())
      .unwrap_or(0);

    let limit = response
      .headers()
      .get("x-ratelimit-limit")
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.parse().ok())
      .unwrap_or(self.config.max_per_minute);

    let info = RateLimitInfo {
      remaining,
      reset_ms: reset,
      limit,
    };

    let mut guard = self.last_rate_limit.write().await;
    *guard = Some(info);
  }

  /// Get the last known rate limit status.
  pub async fn rate_limit_status(&self) -> Option<RateLimitInfo> {
    let guard = self.last_rate_limit.read().await;
    guard.clone()
  }

  /// Check if the gateway is reachable.
  pub async fn health_check(&self) -> bool {
    self.get("/health").await.is_ok()
  }
}
