//! Vybe REST snapshot client
//!
//! Fallback for callers when live streaming is disabled: one request for the
//! most recent token trades, rendered as short display lines.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::RestError;

/// Default Vybe REST base URL
pub const VYBE_API_BASE_URL: &str = "https://api.vybenetwork.xyz";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const TRADES_PATH: &str = "/token/trades";
const SNAPSHOT_TRADES: usize = 3;

/// Bounded exponential backoff, applied to connect and timeout errors only
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Delay after failed attempt `attempt` (1-based): 2^(attempt-1) seconds,
    /// clamped to `[min_delay, max_delay]`
    pub fn delay(&self, attempt: u32) -> Duration {
        let exp = Duration::from_secs(1u64 << attempt.saturating_sub(1).min(32));
        exp.clamp(self.min_delay, self.max_delay)
    }
}

#[derive(Debug, Deserialize)]
struct TradesResponse {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Client for Vybe REST snapshot queries
pub struct SnapshotClient {
    http: Client,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl SnapshotClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, RestError> {
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, RestError> {
        self.http = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    /// Most recent trades rendered as
    /// `<base mint short> for <quote size> SOL at $<price>`
    pub async fn recent_trades(&self) -> Result<Vec<String>, RestError> {
        let body = self.get_with_retry(TRADES_PATH).await?;
        let response: TradesResponse =
            serde_json::from_value(body).map_err(|e| RestError::Json(e.to_string()))?;

        if let Some(error) = response.error {
            return Err(RestError::Json(format!("API returned error: {}", error)));
        }

        let trades: Vec<String> = response
            .data
            .iter()
            .take(SNAPSHOT_TRADES)
            .filter_map(|trade| {
                let line = render_trade(trade);
                if line.is_none() {
                    warn!(raw = %trade, "Skipping trade without display fields");
                }
                line
            })
            .collect();

        info!(count = trades.len(), "Fetched recent trades snapshot");
        Ok(trades)
    }

    async fn get_with_retry(&self, path: &str) -> Result<Value, RestError> {
        let mut attempt = 1;
        loop {
            match self.get_json(path).await {
                Err(RestError::Http(e))
                    if (e.is_connect() || e.is_timeout()) && attempt < self.retry.attempts =>
                {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Snapshot request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn get_json(&self, path: &str) -> Result<Value, RestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET request");

        let response = self
            .http
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .header("accept", "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RestError::Status { status, body });
        }

        response
            .json()
            .await
            .map_err(|e| RestError::Json(e.to_string()))
    }
}

fn render_trade(trade: &Value) -> Option<String> {
    let trade = trade.as_object()?;
    let mint = trade.get("baseMintAddress")?.as_str()?;
    let head: String = mint.chars().take(8).collect();
    Some(format!(
        "{}... for {} SOL at ${}",
        head,
        plain(trade, "quoteSize")?,
        plain(trade, "price")?
    ))
}

/// Strings unquoted, numbers as written
fn plain(trade: &Map<String, Value>, key: &str) -> Option<String> {
    match trade.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            attempts: 3,
            min_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
        }
    }

    async fn setup() -> (MockServer, SnapshotClient) {
        let server = MockServer::start().await;
        let client = SnapshotClient::new(&server.uri(), "test-api-key")
            .unwrap()
            .with_retry(fast_retry());
        (server, client)
    }

    #[test]
    fn test_default_retry_delays() {
        let retry = RetryPolicy::default();
        assert_eq!(retry.delay(1), Duration::from_secs(2));
        assert_eq!(retry.delay(2), Duration::from_secs(2));
        assert_eq!(retry.delay(3), Duration::from_secs(4));
        assert_eq!(retry.delay(5), Duration::from_secs(10));
        assert_eq!(retry.delay(40), Duration::from_secs(10));
    }

    #[test]
    fn test_client_strips_trailing_slash() {
        let client = SnapshotClient::new("http://localhost:3000/", "k").unwrap();
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_render_trade() {
        let trade = json!({
            "baseMintAddress": "DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263",
            "quoteSize": "1.25",
            "price": 0.0000213
        });
        assert_eq!(
            render_trade(&trade).unwrap(),
            "DezXAZ8z... for 1.25 SOL at $0.0000213"
        );
        assert!(render_trade(&json!({"price": 1})).is_none());
    }

    #[tokio::test]
    async fn test_recent_trades_renders_first_three() {
        let (server, client) = setup().await;

        let trade = |mint: &str| json!({"baseMintAddress": mint, "quoteSize": 2, "price": "0.5"});
        Mock::given(method("GET"))
            .and(path("/token/trades"))
            .and(header("X-API-KEY", "test-api-key"))
            .and(header("accept", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [
                    trade("AAAAAAAAAAAA"),
                    trade("BBBBBBBBBBBB"),
                    trade("CCCCCCCCCCCC"),
                    trade("DDDDDDDDDDDD"),
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let trades = client.recent_trades().await.unwrap();
        assert_eq!(
            trades,
            vec![
                "AAAAAAAA... for 2 SOL at $0.5",
                "BBBBBBBB... for 2 SOL at $0.5",
                "CCCCCCCC... for 2 SOL at $0.5",
            ]
        );
    }

    #[tokio::test]
    async fn test_recent_trades_empty() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/token/trades"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        assert!(client.recent_trades().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_body_is_an_error() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/token/trades"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"error": "rate limited"})),
            )
            .mount(&server)
            .await;

        assert!(matches!(
            client.recent_trades().await,
            Err(RestError::Json(_))
        ));
    }

    #[tokio::test]
    async fn test_status_error_not_retried() {
        let (server, client) = setup().await;

        Mock::given(method("GET"))
            .and(path("/token/trades"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        match client.recent_trades().await {
            Err(RestError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Status error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_retried_up_to_attempts() {
        let (server, client) = setup().await;
        let client = client.with_timeout(Duration::from_millis(50)).unwrap();

        Mock::given(method("GET"))
            .and(path("/token/trades"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .expect(3)
            .mount(&server)
            .await;

        match client.recent_trades().await {
            Err(RestError::Http(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got: {:?}", other),
        }
    }
}
