//! Live feed configuration
//!
//! Loaded from environment variables:
//!
//! - `VYBE_API_KEY`: API key, required unless streaming is disabled
//! - `VYBE_WS_URL`: live endpoint (default `wss://api.vybenetwork.xyz/live`)
//! - `VYBE_API_BASE_URL`: REST base URL (default `https://api.vybenetwork.xyz`)
//! - `VYBE_STREAMING_ENABLED`: "false" or "0" turns the live connection off
//!   (default: enabled)
//! - `VYBE_RECONNECT_DELAY_SECS`: fixed reconnect delay (default 5)
//! - `VYBE_LIVE_SUBSCRIBE`: "true" or "1" sends venue selections on the open
//!   socket instead of at the next open (default: false)

use std::env;
use std::time::Duration;
use url::Url;

use crate::connection::DEFAULT_RECONNECT_DELAY;
use crate::error::ConfigError;
use crate::rest::VYBE_API_BASE_URL;
use crate::websocket::VYBE_WS_URL;

#[derive(Clone)]
pub struct LiveConfig {
    pub api_key: Option<String>,
    pub ws_url: String,
    pub api_base_url: String,
    pub streaming_enabled: bool,
    pub reconnect_delay: Duration,
    pub live_subscribe: bool,
}

impl std::fmt::Debug for LiveConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("ws_url", &self.ws_url)
            .field("api_base_url", &self.api_base_url)
            .field("streaming_enabled", &self.streaming_enabled)
            .field("reconnect_delay", &self.reconnect_delay)
            .field("live_subscribe", &self.live_subscribe)
            .finish()
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            ws_url: VYBE_WS_URL.to_string(),
            api_base_url: VYBE_API_BASE_URL.to_string(),
            streaming_enabled: true,
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            live_subscribe: false,
        }
    }
}

impl LiveConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_key = lookup("VYBE_API_KEY").filter(|k| !k.trim().is_empty());
        let ws_url = lookup("VYBE_WS_URL").unwrap_or(defaults.ws_url);
        let api_base_url = lookup("VYBE_API_BASE_URL").unwrap_or(defaults.api_base_url);

        let streaming_enabled = lookup("VYBE_STREAMING_ENABLED")
            .map(|v| !matches!(v.trim().to_lowercase().as_str(), "false" | "0"))
            .unwrap_or(defaults.streaming_enabled);

        let reconnect_delay = match lookup("VYBE_RECONNECT_DELAY_SECS") {
            Some(v) => v
                .trim()
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|_| {
                    ConfigError::Invalid(format!("VYBE_RECONNECT_DELAY_SECS: {:?}", v))
                })?,
            None => defaults.reconnect_delay,
        };

        let live_subscribe = lookup("VYBE_LIVE_SUBSCRIBE")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(defaults.live_subscribe);

        Ok(Self {
            api_key,
            ws_url,
            api_base_url,
            streaming_enabled,
            reconnect_delay,
            live_subscribe,
        })
    }

    /// Check cross-field requirements after any CLI overrides
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.streaming_enabled && self.api_key.is_none() {
            return Err(ConfigError::MissingEnvVar("VYBE_API_KEY".to_string()));
        }
        let ws_url = Url::parse(&self.ws_url)
            .map_err(|e| ConfigError::Invalid(format!("live URL {}: {}", self.ws_url, e)))?;
        if !matches!(ws_url.scheme(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "live URL must be ws:// or wss://, got {}",
                self.ws_url
            )));
        }
        Url::parse(&self.api_base_url).map_err(|e| {
            ConfigError::Invalid(format!("API base URL {}: {}", self.api_base_url, e))
        })?;
        Ok(())
    }
}
