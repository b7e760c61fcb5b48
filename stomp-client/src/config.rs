//! Session configuration

use std::time::Duration;
use url::Url;

use crate::error::{Result, StompError};
use crate::heartbeat::HeartBeat;

/// Configuration for one STOMP session
#[derive(Debug, Clone)]
pub struct StompConfig {
    /// WebSocket endpoint of the broker (`ws://` or `wss://`)
    pub url: Url,

    /// Virtual host sent in the CONNECT `host` header
    /// Default: the URL host
    pub host: Option<String>,

    pub login: Option<String>,
    pub passcode: Option<String>,

    /// Heart-beats this client offers and asks for
    /// Default: 10 seconds each way
    pub heart_beat: HeartBeat,

    /// Limit for the WebSocket upgrade plus CONNECT/CONNECTED exchange
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// How long a graceful disconnect waits for the broker's RECEIPT
    /// Default: 2 seconds
    pub disconnect_timeout: Duration,
}

impl StompConfig {
    pub fn new(url: Url) -> Self {
        Self {
            url,
            host: None,
            login: None,
            passcode: None,
            heart_beat: HeartBeat::new(Duration::from_secs(10), Duration::from_secs(10)),
            connect_timeout: Duration::from_secs(10),
            disconnect_timeout: Duration::from_secs(2),
        }
    }

    /// Parse the endpoint and build a default configuration
    pub fn parse(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| StompError::InvalidUrl(format!("{url}: {e}")))?;
        let config = Self::new(url);
        config.validate()?;
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }

    pub fn with_heart_beat(mut self, heart_beat: HeartBeat) -> Self {
        self.heart_beat = heart_beat;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
        self.disconnect_timeout = timeout;
        self
    }

    /// The value sent in the CONNECT `host` header
    pub fn virtual_host(&self) -> String {
        self.host
            .clone()
            .or_else(|| self.url.host_str().map(str::to_string))
            .unwrap_or_else(|| "/".to_string())
    }

    /// Check the configuration can open a session
    pub fn validate(&self) -> Result<()> {
        match self.url.scheme() {
            "ws" | "wss" => {}
            other => {
                return Err(StompError::InvalidUrl(format!(
                    "unsupported scheme '{other}', expected ws or wss"
                )))
            }
        }

        if self.url.host_str().is_none() {
            return Err(StompError::InvalidUrl(format!("{} has no host", self.url)));
        }

        if self.connect_timeout.is_zero() {
            return Err(StompError::InvalidUrl(
                "connect timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
