//! Configuration for the suspension channel
//!
//! Controls which broker and topic the channel subscribes to, how long an
//! alert stays current and the session timing handed to the STOMP client.

use std::time::Duration;

use url::Url;

use crate::error::ConfigError;

/// Topic suspension broadcasts are published to
pub const DEFAULT_TOPIC: &str = "/topic/line-suspensions";

/// Broker endpoint used when nothing else is configured
pub const DEFAULT_BROKER_URL: &str = "ws://localhost:8080/ws";

/// How long an alert is considered fresh
pub const DEFAULT_ALERT_TTL: Duration = Duration::from_millis(30_000);

/// Configuration for a `SuspensionChannel`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    /// WebSocket endpoint of the broker
    /// Default: ws://localhost:8080/ws
    pub broker_url: String,

    /// Topic carrying suspension broadcasts
    /// Default: /topic/line-suspensions
    pub topic: String,

    /// Time after which the current suspension is cleared
    /// Default: 30 seconds
    pub alert_ttl: Duration,

    /// Limit for the WebSocket upgrade and STOMP handshake
    /// Default: 10 seconds
    pub connect_timeout: Duration,

    /// Heart-beat interval offered to the broker (zero disables)
    /// Default: 10 seconds
    pub heartbeat_outgoing: Duration,

    /// Heart-beat interval requested from the broker (zero disables)
    /// Default: 10 seconds
    pub heartbeat_incoming: Duration,

    pub login: Option<String>,
    pub passcode: Option<String>,

    /// CONNECT `host` header; defaults to the URL host
    pub virtual_host: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            broker_url: DEFAULT_BROKER_URL.to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            alert_ttl: DEFAULT_ALERT_TTL,
            connect_timeout: Duration::from_secs(10),
            heartbeat_outgoing: Duration::from_secs(10),
            heartbeat_incoming: Duration::from_secs(10),
            login: None,
            passcode: None,
            virtual_host: None,
        }
    }
}

impl ChannelConfig {
    /// Default configuration pointed at `broker_url`
    pub fn new(broker_url: impl Into<String>) -> Self {
        Self {
            broker_url: broker_url.into(),
            ..Default::default()
        }
    }

    /// Build a configuration from `METRO_ALERTS_*` environment variables
    ///
    /// - `METRO_ALERTS_BROKER_URL`: broker endpoint
    /// - `METRO_ALERTS_TOPIC`: topic name
    /// - `METRO_ALERTS_TTL_MS`: alert lifetime in milliseconds
    /// - `METRO_ALERTS_LOGIN` / `METRO_ALERTS_PASSCODE`: broker credentials
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self::from_lookup(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load `METRO_ALERTS_*` values through `lookup` without validating
    ///
    /// Callers layering their own overrides on top run `validate` afterwards.
    /// Only an unparsable TTL is rejected here.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("METRO_ALERTS_BROKER_URL") {
            config.broker_url = url;
        }
        if let Some(topic) = lookup("METRO_ALERTS_TOPIC") {
            config.topic = topic;
        }
        if let Some(raw) = lookup("METRO_ALERTS_TTL_MS") {
            let millis: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "METRO_ALERTS_TTL_MS".to_string(),
                value: raw.clone(),
            })?;
            config.alert_ttl = Duration::from_millis(millis);
        }
        config.login = lookup("METRO_ALERTS_LOGIN");
        config.passcode = lookup("METRO_ALERTS_PASSCODE");

        Ok(config)
    }

    /// Short TTL and fast heart-beats, useful against a local broker
    pub fn development() -> Self {
        Self {
            alert_ttl: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            heartbeat_outgoing: Duration::from_secs(2),
            heartbeat_incoming: Duration::from_secs(2),
            ..Default::default()
        }
    }

    /// Parsed broker URL
    pub fn url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.broker_url).map_err(|e| ConfigError::InvalidUrl {
            url: self.broker_url.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::UnsupportedScheme(other.to_string())),
        }
    }

    /// Validate the configuration and return the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.url()?;

        if self.topic.trim().is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        if self.alert_ttl.is_zero() {
            return Err(ConfigError::ZeroDuration("alert_ttl"));
        }

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("connect_timeout"));
        }

        Ok(())
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    pub fn with_alert_ttl(mut self, ttl: Duration) -> Self {
        self.alert_ttl = ttl;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_heartbeat(mut self, outgoing: Duration, incoming: Duration) -> Self {
        self.heartbeat_outgoing = outgoing;
        self.heartbeat_incoming = incoming;
        self
    }

    pub fn with_credentials(mut self, login: impl Into<String>, passcode: impl Into<String>) -> Self {
        self.login = Some(login.into());
        self.passcode = Some(passcode.into());
        self
    }

    pub fn with_virtual_host(mut self, host: impl Into<String>) -> Self {
        self.virtual_host = Some(host.into());
        self
    }
}
