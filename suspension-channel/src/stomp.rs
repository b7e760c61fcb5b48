//! STOMP-over-WebSocket implementation of `ProtocolClient`

use std::time::Duration;

use stomp_client::{HeartBeat, SessionEvent, StompClient, StompConfig, StompHandle};
use tokio::task::JoinHandle;

use crate::config::ChannelConfig;
use crate::error::{ClientError, ConfigError};
use crate::transport::{ClientEvent, ClientFactory, EventSink, ProtocolClient};

impl TryFrom<&ChannelConfig> for StompConfig {
    type Error = ConfigError;

    fn try_from(config: &ChannelConfig) -> Result<Self, Self::Error> {
        let mut stomp = StompConfig::new(config.url()?)
            .with_heart_beat(HeartBeat::new(
                config.heartbeat_outgoing,
                config.heartbeat_incoming,
            ))
            .with_connect_timeout(config.connect_timeout)
            .with_disconnect_timeout(Duration::from_secs(2));

        if let Some(host) = &config.virtual_host {
            stomp = stomp.with_host(host.as_str());
        }
        stomp.login = config.login.clone();
        stomp.passcode = config.passcode.clone();

        Ok(stomp)
    }
}

/// `ClientFactory` producing `StompProtocolClient`s
#[derive(Debug, Clone, Copy, Default)]
pub struct StompClientFactory;

impl ClientFactory for StompClientFactory {
    fn create(&self, config: &ChannelConfig) -> Box<dyn ProtocolClient> {
        Box::new(StompProtocolClient::new(config.clone()))
    }
}

/// One STOMP session per client
///
/// `connect` spawns the session task plus a forwarder that maps its
/// events onto the channel's `EventSink`.
pub struct StompProtocolClient {
    config: ChannelConfig,
    session: Option<StompHandle>,
    forwarder: Option<JoinHandle<()>>,
}

impl StompProtocolClient {
    pub fn new(config: ChannelConfig) -> Self {
        Self {
            config,
            session: None,
            forwarder: None,
        }
    }
}

impl ProtocolClient for StompProtocolClient {
    fn connect(&mut self, sink: EventSink) -> Result<(), ClientError> {
        if self.session.is_some() {
            return Err(ClientError::Protocol(
                "client already has a session".to_string(),
            ));
        }

        let stomp_config = StompConfig::try_from(&self.config)
            .map_err(|e| ClientError::Transport(e.to_string()))?;
        let (handle, mut events) = StompClient::new(stomp_config).spawn();

        self.forwarder = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if !sink.emit(translate(event)) {
                    tracing::trace!("Channel stopped, dropping STOMP events");
                    break;
                }
            }
        }));
        self.session = Some(handle);
        Ok(())
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), ClientError> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| ClientError::Transport("not connected".to_string()))?;
        let id = session.subscribe(topic)?;
        tracing::debug!("STOMP subscription {} for {}", id, topic);
        Ok(())
    }

    fn disconnect(&mut self) {
        if let Some(session) = self.session.take() {
            if session.disconnect().is_err() {
                tracing::trace!("STOMP session already finished");
            }
        }
    }
}

impl Drop for StompProtocolClient {
    fn drop(&mut self) {
        self.disconnect();
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

fn translate(event: SessionEvent) -> ClientEvent {
    match event {
        SessionEvent::Connected { version, server } => {
            tracing::debug!(
                "STOMP connected (version {:?}, server {:?})",
                version,
                server
            );
            ClientEvent::Connected
        }
        SessionEvent::Message {
            destination, body, ..
        } => ClientEvent::Message { destination, body },
        SessionEvent::TransportError(message) => ClientEvent::TransportError(message),
        SessionEvent::ProtocolError(message) => ClientEvent::ProtocolError(message),
        SessionEvent::Closed => ClientEvent::Closed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stomp_client::SubscriptionId;

    #[test]
    fn test_stomp_config_from_channel_config() {
        let config = ChannelConfig::new("wss://alerts.metro.example/ws")
            .with_heartbeat(Duration::from_secs(5), Duration::ZERO)
            .with_credentials("guest", "secret")
            .with_virtual_host("metro")
            .with_connect_timeout(Duration::from_secs(4));

        let stomp = StompConfig::try_from(&config).unwrap();
        assert_eq!(stomp.url.as_str(), "wss://alerts.metro.example/ws");
        assert_eq!(stomp.virtual_host(), "metro");
        assert_eq!(stomp.login.as_deref(), Some("guest"));
        assert_eq!(stomp.passcode.as_deref(), Some("secret"));
        assert_eq!(
            stomp.heart_beat,
            HeartBeat::new(Duration::from_secs(5), Duration::ZERO)
        );
        assert_eq!(stomp.connect_timeout, Duration::from_secs(4));
    }

    #[test]
    fn test_stomp_config_rejects_bad_url() {
        let config = ChannelConfig::new("http://alerts.metro.example");
        assert_eq!(
            StompConfig::try_from(&config).unwrap_err(),
            ConfigError::UnsupportedScheme("http".to_string())
        );
    }

    #[test]
    fn test_translate_events() {
        let event = translate(SessionEvent::Message {
            subscription: SubscriptionId::new("sub-0"),
            destination: "/topic/line-suspensions".to_string(),
            message_id: Some("m-1".to_string()),
            body: "{}".to_string(),
        });
        assert_eq!(
            event,
            ClientEvent::Message {
                destination: "/topic/line-suspensions".to_string(),
                body: "{}".to_string(),
            }
        );

        assert_eq!(translate(SessionEvent::Closed), ClientEvent::Closed);
        assert_eq!(
            translate(SessionEvent::ProtocolError("denied".to_string())),
            ClientEvent::ProtocolError("denied".to_string())
        );
    }

    #[test]
    fn test_subscribe_before_connect_fails() {
        let mut client = StompProtocolClient::new(ChannelConfig::default());
        assert!(matches!(
            client.subscribe("/topic/line-suspensions"),
            Err(ClientError::Transport(_))
        ));
    }
}
