//! Transport session task
//!
//! Owns the WebSocket for one STOMP session: handshake, subscriptions,
//! inbound dispatch, heart-beats in both directions and the goodbye.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use uuid::Uuid;

use crate::client::{SessionCommand, SessionEvent, SubscriptionId};
use crate::config::StompConfig;
use crate::error::{Result, StompError};
use crate::frame::{Command, Frame, Inbound};
use crate::heartbeat::{HeartBeat, Negotiated};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Missing this many expected heart-beat periods ends the session
const HEART_BEAT_TOLERANCE: u32 = 2;

enum Flow {
    Continue,
    Stop,
}

struct Session {
    sink: SplitSink<WsStream, Message>,
    source: SplitStream<WsStream>,
    heart_beat: Negotiated,
    subscriptions: HashMap<SubscriptionId, String>,
}

/// Session task entry point
pub(crate) async fn run(
    config: StompConfig,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    events: mpsc::UnboundedSender<SessionEvent>,
) {
    let (session, connected) = match Session::open(&config).await {
        Ok(opened) => opened,
        Err(e) => {
            tracing::warn!("STOMP handshake with {} failed: {}", config.url, e);
            let _ = events.send(SessionEvent::from_error(e));
            return;
        }
    };

    tracing::info!("STOMP session connected to {}", config.url);
    if events.send(connected).is_err() {
        tracing::debug!("Event receiver dropped before session started");
        return;
    }

    session.serve(&config, &mut commands, &events).await;
}

impl Session {
    async fn open(config: &StompConfig) -> Result<(Self, SessionEvent)> {
        config.validate()?;
        let limit = config.connect_timeout;
        time::timeout(limit, Self::handshake(config))
            .await
            .map_err(|_| StompError::HandshakeTimeout(limit))?
    }

    async fn handshake(config: &StompConfig) -> Result<(Self, SessionEvent)> {
        let (ws, _response) = connect_async(config.url.as_str())
            .await
            .map_err(|e| StompError::Transport(e.to_string()))?;
        let (mut sink, mut source) = ws.split();

        let mut connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", config.virtual_host())
            .header("heart-beat", config.heart_beat.to_header());
        if let Some(login) = &config.login {
            connect = connect.header("login", login.as_str());
        }
        if let Some(passcode) = &config.passcode {
            connect = connect.header("passcode", passcode.as_str());
        }

        sink.send(Message::Text(connect.encode()))
            .await
            .map_err(|e| StompError::Transport(e.to_string()))?;

        loop {
            let message = source
                .next()
                .await
                .ok_or_else(|| {
                    StompError::Transport("connection closed during handshake".to_string())
                })?
                .map_err(|e| StompError::Transport(e.to_string()))?;

            let bytes = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => bytes,
                Message::Close(_) => {
                    return Err(StompError::Transport(
                        "broker closed the socket during handshake".to_string(),
                    ))
                }
                _ => continue,
            };

            let frame = match Frame::decode(&bytes)? {
                Inbound::HeartBeat => continue,
                Inbound::Frame(frame) => frame,
            };

            match frame.command {
                Command::Connected => {
                    let server_beat = frame
                        .get("heart-beat")
                        .map(HeartBeat::parse)
                        .transpose()?
                        .unwrap_or_default();
                    let heart_beat = config.heart_beat.negotiate(&server_beat);
                    tracing::debug!("Negotiated heart-beat: {:?}", heart_beat);

                    let connected = SessionEvent::Connected {
                        version: frame.get("version").map(str::to_string),
                        server: frame.get("server").map(str::to_string),
                    };

                    return Ok((
                        Self {
                            sink,
                            source,
                            heart_beat,
                            subscriptions: HashMap::new(),
                        },
                        connected,
                    ));
                }
                Command::Error => return Err(StompError::Rejected(error_text(&frame))),
                other => return Err(StompError::UnexpectedFrame(other.to_string())),
            }
        }
    }

    async fn serve(
        mut self,
        config: &StompConfig,
        commands: &mut mpsc::UnboundedReceiver<SessionCommand>,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) {
        let mut beat = self.heart_beat.send_every.map(|period| {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });
        let silence_limit = self
            .heart_beat
            .expect_every
            .map(|period| period * HEART_BEAT_TOLERANCE);
        let mut last_inbound = Instant::now();

        loop {
            let deadline = silence_limit.map(|limit| last_inbound + limit);

            tokio::select! {
                command = commands.recv() => match command {
                    Some(SessionCommand::Subscribe { id, destination }) => {
                        if let Err(e) = self.subscribe(id, destination).await {
                            let _ = events.send(SessionEvent::from_error(e));
                            return;
                        }
                    }
                    Some(SessionCommand::Unsubscribe { id }) => {
                        if let Err(e) = self.unsubscribe(&id).await {
                            let _ = events.send(SessionEvent::from_error(e));
                            return;
                        }
                    }
                    Some(SessionCommand::Disconnect) | None => {
                        self.close(config.disconnect_timeout).await;
                        let _ = events.send(SessionEvent::Closed);
                        return;
                    }
                },

                message = self.source.next() => match message {
                    Some(Ok(message)) => {
                        last_inbound = Instant::now();
                        if let Flow::Stop = self.handle_message(message, events) {
                            return;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {}", e);
                        let _ = events.send(SessionEvent::TransportError(e.to_string()));
                        return;
                    }
                    None => {
                        tracing::info!("Broker closed the WebSocket");
                        let _ = events.send(SessionEvent::Closed);
                        return;
                    }
                },

                _ = next_beat(&mut beat) => {
                    if let Err(e) = self.sink.send(Message::Text("\n".to_string())).await {
                        let _ = events.send(SessionEvent::TransportError(e.to_string()));
                        return;
                    }
                }

                _ = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    let limit = silence_limit.unwrap_or_default();
                    tracing::warn!("No data from broker for {:?}, dropping session", limit);
                    let _ = events.send(SessionEvent::TransportError(format!(
                        "heart-beat timeout: nothing received for {limit:?}"
                    )));
                    return;
                }
            }
        }
    }

    fn handle_message(
        &mut self,
        message: Message,
        events: &mpsc::UnboundedSender<SessionEvent>,
    ) -> Flow {
        let bytes = match message {
            Message::Text(text) => text.into_bytes(),
            Message::Binary(bytes) => bytes,
            Message::Close(reason) => {
                tracing::info!("Broker sent close: {:?}", reason);
                let _ = events.send(SessionEvent::Closed);
                return Flow::Stop;
            }
            // Ping/pong are answered by tungstenite
            _ => return Flow::Continue,
        };

        let frame = match Frame::decode(&bytes) {
            Ok(Inbound::HeartBeat) => {
                tracing::trace!("Heart-beat from broker");
                return Flow::Continue;
            }
            Ok(Inbound::Frame(frame)) => frame,
            Err(e) => {
                tracing::warn!("Dropping undecodable frame: {}", e);
                return Flow::Continue;
            }
        };

        match frame.command {
            Command::Message => {
                let Some(subscription) = frame.get("subscription").map(SubscriptionId::new) else {
                    tracing::warn!("MESSAGE without subscription header dropped");
                    return Flow::Continue;
                };
                if !self.subscriptions.contains_key(&subscription) {
                    tracing::debug!("MESSAGE for unknown subscription {} dropped", subscription);
                    return Flow::Continue;
                }

                let destination = frame.get("destination").unwrap_or_default().to_string();
                let message_id = frame.get("message-id").map(str::to_string);
                let _ = events.send(SessionEvent::Message {
                    subscription,
                    destination,
                    message_id,
                    body: frame.body,
                });
                Flow::Continue
            }
            Command::Receipt => {
                tracing::trace!("RECEIPT {:?}", frame.get("receipt-id"));
                Flow::Continue
            }
            Command::Error => {
                let text = error_text(&frame);
                tracing::warn!("Broker sent ERROR: {}", text);
                let _ = events.send(SessionEvent::ProtocolError(text));
                Flow::Stop
            }
            other => {
                tracing::debug!("Ignoring unexpected {} frame", other);
                Flow::Continue
            }
        }
    }

    async fn subscribe(&mut self, id: SubscriptionId, destination: String) -> Result<()> {
        let frame = Frame::new(Command::Subscribe)
            .header("id", id.as_str())
            .header("destination", destination.as_str())
            .header("ack", "auto");
        self.send(frame).await?;

        tracing::debug!("Subscribed {} to {}", id, destination);
        self.subscriptions.insert(id, destination);
        Ok(())
    }

    async fn unsubscribe(&mut self, id: &SubscriptionId) -> Result<()> {
        if self.subscriptions.remove(id).is_none() {
            tracing::debug!("Unsubscribe for unknown subscription {}", id);
            return Ok(());
        }
        self.send(Frame::new(Command::Unsubscribe).header("id", id.as_str()))
            .await
    }

    /// UNSUBSCRIBE everything, DISCONNECT with a receipt, then close
    async fn close(&mut self, wait: Duration) {
        let ids: Vec<SubscriptionId> = self.subscriptions.drain().map(|(id, _)| id).collect();
        for id in ids {
            let frame = Frame::new(Command::Unsubscribe).header("id", id.as_str());
            if self.send(frame).await.is_err() {
                return;
            }
        }

        let receipt = format!("disconnect-{}", Uuid::new_v4().simple());
        let goodbye = Frame::new(Command::Disconnect).header("receipt", receipt.as_str());
        if self.send(goodbye).await.is_ok()
            && time::timeout(wait, self.await_receipt(&receipt)).await.is_err()
        {
            tracing::debug!("No RECEIPT for DISCONNECT within {:?}", wait);
        }

        let _ = self.sink.close().await;
    }

    async fn await_receipt(&mut self, receipt: &str) {
        while let Some(Ok(message)) = self.source.next().await {
            let bytes = match message {
                Message::Text(text) => text.into_bytes(),
                Message::Binary(bytes) => bytes,
                Message::Close(_) => return,
                _ => continue,
            };
            if let Ok(Inbound::Frame(frame)) = Frame::decode(&bytes) {
                if frame.command == Command::Receipt && frame.get("receipt-id") == Some(receipt) {
                    return;
                }
            }
        }
    }

    async fn send(&mut self, frame: Frame) -> Result<()> {
        tracing::trace!("-> {}", frame);
        self.sink
            .send(Message::Text(frame.encode()))
            .await
            .map_err(|e| StompError::Transport(e.to_string()))
    }
}

async fn next_beat(beat: &mut Option<Interval>) {
    match beat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

/// Human-readable text of an ERROR frame
fn error_text(frame: &Frame) -> String {
    let message = frame.get("message").unwrap_or_default();
    let body = frame.body.trim();
    match (message.is_empty(), body.is_empty()) {
        (false, false) => format!("{message}: {body}"),
        (false, true) => message.to_string(),
        (true, false) => body.to_string(),
        (true, true) => "unspecified broker error".to_string(),
    }
}
