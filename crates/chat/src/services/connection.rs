//! Connection manager: one authenticated STOMP connection per chat room.
//!
//! Each [`ConnectionHandle`] owns a background task that performs the
//! handshake, subscribes to the room topic, keeps heart-beats flowing and
//! reconnects after unexpected drops. The task reports through
//! [`ConnectionEvent`]s; the handle is the only way to publish or close.

use std::future::{pending, Future};
use std::sync::Arc;
use std::time::Duration;

use orgchat_config::AppConfig;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};
use url::Url;
use uuid::Uuid;

use crate::services::MessageChannel;
use crate::stomp::{commands, Frame, Heartbeat, Negotiated};
use crate::transport::{Connector, Transport, TungsteniteConnector};
use crate::types::{ChatError, ChatResult, ConnectionEvent, RoomId};
use crate::utils::Validator;

/// Id of the single room subscription a connection holds.
pub const SUBSCRIPTION_ID: &str = "sub-0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Connected,
    Closed,
}

/// Everything a connection needs to reach the broker.
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    pub socket_url: Url,
    /// Value of the STOMP `host` header
    pub host: String,
    pub topic_prefix: String,
    pub publish_destination: String,
    pub heartbeat: Heartbeat,
    /// `None` disables reconnection
    pub reconnect_delay: Option<Duration>,
    pub connect_timeout: Duration,
    /// Events buffered for the handle before the worker stops reading
    /// the socket
    pub event_buffer: usize,
}

impl ConnectionSettings {
    pub fn new(socket_url: Url) -> ChatResult<Self> {
        let host = socket_url
            .host_str()
            .ok_or_else(|| ChatError::configuration("socket URL has no host"))?
            .to_string();

        Ok(Self {
            socket_url,
            host,
            topic_prefix: "/topic/chat-room".to_string(),
            publish_destination: "/app/chat".to_string(),
            heartbeat: Heartbeat::from_millis(4000, 4000),
            reconnect_delay: Some(Duration::from_secs(5)),
            connect_timeout: Duration::from_secs(10),
            event_buffer: 256,
        })
    }

    pub fn from_config(config: &AppConfig) -> ChatResult<Self> {
        let socket_url = Url::parse(&config.server.socket_url())?;
        let stomp = &config.stomp;

        Ok(Self {
            topic_prefix: stomp.topic_prefix.clone(),
            publish_destination: stomp.publish_destination.clone(),
            heartbeat: Heartbeat::from_millis(
                stomp.heartbeat_outgoing_ms,
                stomp.heartbeat_incoming_ms,
            ),
            reconnect_delay: (stomp.reconnect_delay_ms > 0)
                .then(|| Duration::from_millis(stomp.reconnect_delay_ms)),
            connect_timeout: Duration::from_secs(stomp.connect_timeout_seconds),
            ..Self::new(socket_url)?
        })
    }

    /// Room-scoped topic, e.g. `/topic/chat-room/42`.
    pub fn topic_for(&self, room_id: RoomId) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), room_id)
    }
}

/// Opens connections. Cheap to clone.
#[derive(Clone)]
pub struct ConnectionManager {
    settings: Arc<ConnectionSettings>,
    connector: Arc<dyn Connector>,
}

impl ConnectionManager {
    pub fn new(settings: ConnectionSettings, connector: Arc<dyn Connector>) -> Self {
        Self {
            settings: Arc::new(settings),
            connector,
        }
    }

    /// Manager backed by real WebSockets.
    pub fn websocket(settings: ConnectionSettings) -> Self {
        Self::new(settings, Arc::new(TungsteniteConnector::new()))
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }

    /// Start connecting to `room_id`. Without a usable token this fails
    /// with [`ChatError::MissingCredential`] and nothing is spawned.
    pub fn open(&self, room_id: RoomId, token: Option<&str>) -> ChatResult<ConnectionHandle> {
        let token = match Validator::credential(token) {
            Ok(token) => token.to_string(),
            Err(err) => {
                warn!(room_id, "refusing to open chat connection without a token");
                return Err(err);
            }
        };

        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(self.settings.event_buffer.max(1));
        let (state_tx, _) = watch::channel(ConnectionState::Unconnected);
        let state = Arc::new(state_tx);

        let worker = Worker {
            id,
            topic: self.settings.topic_for(room_id),
            token,
            settings: Arc::clone(&self.settings),
            connector: Arc::clone(&self.connector),
            commands: command_rx,
            events: event_tx,
            state: Arc::clone(&state),
        };

        info!(connection_id = %id, room_id, topic = %worker.topic, "opening chat connection");
        tokio::spawn(worker.run());

        Ok(ConnectionHandle {
            id,
            room_id,
            commands: command_tx,
            events: event_rx,
            state,
            closed: false,
        })
    }
}

#[derive(Debug)]
enum Command {
    Send(String),
    Close,
}

/// One open connection. Closing (or dropping) it stops the worker.
pub struct ConnectionHandle {
    id: Uuid,
    room_id: RoomId,
    commands: mpsc::UnboundedSender<Command>,
    events: mpsc::Receiver<ConnectionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
    closed: bool,
}

impl ConnectionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn room_id(&self) -> RoomId {
        self.room_id
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Watch state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// Next event from the worker. Always `None` after [`close`](Self::close).
    pub async fn next_event(&mut self) -> Option<ConnectionEvent> {
        if self.closed {
            return None;
        }
        self.events.recv().await
    }

    /// Release the subscription and the socket. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let _ = self.commands.send(Command::Close);
        self.state.send_replace(ConnectionState::Closed);
        self.events.close();
        while self.events.try_recv().is_ok() {}

        debug!(connection_id = %self.id, room_id = self.room_id, "chat connection closed");
    }

    /// Hand a SEND body to the worker.
    pub(crate) fn transmit(&self, body: String) -> ChatResult<()> {
        if self.closed || !self.is_connected() {
            return Err(ChatError::NotConnected);
        }
        self.commands
            .send(Command::Send(body))
            .map_err(|_| ChatError::NotConnected)
    }
}

impl Drop for ConnectionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

enum Outcome {
    Closed,
    Lost,
    Rejected(ChatError),
}

struct Worker {
    id: Uuid,
    topic: String,
    token: String,
    settings: Arc<ConnectionSettings>,
    connector: Arc<dyn Connector>,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<ConnectionEvent>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Worker {
    async fn run(mut self) {
        loop {
            self.set_state(ConnectionState::Connecting);

            let attempt = until_closed(
                &mut self.commands,
                handshake(
                    self.connector.as_ref(),
                    &self.settings,
                    &self.token,
                    &self.topic,
                ),
            )
            .await;

            let outcome = match attempt {
                None => break,
                Some(Err(err)) => Outcome::Rejected(err),
                Some(Ok((transport, negotiated))) => {
                    self.set_state(ConnectionState::Connected);
                    info!(connection_id = %self.id, topic = %self.topic, "chat connection established");
                    self.emit(ConnectionEvent::Opened).await;
                    self.pump(transport, negotiated).await
                }
            };

            match outcome {
                Outcome::Closed => break,
                Outcome::Lost => {
                    warn!(connection_id = %self.id, "chat connection lost");
                    self.emit(ConnectionEvent::Dropped).await;
                }
                Outcome::Rejected(err) => {
                    error!(connection_id = %self.id, error = %err, "chat handshake failed");
                    self.emit(ConnectionEvent::Failed(err)).await;
                }
            }

            let Some(delay) = self.settings.reconnect_delay else {
                self.emit(ConnectionEvent::Closed).await;
                break;
            };

            self.set_state(ConnectionState::Connecting);
            debug!(connection_id = %self.id, delay_ms = delay.as_millis() as u64, "reconnecting");
            if until_closed(&mut self.commands, sleep(delay)).await.is_none() {
                break;
            }
        }

        self.set_state(ConnectionState::Closed);
        debug!(connection_id = %self.id, "connection worker stopped");
    }

    async fn pump(&mut self, mut transport: Box<dyn Transport>, negotiated: Negotiated) -> Outcome {
        let mut heartbeat = negotiated.send_every.map(|every| {
            let mut ticker = interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let deadline = negotiated.receive_deadline();
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Send(body)) => {
                        let frame = Frame::send(&self.settings.publish_destination, body);
                        trace!(connection_id = %self.id, "SEND");
                        if let Err(err) = transport.send(frame.encode()).await {
                            warn!(connection_id = %self.id, error = %err, "publish failed");
                            return Outcome::Lost;
                        }
                    }
                    Some(Command::Close) | None => {
                        shutdown(transport.as_mut()).await;
                        return Outcome::Closed;
                    }
                },
                inbound = transport.recv() => match inbound {
                    None => return Outcome::Lost,
                    Some(Err(err)) => {
                        warn!(connection_id = %self.id, error = %err, "socket error");
                        transport.close().await;
                        return Outcome::Lost;
                    }
                    Some(Ok(text)) => {
                        last_inbound = Instant::now();
                        match Frame::decode(&text) {
                            Ok(None) => trace!(connection_id = %self.id, "heart-beat received"),
                            Ok(Some(frame)) => {
                                if let Some(outcome) = self.dispatch(frame).await {
                                    transport.close().await;
                                    return outcome;
                                }
                            }
                            Err(err) => warn!(connection_id = %self.id, error = %err, "dropping malformed frame"),
                        }
                    }
                },
                _ = tick(heartbeat.as_mut()) => {
                    if transport.send("\n".to_string()).await.is_err() {
                        return Outcome::Lost;
                    }
                }
                _ = sleep_until_some(deadline.map(|limit| last_inbound + limit)) => {
                    warn!(connection_id = %self.id, "broker heart-beat missed");
                    transport.close().await;
                    return Outcome::Lost;
                }
            }
        }
    }

    async fn dispatch(&self, frame: Frame) -> Option<Outcome> {
        match frame.command.as_str() {
            commands::MESSAGE => {
                if frame.get_header("subscription") != Some(SUBSCRIPTION_ID) {
                    debug!(connection_id = %self.id, "ignoring message for another subscription");
                    return None;
                }
                match MessageChannel::decode(&frame.body) {
                    Ok(message) => self.emit(ConnectionEvent::Message(message)).await,
                    Err(err) => {
                        warn!(connection_id = %self.id, error = %err, "dropping undecodable chat message")
                    }
                }
                None
            }
            commands::ERROR => Some(Outcome::Rejected(ChatError::transport(format!(
                "broker error: {}",
                frame.error_summary()
            )))),
            other => {
                debug!(connection_id = %self.id, command = other, "ignoring frame");
                None
            }
        }
    }

    /// Waits while the handle's buffer is full, which stalls socket reads
    /// until the owner catches up. Closing the handle releases the wait.
    async fn emit(&self, event: ConnectionEvent) {
        if self.events.send(event).await.is_err() {
            trace!(connection_id = %self.id, "event receiver gone");
        }
    }

    /// Never overrides `Closed`, which only the handle sets.
    fn set_state(&self, next: ConnectionState) {
        self.state.send_if_modified(|current| {
            if *current == ConnectionState::Closed || *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}

async fn handshake(
    connector: &dyn Connector,
    settings: &ConnectionSettings,
    token: &str,
    topic: &str,
) -> ChatResult<(Box<dyn Transport>, Negotiated)> {
    let attempt = async {
        let mut transport = connector.connect(&settings.socket_url, token).await?;
        transport
            .send(Frame::connect(&settings.host, token, settings.heartbeat).encode())
            .await?;

        let negotiated = loop {
            let text = match transport.recv().await {
                Some(text) => text?,
                None => return Err(ChatError::handshake("socket closed before CONNECTED")),
            };
            let Some(frame) = Frame::decode(&text)? else {
                continue;
            };
            match frame.command.as_str() {
                commands::CONNECTED => {
                    break settings.heartbeat.negotiate(frame.get_header("heart-beat"))?;
                }
                commands::ERROR => {
                    transport.close().await;
                    return Err(ChatError::handshake(frame.error_summary()));
                }
                other => debug!(command = other, "ignoring frame before CONNECTED"),
            }
        };

        transport
            .send(Frame::subscribe(SUBSCRIPTION_ID, topic).encode())
            .await?;
        Ok::<_, ChatError>((transport, negotiated))
    };

    match timeout(settings.connect_timeout, attempt).await {
        Ok(Ok(connected)) => Ok(connected),
        Ok(Err(err @ ChatError::Handshake { .. })) => Err(err),
        Ok(Err(err)) => Err(ChatError::handshake(err.to_string())),
        Err(_) => Err(ChatError::handshake("timed out waiting for CONNECTED")),
    }
}

async fn shutdown(transport: &mut dyn Transport) {
    for frame in [Frame::unsubscribe(SUBSCRIPTION_ID), Frame::disconnect()] {
        if let Err(err) = transport.send(frame.encode()).await {
            debug!(error = %err, "could not say goodbye to broker");
            break;
        }
    }
    transport.close().await;
}

/// Run `fut` unless the handle asks to close first. Publishes that
/// arrive in the meantime are dropped.
async fn until_closed<F: Future>(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    fut: F,
) -> Option<F::Output> {
    tokio::pin!(fut);
    loop {
        tokio::select! {
            output = &mut fut => return Some(output),
            command = commands.recv() => match command {
                Some(Command::Send(_)) => warn!("dropping publish while not connected"),
                Some(Command::Close) | None => return None,
            },
        }
    }
}

async fn tick(ticker: Option<&mut Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => pending().await,
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => pending().await,
    }
}
