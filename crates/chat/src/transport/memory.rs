//! In-process transport pair for driving a connection without a broker.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::warn;
use url::Url;

use super::{Connector, Transport};
use crate::stomp::{commands, Frame};
use crate::types::{ChatError, ChatResult};

struct Shared {
    attempts: AtomicUsize,
    refusals: AtomicUsize,
    peers: mpsc::UnboundedSender<MemoryPeer>,
}

/// Connector whose sockets end in a [`MemoryListener`].
#[derive(Clone)]
pub struct MemoryConnector {
    shared: Arc<Shared>,
}

/// Server side of a [`MemoryConnector`].
pub struct MemoryListener {
    peers: mpsc::UnboundedReceiver<MemoryPeer>,
}

/// The broker end of one in-memory socket.
pub struct MemoryPeer {
    url: Url,
    bearer: String,
    inbound: mpsc::UnboundedReceiver<String>,
    outbound: Option<mpsc::UnboundedSender<String>>,
}

struct MemoryTransport {
    outbound: Option<mpsc::UnboundedSender<String>>,
    inbound: mpsc::UnboundedReceiver<String>,
}

impl MemoryConnector {
    pub fn new() -> (Self, MemoryListener) {
        let (peers_tx, peers_rx) = mpsc::unbounded_channel();
        let connector = Self {
            shared: Arc::new(Shared {
                attempts: AtomicUsize::new(0),
                refusals: AtomicUsize::new(0),
                peers: peers_tx,
            }),
        };
        (connector, MemoryListener { peers: peers_rx })
    }

    /// Fail the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.shared.refusals.store(count, Ordering::SeqCst);
    }

    /// Connection attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, url: &Url, bearer: &str) -> ChatResult<Box<dyn Transport>> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .shared
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(ChatError::transport("connection refused"));
        }

        let (client_tx, server_rx) = mpsc::unbounded_channel();
        let (server_tx, client_rx) = mpsc::unbounded_channel();
        let peer = MemoryPeer {
            url: url.clone(),
            bearer: bearer.to_string(),
            inbound: server_rx,
            outbound: Some(server_tx),
        };
        self.shared
            .peers
            .send(peer)
            .map_err(|_| ChatError::transport("no listener"))?;

        Ok(Box::new(MemoryTransport {
            outbound: Some(client_tx),
            inbound: client_rx,
        }))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&mut self, text: String) -> ChatResult<()> {
        let outbound = self
            .outbound
            .as_ref()
            .ok_or_else(|| ChatError::transport("socket closed"))?;
        outbound
            .send(text)
            .map_err(|_| ChatError::transport("peer went away"))
    }

    async fn recv(&mut self) -> Option<ChatResult<String>> {
        self.inbound.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}

impl MemoryListener {
    /// Wait for the next socket. `None` once every connector is gone.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.peers.recv().await
    }

    /// A socket that is already waiting, if any.
    pub fn try_accept(&mut self) -> Option<MemoryPeer> {
        self.peers.try_recv().ok()
    }
}

impl MemoryPeer {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Bearer token presented on the upgrade request.
    pub fn bearer(&self) -> &str {
        &self.bearer
    }

    /// Next raw payload from the client, heart-beats included.
    pub async fn recv_raw(&mut self) -> Option<String> {
        self.inbound.recv().await
    }

    /// Next frame from the client, skipping heart-beats.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        loop {
            let text = self.inbound.recv().await?;
            match Frame::decode(&text) {
                Ok(Some(frame)) => return Some(frame),
                Ok(None) => continue,
                Err(err) => warn!(error = %err, "client sent a malformed frame"),
            }
        }
    }

    /// Send a payload to the client. `false` if the client is gone.
    pub fn send_raw(&self, text: impl Into<String>) -> bool {
        match &self.outbound {
            Some(outbound) => outbound.send(text.into()).is_ok(),
            None => false,
        }
    }

    pub fn send_frame(&self, frame: &Frame) -> bool {
        self.send_raw(frame.encode())
    }

    /// Answer CONNECT with CONNECTED and wait for the room subscription.
    /// Returns the CONNECT and SUBSCRIBE frames.
    pub async fn accept_handshake(&mut self, heartbeat: &str) -> Option<(Frame, Frame)> {
        let connect = self.recv_frame().await?;
        if !connect.is(commands::CONNECT) {
            return None;
        }
        let connected = Frame::new(commands::CONNECTED)
            .header("version", "1.2")
            .header("heart-beat", heartbeat);
        self.send_frame(&connected);

        let subscribe = self.recv_frame().await?;
        subscribe
            .is(commands::SUBSCRIBE)
            .then_some((connect, subscribe))
    }

    /// Deliver a MESSAGE frame on `subscription`.
    pub fn deliver(&self, subscription: &str, destination: &str, body: &str) -> bool {
        let frame = Frame::new(commands::MESSAGE)
            .header("subscription", subscription)
            .header("destination", destination)
            .header("message-id", uuid::Uuid::new_v4().to_string())
            .header("content-type", "application/json")
            .with_body(body);
        self.send_frame(&frame)
    }

    /// Drop the server side of the socket.
    pub fn close(&mut self) {
        self.outbound = None;
        self.inbound.close();
    }
}
