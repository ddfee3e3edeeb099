//! STOMP heart-beat negotiation.

use std::time::Duration;

use crate::types::{ChatError, ChatResult};

/// Heart-beat intervals offered by the client in the CONNECT frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    /// How often the client can send.
    pub outgoing: Duration,
    /// How often the client wants to receive.
    pub incoming: Duration,
}

/// Effective intervals after the broker answered with CONNECTED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Negotiated {
    pub send_every: Option<Duration>,
    pub expect_every: Option<Duration>,
}

impl Negotiated {
    /// Silence longer than this means the broker is gone.
    pub fn receive_deadline(&self) -> Option<Duration> {
        self.expect_every.map(|interval| interval * 2)
    }
}

impl Heartbeat {
    pub fn from_millis(outgoing_ms: u64, incoming_ms: u64) -> Self {
        Self {
            outgoing: Duration::from_millis(outgoing_ms),
            incoming: Duration::from_millis(incoming_ms),
        }
    }

    pub fn header_value(&self) -> String {
        format!(
            "{},{}",
            self.outgoing.as_millis(),
            self.incoming.as_millis()
        )
    }

    /// Combine the client offer with the broker's `heart-beat` header.
    ///
    /// ```
    /// use std::time::Duration;
    /// use orgchat_chat::stomp::Heartbeat;
    ///
    /// let offer = Heartbeat::from_millis(4000, 4000);
    /// let negotiated = offer.negotiate(Some("10000,2000")).unwrap();
    /// assert_eq!(negotiated.send_every, Some(Duration::from_millis(4000)));
    /// assert_eq!(negotiated.expect_every, Some(Duration::from_millis(10000)));
    /// ```
    pub fn negotiate(&self, server: Option<&str>) -> ChatResult<Negotiated> {
        let (server_sends, server_wants) = match server {
            Some(value) => parse_pair(value)?,
            None => (0, 0),
        };

        let client_sends = self.outgoing.as_millis() as u64;
        let client_wants = self.incoming.as_millis() as u64;

        Ok(Negotiated {
            send_every: effective(client_sends, server_wants),
            expect_every: effective(client_wants, server_sends),
        })
    }
}

fn effective(ours: u64, theirs: u64) -> Option<Duration> {
    if ours == 0 || theirs == 0 {
        None
    } else {
        Some(Duration::from_millis(ours.max(theirs)))
    }
}

fn parse_pair(value: &str) -> ChatResult<(u64, u64)> {
    let invalid = || ChatError::frame(format!("invalid heart-beat header {value:?}"));
    let (first, second) = value.split_once(',').ok_or_else(invalid)?;
    let first = first.trim().parse().map_err(|_| invalid())?;
    let second = second.trim().parse().map_err(|_| invalid())?;
    Ok((first, second))
}
