//! STOMP 1.2 text frames.

use crate::stomp::Heartbeat;
use crate::types::{ChatError, ChatResult};

pub mod commands {
    pub const CONNECT: &str = "CONNECT";
    pub const CONNECTED: &str = "CONNECTED";
    pub const SUBSCRIBE: &str = "SUBSCRIBE";
    pub const UNSUBSCRIBE: &str = "UNSUBSCRIBE";
    pub const SEND: &str = "SEND";
    pub const MESSAGE: &str = "MESSAGE";
    pub const RECEIPT: &str = "RECEIPT";
    pub const ERROR: &str = "ERROR";
    pub const DISCONNECT: &str = "DISCONNECT";
}

pub const ACCEPT_VERSION: &str = "1.2,1.1,1.0";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of a header; repeated headers keep the first occurrence.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn is(&self, command: &str) -> bool {
        self.command == command
    }

    pub fn connect(host: &str, token: &str, heartbeat: Heartbeat) -> Self {
        Self::new(commands::CONNECT)
            .header("accept-version", ACCEPT_VERSION)
            .header("host", host)
            .header("heart-beat", heartbeat.header_value())
            .header("Authorization", format!("Bearer {token}"))
    }

    pub fn subscribe(id: &str, destination: &str) -> Self {
        Self::new(commands::SUBSCRIBE)
            .header("id", id)
            .header("destination", destination)
            .header("ack", "auto")
    }

    pub fn unsubscribe(id: &str) -> Self {
        Self::new(commands::UNSUBSCRIBE).header("id", id)
    }

    pub fn send(destination: &str, json_body: String) -> Self {
        Self::new(commands::SEND)
            .header("destination", destination)
            .header("content-type", "application/json")
            .header("content-length", json_body.len().to_string())
            .with_body(json_body)
    }

    pub fn disconnect() -> Self {
        Self::new(commands::DISCONNECT)
    }

    /// Human readable summary of an ERROR frame.
    pub fn error_summary(&self) -> String {
        let message = self.get_header("message").unwrap_or("broker reported an error");
        let details = self.body.trim();
        if details.is_empty() {
            message.to_string()
        } else {
            format!("{message}: {details}")
        }
    }

    pub fn encode(&self) -> String {
        let escape = !self.skips_escaping();
        let mut out = String::with_capacity(self.command.len() + self.body.len() + 64);
        out.push_str(&self.command);
        out.push('\n');
        for (name, value) in &self.headers {
            if escape {
                out.push_str(&escape_header(name));
                out.push(':');
                out.push_str(&escape_header(value));
            } else {
                out.push_str(name);
                out.push(':');
                out.push_str(value);
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.body);
        out.push('\0');
        out
    }

    /// Parse one frame. `Ok(None)` is a heart-beat.
    pub fn decode(text: &str) -> ChatResult<Option<Frame>> {
        let text = text.trim_start_matches(&['\r', '\n'][..]);
        if text.is_empty() {
            return Ok(None);
        }

        let (command, mut rest) =
            next_line(text).ok_or_else(|| ChatError::frame("missing command line"))?;
        if command.is_empty() || !command.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(ChatError::frame(format!("invalid command {command:?}")));
        }

        let mut frame = Frame::new(command);
        let unescape = !frame.skips_escaping();

        loop {
            let (line, after) =
                next_line(rest).ok_or_else(|| ChatError::frame("unterminated headers"))?;
            rest = after;
            if line.is_empty() {
                break;
            }

            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| ChatError::frame(format!("invalid header line {line:?}")))?;
            if unescape {
                frame.headers.push((unescape_header(name)?, unescape_header(value)?));
            } else {
                frame.headers.push((name.to_string(), value.to_string()));
            }
        }

        let body = match frame.get_header("content-length") {
            Some(length) => {
                let length: usize = length
                    .trim()
                    .parse()
                    .map_err(|_| ChatError::frame(format!("invalid content-length {length:?}")))?;
                let body = rest
                    .get(..length)
                    .ok_or_else(|| ChatError::frame("body shorter than content-length"))?;
                if !rest[length..].starts_with('\0') {
                    return Err(ChatError::frame("missing NUL after body"));
                }
                body
            }
            None => {
                let end = rest
                    .find('\0')
                    .ok_or_else(|| ChatError::frame("missing NUL terminator"))?;
                &rest[..end]
            }
        };

        frame.body = body.to_string();
        Ok(Some(frame))
    }

    fn skips_escaping(&self) -> bool {
        self.is(commands::CONNECT) || self.is(commands::CONNECTED)
    }
}

fn next_line(text: &str) -> Option<(&str, &str)> {
    let index = text.find('\n')?;
    let line = &text[..index];
    Some((line.strip_suffix('\r').unwrap_or(line), &text[index + 1..]))
}

fn escape_header(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_header(value: &str) -> ChatResult<String> {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(ChatError::frame(format!(
                    "undefined header escape \\{}",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}
