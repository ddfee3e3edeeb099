use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::debug;
use url::Url;

use super::{Connector, Transport};
use crate::types::{ChatError, ChatResult};

/// Connects with `tokio-tungstenite`, sending the bearer token on the
/// upgrade request.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url, bearer: &str) -> ChatResult<Box<dyn Transport>> {
        let mut request = url.as_str().into_client_request()?;
        let authorization = HeaderValue::from_str(&format!("Bearer {bearer}"))
            .map_err(|_| ChatError::handshake("access token is not a valid header value"))?;
        request.headers_mut().insert(AUTHORIZATION, authorization);

        let (stream, response) = connect_async(request).await?;
        debug!(url = %url, status = %response.status(), "websocket upgraded");

        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, text: String) -> ChatResult<()> {
        self.stream.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<ChatResult<String>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Binary(bytes)) => {
                    return Some(
                        String::from_utf8(bytes)
                            .map_err(|_| ChatError::frame("binary frame is not UTF-8")),
                    )
                }
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "websocket closed by peer");
                    return None;
                }
                Ok(_) => continue,
                Err(err) => return Some(Err(err.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(error = %err, "websocket close failed");
        }
    }
}
