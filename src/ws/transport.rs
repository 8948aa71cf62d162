//! tokio-tungstenite backed [`Connector`].

use async_trait::async_trait;
use futures::{SinkExt as _, StreamExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest as _;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use url::Url;

use super::state::CloseInfo;
use super::traits::{Connector, Frame, Transport};
use crate::Result;
use crate::error::{Error, Kind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Opens real WebSocket connections.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    type Transport = TungsteniteTransport;

    async fn connect(&self, address: &Url, protocols: &[String]) -> Result<Self::Transport> {
        let mut request = address.as_str().into_client_request()?;

        if !protocols.is_empty() {
            let header = HeaderValue::from_str(&protocols.join(", "))
                .map_err(|e| Error::with_source(Kind::Validation, e))?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, header);
        }

        let (stream, _) = connect_async(request).await?;
        Ok(TungsteniteTransport { stream })
    }
}

/// A connected tokio-tungstenite stream.
pub struct TungsteniteTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::Text(text.into())).await?;
        Ok(())
    }

    async fn next(&mut self) -> Option<Result<Frame>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(Frame::Text(text.as_str().to_owned()))),
                Ok(Message::Binary(bytes)) => {
                    return Some(Ok(Frame::Text(
                        String::from_utf8_lossy(&bytes).into_owned(),
                    )));
                }
                Ok(Message::Close(frame)) => {
                    let info = frame.map_or_else(CloseInfo::no_status, |f| {
                        CloseInfo::new(u16::from(f.code), f.reason.as_str())
                    });
                    return Some(Ok(Frame::Close(info)));
                }
                Err(e) => return Some(Err(e.into())),
                // Protocol-level ping/pong is answered by tungstenite itself.
                Ok(_) => {}
            }
        }
    }

    async fn close(&mut self, info: CloseInfo) -> Result<()> {
        let frame = CloseFrame {
            code: CloseCode::from(info.code),
            reason: info.reason.into(),
        };
        self.stream.close(Some(frame)).await?;
        Ok(())
    }
}
