//! WebSocket transport opener

use crate::config::ClientConfig;
use futures::stream::{SplitSink, SplitStream};
use rpclink_core::{Error, Result};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsSink = SplitSink<WsStream, Message>;
pub(crate) type WsSource = SplitStream<WsStream>;

/// Open the WebSocket, bounded by the connect timeout
///
/// The auth token, if any, travels as `Authorization: Bearer <token>` on the
/// upgrade request.
#[tracing::instrument(skip_all, fields(server = %config.server_address))]
pub(crate) async fn open(config: &ClientConfig) -> Result<WsStream> {
    let mut request = config
        .server_address
        .as_str()
        .into_client_request()
        .map_err(|e| Error::Transport(e.to_string()))?;

    if let Some(token) = &config.auth_token {
        let value = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|_| Error::InvalidConfig("authToken is not a valid header value".into()))?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }

    let (stream, response) = tokio::time::timeout(config.connect_timeout(), connect_async(request))
        .await
        .map_err(|_| {
            Error::Transport(format!("connect timed out after {}ms", config.connect_timeout_ms))
        })?
        .map_err(|e| Error::Transport(e.to_string()))?;

    tracing::debug!(status = %response.status(), "WebSocket upgrade accepted");
    Ok(stream)
}
