//! WebSocket transport for JSON-RPC messages.
//!
//! Each JSON-RPC message travels as one text frame on a WebSocket negotiated
//! with the `SoHal-jsonrpc` subprotocol. Binary frames are accepted on read
//! when they hold UTF-8 JSON. Control frames are handled by tungstenite and
//! never reach the caller.

use std::time::Duration;

use async_tungstenite::WebSocketStream;
use async_tungstenite::tokio::TokioAdapter;
use async_tungstenite::tungstenite::Message as WsMessage;
use async_tungstenite::tungstenite::client::IntoClientRequest;
use async_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use async_tungstenite::tungstenite::http::HeaderValue;
use async_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio::net::TcpStream;

use crate::error::TransportError;
use crate::protocol::Message;

/// WebSocket subprotocol spoken by SoHal
pub const SUBPROTOCOL: &str = "SoHal-jsonrpc";

/// Maximum message size (16 MB)
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

pub type WsStream = WebSocketStream<TokioAdapter<TcpStream>>;

/// Open a WebSocket to `url`, bounded by `timeout`.
///
/// # Errors
///
/// Returns `TransportError::Connect` when the TCP connection or the handshake
/// fails, and `TransportError::ConnectTimeout` when `timeout` elapses first.
pub async fn connect(url: &str, timeout: Duration) -> Result<WsStream, TransportError> {
    let connect_error = |reason: String| TransportError::Connect {
        url: url.to_string(),
        reason,
    };

    let mut request = url
        .into_client_request()
        .map_err(|e| connect_error(e.to_string()))?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));

    let authority = request
        .uri()
        .authority()
        .map(|a| {
            let port = a.port_u16().unwrap_or(80);
            format!("{}:{port}", a.host())
        })
        .ok_or_else(|| connect_error("missing host".to_string()))?;

    let handshake = async {
        let tcp = TcpStream::connect(&authority)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        tcp.set_nodelay(true)
            .map_err(|e| connect_error(e.to_string()))?;
        let (stream, _response) = async_tungstenite::tokio::client_async(request, tcp)
            .await
            .map_err(|e| connect_error(e.to_string()))?;
        Ok::<_, TransportError>(stream)
    };

    tokio::time::timeout(timeout, handshake)
        .await
        .map_err(|_| TransportError::ConnectTimeout(url.to_string()))?
}

/// Accept a WebSocket on an already accepted TCP stream, agreeing to the
/// SoHal subprotocol.
///
/// # Errors
///
/// Returns `TransportError::Ws` if the handshake fails.
pub async fn accept(stream: TcpStream) -> Result<WsStream, TransportError> {
    let callback = |_request: &Request, mut response: Response| -> Result<Response, ErrorResponse> {
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        Ok(response)
    };
    Ok(async_tungstenite::tokio::accept_hdr_async(stream, callback).await?)
}

/// Encode a message as a text frame.
///
/// # Errors
///
/// Returns an error if serialization fails or the text exceeds
/// `MAX_MESSAGE_SIZE`.
pub fn encode(message: &Message) -> Result<WsMessage, TransportError> {
    let json = message.to_json()?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge(json.len()));
    }
    Ok(WsMessage::Text(json))
}

/// Decode a frame.
///
/// Returns `Ok(None)` for control frames.
///
/// # Errors
///
/// Returns `TransportError::Closed` for a close frame, and a decoding error
/// when the payload is not a JSON-RPC message.
pub fn decode(frame: WsMessage) -> Result<Option<Message>, TransportError> {
    let text = match frame {
        WsMessage::Text(text) => text,
        WsMessage::Binary(bytes) => String::from_utf8(bytes)?,
        WsMessage::Close(_) => return Err(TransportError::Closed),
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => return Ok(None),
    };

    if text.len() > MAX_MESSAGE_SIZE {
        return Err(TransportError::MessageTooLarge(text.len()));
    }

    Ok(Some(Message::parse(&text)?))
}
