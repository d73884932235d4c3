//! RPC client for talking to SoHal.
//!
//! One `RpcClient` owns one WebSocket. Responses are matched to calls by id;
//! everything else the server sends is forwarded as [`Inbound`] on the
//! channel returned by [`RpcClient::connect`].

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_tungstenite::tungstenite::Message as WsMessage;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use hippo_types::{ErrorKind, Facility, HippoError, Result};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::error::TransportError;
use crate::protocol::{Message, Notification, Request, RequestId, Response, RpcError};
use crate::transport::{self, WsStream};

/// Something the server sent that is not a response to one of our calls.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A push without an id
    Notification {
        method: String,
        params: Option<Value>,
    },
    /// A request the server expects us to answer with [`RpcClient::respond`]
    Invocation {
        id: RequestId,
        method: String,
        params: Option<Value>,
    },
    /// The connection is gone. Always the last item on the channel.
    Disconnected,
}

pub type Incoming = mpsc::UnboundedReceiver<Inbound>;

/// Pending request waiting for a response
type PendingRequest = oneshot::Sender<Response>;
type PendingMap = Arc<Mutex<HashMap<RequestId, PendingRequest>>>;

/// RPC client bound to a single WebSocket connection
pub struct RpcClient {
    sender: Arc<Mutex<SplitSink<WsStream, WsMessage>>>,
    pending: PendingMap,
    next_id: AtomicU64,
    facility: Facility,
    closed: CancellationToken,
    reader: JoinHandle<()>,
    url: String,
}

impl RpcClient {
    /// Connect to the SoHal described by `config`.
    ///
    /// Errors raised by this client are tagged with `facility`.
    ///
    /// # Errors
    ///
    /// Returns `Open` if the server cannot be reached or refuses the
    /// handshake, and `Timeout` if the handshake exceeds the connect timeout.
    pub async fn connect(config: &ConnectionConfig, facility: Facility) -> Result<(Self, Incoming)> {
        let url = config.url();
        let stream = transport::connect(&url, config.connect_timeout())
            .await
            .map_err(|e| e.into_error(facility))?;
        debug!("[{url}] connected");

        let (sink, stream) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let closed = CancellationToken::new();
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();

        let reader = tokio::spawn(read_loop(
            stream,
            pending.clone(),
            incoming_tx,
            closed.clone(),
            url.clone(),
        ));

        let client = Self {
            sender: Arc::new(Mutex::new(sink)),
            pending,
            next_id: AtomicU64::new(1),
            facility,
            closed,
            reader,
            url,
        };
        Ok((client, incoming_rx))
    }

    /// Send a request and wait for its response.
    ///
    /// A zero `timeout` waits until the response arrives or the connection
    /// drops.
    ///
    /// # Errors
    ///
    /// - `Write` if the request cannot be sent
    /// - `Timeout` if no response arrives in time. The connection stays usable.
    /// - `WrongState` if the connection drops while waiting
    /// - the server's error, decoded from its `data` member
    pub async fn call(&self, method: &str, params: Option<Value>, timeout: Duration) -> Result<Value> {
        let id = RequestId::Number(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id.clone(), tx);

        // The reader cancels before draining, so an entry inserted after the
        // drain is caught here
        if self.is_closed() {
            self.pending.lock().await.remove(&id);
            return Err(self.error(ErrorKind::Write, "connection closed"));
        }

        debug!("[{}] -> {method} #{id}", self.url);
        let request = Request::new(method, params, id.clone());
        if let Err(e) = self.send(&Message::Request(request)).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let received = if timeout.is_zero() {
            Ok(rx.await)
        } else {
            tokio::time::timeout(timeout, rx).await
        };

        match received {
            Ok(Ok(response)) => {
                debug!("[{}] <- {method} #{id}", self.url);
                response.into_result(self.facility)
            }
            Ok(Err(_)) => Err(self.error(ErrorKind::WrongState, "connection lost")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                warn!("[{}] {method} #{id} timed out after {timeout:?}", self.url);
                Err(self.error(ErrorKind::Timeout, format!("{method} timed out")))
            }
        }
    }

    /// Send a notification (no response expected).
    ///
    /// # Errors
    ///
    /// Returns `Write` if sending fails.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        debug!("[{}] -> {method} (notification)", self.url);
        self.send(&Message::Notification(Notification::new(method, params)))
            .await
    }

    /// Answer an [`Inbound::Invocation`].
    ///
    /// # Errors
    ///
    /// Returns `Write` if sending fails.
    pub async fn respond(&self, id: RequestId, result: Result<Value>) -> Result<()> {
        let response = match result {
            Ok(value) => Response::success(id, value),
            Err(err) => Response::error(id, RpcError::from(&err)),
        };
        self.send(&Message::Response(response)).await
    }

    /// Send a close frame. Pending calls fail once the server acknowledges.
    ///
    /// # Errors
    ///
    /// Returns `Write` if the close frame cannot be sent.
    pub async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        debug!("[{}] closing", self.url);
        let result = self.sender.lock().await.close().await;
        self.closed.cancel();
        result.map_err(|e| TransportError::from(e).into_error(self.facility))
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }

    /// Resolves once the connection has dropped or been closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    #[must_use]
    pub fn facility(&self) -> Facility {
        self.facility
    }

    async fn send(&self, message: &Message) -> Result<()> {
        if self.is_closed() {
            return Err(self.error(ErrorKind::Write, "connection closed"));
        }
        let frame = transport::encode(message).map_err(|e| e.into_error(self.facility))?;
        self.sender
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|e| TransportError::from(e).into_error(self.facility))
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>) -> HippoError {
        HippoError::new(self.facility, kind).with_message(message)
    }
}

impl Drop for RpcClient {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("facility", &self.facility)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn read_loop(
    mut stream: SplitStream<WsStream>,
    pending: PendingMap,
    incoming: mpsc::UnboundedSender<Inbound>,
    closed: CancellationToken,
    url: String,
) {
    while let Some(frame) = stream.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                warn!("[{url}] read failed: {e}");
                break;
            }
        };

        let message = match transport::decode(frame) {
            Ok(Some(message)) => message,
            Ok(None) => continue,
            Err(TransportError::Closed) => {
                debug!("[{url}] closed by peer");
                break;
            }
            Err(e) => {
                warn!("[{url}] dropping frame: {e}");
                continue;
            }
        };

        let inbound = match message {
            Message::Response(response) => {
                match pending.lock().await.remove(&response.id) {
                    Some(tx) => {
                        let _ = tx.send(response);
                    }
                    None => debug!("[{url}] dropping response #{} with no caller", response.id),
                }
                continue;
            }
            Message::Request(Request {
                id: Some(id),
                method,
                params,
                ..
            }) => Inbound::Invocation { id, method, params },
            Message::Request(Request {
                id: None,
                method,
                params,
                ..
            })
            | Message::Notification(Notification { method, params, .. }) => {
                Inbound::Notification { method, params }
            }
        };

        // Nobody listening is fine; responses still need routing
        let _ = incoming.send(inbound);
    }

    closed.cancel();
    let dropped = {
        let mut pending = pending.lock().await;
        let count = pending.len();
        pending.clear();
        count
    };
    if dropped > 0 {
        debug!("[{url}] failing {dropped} pending call(s)");
    }
    let _ = incoming.send(Inbound::Disconnected);
}
