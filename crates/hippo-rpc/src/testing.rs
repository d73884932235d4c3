//! In-process stand-in for SoHal.
//!
//! `MockSohal` listens on a random local port and speaks the same WebSocket
//! JSON-RPC dialect as the real service. Replies are scripted per method;
//! `subscribe`/`unsubscribe` are counted; software devices registered with
//! `system.device_connected` receive forwarded calls and can push
//! notifications to every other session.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_tungstenite::tungstenite::Message as WsMessage;
use futures_util::{SinkExt, StreamExt};
use hippo_types::{ErrorKind, Facility, HippoError, Params};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Notify, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ConnectionConfig;
use crate::protocol::{Message, Notification, Request, RequestId, Response, RpcError};
use crate::transport;

/// Registration method for software devices
pub const DEVICE_CONNECTED: &str = "system.device_connected";

/// Scripted outcome of a call
#[derive(Debug, Clone)]
pub enum Reply {
    Result(Value),
    /// Error response carrying this raw 64-bit code
    Error(u64),
    /// Never answer
    Silent,
}

type Handler = Arc<dyn Fn(&Params) -> Reply + Send + Sync>;
type SessionId = u64;

/// A request the mock received
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub method: String,
    pub params: Option<Value>,
}

struct Forward {
    target: SessionId,
    origin: SessionId,
    origin_id: RequestId,
}

#[derive(Default)]
struct Inner {
    handlers: Mutex<HashMap<String, Handler>>,
    sessions: Mutex<HashMap<SessionId, mpsc::UnboundedSender<WsMessage>>>,
    calls: Mutex<Vec<Call>>,
    subscriptions: Mutex<HashMap<String, u32>>,
    sw_devices: Mutex<HashMap<String, SessionId>>,
    forwarded: Mutex<HashMap<u64, Forward>>,
    shutdown: Mutex<CancellationToken>,
    refusing: AtomicBool,
    next_session: AtomicU64,
    next_forward: AtomicU64,
    changed: Notify,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Local SoHal double for tests
pub struct MockSohal {
    inner: Arc<Inner>,
    addr: SocketAddr,
    acceptor: JoinHandle<()>,
}

impl MockSohal {
    /// Bind to a free port on 127.0.0.1 and start accepting.
    ///
    /// # Panics
    ///
    /// Panics if no local port can be bound.
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock SoHal");
        let addr = listener.local_addr().expect("mock SoHal address");

        let inner = Arc::new(Inner::default());
        let acceptor = tokio::spawn(accept_loop(listener, inner.clone()));
        debug!("[mock] listening on {addr}");

        Self {
            inner,
            addr,
            acceptor,
        }
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Connection settings pointing at this mock, with short timeouts.
    #[must_use]
    pub fn config(&self) -> ConnectionConfig {
        ConnectionConfig {
            connect_timeout_ms: 2000,
            request_timeout_ms: 2000,
            reconnect_interval_ms: 50,
            ..ConnectionConfig::new("127.0.0.1", self.port())
        }
    }

    /// Script the reply for `method` (full name, e.g. `touchmat@0.state`).
    pub fn on<F>(&self, method: &str, handler: F)
    where
        F: Fn(&Params) -> Reply + Send + Sync + 'static,
    {
        lock(&self.inner.handlers).insert(method.to_string(), Arc::new(handler));
    }

    /// Send a raw notification to every session.
    pub fn push(&self, method: &str, params: Option<Value>) {
        self.inner
            .broadcast(None, &Message::Notification(Notification::new(method, params)));
    }

    /// Send `<device>.on_<event>` with `param` wrapped as `[param]`.
    pub fn notify(&self, device: &str, event: &str, param: Option<Value>) {
        let params = param.map(|p| Value::Array(vec![p]));
        self.push(&format!("{device}.on_{event}"), params);
    }

    /// Drop every open session. New connections are still accepted.
    pub fn disconnect_all(&self) {
        let old = std::mem::take(&mut *lock(&self.inner.shutdown));
        old.cancel();
    }

    /// Accept and immediately drop new connections while `refuse` is set.
    pub fn refuse_connections(&self, refuse: bool) {
        self.inner.refusing.store(refuse, Ordering::SeqCst);
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        lock(&self.inner.sessions).len()
    }

    /// Current subscriber count for `device` (e.g. `touchmat@0`).
    #[must_use]
    pub fn subscriptions(&self, device: &str) -> u32 {
        lock(&self.inner.subscriptions)
            .get(device)
            .copied()
            .unwrap_or(0)
    }

    /// Every request received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        lock(&self.inner.calls).clone()
    }

    #[must_use]
    pub fn call_count(&self, method: &str) -> usize {
        lock(&self.inner.calls)
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    #[must_use]
    pub fn is_registered(&self, device_name: &str) -> bool {
        lock(&self.inner.sw_devices).contains_key(device_name)
    }

    pub async fn wait_for_sessions(&self, count: usize) {
        self.wait_until(|| self.session_count() >= count).await;
    }

    pub async fn wait_for_call(&self, method: &str) {
        self.wait_until(|| self.call_count(method) > 0).await;
    }

    pub async fn wait_for_registration(&self, device_name: &str) {
        self.wait_until(|| self.is_registered(device_name)).await;
    }

    pub async fn wait_for_unregistration(&self, device_name: &str) {
        self.wait_until(|| !self.is_registered(device_name)).await;
    }

    async fn wait_until(&self, condition: impl Fn() -> bool) {
        let wait = async {
            loop {
                let changed = self.inner.changed.notified();
                if condition() {
                    return;
                }
                changed.await;
            }
        };
        tokio::time::timeout(Duration::from_secs(10), wait)
            .await
            .expect("mock SoHal condition not reached");
    }
}

impl Drop for MockSohal {
    fn drop(&mut self) {
        self.acceptor.abort();
        lock(&self.inner.shutdown).cancel();
    }
}

async fn accept_loop(listener: TcpListener, inner: Arc<Inner>) {
    while let Ok((socket, _)) = listener.accept().await {
        if inner.refusing.load(Ordering::SeqCst) {
            drop(socket);
            continue;
        }
        let shutdown = lock(&inner.shutdown).clone();
        tokio::spawn(serve_session(inner.clone(), socket, shutdown));
    }
}

async fn serve_session(inner: Arc<Inner>, socket: TcpStream, shutdown: CancellationToken) {
    let Ok(ws) = transport::accept(socket).await else {
        return;
    };
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    let session = inner.next_session.fetch_add(1, Ordering::SeqCst);
    lock(&inner.sessions).insert(session, tx);
    inner.changed.notify_waiters();
    debug!("[mock] session {session} opened");

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            Some(frame) = rx.recv() => {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
            frame = stream.next() => {
                let Some(Ok(frame)) = frame else { break };
                match transport::decode(frame) {
                    Ok(Some(message)) => inner.handle(session, message),
                    Ok(None) => {}
                    Err(_) => break,
                }
            }
        }
    }

    inner.close_session(session);
    debug!("[mock] session {session} closed");
}

impl Inner {
    fn send(&self, session: SessionId, message: &Message) {
        let Ok(frame) = transport::encode(message) else {
            return;
        };
        if let Some(tx) = lock(&self.sessions).get(&session) {
            let _ = tx.send(frame);
        }
    }

    fn broadcast(&self, except: Option<SessionId>, message: &Message) {
        let Ok(frame) = transport::encode(message) else {
            return;
        };
        for (id, tx) in lock(&self.sessions).iter() {
            if Some(*id) != except {
                let _ = tx.send(frame.clone());
            }
        }
    }

    fn reply(&self, session: SessionId, id: RequestId, reply: Reply) {
        let response = match reply {
            Reply::Result(value) => Response::success(id, value),
            Reply::Error(code) => {
                let err = HippoError::from_raw(code)
                    .unwrap_or_else(|| HippoError::new(Facility::SoHal, ErrorKind::Error));
                Response::error(id, RpcError::from(&err))
            }
            Reply::Silent => return,
        };
        self.send(session, &Message::Response(response));
    }

    fn handle(&self, session: SessionId, message: Message) {
        match message {
            Message::Request(Request {
                id: Some(id),
                method,
                params,
                ..
            }) => self.handle_call(session, id, &method, params),
            Message::Request(Request { method, params, .. })
            | Message::Notification(Notification { method, params, .. }) => {
                // Pushes from software devices fan out to everyone else
                self.broadcast(
                    Some(session),
                    &Message::Notification(Notification::new(method, params)),
                );
            }
            Message::Response(response) => self.relay_response(response),
        }
    }

    fn handle_call(&self, session: SessionId, id: RequestId, method: &str, params: Option<Value>) {
        lock(&self.calls).push(Call {
            method: method.to_string(),
            params: params.clone(),
        });
        self.changed.notify_waiters();

        let handler = lock(&self.handlers).get(method).cloned();
        if let Some(handler) = handler {
            let reply = handler(&Params::from_value(params));
            self.reply(session, id, reply);
            return;
        }

        if method == DEVICE_CONNECTED {
            self.register(session, params.as_ref());
            self.reply(session, id, Reply::Result(Value::Null));
            return;
        }

        let Some((target, call)) = method.split_once('.') else {
            self.reply(session, id, Reply::Error(not_available()));
            return;
        };

        match call {
            "subscribe" => {
                let count = self.adjust_subscriptions(target, true);
                self.reply(session, id, Reply::Result(Value::from(count)));
            }
            "unsubscribe" => {
                let count = self.adjust_subscriptions(target, false);
                self.reply(session, id, Reply::Result(Value::from(count)));
            }
            _ => {
                let device_name = target.split('@').next().unwrap_or(target);
                let device_session = lock(&self.sw_devices).get(device_name).copied();
                match device_session {
                    Some(device_session) => {
                        self.forward(session, id, device_session, device_name, call, params);
                    }
                    None => self.reply(session, id, Reply::Error(not_available())),
                }
            }
        }
    }

    fn adjust_subscriptions(&self, target: &str, subscribe: bool) -> u32 {
        let mut subscriptions = lock(&self.subscriptions);
        let count = subscriptions.entry(target.to_string()).or_insert(0);
        *count = if subscribe {
            count.saturating_add(1)
        } else {
            count.saturating_sub(1)
        };
        *count
    }

    fn register(&self, session: SessionId, schema: Option<&Value>) {
        let names = schema
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(|device| device.get("device_name").and_then(Value::as_str));
        let mut sw_devices = lock(&self.sw_devices);
        for name in names {
            debug!("[mock] session {session} registered {name}");
            sw_devices.insert(name.to_string(), session);
        }
        drop(sw_devices);
        self.changed.notify_waiters();
    }

    fn forward(
        &self,
        origin: SessionId,
        origin_id: RequestId,
        target: SessionId,
        device_name: &str,
        call: &str,
        params: Option<Value>,
    ) {
        let id = self.next_forward.fetch_add(1, Ordering::SeqCst) + 1;
        lock(&self.forwarded).insert(
            id,
            Forward {
                target,
                origin,
                origin_id,
            },
        );
        let request = Request::new(format!("{device_name}.{call}"), params, id.into());
        self.send(target, &Message::Request(request));
    }

    fn relay_response(&self, mut response: Response) {
        let RequestId::Number(id) = response.id else {
            return;
        };
        let Some(forward) = lock(&self.forwarded).remove(&id) else {
            return;
        };
        response.id = forward.origin_id;
        self.send(forward.origin, &Message::Response(response));
    }

    fn close_session(&self, session: SessionId) {
        lock(&self.sessions).remove(&session);
        lock(&self.sw_devices).retain(|_, owner| *owner != session);

        let orphaned: Vec<Forward> = {
            let mut forwarded = lock(&self.forwarded);
            let ids: Vec<u64> = forwarded
                .iter()
                .filter(|(_, f)| f.target == session)
                .map(|(id, _)| *id)
                .collect();
            ids.iter().filter_map(|id| forwarded.remove(id)).collect()
        };
        for forward in orphaned {
            let err = HippoError::new(Facility::SoHal, ErrorKind::DevNotFound);
            self.reply(forward.origin, forward.origin_id, Reply::Error(err.raw()));
        }

        self.changed.notify_waiters();
    }
}

fn not_available() -> u64 {
    HippoError::new(Facility::SoHal, ErrorKind::FuncNotAvailable).raw()
}
