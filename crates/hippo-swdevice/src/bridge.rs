//! Serving a software device through SoHal.
//!
//! A [`Bridge`] registers a [`SwDevice`] with `system.device_connected` and
//! then answers every invocation SoHal forwards to it. Each invocation runs
//! on its own task so a slow handler never holds up the others. The bridge
//! also owns the "needs to disconnect" flag that the hosting program waits
//! on before tearing the device down.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hippo_rpc::{ConnectionConfig, Inbound, Incoming, RequestId, RpcClient};
use hippo_types::{ErrorKind, Facility, HippoError, Params, Result, Wire};
use serde_json::Value;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::schema::{MethodTable, Schema};

/// Registration method on SoHal
pub const DEVICE_CONNECTED: &str = "system.device_connected";

/// Method a peer calls to ask the device to go away
pub const DISCONNECT_DEVICE: &str = "disconnect_device";

const REGISTER_TIMEOUT: Duration = Duration::from_secs(10);

/// A device implementation served by a [`Bridge`].
pub trait SwDevice: Send + Sync + 'static {
    fn schema(&self) -> &Schema;

    /// Run `method` (without the device prefix) and produce its result.
    ///
    /// `params` holds at least as many entries as the schema declares.
    fn dispatch(
        &self,
        method: &str,
        params: Params,
        notifier: &Notifier,
    ) -> impl Future<Output = Result<Value>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Unregistered,
    Connecting,
    Serving,
    Disconnecting,
}

/// The shared "needs to disconnect" flag.
///
/// `None` until the first registration succeeds. Every registration swaps in
/// a fresh token, so a flag raised by an earlier session does not leak into
/// the next one.
#[derive(Default)]
struct DisconnectFlag {
    token: Mutex<Option<CancellationToken>>,
}

impl DisconnectFlag {
    fn slot(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn reset(&self) {
        *self.slot() = Some(CancellationToken::new());
    }

    fn raise(&self) {
        if let Some(token) = self.slot().as_ref() {
            token.cancel();
        }
    }

    fn current(&self) -> Option<CancellationToken> {
        self.slot().clone()
    }
}

/// Sends notifications on behalf of a served device.
#[derive(Clone)]
pub struct Notifier {
    client: Arc<RpcClient>,
    device_name: Arc<str>,
    flag: Arc<DisconnectFlag>,
}

impl Notifier {
    /// Push `<device>.on_<name>` to every subscriber, with `[value]` as
    /// params or no params at all.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` if `value` cannot be encoded and `Write` if the
    /// connection is gone.
    pub async fn notify<T: Wire>(&self, name: &str, value: Option<&T>) -> Result<()> {
        let params = value
            .map(|v| {
                v.to_wire()
                    .map(|encoded| Value::Array(vec![encoded]))
                    .map_err(|e| e.into_error(Facility::SwDevice))
            })
            .transpose()?;
        self.client
            .notify(&format!("{}.on_{name}", self.device_name), params)
            .await
    }

    /// Push `<device>.on_<name>` without a parameter.
    ///
    /// # Errors
    ///
    /// Returns `Write` if the connection is gone.
    pub async fn signal(&self, name: &str) -> Result<()> {
        self.notify::<()>(name, None).await
    }

    /// Raise the "needs to disconnect" flag.
    pub fn request_disconnect(&self) {
        self.flag.raise();
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("device_name", &self.device_name)
            .finish_non_exhaustive()
    }
}

struct Session {
    client: Arc<RpcClient>,
    notifier: Notifier,
    task: JoinHandle<()>,
}

/// Registers a [`SwDevice`] with SoHal and serves it.
pub struct Bridge<D: SwDevice> {
    device: Arc<D>,
    config: ConnectionConfig,
    table: Arc<MethodTable>,
    device_name: Arc<str>,
    session: tokio::sync::Mutex<Option<Session>>,
    state: Arc<Mutex<BridgeState>>,
    flag: Arc<DisconnectFlag>,
}

impl<D: SwDevice> Bridge<D> {
    #[must_use]
    pub fn new(config: ConnectionConfig, device: D) -> Self {
        let table = Arc::new(MethodTable::new(device.schema()));
        let device_name = Arc::from(device.schema().device_name());
        Self {
            device: Arc::new(device),
            config,
            table,
            device_name,
            session: tokio::sync::Mutex::new(None),
            state: Arc::new(Mutex::new(BridgeState::Unregistered)),
            flag: Arc::new(DisconnectFlag::default()),
        }
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    #[must_use]
    pub fn state(&self) -> BridgeState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: BridgeState) {
        set_state(&self.state, state);
    }

    /// Connect, register the schema and start serving.
    ///
    /// Calling this while already serving does nothing. A session whose
    /// connection has dropped is replaced.
    ///
    /// # Errors
    ///
    /// Returns `Open` or `Timeout` if SoHal cannot be reached, or the error
    /// SoHal reports for the registration.
    pub async fn connect_device(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        if let Some(current) = session.as_ref() {
            if !current.client.is_closed() {
                return Ok(());
            }
            debug!("[{}] replacing dropped session", self.device_name);
        }
        if let Some(stale) = session.take() {
            stale.task.abort();
            // The old loop must not touch the state once we start connecting
            let _ = stale.task.await;
        }

        self.set_state(BridgeState::Connecting);
        let (client, incoming) = match self.register().await {
            Ok(registered) => registered,
            Err(e) => {
                self.set_state(BridgeState::Unregistered);
                return Err(e);
            }
        };

        self.flag.reset();
        let notifier = Notifier {
            client: client.clone(),
            device_name: self.device_name.clone(),
            flag: self.flag.clone(),
        };
        let task = tokio::spawn(command_loop(
            self.device.clone(),
            self.table.clone(),
            incoming,
            notifier.clone(),
            self.state.clone(),
        ));
        *session = Some(Session {
            client,
            notifier,
            task,
        });
        self.set_state(BridgeState::Serving);
        info!("[{}] registered with SoHal", self.device_name);
        Ok(())
    }

    async fn register(&self) -> Result<(Arc<RpcClient>, Incoming)> {
        let (client, incoming) = RpcClient::connect(&self.config, Facility::SwDevice).await?;
        let schema = self.device.schema().to_value();
        if let Err(e) = client
            .call(DEVICE_CONNECTED, Some(schema), REGISTER_TIMEOUT)
            .await
        {
            warn!("[{}] registration failed: {e}", self.device_name);
            let _ = client.close().await;
            return Err(e);
        }
        Ok((Arc::new(client), incoming))
    }

    /// Stop serving and close the connection. Safe to call repeatedly.
    ///
    /// # Errors
    ///
    /// Returns `Write` if the close frame cannot be sent. The bridge is
    /// unregistered either way.
    pub async fn disconnect_device(&self) -> Result<()> {
        let Some(session) = self.session.lock().await.take() else {
            return Ok(());
        };

        self.set_state(BridgeState::Disconnecting);
        session.task.abort();
        let closed = session.client.close().await;
        self.flag.raise();
        self.set_state(BridgeState::Unregistered);
        info!("[{}] disconnected from SoHal", self.device_name);
        closed
    }

    /// Whether the device has been asked to go away.
    ///
    /// # Errors
    ///
    /// Returns `Open` before the first successful [`Bridge::connect_device`].
    pub fn needs_to_disconnect(&self) -> Result<bool> {
        self.flag
            .current()
            .map(|token| token.is_cancelled())
            .ok_or_else(|| HippoError::new(Facility::SwDevice, ErrorKind::Open))
    }

    /// Like [`Bridge::needs_to_disconnect`], treating "never connected" as
    /// yes.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        self.needs_to_disconnect().unwrap_or(true)
    }

    /// Resolves once the flag is raised. Returns at once if the device never
    /// connected.
    pub async fn wait_for_disconnect(&self) {
        if let Some(token) = self.flag.current() {
            token.cancelled().await;
        }
    }

    /// Notifier for the current session, for pushes outside a handler.
    pub async fn notifier(&self) -> Option<Notifier> {
        self.session
            .lock()
            .await
            .as_ref()
            .map(|session| session.notifier.clone())
    }
}

impl<D: SwDevice> Drop for Bridge<D> {
    fn drop(&mut self) {
        if let Some(session) = self.session.get_mut().take() {
            session.task.abort();
        }
    }
}

impl<D: SwDevice> std::fmt::Debug for Bridge<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("device_name", &self.device_name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn command_loop<D: SwDevice>(
    device: Arc<D>,
    table: Arc<MethodTable>,
    mut incoming: Incoming,
    notifier: Notifier,
    state: Arc<Mutex<BridgeState>>,
) {
    // Handlers die with the loop when the bridge disconnects
    let mut handlers = JoinSet::new();

    loop {
        tokio::select! {
            inbound = incoming.recv() => match inbound {
                Some(Inbound::Invocation { id, method, params }) => {
                    let name = method
                        .split_once('.')
                        .map_or(method.as_str(), |(_, name)| name)
                        .to_string();
                    let params = Params::from_value(params);

                    if let Err(e) = check_call(&table, &name, &params) {
                        warn!("[{}] rejecting {method}: {e}", notifier.device_name);
                        respond(&notifier, id, Err(e)).await;
                        continue;
                    }

                    debug!("[{}] invoking {name}", notifier.device_name);
                    handlers.spawn(serve(device.clone(), notifier.clone(), id, name, params));
                }
                Some(Inbound::Notification { method, .. }) => {
                    debug!("[{}] ignoring notification {method}", notifier.device_name);
                }
                Some(Inbound::Disconnected) | None => break,
            },
            Some(_) = handlers.join_next(), if !handlers.is_empty() => {}
        }
    }

    warn!("[{}] connection to SoHal lost", notifier.device_name);
    set_state(&state, BridgeState::Unregistered);
    notifier.request_disconnect();
}

fn set_state(slot: &Mutex<BridgeState>, state: BridgeState) {
    *slot.lock().unwrap_or_else(PoisonError::into_inner) = state;
}

fn check_call(table: &MethodTable, name: &str, params: &Params) -> Result<()> {
    let invalid = |message: String| {
        HippoError::new(Facility::SwDevice, ErrorKind::InvalidParam).with_message(message)
    };
    let arity = table
        .arity(name)
        .ok_or_else(|| invalid(format!("unknown method '{name}'")))?;
    if params.len() < arity {
        return Err(invalid(format!(
            "'{name}' takes {arity} parameters, got {}",
            params.len()
        )));
    }
    Ok(())
}

async fn serve<D: SwDevice>(
    device: Arc<D>,
    notifier: Notifier,
    id: RequestId,
    name: String,
    params: Params,
) {
    let result = device.dispatch(&name, params, &notifier).await;
    if let Err(e) = &result {
        debug!("[{}] {name} failed: {e}", notifier.device_name);
    }
    let succeeded = result.is_ok();
    respond(&notifier, id, result).await;

    // Answer first so the caller is not cut off by the teardown
    if succeeded && name == DISCONNECT_DEVICE {
        info!("[{}] peer requested disconnect", notifier.device_name);
        notifier.request_disconnect();
    }
}

async fn respond(notifier: &Notifier, id: RequestId, result: Result<Value>) {
    if let Err(e) = notifier.client.respond(id, result).await {
        warn!("[{}] could not send response: {e}", notifier.device_name);
    }
}
