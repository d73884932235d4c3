//! Generic device handle.
//!
//! A [`Device`] addresses one `<name>@<index>` on SoHal. The WebSocket is
//! opened on first use and reopened on demand after it drops. Every
//! connection feeds a single dispatcher task that hands pushes to the
//! subscriber and, while someone is subscribed, restores the subscription
//! after a connection loss.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use hippo_rpc::{ConnectionConfig, Inbound, Incoming, RpcClient};
use hippo_types::{
    DeviceInfo, Facility, Notification, Params, Result, SOHAL_CONNECTED, SOHAL_DISCONNECTED,
    TemperatureInfo, Wire,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::subscriber::{Callback, Subscriber};

/// Handle to one device instance.
///
/// Dropping the handle stops its local tasks and closes its connection. It
/// does not close the device on the server.
pub struct Device<N: Notification> {
    shared: Arc<Shared<N>>,
}

struct Dispatcher {
    connections: mpsc::UnboundedSender<Incoming>,
    task: JoinHandle<()>,
}

struct Shared<N> {
    name: String,
    index: u32,
    target: String,
    facility: Facility,
    config: ConnectionConfig,
    connection: tokio::sync::Mutex<Option<Arc<RpcClient>>>,
    subscriber: Subscriber<N>,
    dispatcher: Mutex<Option<Dispatcher>>,
}

impl<N: Notification> Device<N> {
    #[must_use]
    pub fn new(config: ConnectionConfig, name: impl Into<String>, index: u32, facility: Facility) -> Self {
        let name = name.into();
        let target = format!("{name}@{index}");
        Self {
            shared: Arc::new(Shared {
                subscriber: Subscriber::new(target.clone()),
                name,
                index,
                target,
                facility,
                config,
                connection: tokio::sync::Mutex::new(None),
                dispatcher: Mutex::new(None),
            }),
        }
    }

    /// Device type name, e.g. `touchmat`.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    #[must_use]
    pub fn index(&self) -> u32 {
        self.shared.index
    }

    /// `<name>@<index>`, the prefix of every method this handle calls.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.shared.target
    }

    #[must_use]
    pub fn facility(&self) -> Facility {
        self.shared.facility
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }

    /// Whether a live connection is currently held.
    pub async fn is_connected(&self) -> bool {
        self.shared
            .connection
            .lock()
            .await
            .as_ref()
            .is_some_and(|client| !client.is_closed())
    }

    /// Open the connection now instead of on first call.
    ///
    /// # Errors
    ///
    /// Returns `Open` or `Timeout` if SoHal cannot be reached.
    pub async fn connect(&self) -> Result<()> {
        Shared::ensure_connected(&self.shared).await.map(|_| ())
    }

    /// Call `<target>.<method>` with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns connection errors, the server's error, or `MessageError` if
    /// the result does not decode as `T`.
    pub async fn call<T: Wire>(&self, method: &str, params: Params) -> Result<T> {
        self.call_with_timeout(method, params, self.shared.config.request_timeout())
            .await
    }

    /// Call `<target>.<method>` with an explicit timeout. Zero waits forever.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn call_with_timeout<T: Wire>(
        &self,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<T> {
        Shared::call(&self.shared, method, params, timeout).await
    }

    /// Read a property: `method()` returns the current value.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn get<T: Wire>(&self, method: &str) -> Result<T> {
        self.call(method, Params::new()).await
    }

    /// Write a property, discarding whatever the server echoes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidParam` if `value` cannot be encoded, otherwise the
    /// same as [`Device::call`].
    pub async fn set<T: Wire>(&self, method: &str, value: &T) -> Result<()> {
        let params = self.params(value)?;
        self.call::<()>(method, params).await
    }

    /// Write a property and return the value the device actually applied.
    ///
    /// # Errors
    ///
    /// Same as [`Device::set`].
    pub async fn set_confirmed<T: Wire>(&self, method: &str, value: &T) -> Result<T> {
        let params = self.params(value)?;
        self.call(method, params).await
    }

    fn params<T: Wire>(&self, value: &T) -> Result<Params> {
        Params::new()
            .with(value)
            .map_err(|e| e.into_error(self.shared.facility))
    }

    /// Open the device. Returns the new open count.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn open(&self) -> Result<u32> {
        self.get("open").await
    }

    /// Close the device. Returns the remaining open count.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn close(&self) -> Result<u32> {
        self.get("close").await
    }

    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn open_count(&self) -> Result<u32> {
        self.get("open_count").await
    }

    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn factory_default(&self) -> Result<()> {
        self.get("factory_default").await
    }

    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn info(&self) -> Result<DeviceInfo> {
        self.get("info").await
    }

    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn is_device_connected(&self) -> Result<bool> {
        self.get("is_device_connected").await
    }

    /// # Errors
    ///
    /// Same as [`Device::call`].
    pub async fn temperatures(&self) -> Result<Vec<TemperatureInfo>> {
        self.get("temperatures").await
    }

    /// Subscribe to this device's notifications.
    ///
    /// `callback` replaces any previously registered one and runs on the
    /// dispatcher task, so it must not block. Returns the server's
    /// subscriber count.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`]. The previous callback stays in place.
    pub async fn subscribe<F>(&self, callback: F) -> Result<u32>
    where
        F: Fn(&N) + Send + Sync + 'static,
    {
        let count = self.get("subscribe").await?;
        self.shared.subscriber.set(Arc::new(callback) as Callback<N>);
        info!("[{}] subscribed ({count})", self.shared.target);
        Ok(count)
    }

    /// Drop the callback and unsubscribe. Returns the server's subscriber
    /// count.
    ///
    /// # Errors
    ///
    /// Same as [`Device::call`]. The callback is cleared either way.
    pub async fn unsubscribe(&self) -> Result<u32> {
        self.shared.subscriber.clear();
        let count = self.get("unsubscribe").await?;
        info!("[{}] unsubscribed ({count})", self.shared.target);
        Ok(count)
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.shared.subscriber.is_set()
    }
}

impl<N: Notification> Drop for Device<N> {
    fn drop(&mut self) {
        if let Some(dispatcher) = self.shared.dispatcher().take() {
            dispatcher.task.abort();
        }
    }
}

impl<N: Notification> std::fmt::Debug for Device<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("target", &self.shared.target)
            .field("facility", &self.shared.facility)
            .field("subscribed", &self.shared.subscriber.is_set())
            .finish_non_exhaustive()
    }
}

impl<N: Notification> Shared<N> {
    fn dispatcher(&self) -> MutexGuard<'_, Option<Dispatcher>> {
        self.dispatcher.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn ensure_connected(this: &Arc<Self>) -> Result<Arc<RpcClient>> {
        let mut connection = this.connection.lock().await;
        if let Some(client) = connection.as_ref().filter(|c| !c.is_closed()) {
            return Ok(client.clone());
        }

        let (client, incoming) = RpcClient::connect(&this.config, this.facility).await?;
        let client = Arc::new(client);
        *connection = Some(client.clone());
        drop(connection);
        debug!("[{}] connected to {}", this.target, client.url());

        Self::hand_over(this, incoming);
        Ok(client)
    }

    /// Give a fresh connection's inbound stream to the dispatcher, starting
    /// the dispatcher on first use.
    fn hand_over(this: &Arc<Self>, incoming: Incoming) {
        let mut slot = this.dispatcher();
        let dispatcher = slot.get_or_insert_with(|| {
            let (connections, rx) = mpsc::unbounded_channel();
            let task = tokio::spawn(dispatch_loop(this.clone(), rx));
            Dispatcher { connections, task }
        });
        let _ = dispatcher.connections.send(incoming);
    }

    async fn call<T: Wire>(
        this: &Arc<Self>,
        method: &str,
        params: Params,
        timeout: Duration,
    ) -> Result<T> {
        let client = Self::ensure_connected(this).await?;
        let value = client
            .call(&format!("{}.{method}", this.target), params.into_value(), timeout)
            .await?;
        T::from_wire(&value).map_err(|e| e.into_error(this.facility))
    }

    /// Retry connect plus `subscribe` until it works or nobody is
    /// subscribed any more.
    async fn resubscribe(this: &Arc<Self>) {
        let interval = this.config.reconnect_interval();
        loop {
            tokio::time::sleep(interval).await;
            if !this.subscriber.is_set() {
                debug!("[{}] no subscriber, not reconnecting", this.target);
                return;
            }

            let resubscribed =
                Self::call::<u32>(this, "subscribe", Params::new(), this.config.request_timeout())
                    .await;
            match resubscribed {
                Ok(count) => {
                    info!("[{}] reconnected, resubscribed ({count})", this.target);
                    this.subscriber.deliver_event(SOHAL_CONNECTED);
                    return;
                }
                Err(e) => debug!("[{}] reconnect failed: {e}", this.target),
            }
        }
    }
}

async fn dispatch_loop<N: Notification>(
    shared: Arc<Shared<N>>,
    mut connections: mpsc::UnboundedReceiver<Incoming>,
) {
    while let Some(mut incoming) = connections.recv().await {
        while let Some(inbound) = incoming.recv().await {
            match inbound {
                Inbound::Notification { method, params } => {
                    shared.subscriber.deliver(&method, params);
                }
                Inbound::Invocation { method, .. } => {
                    warn!("[{}] ignoring invocation of {method}", shared.target);
                }
                Inbound::Disconnected => break,
            }
        }

        warn!("[{}] connection to SoHal lost", shared.target);
        shared.subscriber.deliver_event(SOHAL_DISCONNECTED);
        if shared.subscriber.is_set() {
            Shared::resubscribe(&shared).await;
        }
    }
}
