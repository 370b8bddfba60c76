//! Connection Lifecycle Manager
//!
//! Owns the single connection to a device:
//!
//! ```text
//! Disconnected -> Connecting -> Connected
//!       ^             |             |
//!       +-------------+-------------+  (failure, disconnect, link loss)
//! ```
//!
//! Callers are expected to let one lifecycle operation settle before issuing
//! the next. Overlaps are still well defined:
//! - `connect()` while `Connecting` fails with `Busy`
//! - `connect()` while `Connected` fails with `AlreadyConnected`
//! - `disconnect()` while `Connecting` abandons the attempt; the pending
//!   `connect()` closes whatever link it obtained and fails with `ConnectFailed`
//!
//! Link loss is the only transition nobody asks for. Each connection gets one
//! watcher task, tagged with the connection generation, so a watcher from an
//! old connection can never tear down a newer one.

use std::sync::{Arc, Mutex, MutexGuard};

use firminia_proto::ConfigurationPayload;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::transport::{CandidateDevice, ChannelSpec, Endpoint, Link, LinkLoss, Transport};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

type EndpointOf<T> = <<T as Transport>::Link as Link>::Endpoint;

struct Inner<T: Transport> {
    state: ConnectionState,
    /// Bumped whenever a connection attempt starts or a connection is torn down
    generation: u64,
    device: Option<CandidateDevice>,
    link: Option<T::Link>,
    endpoint: Option<EndpointOf<T>>,
    watcher: Option<JoinHandle<()>>,
}

impl<T: Transport> Inner<T> {
    /// Back to `Disconnected` with every reference dropped. Returns the link so
    /// the caller can close it outside the lock.
    fn reset(&mut self) -> Option<T::Link> {
        self.generation += 1;
        self.state = ConnectionState::Disconnected;
        self.device = None;
        self.endpoint = None;
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
        self.link.take()
    }
}

pub struct ConnectionManager<T: Transport> {
    transport: Arc<T>,
    channel: ChannelSpec,
    inner: Arc<Mutex<Inner<T>>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
}

fn lock<T: Transport>(inner: &Mutex<Inner<T>>) -> MutexGuard<'_, Inner<T>> {
    inner.lock().unwrap_or_else(|e| e.into_inner())
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: Arc<T>, channel: ChannelSpec) -> Self {
        let inner = Inner {
            state: ConnectionState::Disconnected,
            generation: 0,
            device: None,
            link: None,
            endpoint: None,
            watcher: None,
        };
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            transport,
            channel,
            inner: Arc::new(Mutex::new(inner)),
            state_tx: Arc::new(state_tx),
        }
    }

    pub fn state(&self) -> ConnectionState {
        lock(&self.inner).state
    }

    /// Observes every state change, including those caused by link loss.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// The device being connected to or connected.
    pub fn device(&self) -> Option<CandidateDevice> {
        lock(&self.inner).device.clone()
    }

    pub fn has_endpoint(&self) -> bool {
        lock(&self.inner).endpoint.is_some()
    }

    pub fn has_link(&self) -> bool {
        lock(&self.inner).link.is_some()
    }

    /// Connects and opens the configuration channel. Valid only from `Disconnected`.
    ///
    /// On any failure the manager is back in `Disconnected` with no device or
    /// endpoint held. Dropping the returned future has the same effect.
    pub async fn connect(&self, device: &CandidateDevice) -> Result<()> {
        let generation = {
            let mut inner = lock(&self.inner);
            match inner.state {
                ConnectionState::Connecting => return Err(Error::Busy),
                ConnectionState::Connected => {
                    let name = inner.device.as_ref().map(|d| d.name.clone()).unwrap_or_default();
                    return Err(Error::AlreadyConnected(name));
                }
                ConnectionState::Disconnected => {}
            }
            inner.generation += 1;
            inner.state = ConnectionState::Connecting;
            inner.device = Some(device.clone());
            self.state_tx.send_replace(ConnectionState::Connecting);
            inner.generation
        };
        let mut attempt = PendingConnect {
            inner: &*self.inner,
            state_tx: &*self.state_tx,
            generation,
            link: None,
            armed: true,
        };
        info!(id = %device.id, name = %device.name, "connecting");

        let (endpoint, loss) = match self.establish(device, &mut attempt.link).await {
            Ok(established) => established,
            Err(e) => {
                warn!(id = %device.id, error = %e, "connect failed");
                return Err(e);
            }
        };
        let link = attempt.disarm();

        let abandoned = {
            let mut inner = lock(&self.inner);
            if inner.generation == generation {
                inner.watcher = Some(self.watch_link_loss(generation, loss));
                inner.link = link;
                inner.endpoint = Some(endpoint);
                inner.state = ConnectionState::Connected;
                self.state_tx.send_replace(ConnectionState::Connected);
                None
            } else {
                Some(link)
            }
        };

        if let Some(link) = abandoned {
            warn!(id = %device.id, "connection abandoned by disconnect");
            if let Some(link) = link {
                if let Err(e) = link.disconnect().await {
                    debug!(error = %e, "closing abandoned link failed");
                }
            }
            return Err(Error::ConnectFailed(
                "disconnected while connecting".to_string(),
            ));
        }

        info!(id = %device.id, name = %device.name, "connected");
        Ok(())
    }

    /// Leaves the link in `slot` while the channel is opened, so an attempt
    /// dropped halfway can still close it.
    async fn establish(
        &self,
        device: &CandidateDevice,
        slot: &mut Option<T::Link>,
    ) -> Result<(EndpointOf<T>, LinkLoss)> {
        let link = slot.insert(self.transport.connect(device).await?);

        let opened = match link.open_channel(&self.channel).await {
            Ok(endpoint) => match link.subscribe_link_loss().await {
                Ok(loss) => Ok((endpoint, loss)),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        };

        if opened.is_err() {
            if let Some(link) = slot.take() {
                if let Err(close) = link.disconnect().await {
                    debug!(error = %close, "closing half-open link failed");
                }
            }
        }
        opened
    }

    fn watch_link_loss(&self, generation: u64, loss: LinkLoss) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let state_tx = Arc::clone(&self.state_tx);

        tokio::spawn(async move {
            loss.wait().await;

            let device = {
                let mut guard = lock(&inner);
                if guard.generation != generation || guard.state != ConnectionState::Connected {
                    return;
                }
                let device = guard.device.clone();
                // this task is the watcher; detach it instead of aborting itself
                guard.watcher.take();
                guard.reset();
                state_tx.send_replace(ConnectionState::Disconnected);
                device
            };

            warn!(
                name = %device.map(|d| d.name).unwrap_or_default(),
                "link lost"
            );
        })
    }

    /// Tears the connection down. A no-op when already `Disconnected`.
    ///
    /// The state is `Disconnected` as soon as this returns, whether or not the
    /// transport managed to close the link cleanly.
    pub async fn disconnect(&self) {
        let (link, device) = {
            let mut inner = lock(&self.inner);
            if inner.state == ConnectionState::Disconnected {
                debug!("disconnect: already disconnected");
                return;
            }
            let device = inner.device.clone();
            let link = inner.reset();
            self.state_tx.send_replace(ConnectionState::Disconnected);
            (link, device)
        };

        if let Some(link) = link {
            if link.is_connected().await {
                if let Err(e) = link.disconnect().await {
                    warn!(error = %e, "transport disconnect failed");
                }
            }
        }

        info!(
            name = %device.map(|d| d.name).unwrap_or_default(),
            "disconnected"
        );
    }

    /// Encodes the payload and performs exactly one write on the channel.
    ///
    /// Fails with `NotConnected` without touching the transport unless the
    /// state is `Connected`.
    pub async fn send(&self, payload: &ConfigurationPayload) -> Result<()> {
        let endpoint = {
            let inner = lock(&self.inner);
            match (inner.state, &inner.endpoint) {
                (ConnectionState::Connected, Some(endpoint)) => endpoint.clone(),
                _ => return Err(Error::NotConnected),
            }
        };

        let bytes = payload.encode()?;
        endpoint.write(&bytes).await.map_err(|e| match e {
            Error::WriteFailed(_) => e,
            other => Error::WriteFailed(other.to_string()),
        })?;

        info!(bytes = bytes.len(), ssid = %payload.ssid, "configuration sent");
        Ok(())
    }
}

/// An in-flight `connect()`. Unless disarmed, dropping it puts the manager
/// back in `Disconnected` and closes any link obtained so far.
struct PendingConnect<'a, T: Transport> {
    inner: &'a Mutex<Inner<T>>,
    state_tx: &'a watch::Sender<ConnectionState>,
    generation: u64,
    link: Option<T::Link>,
    armed: bool,
}

impl<T: Transport> PendingConnect<'_, T> {
    fn disarm(&mut self) -> Option<T::Link> {
        self.armed = false;
        self.link.take()
    }
}

impl<T: Transport> Drop for PendingConnect<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        {
            let mut inner = lock(self.inner);
            if inner.generation == self.generation {
                inner.reset();
                self.state_tx.send_replace(ConnectionState::Disconnected);
            }
        }

        let Some(link) = self.link.take() else {
            return;
        };
        warn!("connect cancelled, closing link");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = link.disconnect().await {
                    debug!(error = %e, "closing cancelled link failed");
                }
            });
        }
    }
}

impl<T: Transport> Drop for ConnectionManager<T> {
    fn drop(&mut self) {
        if let Some(watcher) = lock(&self.inner).watcher.take() {
            watcher.abort();
        }
    }
}
