// Bus connection manager: owns the single transport to the message bus.
//
// One connection per process, shared by every active room. Transport
// failures surface as a state transition to `Disconnected`, never as an
// error thrown at the caller; there is no automatic backoff — retry is
// caller-driven (typically on the next user action).
//
// Transport is abstracted via `BusTransport` for testability. The
// tokio-tungstenite implementation lives in `transport`.

use std::net::IpAddr;

use anyhow::{anyhow, Result};
use tracing::{info, warn};
use url::Url;
use uuid::Uuid;

use livedraft_common::protocol::bus::BusMessage;
use livedraft_common::types::Session;

use crate::subscription::{SubscriptionGuard, SubscriptionSet};

/// Who the local user is, independent of any live connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub user_id: String,
    pub display_name: String,
}

/// Abstraction over the network transport for testability.
pub trait BusTransport {
    /// Open the connection to the given URL.
    fn connect(&mut self, bus_url: &str) -> Result<()>;

    /// Send a message over the connection.
    fn send(&mut self, msg: &BusMessage) -> Result<()>;

    /// Receive the next message (blocking). Returns None on clean close.
    fn recv(&mut self) -> Result<Option<BusMessage>>;

    /// Close the connection.
    fn close(&mut self);
}

/// Current state of the bus connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Manages the bus connection lifecycle.
pub struct ConnectionManager<T: BusTransport> {
    bus_url: String,
    identity: ClientIdentity,
    transport: T,
    state: ConnectionState,
    session: Option<Session>,
    observers: SubscriptionSet<ConnectionState>,
}

impl<T: BusTransport> ConnectionManager<T> {
    pub fn new(bus_url: impl Into<String>, identity: ClientIdentity, transport: T) -> Self {
        Self {
            bus_url: bus_url.into(),
            identity,
            transport,
            state: ConnectionState::Disconnected,
            session: None,
            observers: SubscriptionSet::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn identity(&self) -> &ClientIdentity {
        &self.identity
    }

    /// The live session, if connected.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Observe state transitions. Dropping the guard deregisters the handler.
    pub fn on_state_change(
        &self,
        handler: impl FnMut(&ConnectionState) + 'static,
    ) -> SubscriptionGuard {
        self.observers.subscribe(handler)
    }

    /// Establish the transport if not already connected. Idempotent.
    ///
    /// Returns the resulting state; a transport failure leaves the manager
    /// `Disconnected` (observers see the transition). `Err` is reserved for
    /// an invalid bus URL.
    pub fn connect(&mut self) -> Result<ConnectionState> {
        if self.state == ConnectionState::Connected {
            return Ok(self.state);
        }
        validate_bus_url(&self.bus_url)?;

        self.set_state(ConnectionState::Connecting);
        match self.transport.connect(&self.bus_url) {
            Ok(()) => {
                let session = Session {
                    connection_id: Uuid::new_v4(),
                    user_id: self.identity.user_id.clone(),
                    display_name: self.identity.display_name.clone(),
                };
                info!(connection_id = %session.connection_id, "connected to message bus");
                self.session = Some(session);
                self.set_state(ConnectionState::Connected);
            }
            Err(error) => {
                warn!(%error, "bus connection failed");
                self.session = None;
                self.set_state(ConnectionState::Disconnected);
            }
        }
        Ok(self.state)
    }

    /// Tear the transport down. Safe to call repeatedly.
    pub fn disconnect(&mut self) {
        self.transport.close();
        self.session = None;
        self.set_state(ConnectionState::Disconnected);
    }

    /// Send a message to the bus.
    ///
    /// `Err` means caller misuse (not connected). A transport-level failure
    /// instead drops the connection and notifies state observers.
    pub fn send(&mut self, msg: &BusMessage) -> Result<()> {
        if self.state != ConnectionState::Connected {
            return Err(anyhow!("cannot send: not connected"));
        }
        if let Err(error) = self.transport.send(msg) {
            warn!(%error, "bus send failed, dropping connection");
            self.transport.close();
            self.session = None;
            self.set_state(ConnectionState::Disconnected);
        }
        Ok(())
    }

    /// Receive the next inbound message.
    ///
    /// Returns `Ok(None)` when the connection closed — cleanly or through a
    /// transport error — after transitioning to `Disconnected`.
    pub fn recv(&mut self) -> Result<Option<BusMessage>> {
        if self.state != ConnectionState::Connected {
            return Err(anyhow!("cannot receive: not connected"));
        }
        match self.transport.recv() {
            Ok(Some(msg)) => Ok(Some(msg)),
            Ok(None) => {
                self.session = None;
                self.set_state(ConnectionState::Disconnected);
                Ok(None)
            }
            Err(error) => {
                warn!(%error, "bus receive failed, dropping connection");
                self.transport.close();
                self.session = None;
                self.set_state(ConnectionState::Disconnected);
                Ok(None)
            }
        }
    }

    fn set_state(&mut self, next: ConnectionState) {
        if self.state != next {
            self.state = next;
            self.observers.emit(&next);
        }
    }
}

fn validate_bus_url(value: &str) -> Result<()> {
    let parsed = Url::parse(value).map_err(|error| anyhow!("invalid bus_url `{value}`: {error}"))?;
    match parsed.scheme() {
        "wss" => Ok(()),
        "ws" if is_loopback_host(parsed.host_str()) => Ok(()),
        _ => Err(anyhow!("bus_url must use wss (ws is allowed only for localhost testing)")),
    }
}

fn is_loopback_host(host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().is_ok_and(|addr| addr.is_loopback())
}
