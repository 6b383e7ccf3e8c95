//! Trait abstraction for the WiFi link layer to enable testing
//!
//! Hardware callbacks from the link layer are re-modeled as [`WifiEvent`]
//! messages delivered on a channel, so the connectivity manager consumes
//! everything through one event loop instead of shared callback state.

use async_trait::async_trait;
use std::io;
use std::net::Ipv4Addr;

/// One configured access point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessPoint {
    pub ssid: String,
    pub password: String,
}

impl AccessPoint {
    pub fn new(ssid: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            ssid: ssid.into(),
            password: password.into(),
        }
    }
}

/// Asynchronous notifications from the link layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiEvent {
    /// Outcome of the last connect request
    ConnectResult { success: bool },
    /// The association dropped, locally requested or not
    Disconnected,
    /// A network address was assigned to the interface (observability only)
    AddressAssigned(Ipv4Addr),
}

/// Interface state reported by a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IfaceState {
    Inactive,
    Scanning,
    Associating,
    Associated,
}

/// Snapshot returned by [`WifiDriver::query_status`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfaceStatus {
    pub state: IfaceState,
    pub ssid: Option<String>,
    pub rssi_dbm: Option<i8>,
}

/// Operations the connectivity manager issues to the link layer
///
/// Requests are accepted or rejected immediately; the actual outcome arrives
/// later as a [`WifiEvent`] on the manager's event channel.
#[async_trait]
pub trait WifiDriver: Send {
    /// Ask the link layer to associate with `ap`
    async fn request_connect(&mut self, ap: &AccessPoint) -> io::Result<()>;

    /// Ask the link layer to drop the current association
    async fn request_disconnect(&mut self) -> io::Result<()>;

    /// Poll the current interface state
    async fn query_status(&mut self) -> io::Result<IfaceStatus>;
}

/// Placeholder driver for platforms without link hardware glue
///
/// Accepts every request and never delivers an event, so the connectivity
/// manager cycles through timed-out connect attempts and the unit keeps
/// logging locally with the link reported down.
#[derive(Debug, Default)]
pub struct DetachedDriver;

#[async_trait]
impl WifiDriver for DetachedDriver {
    async fn request_connect(&mut self, _ap: &AccessPoint) -> io::Result<()> {
        Ok(())
    }

    async fn request_disconnect(&mut self) -> io::Result<()> {
        Ok(())
    }

    async fn query_status(&mut self) -> io::Result<IfaceStatus> {
        Ok(IfaceStatus {
            state: IfaceState::Inactive,
            ssid: None,
            rssi_dbm: None,
        })
    }
}
