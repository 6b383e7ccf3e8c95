//! # Connectivity Manager
//!
//! Owns the wireless link lifecycle: association, redundancy fallback,
//! timeout detection and disconnection recovery.
//!
//! This module handles:
//! - The `Disconnected / Connecting / Connected / Disconnecting` state machine
//! - Rotation between the primary and redundant access points
//! - Status polling between link-layer events while a connect is pending
//! - Publishing the link state for lock-free reads by other tasks
//!
//! The link is best-effort infrastructure: connect rejections, timeouts and
//! spontaneous disconnects are retried indefinitely and never escalate
//! beyond log events.

pub mod driver;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::config::WifiConfig;

pub use driver::{AccessPoint, IfaceState, IfaceStatus, WifiDriver, WifiEvent};

/// Which configured access point a connect attempt targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Primary,
    Redundant,
}

impl Target {
    /// The other element of the two-target rotation
    pub fn other(self) -> Self {
        match self {
            Target::Primary => Target::Redundant,
            Target::Redundant => Target::Primary,
        }
    }
}

/// Wireless link lifecycle state
///
/// Exactly one instance exists, mutated only by the connectivity manager and
/// published as an atomic discriminant for concurrent readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    Connecting(Target),
    Connected,
    Disconnecting,
}

impl LinkState {
    /// True only while the link can carry telemetry
    pub fn is_usable(self) -> bool {
        matches!(self, LinkState::Connected)
    }

    fn encode(self) -> u8 {
        match self {
            LinkState::Disconnected => 0,
            LinkState::Connecting(Target::Primary) => 1,
            LinkState::Connecting(Target::Redundant) => 2,
            LinkState::Connected => 3,
            LinkState::Disconnecting => 4,
        }
    }

    fn decode(raw: u8) -> Self {
        match raw {
            1 => LinkState::Connecting(Target::Primary),
            2 => LinkState::Connecting(Target::Redundant),
            3 => LinkState::Connected,
            4 => LinkState::Disconnecting,
            _ => LinkState::Disconnected,
        }
    }
}

/// Timing and target configuration for the connectivity manager
#[derive(Debug, Clone)]
pub struct LinkConfig {
    pub primary: AccessPoint,
    pub redundant: Option<AccessPoint>,
    pub status_poll: Duration,
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
}

impl LinkConfig {
    /// Build the manager configuration from the `[wifi]` config section
    pub fn from_wifi_config(config: &WifiConfig) -> Self {
        let redundant = config
            .redundancy_enabled
            .then(|| AccessPoint::new(&config.redundant_ssid, &config.redundant_password));

        Self {
            primary: AccessPoint::new(&config.primary_ssid, &config.primary_password),
            redundant,
            status_poll: Duration::from_millis(config.status_poll_ms),
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        }
    }
}

#[derive(Debug)]
struct LinkShared {
    state: AtomicU8,
    disconnect_requested: AtomicBool,
}

/// Commands other tasks can issue to the manager
#[derive(Debug)]
enum LinkCommand {
    Disconnect,
}

/// Cheap cloneable view of the published link state
#[derive(Debug, Clone)]
pub struct LinkHandle {
    shared: Arc<LinkShared>,
    commands: mpsc::Sender<LinkCommand>,
}

impl LinkHandle {
    /// Current link state (lock-free, safe for concurrent readers)
    pub fn current_state(&self) -> LinkState {
        LinkState::decode(self.shared.state.load(Ordering::Acquire))
    }

    /// True only while the link can carry telemetry
    pub fn is_usable(&self) -> bool {
        self.current_state().is_usable()
    }

    /// Ask the manager to drop the current association
    pub async fn request_disconnect(&self) {
        if self.commands.send(LinkCommand::Disconnect).await.is_err() {
            debug!("disconnect request ignored, connectivity manager stopped");
        }
    }

    /// Inject a link state directly, bypassing the manager
    #[cfg(test)]
    pub fn force_state(&self, state: LinkState) {
        self.shared.state.store(state.encode(), Ordering::Release);
    }
}

/// Outcome of one connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Connected,
    Failed,
    TimedOut,
    Shutdown,
}

/// The task owning the wireless link lifecycle
pub struct ConnectivityManager {
    driver: Box<dyn WifiDriver>,
    events: mpsc::Receiver<WifiEvent>,
    commands: mpsc::Receiver<LinkCommand>,
    commands_open: bool,
    config: LinkConfig,
    shared: Arc<LinkShared>,
}

impl ConnectivityManager {
    /// Create the manager and the handle other tasks read the link through
    pub fn new(
        driver: Box<dyn WifiDriver>,
        events: mpsc::Receiver<WifiEvent>,
        config: LinkConfig,
    ) -> (Self, LinkHandle) {
        let shared = Arc::new(LinkShared {
            state: AtomicU8::new(LinkState::Disconnected.encode()),
            disconnect_requested: AtomicBool::new(false),
        });

        let (command_tx, command_rx) = mpsc::channel(4);

        let handle = LinkHandle {
            shared: Arc::clone(&shared),
            commands: command_tx,
        };

        let manager = Self {
            driver,
            events,
            commands: command_rx,
            commands_open: true,
            config,
            shared,
        };

        (manager, handle)
    }

    /// Run the connect cycle until the event channel closes
    pub async fn run(mut self) {
        info!(
            primary = %self.config.primary.ssid,
            redundancy = self.config.redundant.is_some(),
            "connectivity manager started"
        );

        let mut target = Target::Primary;

        loop {
            match self.connect_attempt(target).await {
                Attempt::Connected => {
                    self.set_state(LinkState::Connected);

                    let keep_running = self.monitor_connected().await;

                    if self.shared.disconnect_requested.swap(false, Ordering::AcqRel) {
                        info!("requested disconnect complete");
                    } else {
                        warn!("link lost, restarting connect cycle");
                    }
                    self.set_state(LinkState::Disconnected);

                    if !keep_running {
                        break;
                    }
                    target = Target::Primary;
                }
                Attempt::Failed | Attempt::TimedOut => {
                    if self.config.redundant.is_some() {
                        // Two-element rotation, repeated indefinitely
                        target = target.other();
                    } else {
                        self.set_state(LinkState::Disconnected);
                        sleep(self.config.retry_delay).await;
                    }
                }
                Attempt::Shutdown => {
                    self.set_state(LinkState::Disconnected);
                    break;
                }
            }
        }

        info!("connectivity manager stopped");
    }

    /// Issue one connect request and wait for its outcome
    ///
    /// Between events the interface status is polled once per poll interval,
    /// mirroring the link layer's own reporting cadence. A status query
    /// failure counts as a failed attempt, not a crash.
    async fn connect_attempt(&mut self, target: Target) -> Attempt {
        self.set_state(LinkState::Connecting(target));

        let ap = self.target_ap(target).clone();

        if let Err(error) = self.driver.request_connect(&ap).await {
            warn!(ssid = %ap.ssid, %error, "connect request rejected");
            // Pace retries when the link layer rejects requests outright
            sleep(self.config.status_poll).await;
            return Attempt::Failed;
        }
        info!(ssid = %ap.ssid, "connection requested");

        let polls = (self.config.connect_timeout.as_millis()
            / self.config.status_poll.as_millis().max(1)) as u64;

        for _ in 0..polls.max(1) {
            match timeout(self.config.status_poll, self.events.recv()).await {
                Ok(Some(WifiEvent::ConnectResult { success: true })) => {
                    return Attempt::Connected;
                }
                Ok(Some(WifiEvent::ConnectResult { success: false })) => {
                    warn!(ssid = %ap.ssid, "connection failed");
                    return Attempt::Failed;
                }
                Ok(Some(WifiEvent::AddressAssigned(address))) => {
                    info!(%address, "network address assigned");
                }
                Ok(Some(WifiEvent::Disconnected)) => {
                    debug!("stale disconnect event ignored while connecting");
                }
                Ok(None) => return Attempt::Shutdown,
                Err(_) => match self.driver.query_status().await {
                    Ok(status) => {
                        debug!(state = ?status.state, rssi = ?status.rssi_dbm, "interface status");
                    }
                    Err(error) => {
                        warn!(%error, "status query failed");
                        return Attempt::Failed;
                    }
                },
            }
        }

        warn!(ssid = %ap.ssid, "connection timed out");
        Attempt::TimedOut
    }

    /// Block on link events while connected
    ///
    /// Returns `false` when the event channel closed and the manager should
    /// shut down, `true` on a disconnect (requested or spontaneous).
    async fn monitor_connected(&mut self) -> bool {
        loop {
            tokio::select! {
                event = self.events.recv() => match event {
                    Some(WifiEvent::Disconnected) => return true,
                    Some(WifiEvent::AddressAssigned(address)) => {
                        info!(%address, "network address assigned");
                    }
                    Some(WifiEvent::ConnectResult { .. }) => {
                        debug!("duplicate connect result ignored while connected");
                    }
                    None => return false,
                },
                command = self.commands.recv(), if self.commands_open => match command {
                    Some(LinkCommand::Disconnect) => {
                        self.shared.disconnect_requested.store(true, Ordering::Release);
                        self.set_state(LinkState::Disconnecting);
                        if let Err(error) = self.driver.request_disconnect().await {
                            warn!(%error, "disconnect request rejected");
                        }
                    }
                    None => self.commands_open = false,
                },
            }
        }
    }

    fn target_ap(&self, target: Target) -> &AccessPoint {
        match target {
            Target::Primary => &self.config.primary,
            // Redundant is only targeted when configured; fall back to the
            // primary rather than panic if it is not
            Target::Redundant => self.config.redundant.as_ref().unwrap_or(&self.config.primary),
        }
    }

    fn set_state(&self, next: LinkState) {
        let previous = LinkState::decode(self.shared.state.swap(next.encode(), Ordering::AcqRel));
        if previous != next {
            info!(from = ?previous, to = ?next, "link state changed");
        }
    }
}
