//! # Bench Simulation
//!
//! Simulated collaborators for running the unit without vehicle hardware:
//! a motor CAN frame generator, a GPS fix generator and a scripted WiFi
//! driver. Glue only; the pipeline under them is the production code.

use std::io;
use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep};
use tracing::info;

use crate::ingest::can::{CanFrame, MOTOR_FRAME_ID};
use crate::ingest::gps::GpsFix;
use crate::link::driver::{AccessPoint, IfaceState, IfaceStatus, WifiDriver, WifiEvent};

/// Small xorshift PRNG, enough for bench value jitter
#[derive(Debug)]
struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    fn new(seed: u64) -> Self {
        Self { state: seed.max(1) }
    }

    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 32) as u32
    }

    fn below(&mut self, bound: u32) -> u32 {
        self.next_u32() % bound
    }
}

/// Build one motor broadcast frame from bench values
fn motor_frame(power: u16, angular_speed: u16, vehicle_speed: u16) -> CanFrame {
    let p = power.to_be_bytes();
    let a = angular_speed.to_be_bytes();
    let v = vehicle_speed.to_be_bytes();

    CanFrame {
        id: MOTOR_FRAME_ID,
        dlc: 8,
        data: [p[0], p[1], a[0], a[1], v[0], v[1], 0, 0],
    }
}

/// Fabricate motor frames on a timer
///
/// Value ranges follow the bench motor generator: power 55000-59999,
/// angular speed 80-84, vehicle speed 78-82.
pub async fn run_motor_sim(frames: mpsc::Sender<CanFrame>, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "motor simulation started");

    let mut rng = XorShift64::new(0x5EED_CAFE);
    let mut ticker = interval(period);

    loop {
        ticker.tick().await;

        let power = 55000 + rng.below(5000) as u16;
        let angular_speed = 80 + rng.below(5) as u16;
        let vehicle_speed = 78 + rng.below(5) as u16;

        if frames.send(motor_frame(power, angular_speed, vehicle_speed)).await.is_err() {
            break;
        }
    }

    info!("motor simulation stopped");
}

/// Fabricate GPS fixes wandering around a fixed point
pub async fn run_gps_sim(fixes: mpsc::Sender<GpsFix>, period: Duration) {
    info!(period_ms = period.as_millis() as u64, "GPS simulation started");

    let mut rng = XorShift64::new(0x6E55_1E55);
    let mut ticker = interval(period);
    let mut time_of_day = 43200.0;

    loop {
        ticker.tick().await;

        let fix = GpsFix {
            latitude: 46.2331 + rng.below(1000) as f64 * 1e-6,
            longitude: 7.3606 + rng.below(1000) as f64 * 1e-6,
            fix: true,
            time_of_day,
            speed: 60.0 + rng.below(200) as f64 * 0.1,
        };
        time_of_day = (time_of_day + period.as_secs_f64()) % 86400.0;

        if fixes.send(fix).await.is_err() {
            break;
        }
    }

    info!("GPS simulation stopped");
}

/// Scripted WiFi driver
///
/// Accepts every connect request and reports success once the configured
/// number of attempts has been made, so the manager's retry and redundancy
/// paths get exercised on the bench. Optionally drops the link some time
/// after each successful connect.
pub struct SimWifiDriver {
    events: mpsc::Sender<WifiEvent>,
    attempts: u32,
    succeed_after: u32,
    drop_after: Option<Duration>,
}

impl SimWifiDriver {
    /// Result latency of the simulated link layer
    const RESULT_DELAY: Duration = Duration::from_millis(600);

    pub fn new(
        events: mpsc::Sender<WifiEvent>,
        succeed_after: u32,
        drop_after: Option<Duration>,
    ) -> Self {
        Self {
            events,
            attempts: 0,
            succeed_after: succeed_after.max(1),
            drop_after,
        }
    }
}

#[async_trait]
impl WifiDriver for SimWifiDriver {
    async fn request_connect(&mut self, _ap: &AccessPoint) -> io::Result<()> {
        self.attempts += 1;
        let success = self.attempts >= self.succeed_after;

        let events = self.events.clone();
        let drop_after = if success { self.drop_after } else { None };

        tokio::spawn(async move {
            sleep(Self::RESULT_DELAY).await;
            if events.send(WifiEvent::ConnectResult { success }).await.is_err() {
                return;
            }

            if success {
                let _ = events
                    .send(WifiEvent::AddressAssigned(Ipv4Addr::new(192, 168, 1, 42)))
                    .await;

                if let Some(delay) = drop_after {
                    sleep(delay).await;
                    let _ = events.send(WifiEvent::Disconnected).await;
                }
            }
        });

        Ok(())
    }

    async fn request_disconnect(&mut self) -> io::Result<()> {
        let events = self.events.clone();
        tokio::spawn(async move {
            let _ = events.send(WifiEvent::Disconnected).await;
        });
        Ok(())
    }

    async fn query_status(&mut self) -> io::Result<IfaceStatus> {
        Ok(IfaceStatus {
            state: IfaceState::Associating,
            ssid: None,
            rssi_dbm: Some(-55),
        })
    }
}
