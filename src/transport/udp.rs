//! # UDP Transport
//!
//! Sends telemetry frames to the base station as UDP datagrams.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::info;

use super::Transport;

/// UDP datagram transport towards the base station
pub struct UdpTransport {
    socket: UdpSocket,
    base_station: SocketAddr,
}

impl std::fmt::Debug for UdpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpTransport")
            .field("base_station", &self.base_station)
            .finish_non_exhaustive()
    }
}

impl UdpTransport {
    /// Bind an ephemeral local port and aim it at the base station
    ///
    /// # Errors
    ///
    /// Returns error if the local socket cannot be bound or connected
    pub async fn connect(base_station: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(base_station).await?;

        info!(%base_station, "UDP transport ready");

        Ok(Self { socket, base_station })
    }

    /// The configured base station address
    pub fn base_station(&self) -> SocketAddr {
        self.base_station
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&mut self, frame: &[u8]) -> io::Result<()> {
        // One datagram per frame; a datagram either leaves whole or errors
        self.socket.send(frame).await.map(|_| ())
    }
}
