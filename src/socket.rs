//! Packet-oriented UDP socket.
//!
//! [`Socket`] is a thin wrapper around [`tokio::net::UdpSocket`] that speaks
//! [`Packet`] instead of raw bytes.  All protocol logic lives elsewhere;
//! this module owns nothing but byte I/O and decoding at the boundary.

use std::net::SocketAddr;

use tokio::net::UdpSocket;

use crate::error::{DrtpError, Result};
use crate::packet::{Packet, MAX_DATAGRAM};

/// A bound UDP socket that sends and receives whole protocol packets.
#[derive(Debug)]
pub struct Socket {
    /// The address this socket is actually bound to.  Differs from the
    /// requested one when the OS picks an ephemeral port.
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `addr`.  Port 0 asks the OS for an ephemeral
    /// port.
    pub async fn bind(addr: SocketAddr) -> Result<Self> {
        let inner = UdpSocket::bind(addr)
            .await
            .map_err(|source| DrtpError::Bind { addr, source })?;
        let local_addr = inner.local_addr().map_err(DrtpError::Io)?;
        Ok(Self { local_addr, inner })
    }

    /// Encode `packet` and send it as one datagram to `dest`.
    pub async fn send(&self, packet: &Packet, dest: SocketAddr) -> Result<()> {
        self.send_raw(&packet.encode(), dest).await
    }

    /// Send pre-encoded bytes unchanged.  The retransmission path uses this
    /// to replay stored datagrams verbatim.
    pub async fn send_raw(&self, bytes: &[u8], dest: SocketAddr) -> Result<()> {
        self.inner
            .send_to(bytes, dest)
            .await
            .map_err(DrtpError::from_io)?;
        Ok(())
    }

    /// Receive the next datagram and decode it.
    ///
    /// Returns the packet together with its sender's address.  Datagrams
    /// that fail to decode surface as [`DrtpError::Header`]; the caller
    /// decides whether that is fatal (handshake) or droppable (data loop).
    pub async fn recv(&self) -> Result<(Packet, SocketAddr)> {
        let mut buf = [0u8; MAX_DATAGRAM];
        let (len, addr) = self
            .inner
            .recv_from(&mut buf)
            .await
            .map_err(DrtpError::from_io)?;
        let packet = Packet::decode(&buf[..len])?;
        Ok((packet, addr))
    }
}
