//! Client engine: handshake, Go-Back-N transfer, teardown.
//!
//! [`Sender`] drives one whole transfer on a single logical control flow;
//! its only suspension points are bounded socket receives.  The window
//! bookkeeping lives in [`SendWindow`], this module owns the socket and the
//! retry rules:
//!
//! - An acknowledgment naming the window head releases exactly one slot.
//! - Any other acknowledgment, an undecodable datagram, and an expired wait
//!   all trigger the same Go-Back-N step: every in-flight segment is resent
//!   in window order, verbatim.
//! - The handshake is attempted exactly once; the closing FIN is retried
//!   without bound.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use tokio::time::timeout;

use crate::error::{DrtpError, Result};
use crate::files::{base_name, FileChunker};
use crate::packet::{Flags, Packet};
use crate::socket::Socket;
use crate::state::{advance, ConnectionState};
use crate::window::SendWindow;
use crate::{Config, LINK_TIMEOUT};

/// Client-side engine for one file transfer.
#[derive(Debug)]
pub struct Sender {
    socket: Socket,
    peer: SocketAddr,
    window: SendWindow,
    state: ConnectionState,
    /// Next sequence number to assign: 1 is the name segment, 2 onward the
    /// content chunks.
    seq: u16,
}

impl Sender {
    /// Bind an ephemeral local port and run the connection-establishment
    /// handshake against `cfg.addr`.
    ///
    /// One SYN, one bounded wait.  No reply within [`LINK_TIMEOUT`], a reply
    /// other than SYN+ACK, and a connection reset are all fatal; the
    /// handshake is never retried.
    pub async fn connect(cfg: &Config) -> Result<Self> {
        let socket = Socket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))).await?;
        let peer = cfg.addr;
        let mut state = ConnectionState::Idle;

        log::info!("connection establishment phase");
        socket.send(&Packet::control(Flags::Syn), peer).await?;
        advance(&mut state, ConnectionState::SynSent);
        log::info!("SYN packet is sent");

        let (reply, _) = match timeout(LINK_TIMEOUT, socket.recv()).await {
            Err(_) => return Err(DrtpError::HandshakeTimeout(peer, LINK_TIMEOUT)),
            Ok(received) => received?,
        };
        if reply.header.flags != Flags::SynAck {
            return Err(DrtpError::UnexpectedSegment {
                expected: "SYN-ACK",
                got: reply.header.flags,
            });
        }
        log::info!("SYN-ACK packet is received");

        socket.send(&Packet::control(Flags::Ack), peer).await?;
        log::info!("ACK packet is sent");
        log::info!("connection established");
        advance(&mut state, ConnectionState::Established);

        Ok(Self {
            socket,
            peer,
            window: SendWindow::new(cfg.window),
            state,
            seq: 1,
        })
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Send the whole file: the base-name segment first, then every content
    /// chunk, each through the admit / transmit / drain cycle.
    pub async fn transfer(&mut self, path: &Path) -> Result<()> {
        if self.state != ConnectionState::Established {
            return Err(DrtpError::BadState);
        }
        let name = base_name(path).ok_or_else(|| {
            DrtpError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "file has no UTF-8 base name",
            ))
        })?;

        log::info!("data transfer phase");
        let mut chunker = FileChunker::open(path).map_err(DrtpError::Io)?;

        self.send_segment(name.as_bytes().to_vec()).await?;
        while let Some(chunk) = chunker.next_chunk().map_err(DrtpError::Io)? {
            self.send_segment(chunk).await?;
        }
        // Final drain: every in-flight segment must be acknowledged before
        // teardown may start.
        self.drain(true).await?;
        log::info!("data transfer finished");
        Ok(())
    }

    /// Connection teardown: FIN, retried without bound until a FIN+ACK
    /// arrives.
    ///
    /// The receiver answers with exactly one FIN+ACK.  If that single reply
    /// is lost this loop keeps resending the FIN; a known limitation of the
    /// protocol's teardown.
    pub async fn close(&mut self) -> Result<()> {
        if self.state != ConnectionState::Established {
            return Err(DrtpError::BadState);
        }
        log::info!("connection teardown phase");
        advance(&mut self.state, ConnectionState::FinWait);

        loop {
            self.socket.send(&Packet::control(Flags::Fin), self.peer).await?;
            log::info!("FIN packet is sent");
            match timeout(LINK_TIMEOUT, self.socket.recv()).await {
                Err(_) => {
                    log::info!("no FIN-ACK received, resending FIN packet");
                }
                Ok(Err(DrtpError::Header(e))) => {
                    log::debug!("undecodable datagram while closing: {e}");
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok((pkt, addr))) if addr == self.peer && pkt.header.flags == Flags::FinAck => {
                    log::info!("FIN-ACK packet is received");
                    break;
                }
                // Anything else resends the FIN.
                Ok(Ok(_)) => {}
            }
        }
        advance(&mut self.state, ConnectionState::Closed);
        log::info!("connection closes");
        Ok(())
    }

    /// Full client lifecycle against one server: connect, transfer, close.
    pub async fn run(cfg: &Config, path: &Path) -> Result<()> {
        let mut sender = Self::connect(cfg).await?;
        sender.transfer(path).await?;
        sender.close().await
    }

    /// Put one payload on the wire, admit it into the window, then drain
    /// until the window has room again.
    async fn send_segment(&mut self, payload: Vec<u8>) -> Result<()> {
        let wire = Packet::data(self.seq, payload).encode();
        self.socket.send_raw(&wire, self.peer).await?;
        self.window.admit(self.seq, wire);
        log::info!(
            "packet seq={} sent, sliding window={:?}",
            self.seq,
            self.window.seqs()
        );
        self.seq = self.seq.wrapping_add(1);
        self.drain(false).await
    }

    /// The Go-Back-N drain loop.
    ///
    /// Blocks while the window is full, or until it is empty when `last` is
    /// set, releasing one slot per matching acknowledgment.  A timeout, a
    /// mismatched acknowledgment, and an undecodable datagram all count as
    /// an RTO and resend the whole window.
    async fn drain(&mut self, last: bool) -> Result<()> {
        while !self.drained(last) {
            match timeout(LINK_TIMEOUT, self.socket.recv()).await {
                Err(_) => {
                    log::info!("RTO occurred");
                    self.retransmit_window().await?;
                }
                Ok(Err(DrtpError::Header(e))) => {
                    log::debug!("undecodable datagram while draining: {e}");
                    log::info!("RTO occurred");
                    self.retransmit_window().await?;
                }
                Ok(Err(e)) => return Err(e),
                Ok(Ok((pkt, addr))) => {
                    if addr != self.peer {
                        log::debug!("ignoring datagram from foreign address {addr}");
                        continue;
                    }
                    let header = pkt.header;
                    if !header.flags.has_ack() {
                        continue;
                    }
                    if self.window.acknowledge(header.seq, header.ack) {
                        log::info!("ACK for packet seq={} is received", header.ack);
                    } else {
                        log::debug!(
                            "ACK seq={} ack={} does not match window head",
                            header.seq,
                            header.ack
                        );
                        log::info!("RTO occurred");
                        self.retransmit_window().await?;
                    }
                }
            }
        }
        Ok(())
    }

    fn drained(&self, last: bool) -> bool {
        if last {
            self.window.is_empty()
        } else {
            !self.window.is_full()
        }
    }

    /// Resend every in-flight segment, oldest first, byte for byte.
    async fn retransmit_window(&self) -> Result<()> {
        for (seq, wire) in self.window.outstanding() {
            log::info!("retransmitting lost packet seq={seq}");
            self.socket.send_raw(wire, self.peer).await?;
        }
        Ok(())
    }
}
