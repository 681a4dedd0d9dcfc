//! Server engine: accept one client, deliver its file in order, answer the
//! closing FIN.
//!
//! The delivery rules live in [`InOrder`], which is pure state:
//!
//! - Only the next expected segment is accepted.
//! - Out-of-order and duplicate segments are logged and dropped without an
//!   acknowledgment; that silence is what drives the sender's Go-Back-N
//!   resend.
//! - Segment 1 carries the file's base name rather than content, and a
//!   retransmitted copy of it is re-acknowledged without skipping ahead.
//!
//! [`Receiver`] wraps that state with the socket loop and the file sink.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use crate::error::{DrtpError, Result};
use crate::files::{throughput_mbps, OutputSink};
use crate::packet::{Flags, Packet};
use crate::socket::Socket;
use crate::state::{advance, ConnectionState};
use crate::{Config, INACTIVITY_TIMEOUT};

// ---------------------------------------------------------------------------
// InOrder: pure delivery state
// ---------------------------------------------------------------------------

/// What the delivery rules say to do with one received segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The configured test drop: ignore the segment, hook now spent.
    Discarded,
    /// FIN observed: the data phase is over.
    Finished,
    /// Segment 1: the payload is the file's base name.  Acknowledge it.
    Name,
    /// The next expected segment: acknowledge it and keep the payload.
    Accept,
    /// Out of order or duplicate: drop it and send nothing back.
    OutOfOrder,
}

/// Receive-side delivery state for one connection.
#[derive(Debug)]
pub struct InOrder {
    /// Sequence number the next acceptable segment must carry.
    next: u16,
    /// One-shot sequence number to drop, simulating loss on the link.
    discard: Option<u16>,
}

impl InOrder {
    pub fn new(discard: Option<u16>) -> Self {
        Self { next: 1, discard }
    }

    /// Sequence number the next in-order segment must carry.
    pub fn next_expected(&self) -> u16 {
        self.next
    }

    /// Classify one segment and advance the delivery state.
    ///
    /// Checks run in protocol order: test drop, FIN, name segment, in-order
    /// data, everything else.
    pub fn on_segment(&mut self, seq: u16, flags: Flags) -> Verdict {
        if self.discard == Some(seq) {
            self.discard = None;
            return Verdict::Discarded;
        }
        if flags.has_fin() {
            return Verdict::Finished;
        }
        if seq == 1 {
            // Forward-only: a retransmitted name never rewinds the counter.
            self.next = self.next.max(2);
            return Verdict::Name;
        }
        if seq == self.next {
            self.next = self.next.wrapping_add(1);
            return Verdict::Accept;
        }
        Verdict::OutOfOrder
    }
}

// ---------------------------------------------------------------------------
// Receiver: server engine
// ---------------------------------------------------------------------------

/// Outcome of one completed incoming transfer.
#[derive(Debug)]
pub struct TransferReport {
    /// Where the received file ended up.
    pub path: PathBuf,
    /// Content bytes written.  The name segment is never written.
    pub bytes: u64,
    /// Wall time of the data phase, established to FIN.
    pub elapsed: Duration,
}

impl TransferReport {
    /// Throughput figure in megabits per second.
    pub fn mbps(&self) -> f64 {
        throughput_mbps(self.bytes, self.elapsed)
    }
}

/// Server-side engine.  Owns the bound socket and serves exactly one client.
#[derive(Debug)]
pub struct Receiver {
    socket: Socket,
    cfg: Config,
    state: ConnectionState,
    /// The one active client, recorded when its SYN arrives.
    peer: Option<SocketAddr>,
}

impl Receiver {
    /// Bind the server socket.  Failure to bind is fatal.
    pub async fn bind(cfg: Config) -> Result<Self> {
        let socket = Socket::bind(cfg.addr).await?;
        log::info!("listening on {}", socket.local_addr);
        Ok(Self {
            socket,
            cfg,
            state: ConnectionState::Idle,
            peer: None,
        })
    }

    /// The address actually bound, relevant when port 0 was requested.
    pub fn local_addr(&self) -> SocketAddr {
        self.socket.local_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Wait for a client and run the connection-establishment handshake.
    ///
    /// Blocks indefinitely for the first datagram.  A first segment that is
    /// not a SYN is a hard failure, not something to skip.  After the SYN,
    /// every receive is bounded by [`INACTIVITY_TIMEOUT`].
    pub async fn accept(&mut self) -> Result<SocketAddr> {
        if self.state != ConnectionState::Idle {
            return Err(DrtpError::BadState);
        }

        let (syn, peer) = self.socket.recv().await?;
        if !syn.header.flags.has_syn() {
            return Err(DrtpError::UnexpectedSegment {
                expected: "SYN",
                got: syn.header.flags,
            });
        }
        log::info!("SYN packet is received");
        advance(&mut self.state, ConnectionState::SynRcvd);

        self.socket.send(&Packet::control(Flags::SynAck), peer).await?;
        log::info!("SYN-ACK packet is sent");

        // Only the handshaking client may complete the handshake.
        let ack = loop {
            let (pkt, addr) = self.bounded_recv().await?;
            if addr != peer {
                log::debug!("ignoring datagram from foreign address {addr}");
                continue;
            }
            break pkt;
        };
        if !ack.header.flags.has_ack() {
            return Err(DrtpError::UnexpectedSegment {
                expected: "ACK",
                got: ack.header.flags,
            });
        }
        log::info!("ACK packet is received");
        log::info!("connection established");
        advance(&mut self.state, ConnectionState::Established);
        self.peer = Some(peer);
        Ok(peer)
    }

    /// Run the data phase: accept in-order segments until FIN, answer the
    /// teardown, finalize the received file.
    pub async fn receive(&mut self) -> Result<TransferReport> {
        if self.state != ConnectionState::Established {
            return Err(DrtpError::BadState);
        }
        let Some(peer) = self.peer else {
            return Err(DrtpError::BadState);
        };

        let mut flow = InOrder::new(self.cfg.discard);
        let mut sink = OutputSink::create(&self.cfg.output_dir).map_err(DrtpError::Io)?;
        let mut name: Option<String> = None;
        let started = Instant::now();

        loop {
            let (pkt, addr) = match self.bounded_recv().await {
                Ok(received) => received,
                Err(DrtpError::Header(e)) => {
                    log::debug!("dropping undecodable datagram: {e}");
                    continue;
                }
                Err(e) => return Err(e),
            };
            if addr != peer {
                log::debug!("dropping datagram from foreign address {addr}");
                continue;
            }

            let header = pkt.header;
            match flow.on_segment(header.seq, header.flags) {
                Verdict::Discarded => {
                    log::debug!("test hook: discarding packet seq={} once", header.seq);
                }
                Verdict::Finished => {
                    log::info!("FIN packet is received");
                    break;
                }
                Verdict::Name => {
                    log::info!("packet seq={} is received", header.seq);
                    match String::from_utf8(pkt.payload) {
                        Ok(decoded) => name = Some(decoded),
                        Err(_) => log::warn!("file name is not valid UTF-8, keeping scratch name"),
                    }
                    self.send_ack(header.seq, peer).await?;
                }
                Verdict::Accept => {
                    log::info!("packet seq={} is received", header.seq);
                    self.send_ack(header.seq, peer).await?;
                    sink.append(&pkt.payload).map_err(DrtpError::Io)?;
                }
                Verdict::OutOfOrder => {
                    log::info!("out-of-order packet seq={} received", header.seq);
                }
            }
        }
        let elapsed = started.elapsed();

        // Teardown: exactly one FIN-ACK, never retried.
        self.socket.send(&Packet::control(Flags::FinAck), peer).await?;
        log::info!("FIN-ACK packet is sent");
        advance(&mut self.state, ConnectionState::Closed);

        let bytes = sink.bytes_written();
        let path = sink.finalize(name.as_deref()).map_err(DrtpError::Io)?;
        log::info!("received {bytes} bytes into {}", path.display());
        Ok(TransferReport { path, bytes, elapsed })
    }

    /// Accept and receive in one call: the whole server side of a transfer.
    pub async fn serve(&mut self) -> Result<TransferReport> {
        self.accept().await?;
        self.receive().await
    }

    /// One receive bounded by the inactivity timeout.  Applies to every
    /// receive after the opening SYN.
    async fn bounded_recv(&self) -> Result<(Packet, SocketAddr)> {
        match timeout(INACTIVITY_TIMEOUT, self.socket.recv()).await {
            Ok(received) => received,
            Err(_) => Err(DrtpError::Inactivity(INACTIVITY_TIMEOUT)),
        }
    }

    async fn send_ack(&self, seq: u16, peer: SocketAddr) -> Result<()> {
        self.socket.send(&Packet::ack_of(seq), peer).await?;
        log::info!("sending ACK for packet seq={seq}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_expecting_the_name_segment() {
        let flow = InOrder::new(None);
        assert_eq!(flow.next_expected(), 1);
    }

    #[test]
    fn in_order_run_advances_one_per_segment() {
        let mut flow = InOrder::new(None);
        assert_eq!(flow.on_segment(1, Flags::Ack), Verdict::Name);
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::Accept);
        assert_eq!(flow.on_segment(3, Flags::Ack), Verdict::Accept);
        assert_eq!(flow.next_expected(), 4);
    }

    #[test]
    fn out_of_order_segment_is_dropped_without_advancing() {
        let mut flow = InOrder::new(None);
        flow.on_segment(1, Flags::Ack);
        assert_eq!(flow.on_segment(4, Flags::Ack), Verdict::OutOfOrder);
        assert_eq!(flow.next_expected(), 2);
    }

    #[test]
    fn duplicate_data_is_not_accepted_twice() {
        let mut flow = InOrder::new(None);
        flow.on_segment(1, Flags::Ack);
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::Accept);
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::OutOfOrder);
        assert_eq!(flow.next_expected(), 3);
    }

    #[test]
    fn retransmitted_name_is_reacknowledged_without_skipping() {
        let mut flow = InOrder::new(None);
        assert_eq!(flow.on_segment(1, Flags::Ack), Verdict::Name);
        assert_eq!(flow.on_segment(1, Flags::Ack), Verdict::Name);
        // Sequence 2 must still be the next acceptable segment.
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::Accept);
        assert_eq!(flow.next_expected(), 3);
    }

    #[test]
    fn fin_ends_the_data_phase() {
        let mut flow = InOrder::new(None);
        flow.on_segment(1, Flags::Ack);
        assert_eq!(flow.on_segment(0, Flags::Fin), Verdict::Finished);
        assert_eq!(flow.on_segment(0, Flags::FinAck), Verdict::Finished);
    }

    #[test]
    fn discard_hook_fires_exactly_once() {
        let mut flow = InOrder::new(Some(2));
        flow.on_segment(1, Flags::Ack);
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::Discarded);
        assert_eq!(flow.on_segment(2, Flags::Ack), Verdict::Accept);
        assert_eq!(flow.next_expected(), 3);
    }

    #[test]
    fn discard_hook_applies_before_any_other_rule() {
        let mut flow = InOrder::new(Some(0));
        // Even a FIN is eaten once when its sequence number matches the hook.
        assert_eq!(flow.on_segment(0, Flags::Fin), Verdict::Discarded);
        assert_eq!(flow.on_segment(0, Flags::Fin), Verdict::Finished);
    }
}
