//! DRTP: reliable one-file transfer over UDP.
//!
//! DRTP layers connection establishment, ordered reliable delivery and
//! graceful teardown directly on UDP datagrams.  One connection moves
//! exactly one file from the client to the server, with a fixed-size
//! Go-Back-N window on the sending side and a strict in-order receiver
//! that never acknowledges out-of-order data.
//!
//! # Architecture
//!
//! ```text
//!   +----------+   name + data segments    +----------+
//!   |  Sender  | ------------------------> | Receiver |
//!   | (client) | <------------------------ | (server) |
//!   +----+-----+       per-segment ACKs    +-----+----+
//!        |                                       |
//!   SendWindow                               InOrder
//!   (in-flight segments,                     (next-expected counter)
//!    verbatim retransmit)                        |
//!        |                                   OutputSink
//!        |                                   (scratch file, rename)
//!        v                                       v
//!   +-------------------------------------------------+
//!   |                     Socket                      |
//!   |     (packet-oriented tokio UDP, <= 1000 B)      |
//!   +-------------------------------------------------+
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]: wire format (6-byte header, flag combinations, codec)
//! - [`socket`]: packet-oriented UDP socket
//! - [`state`]: connection state machine types
//! - [`window`]: Go-Back-N sliding window and packet store
//! - [`sender`]: client engine (handshake, windowed transfer, teardown)
//! - [`receiver`]: server engine (accept, in-order delivery, teardown reply)
//! - [`files`]: chunking, output sink, naming, throughput figure
//! - [`error`]: error taxonomy

pub mod error;
pub mod files;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod socket;
pub mod state;
pub mod window;

pub use error::{DrtpError, Result};
pub use receiver::{Receiver, TransferReport};
pub use sender::Sender;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Bound on every wait for a reply on the link: handshake, acknowledgment
/// drain and teardown all use it.
pub const LINK_TIMEOUT: Duration = Duration::from_millis(500);

/// How long the receiver tolerates silence once a client has shown up.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

/// Largest file a client agrees to send, in bytes.
pub const MAX_FILE_SIZE: u64 = 60_000_000;

/// Window size used when none is configured.
pub const DEFAULT_WINDOW: usize = 3;

/// Per-transfer configuration handed to the engines at construction.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server address: bound by the receiver, targeted by the sender.
    pub addr: SocketAddr,
    /// Go-Back-N window size, at least 1.  Sender side only.
    pub window: usize,
    /// Drop the data segment with this sequence number once, simulating
    /// loss.  Receiver side only.
    pub discard: Option<u16>,
    /// Directory the receiver assembles its file in.
    pub output_dir: PathBuf,
}

impl Config {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            window: DEFAULT_WINDOW,
            discard: None,
            output_dir: PathBuf::from("."),
        }
    }

    /// Set the Go-Back-N window size.
    ///
    /// # Panics
    ///
    /// Panics if `window` is zero.
    pub fn with_window(mut self, window: usize) -> Self {
        assert!(window >= 1, "window size must be at least 1");
        self.window = window;
        self
    }

    /// Arm the one-shot discard hook for `seq`.
    pub fn with_discard(mut self, seq: u16) -> Self {
        self.discard = Some(seq);
        self
    }

    /// Change where the receiver stores the incoming file.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }
}
