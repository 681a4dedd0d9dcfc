//! Error taxonomy for DRTP operations.
//!
//! Only unrecoverable conditions surface as [`DrtpError`].  Everything the
//! protocol recovers from on its own (acknowledgment timeouts, mismatched
//! acknowledgments, a missing FIN+ACK) stays inside the engine loops as
//! logged retransmission events and never reaches a caller.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use crate::packet::{Flags, HeaderError};

/// Result type alias for DRTP operations.
pub type Result<T> = std::result::Result<T, DrtpError>;

/// Fatal failure modes of a transfer.
#[derive(Debug, Error)]
pub enum DrtpError {
    /// The requested local address could not be bound.
    #[error("cannot bind {addr}: {source}; the IP/port may be unavailable or in use")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    /// No SYN+ACK arrived within the link timeout.  The handshake is
    /// attempted exactly once, so this ends the transfer.
    #[error("no SYN-ACK from {0} within {1:?}; is the server running?")]
    HandshakeTimeout(SocketAddr, Duration),

    /// A phase that demands specific flags saw something else.
    #[error("expected a {expected} segment, received {got}")]
    UnexpectedSegment {
        expected: &'static str,
        got: Flags,
    },

    /// The channel reported the peer unreachable (reset or refused).
    #[error("lost contact with the peer: {0}")]
    PeerGone(io::Error),

    /// The receiver saw no traffic for the whole inactivity window.
    #[error("peer went silent for {0:?}")]
    Inactivity(Duration),

    /// A datagram could not be decoded in a phase that may not drop it.
    #[error(transparent)]
    Header(#[from] HeaderError),

    /// Any other I/O failure.
    #[error("I/O error: {0}")]
    Io(io::Error),

    /// An engine method was called out of lifecycle order.
    #[error("operation not valid in the current connection state")]
    BadState,
}

impl DrtpError {
    /// Classify a socket error: connection resets and refusals become
    /// [`DrtpError::PeerGone`]; everything else is plain I/O.
    pub(crate) fn from_io(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused => Self::PeerGone(e),
            _ => Self::Io(e),
        }
    }
}
