//! Connection state machine types.
//!
//! The lifecycle is deliberately small: one handshake, one data phase, one
//! teardown.  Transitions are driven by [`crate::sender::Sender`] and
//! [`crate::receiver::Receiver`] and logged as they happen, so a transfer
//! can be reconstructed from its output alone.
//!
//! ```text
//!   sender:    Idle -> SynSent -> Established -> FinWait -> Closed
//!   receiver:  Idle -> SynRcvd -> Established -> Closed
//! ```

use std::fmt;

/// Lifecycle position of one connection endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Nothing sent or received yet.
    Idle,
    /// SYN sent; waiting for SYN+ACK (sender side).
    SynSent,
    /// SYN received, SYN+ACK sent; waiting for the final ACK (receiver side).
    SynRcvd,
    /// Handshake complete; the data phase may run.
    Established,
    /// FIN sent; waiting for FIN+ACK (sender side).
    FinWait,
    /// The connection is over.
    Closed,
}

impl Default for ConnectionState {
    fn default() -> Self {
        Self::Idle
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Step the state machine, logging the transition.
pub(crate) fn advance(state: &mut ConnectionState, to: ConnectionState) {
    log::debug!("state {state} -> {to}");
    *state = to;
}
