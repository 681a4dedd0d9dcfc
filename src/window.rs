//! Go-Back-N send-side window and packet store.
//!
//! [`SendWindow`] tracks every in-flight segment of one transfer: its
//! sequence number and the exact bytes that went on the wire, so that a
//! retransmission replays the original datagrams verbatim.  Unlike TCP's
//! cumulative acknowledgments, a DRTP acknowledgment releases exactly the
//! oldest segment, and only when both of its header fields name that
//! segment.
//!
//! This module only manages state.  All socket I/O is the caller's
//! responsibility.

use std::collections::VecDeque;

/// One in-flight segment occupying one window slot.
#[derive(Debug, Clone)]
struct Slot {
    /// Sequence number carried by the segment.
    seq: u16,
    /// The datagram exactly as last transmitted.
    wire: Vec<u8>,
}

/// Send-side sliding window for one transfer.
///
/// ```text
///    head (oldest unacknowledged)          newest
///      |                                     |
///      v                                     v
///   +------+--------+--------+--------+
///   |  n   |  n+1   |  n+2   |  n+3   |    capacity = configured window size
///   +------+--------+--------+--------+
/// ```
///
/// Invariant: the slots always hold a contiguous run of increasing
/// unacknowledged sequence numbers, oldest at the front.
#[derive(Debug)]
pub struct SendWindow {
    capacity: usize,
    slots: VecDeque<Slot>,
}

impl SendWindow {
    /// Create a window of `capacity` slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero; a window holds at least one segment.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity >= 1, "window size must be at least 1");
        Self {
            capacity,
            slots: VecDeque::with_capacity(capacity),
        }
    }

    /// True when no further segment may be admitted.
    pub fn is_full(&self) -> bool {
        self.slots.len() == self.capacity
    }

    /// True when nothing is awaiting acknowledgment.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of segments currently awaiting acknowledgment.
    pub fn in_flight(&self) -> usize {
        self.slots.len()
    }

    /// Sequence number of the oldest unacknowledged segment, if any.
    pub fn head(&self) -> Option<u16> {
        self.slots.front().map(|s| s.seq)
    }

    /// Admit a just-transmitted segment into the window.
    ///
    /// Debug builds panic if the window is full or `seq` breaks the
    /// contiguous-run invariant.
    pub fn admit(&mut self, seq: u16, wire: Vec<u8>) {
        debug_assert!(!self.is_full(), "admit on a full window");
        debug_assert!(
            self.slots.back().map_or(true, |s| s.seq.wrapping_add(1) == seq),
            "sequence numbers must be admitted contiguously"
        );
        self.slots.push_back(Slot { seq, wire });
    }

    /// Apply a received acknowledgment.
    ///
    /// Releases the head slot iff the acknowledgment's sequence and ack
    /// fields both equal the head's sequence number: one slot per ACK,
    /// never more.  Returns `false` for anything else, which the caller
    /// treats exactly like a timeout.
    pub fn acknowledge(&mut self, seq: u16, ack: u16) -> bool {
        match self.head() {
            Some(head) if seq == head && ack == head => {
                self.slots.pop_front();
                true
            }
            _ => false,
        }
    }

    /// In-flight segments oldest first, as `(sequence, verbatim bytes)`.
    /// This is the Go-Back-N resend set.
    pub fn outstanding(&self) -> impl Iterator<Item = (u16, &[u8])> {
        self.slots.iter().map(|s| (s.seq, s.wire.as_slice()))
    }

    /// In-flight sequence numbers oldest first, for log lines.
    pub fn seqs(&self) -> Vec<u16> {
        self.slots.iter().map(|s| s.seq).collect()
    }
}
