//! Wire-format definitions for DRTP segments.
//!
//! Every datagram exchanged between peers is a [`Packet`]: a fixed 6-byte
//! header followed by up to [`MAX_PAYLOAD`] bytes of payload.  This module is
//! responsible for:
//! - Defining the on-wire binary layout (header fields, flag combinations).
//! - Serialising a [`Packet`] into a byte buffer ready for transmission.
//! - Deserialising a raw datagram back into a [`Packet`], returning errors
//!   for truncated input or an illegal flag combination.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! All multi-byte integers are **big-endian**.
//!
//! ```text
//!  0               1
//!  0 1 2 3 4 5 6 7 0 1 2 3 4 5 6 7
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |        Sequence Number        |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |     Acknowledgment Number     |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |  Flags (low 4 bits of field)  |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! |           Payload ...         |
//! +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//! ```
//!
//! There is no payload-length field: the receiver infers the payload from
//! the datagram size, so one segment always fits one datagram and a datagram
//! never exceeds [`MAX_DATAGRAM`] bytes.

use thiserror::Error;

/// Byte length of the fixed-size header on the wire.
/// seq(2) + ack(2) + flags(2) = 6.
pub const HEADER_LEN: usize = 6;

/// Maximum payload bytes per segment.
pub const MAX_PAYLOAD: usize = 994;

/// Largest datagram DRTP ever puts on the wire.
pub const MAX_DATAGRAM: usize = HEADER_LEN + MAX_PAYLOAD;

// Byte offsets of each field within the serialised header.
const OFF_SEQ: usize = 0;
const OFF_ACK: usize = 2;
const OFF_FLAGS: usize = 4;

// Individual flag bits inside the third header field (bit 0 unused).
const SYN_BIT: u16 = 0b1000;
const ACK_BIT: u16 = 0b0100;
const FIN_BIT: u16 = 0b0010;

/// The flag combinations DRTP puts on the wire.
///
/// Only these five combinations are legal; [`Flags::from_bits`] rejects any
/// other bit pattern so a malformed segment is caught at the decode boundary
/// instead of being misread deep inside an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flags {
    /// Handshake initiation.
    Syn,
    /// Handshake reply.
    SynAck,
    /// Acknowledgment; also carried by every data segment.
    Ack,
    /// Sender has no more data.
    Fin,
    /// Teardown reply.
    FinAck,
}

impl Flags {
    /// On-wire value of this combination.
    pub fn bits(self) -> u16 {
        match self {
            Flags::Syn => SYN_BIT,
            Flags::SynAck => SYN_BIT | ACK_BIT,
            Flags::Ack => ACK_BIT,
            Flags::Fin => FIN_BIT,
            Flags::FinAck => FIN_BIT | ACK_BIT,
        }
    }

    /// Parse the flags field, rejecting anything but the five legal values.
    pub fn from_bits(raw: u16) -> Result<Self, HeaderError> {
        match raw {
            x if x == SYN_BIT => Ok(Flags::Syn),
            x if x == SYN_BIT | ACK_BIT => Ok(Flags::SynAck),
            x if x == ACK_BIT => Ok(Flags::Ack),
            x if x == FIN_BIT => Ok(Flags::Fin),
            x if x == FIN_BIT | ACK_BIT => Ok(Flags::FinAck),
            other => Err(HeaderError::BadFlags(other)),
        }
    }

    /// `true` when the SYN bit is set (SYN or SYN+ACK).
    pub fn has_syn(self) -> bool {
        matches!(self, Flags::Syn | Flags::SynAck)
    }

    /// `true` when the ACK bit is set (SYN+ACK, ACK, FIN+ACK).
    pub fn has_ack(self) -> bool {
        matches!(self, Flags::SynAck | Flags::Ack | Flags::FinAck)
    }

    /// `true` when the FIN bit is set (FIN or FIN+ACK).
    pub fn has_fin(self) -> bool {
        matches!(self, Flags::Fin | Flags::FinAck)
    }
}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Flags::Syn => "SYN",
            Flags::SynAck => "SYN-ACK",
            Flags::Ack => "ACK",
            Flags::Fin => "FIN",
            Flags::FinAck => "FIN-ACK",
        };
        f.write_str(s)
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    /// Datagram shorter than the fixed header size.
    #[error("datagram of {0} bytes is too short for a DRTP header")]
    Truncated(usize),
    /// Flags field holds a combination DRTP never sends.
    #[error("illegal flag combination {0:#06b} on the wire")]
    BadFlags(u16),
}

/// Fixed-size DRTP header.
///
/// Fields are in host byte order; [`Packet::encode`] converts to big-endian
/// on the wire and [`Packet::decode`] converts back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Sequence number of this segment (0 on control segments).
    pub seq: u16,
    /// Sequence number being confirmed; meaningful only under [`Flags::Ack`].
    pub ack: u16,
    /// One of the five legal flag combinations.
    pub flags: Flags,
}

/// A complete DRTP segment: header + payload bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: Header,
    pub payload: Vec<u8>,
}

impl Packet {
    /// A payload-less control segment with seq = ack = 0.
    ///
    /// Covers the reserved SYN, SYN+ACK, ACK, FIN and FIN+ACK segments of
    /// the handshake and teardown phases.
    pub fn control(flags: Flags) -> Self {
        Self {
            header: Header { seq: 0, ack: 0, flags },
            payload: Vec::new(),
        }
    }

    /// A data-bearing segment.
    ///
    /// Data segments carry the ACK flag with `ack = 0`.  The payload is
    /// file content or, for `seq == 1`, the transferred file's base name.
    pub fn data(seq: u16, payload: Vec<u8>) -> Self {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        Self {
            header: Header { seq, ack: 0, flags: Flags::Ack },
            payload,
        }
    }

    /// The acknowledgment for data segment `seq`: seq = ack = N, flags ACK.
    pub fn ack_of(seq: u16) -> Self {
        Self {
            header: Header { seq, ack: seq, flags: Flags::Ack },
            payload: Vec::new(),
        }
    }

    /// Serialise this segment into a newly allocated byte vector.
    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() <= MAX_PAYLOAD);
        let mut buf = vec![0u8; HEADER_LEN + self.payload.len()];
        buf[OFF_SEQ..OFF_SEQ + 2].copy_from_slice(&self.header.seq.to_be_bytes());
        buf[OFF_ACK..OFF_ACK + 2].copy_from_slice(&self.header.ack.to_be_bytes());
        buf[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&self.header.flags.bits().to_be_bytes());
        buf[HEADER_LEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a [`Packet`] from a raw datagram.
    ///
    /// Returns [`Err`] if `buf` is shorter than [`HEADER_LEN`] or the flags
    /// field holds an illegal combination.  Everything after the header is
    /// the payload.
    pub fn decode(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < HEADER_LEN {
            return Err(HeaderError::Truncated(buf.len()));
        }
        let seq = u16::from_be_bytes([buf[OFF_SEQ], buf[OFF_SEQ + 1]]);
        let ack = u16::from_be_bytes([buf[OFF_ACK], buf[OFF_ACK + 1]]);
        let flags = Flags::from_bits(u16::from_be_bytes([buf[OFF_FLAGS], buf[OFF_FLAGS + 1]]))?;
        Ok(Packet {
            header: Header { seq, ack, flags },
            payload: buf[HEADER_LEN..].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_FLAGS: [Flags; 5] = [
        Flags::Syn,
        Flags::SynAck,
        Flags::Ack,
        Flags::Fin,
        Flags::FinAck,
    ];

    fn make_packet(seq: u16, ack: u16, flags: Flags, payload: &[u8]) -> Packet {
        Packet {
            header: Header { seq, ack, flags },
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn encode_decode_roundtrip() {
        let pkt = make_packet(42, 0, Flags::Ack, b"hello");
        let decoded = Packet::decode(&pkt.encode()).unwrap();
        assert_eq!(decoded, pkt);
    }

    #[test]
    fn roundtrip_all_flag_combinations_at_range_edges() {
        for flags in ALL_FLAGS {
            for (seq, ack) in [(0, 0), (1, 1), (u16::MAX, u16::MAX), (7, 65534)] {
                let pkt = make_packet(seq, ack, flags, b"");
                assert_eq!(Packet::decode(&pkt.encode()).unwrap(), pkt);
            }
        }
    }

    #[test]
    fn encoded_length_equals_header_plus_payload() {
        let payload = vec![0xabu8; 100];
        let bytes = make_packet(3, 0, Flags::Ack, &payload).encode();
        assert_eq!(bytes.len(), HEADER_LEN + payload.len());
    }

    #[test]
    fn max_payload_roundtrip_fills_one_datagram() {
        let payload = vec![7u8; MAX_PAYLOAD];
        let bytes = make_packet(9, 0, Flags::Ack, &payload).encode();
        assert_eq!(bytes.len(), MAX_DATAGRAM);
        assert_eq!(Packet::decode(&bytes).unwrap().payload, payload);
    }

    #[test]
    fn seq_ack_flags_big_endian_on_wire() {
        let bytes = make_packet(0x0102, 0x0304, Flags::SynAck, b"").encode();
        assert_eq!(&bytes[OFF_SEQ..OFF_SEQ + 2], &[0x01, 0x02]);
        assert_eq!(&bytes[OFF_ACK..OFF_ACK + 2], &[0x03, 0x04]);
        assert_eq!(&bytes[OFF_FLAGS..OFF_FLAGS + 2], &[0x00, 0b1100]);
    }

    #[test]
    fn decode_empty_buffer_returns_truncated() {
        assert_eq!(Packet::decode(&[]), Err(HeaderError::Truncated(0)));
    }

    #[test]
    fn decode_short_header_returns_truncated() {
        let bytes = [0u8; HEADER_LEN - 1];
        assert_eq!(
            Packet::decode(&bytes),
            Err(HeaderError::Truncated(HEADER_LEN - 1))
        );
    }

    #[test]
    fn decode_rejects_illegal_flag_combinations() {
        for raw in [0b0000u16, 0b0001, 0b1010, 0b1110, 0b1111, 0x8000] {
            let mut bytes = Packet::control(Flags::Syn).encode();
            bytes[OFF_FLAGS..OFF_FLAGS + 2].copy_from_slice(&raw.to_be_bytes());
            assert_eq!(Packet::decode(&bytes), Err(HeaderError::BadFlags(raw)));
        }
    }

    #[test]
    fn flag_bits_match_wire_spec() {
        assert_eq!(Flags::Syn.bits(), 0b1000);
        assert_eq!(Flags::Ack.bits(), 0b0100);
        assert_eq!(Flags::Fin.bits(), 0b0010);
        assert_eq!(Flags::SynAck.bits(), 0b1100);
        assert_eq!(Flags::FinAck.bits(), 0b0110);
    }

    #[test]
    fn flag_bit_queries() {
        assert!(Flags::Syn.has_syn() && !Flags::Syn.has_ack() && !Flags::Syn.has_fin());
        assert!(Flags::SynAck.has_syn() && Flags::SynAck.has_ack());
        assert!(Flags::FinAck.has_fin() && Flags::FinAck.has_ack());
        assert!(!Flags::Ack.has_syn() && !Flags::Ack.has_fin());
    }

    #[test]
    fn control_segments_have_zero_seq_and_ack() {
        for flags in ALL_FLAGS {
            let pkt = Packet::control(flags);
            assert_eq!((pkt.header.seq, pkt.header.ack), (0, 0));
            assert!(pkt.payload.is_empty());
        }
    }

    #[test]
    fn ack_of_mirrors_sequence_into_both_fields() {
        let pkt = Packet::ack_of(1234);
        assert_eq!(pkt.header.seq, 1234);
        assert_eq!(pkt.header.ack, 1234);
        assert_eq!(pkt.header.flags, Flags::Ack);
        assert!(pkt.payload.is_empty());
    }

    #[test]
    fn data_segments_carry_ack_flag_with_zero_ack_field() {
        let pkt = Packet::data(5, b"chunk".to_vec());
        assert_eq!(pkt.header.flags, Flags::Ack);
        assert_eq!(pkt.header.ack, 0);
        assert_eq!(pkt.header.seq, 5);
    }

    #[test]
    fn header_len_constant_is_correct() {
        // seq(2) + ack(2) + flags(2) = 6
        assert_eq!(HEADER_LEN, 6);
        assert_eq!(MAX_DATAGRAM, 1000);
    }
}
