use std::net::SocketAddr;
use std::time::Instant;

use crate::config::HEADER_SIZE;

const SEQ_WIDTH: usize = 8;
const ACK_WIDTH: usize = 8;
const WND_WIDTH: usize = 5;
const CHECKSUM_WIDTH: usize = 32;

/// A single RTP datagram: fixed-width ASCII header plus opaque payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub is_ack: bool,
    pub is_handshake: bool,
    pub is_disconnect: bool,
    pub seq_num: u32,
    pub ack_num: u32,
    pub advertised_window: u32,
    pub payload: Vec<u8>,

    // Transient metadata; never serialized.
    pub deadline: Option<Instant>,
    pub peer_addr: Option<SocketAddr>,
}

impl Packet {
    pub fn new(payload: Vec<u8>) -> Self {
        Packet {
            is_ack: false,
            is_handshake: false,
            is_disconnect: false,
            seq_num: 0,
            ack_num: 0,
            advertised_window: 0,
            payload,
            deadline: None,
            peer_addr: None,
        }
    }

    pub fn data(payload: Vec<u8>) -> Self {
        Packet::new(payload)
    }

    pub fn standalone_ack(ack_num: u32, advertised_window: u32) -> Self {
        Packet {
            is_ack: true,
            ack_num,
            advertised_window,
            ..Packet::new(Vec::new())
        }
    }

    pub fn syn(seq_num: u32, advertised_window: u32) -> Self {
        Packet {
            is_handshake: true,
            seq_num,
            advertised_window,
            ..Packet::new(Vec::new())
        }
    }

    pub fn syn_ack(seq_num: u32, ack_num: u32, advertised_window: u32) -> Self {
        Packet {
            is_handshake: true,
            is_ack: true,
            seq_num,
            ack_num,
            advertised_window,
            ..Packet::new(Vec::new())
        }
    }

    pub fn fin(advertised_window: u32) -> Self {
        Packet {
            is_disconnect: true,
            advertised_window,
            ..Packet::new(Vec::new())
        }
    }

    pub fn fin_ack(ack_num: u32, advertised_window: u32) -> Self {
        Packet {
            is_disconnect: true,
            is_ack: true,
            ack_num,
            advertised_window,
            ..Packet::new(Vec::new())
        }
    }

    /// A data packet carries no sequence number assignment (yet) and is
    /// not tracked for retransmission until the send window stamps it.
    pub fn is_pure_ack(&self) -> bool {
        self.is_ack && !self.is_handshake && !self.is_disconnect && self.payload.is_empty()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());

        out.push(if self.is_ack { b'T' } else { b'F' });
        out.push(if self.is_handshake { b'T' } else { b'F' });
        out.push(if self.is_disconnect { b'T' } else { b'F' });
        out.extend(format!("{:0width$}", self.seq_num, width = SEQ_WIDTH).into_bytes());
        out.extend(format!("{:0width$}", self.ack_num, width = ACK_WIDTH).into_bytes());
        out.extend(
            format!("{:0width$}", self.advertised_window, width = WND_WIDTH).into_bytes(),
        );
        out.extend(std::iter::repeat(b'0').take(CHECKSUM_WIDTH));
        out.extend_from_slice(&self.payload);

        let checksum = format!("{:x}", md5::compute(&out));
        out[24..24 + CHECKSUM_WIDTH].copy_from_slice(checksum.as_bytes());

        out
    }

    /// Parses a received datagram. Returns `None` on truncation or checksum
    /// mismatch; the caller must not advance any protocol state in that case.
    pub fn deserialize(data: &[u8], origin: SocketAddr) -> Option<Packet> {
        if data.len() < HEADER_SIZE {
            return None;
        }

        let is_ack = data[0] == b'T';
        let is_handshake = data[1] == b'T';
        let is_disconnect = data[2] == b'T';

        let seq_num = parse_digits(&data[3..3 + SEQ_WIDTH])?;
        let ack_num = parse_digits(&data[11..11 + ACK_WIDTH])?;
        let advertised_window = parse_digits(&data[19..19 + WND_WIDTH])?;

        let claimed_checksum = std::str::from_utf8(&data[24..24 + CHECKSUM_WIDTH]).ok()?;

        let mut zeroed = data.to_vec();
        zeroed[24..24 + CHECKSUM_WIDTH].copy_from_slice(&[b'0'; CHECKSUM_WIDTH]);
        let computed = format!("{:x}", md5::compute(&zeroed));

        if !computed.eq_ignore_ascii_case(claimed_checksum) {
            return None;
        }

        Some(Packet {
            is_ack,
            is_handshake,
            is_disconnect,
            seq_num,
            ack_num,
            advertised_window,
            payload: data[HEADER_SIZE..].to_vec(),
            deadline: None,
            peer_addr: Some(origin),
        })
    }
}

fn parse_digits(field: &[u8]) -> Option<u32> {
    std::str::from_utf8(field).ok()?.parse().ok()
}
