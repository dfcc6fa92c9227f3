//! L2/L3 framing for payload bytes carried inside visual frames.
//!
//! Every decoded frame carries one L2 envelope:
//!
//! ```text
//! [u8 mode][L3 packet]
//! ```
//!
//! The mode flag selects the L3 discipline:
//! - `0` sequential: `[u32 index][u32 total_chunks][payload]`
//! - `1` fountain:   `[u32 symbol_id][u32 total_file_size][payload]`
//!
//! All integers are little-endian. Every function here is pure; nothing in this
//! crate performs I/O or keeps state between calls.

mod error;

pub use error::{PacketError, PacketResult};

/// Size of the L2 envelope header (the mode flag).
pub const L2_HEADER_LEN: usize = 1;

/// Size of both L3 headers (two little-endian `u32` fields).
pub const L3_HEADER_LEN: usize = 8;

/// L3 discipline selected by the L2 mode flag.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Mode {
    Sequential = 0,
    Fountain = 1,
}

impl Mode {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Mode::Sequential),
            1 => Some(Mode::Fountain),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Sequential => "sequential",
            Mode::Fountain => "fountain",
        }
    }
}

/// Borrowed view over a parsed sequential L3 packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SequentialPacket<'a> {
    pub index: u32,
    pub total_chunks: u32,
    pub payload: &'a [u8],
}

/// Borrowed view over a parsed fountain L3 packet.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FountainPacket<'a> {
    pub symbol_id: u32,
    pub total_file_size: u32,
    pub payload: &'a [u8],
}

/// A fully depacketized L2 envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Packet<'a> {
    Sequential(SequentialPacket<'a>),
    Fountain(FountainPacket<'a>),
}

impl<'a> Packet<'a> {
    /// Unwraps the L2 envelope and parses the L3 packet it announces.
    pub fn decode(bytes: &'a [u8]) -> PacketResult<Self> {
        let (mode, l3) = unwrap_l2(bytes)?;
        match mode {
            Mode::Sequential => parse_sequential(l3).map(Packet::Sequential),
            Mode::Fountain => parse_fountain(l3).map(Packet::Fountain),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Packet::Sequential(_) => Mode::Sequential,
            Packet::Fountain(_) => Mode::Fountain,
        }
    }

    pub fn payload(&self) -> &'a [u8] {
        match self {
            Packet::Sequential(p) => p.payload,
            Packet::Fountain(p) => p.payload,
        }
    }
}

/// Builds a sequential L3 packet.
pub fn make_sequential(index: u32, total_chunks: u32, payload: &[u8]) -> Vec<u8> {
    make_l3(index, total_chunks, payload)
}

/// Builds a fountain L3 packet.
pub fn make_fountain(symbol_id: u32, total_file_size: u32, payload: &[u8]) -> Vec<u8> {
    make_l3(symbol_id, total_file_size, payload)
}

/// Prefixes an L3 packet with the L2 mode flag.
pub fn wrap_l2(mode: Mode, l3: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(L2_HEADER_LEN + l3.len());
    out.push(mode as u8);
    out.extend_from_slice(l3);
    out
}

/// Splits an L2 envelope into its mode and L3 bytes.
pub fn unwrap_l2(bytes: &[u8]) -> PacketResult<(Mode, &[u8])> {
    let (&flag, l3) = bytes.split_first().ok_or(PacketError::Truncated {
        needed: L2_HEADER_LEN,
        got: 0,
    })?;
    let mode = Mode::from_u8(flag).ok_or(PacketError::UnknownMode(flag))?;
    Ok((mode, l3))
}

pub fn parse_sequential(l3: &[u8]) -> PacketResult<SequentialPacket<'_>> {
    let (index, total_chunks, payload) = split_l3(l3)?;
    Ok(SequentialPacket {
        index,
        total_chunks,
        payload,
    })
}

pub fn parse_fountain(l3: &[u8]) -> PacketResult<FountainPacket<'_>> {
    let (symbol_id, total_file_size, payload) = split_l3(l3)?;
    Ok(FountainPacket {
        symbol_id,
        total_file_size,
        payload,
    })
}

/// Number of sequential chunks needed for `file_len` bytes.
///
/// An empty file still travels as a single empty chunk so the receiver has a
/// packet to complete on.
pub fn chunk_count(file_len: usize, chunk_payload: usize) -> usize {
    if chunk_payload == 0 {
        return 0;
    }
    file_len.div_ceil(chunk_payload).max(1)
}

/// L3 payload bytes available per frame for a codec carrying `codec_payload` bytes.
pub fn l3_payload_size(codec_payload: usize) -> Option<usize> {
    codec_payload
        .checked_sub(L2_HEADER_LEN + L3_HEADER_LEN)
        .filter(|&size| size > 0)
}

fn make_l3(first: u32, second: u32, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(L3_HEADER_LEN + payload.len());
    out.extend_from_slice(&first.to_le_bytes());
    out.extend_from_slice(&second.to_le_bytes());
    out.extend_from_slice(payload);
    out
}

fn split_l3(l3: &[u8]) -> PacketResult<(u32, u32, &[u8])> {
    if l3.len() < L3_HEADER_LEN {
        return Err(PacketError::Truncated {
            needed: L3_HEADER_LEN,
            got: l3.len(),
        });
    }
    let (header, payload) = l3.split_at(L3_HEADER_LEN);
    let first = read_u32(&header[0..4]);
    let second = read_u32(&header[4..8]);
    Ok((first, second, payload))
}

#[inline]
fn read_u32(bytes: &[u8]) -> u32 {
    let mut buf = [0u8; 4];
    buf.copy_from_slice(bytes);
    u32::from_le_bytes(buf)
}
