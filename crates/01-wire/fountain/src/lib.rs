//! Rateless erasure coding for the fountain transfer mode.
//!
//! Thin adapter around the [`raptorq`](https://crates.io/crates/raptorq) crate.
//! Sender and receiver derive identical transmission parameters from the pair
//! `(total_file_size, payload_size)`, which is all the wire header carries, so
//! no extra negotiation happens over the optical channel.
//!
//! Each wire payload is a serialized `raptorq` packet (4-byte payload id plus one
//! symbol) zero-padded to the fixed per-frame payload size.

mod error;

use std::collections::HashSet;
use std::sync::Arc;

use raptorq::{Decoder, Encoder, EncodingPacket, ObjectTransmissionInformation};
use tracing::{debug, trace};

pub use error::{FountainError, FountainResult};

/// Bytes of the serialized `raptorq` payload id preceding each symbol.
pub const PAYLOAD_ID_LEN: usize = 4;

/// Symbols are aligned to this many bytes.
const SYMBOL_ALIGNMENT: usize = 8;

/// Largest aligned symbol that fits the `u16` symbol size field.
const MAX_SYMBOL_SIZE: usize = u16::MAX as usize - (u16::MAX as usize % SYMBOL_ALIGNMENT);

/// Largest source block size (K'max in RFC 6330).
const MAX_BLOCK_SYMBOLS: u64 = 56_403;

/// Source block numbers are a single byte on the wire.
const MAX_SOURCE_BLOCKS: u64 = u8::MAX as u64;

/// Encoding symbol ids are 24 bits wide.
const ESI_LIMIT: u32 = 1 << 24;

/// Transmission parameters shared by encoder and decoder.
#[derive(Clone, Debug)]
pub struct FountainParams {
    total_size: u32,
    payload_size: usize,
    symbol_size: usize,
    oti: ObjectTransmissionInformation,
}

impl FountainParams {
    pub fn new(total_size: u32, payload_size: usize) -> FountainResult<Self> {
        if total_size == 0 {
            return Err(FountainError::EmptyInput);
        }
        let min = PAYLOAD_ID_LEN + SYMBOL_ALIGNMENT;
        if payload_size < min {
            return Err(FountainError::PayloadTooSmall { payload_size, min });
        }
        let raw = (payload_size - PAYLOAD_ID_LEN).min(MAX_SYMBOL_SIZE);
        let symbol_size = raw - raw % SYMBOL_ALIGNMENT;

        let limit =
            (symbol_size as u64 * MAX_BLOCK_SYMBOLS * MAX_SOURCE_BLOCKS).min(u32::MAX as u64);
        if u64::from(total_size) > limit {
            return Err(FountainError::TooLarge {
                size: u64::from(total_size),
                limit,
            });
        }

        let oti = ObjectTransmissionInformation::with_defaults(
            u64::from(total_size),
            symbol_size as u16,
        );
        Ok(Self {
            total_size,
            payload_size,
            symbol_size,
            oti,
        })
    }

    pub fn total_size(&self) -> u32 {
        self.total_size
    }

    pub fn payload_size(&self) -> usize {
        self.payload_size
    }

    pub fn symbol_size(&self) -> usize {
        self.symbol_size
    }

    pub fn source_blocks(&self) -> u8 {
        self.oti.source_blocks()
    }

    /// Number of source symbols across all blocks; a decoder needs slightly more
    /// than this many distinct symbols.
    pub fn source_symbols(&self) -> u32 {
        (self.total_size as usize).div_ceil(self.symbol_size) as u32
    }

    fn wire_len(&self) -> usize {
        PAYLOAD_ID_LEN + self.symbol_size
    }
}

struct BlockCache {
    source: Vec<EncodingPacket>,
    /// First repair ESI (K' for this block).
    first_repair_esi: u32,
}

/// Deterministic symbol generator over a fixed input buffer.
///
/// Construction runs the precoding for every source block, so build one per
/// send session and share it between producers.
pub struct FountainEncoder {
    params: FountainParams,
    inner: Encoder,
    blocks: Vec<BlockCache>,
}

impl FountainEncoder {
    pub fn new(data: &[u8], payload_size: usize) -> FountainResult<Self> {
        let total_size = u32::try_from(data.len()).map_err(|_| FountainError::TooLarge {
            size: data.len() as u64,
            limit: u32::MAX as u64,
        })?;
        let params = FountainParams::new(total_size, payload_size)?;
        let inner = Encoder::new(data, params.oti);
        let blocks = inner
            .get_block_encoders()
            .iter()
            .map(|block| {
                let source = block.source_packets();
                let first_repair_esi = block
                    .repair_packets(0, 1)
                    .first()
                    .map(|packet| packet.payload_id().encoding_symbol_id())
                    .unwrap_or(source.len() as u32);
                BlockCache {
                    source,
                    first_repair_esi,
                }
            })
            .collect::<Vec<_>>();
        debug!(
            total_size,
            payload_size,
            symbol_size = params.symbol_size,
            blocks = blocks.len(),
            "fountain encoder ready"
        );
        Ok(Self {
            params,
            inner,
            blocks,
        })
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn params(&self) -> &FountainParams {
        &self.params
    }

    /// Returns the wire payload for `symbol_id`. The same id always yields the
    /// same bytes.
    pub fn encode(&self, symbol_id: u32) -> Vec<u8> {
        let block_count = self.blocks.len() as u32;
        let block_idx = (symbol_id % block_count) as usize;
        let block = &self.blocks[block_idx];
        let n = symbol_id / block_count;

        let packet = match block.source.get(n as usize) {
            Some(packet) => packet.clone(),
            None => {
                let repair_span = ESI_LIMIT.saturating_sub(block.first_repair_esi).max(1);
                let offset = (n - block.source.len() as u32) % repair_span;
                self.inner.get_block_encoders()[block_idx]
                    .repair_packets(offset, 1)
                    .pop()
                    .unwrap_or_else(|| block.source[0].clone())
            }
        };

        let mut payload = packet.serialize();
        payload.resize(self.params.payload_size, 0);
        payload
    }
}

/// Accumulates fountain payloads until the original buffer can be rebuilt.
///
/// Exactly one decoder lives per receive session; it is stateful and its
/// construction allocates the whole reconstruction buffer.
pub struct FountainDecoder {
    params: FountainParams,
    inner: Decoder,
    distinct: HashSet<(u8, u32)>,
}

impl FountainDecoder {
    pub fn new(params: FountainParams) -> Self {
        let inner = Decoder::new(params.oti);
        Self {
            params,
            inner,
            distinct: HashSet::new(),
        }
    }

    pub fn params(&self) -> &FountainParams {
        &self.params
    }

    /// Distinct engine symbols seen so far.
    pub fn distinct_symbols(&self) -> usize {
        self.distinct.len()
    }

    /// Feeds one wire payload. Returns the reconstructed buffer once enough
    /// symbols have arrived. Malformed payloads are ignored.
    pub fn decode(&mut self, payload: &[u8]) -> Option<Vec<u8>> {
        let wire_len = self.params.wire_len();
        if payload.len() < wire_len {
            trace!(len = payload.len(), wire_len, "short fountain payload");
            return None;
        }
        let packet = EncodingPacket::deserialize(&payload[..wire_len]);
        let id = packet.payload_id();
        let key = (id.source_block_number(), id.encoding_symbol_id());
        if key.0 >= self.params.source_blocks() {
            trace!(block = key.0, "fountain payload names an unknown source block");
            return None;
        }
        self.distinct.insert(key);
        let decoded = self.inner.decode(packet)?;
        debug!(
            symbols = self.distinct.len(),
            size = decoded.len(),
            "fountain decode complete"
        );
        Some(decoded)
    }
}
