//! Receive-side session state.
//!
//! A [`Reassembler`] starts empty, fixes its mode and size from the first
//! valid packet, collects until the file can be rebuilt, then stays
//! complete. Packets may arrive in any order, any number of times.
//!
//! ```text
//! Init -> Collecting(Sequential | Fountain) -> Complete
//! ```

mod error;

use std::collections::{HashMap, HashSet};

use fountain::{FountainDecoder, FountainParams};
use packet::{FountainPacket, Mode, Packet, SequentialPacket};
use tracing::{debug, info, warn};

pub use error::Rejection;

/// Outcome of feeding one packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Accepted {
    /// New data recorded; the file is not complete yet.
    Stored,
    /// Already seen; nothing changed.
    Duplicate,
    Rejected(Rejection),
    /// This packet completed the file.
    Completed,
    /// The session was already complete; the packet was ignored.
    AlreadyComplete,
}

impl Accepted {
    pub fn is_completed(&self) -> bool {
        matches!(self, Accepted::Completed)
    }
}

/// Distinct units collected against the number needed. For fountain
/// sessions `expected` is the source symbol count, a lower bound.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Progress {
    pub received: usize,
    pub expected: Option<usize>,
}

/// Slots are keyed by index rather than preallocated, so a corrupt
/// `total_chunks` cannot force a huge allocation.
struct SequentialState {
    total_chunks: u32,
    slots: HashMap<u32, Vec<u8>>,
    remaining: u32,
}

impl SequentialState {
    fn new(total_chunks: u32) -> Self {
        Self {
            total_chunks,
            slots: HashMap::new(),
            remaining: total_chunks,
        }
    }

    fn received(&self) -> usize {
        (self.total_chunks - self.remaining) as usize
    }

    fn assemble(&mut self) -> Vec<u8> {
        let len = self.slots.values().map(Vec::len).sum();
        let mut out = Vec::with_capacity(len);
        for index in 0..self.total_chunks {
            if let Some(chunk) = self.slots.remove(&index) {
                out.extend_from_slice(&chunk);
            }
        }
        out
    }
}

struct FountainState {
    total_file_size: u32,
    collected_ids: HashSet<u32>,
    decoder: FountainDecoder,
}

enum State {
    Init,
    Sequential(SequentialState),
    Fountain(FountainState),
    Complete {
        mode: Mode,
        progress: Progress,
        output: Vec<u8>,
    },
}

pub struct Reassembler {
    state: State,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Self { state: State::Init }
    }

    /// Mode fixed by the first valid packet.
    pub fn mode(&self) -> Option<Mode> {
        match &self.state {
            State::Init => None,
            State::Sequential(_) => Some(Mode::Sequential),
            State::Fountain(_) => Some(Mode::Fountain),
            State::Complete { mode, .. } => Some(*mode),
        }
    }

    pub fn accept(&mut self, packet: &Packet<'_>) -> Accepted {
        if let State::Init = self.state {
            match start_session(packet) {
                Ok(state) => self.state = state,
                Err(reason) => return rejected(reason),
            }
        }
        let (accepted, output) = match (&mut self.state, packet) {
            (State::Complete { .. }, _) => return Accepted::AlreadyComplete,
            (State::Sequential(state), Packet::Sequential(p)) => accept_sequential(state, p),
            (State::Fountain(state), Packet::Fountain(p)) => accept_fountain(state, p),
            (state, packet) => {
                let expected = match state {
                    State::Fountain(_) => Mode::Fountain,
                    _ => Mode::Sequential,
                };
                let reason = Rejection::ModeMismatch {
                    expected,
                    got: packet.mode(),
                };
                return rejected(reason);
            }
        };
        if let Some(output) = output {
            let progress = self.progress();
            info!(
                mode = packet.mode().as_str(),
                bytes = output.len(),
                received = progress.received,
                "transfer complete"
            );
            self.state = State::Complete {
                mode: packet.mode(),
                progress,
                output,
            };
        }
        accepted
    }

    pub fn progress(&self) -> Progress {
        match &self.state {
            State::Init => Progress::default(),
            State::Sequential(s) => Progress {
                received: s.received(),
                expected: Some(s.total_chunks as usize),
            },
            State::Fountain(s) => Progress {
                received: s.collected_ids.len(),
                expected: Some(s.decoder.params().source_symbols() as usize),
            },
            State::Complete { progress, .. } => *progress,
        }
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, State::Complete { .. })
    }

    pub fn output(&self) -> Option<&[u8]> {
        match &self.state {
            State::Complete { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn into_output(self) -> Option<Vec<u8>> {
        match self.state {
            State::Complete { output, .. } => Some(output),
            _ => None,
        }
    }
}

fn rejected(reason: Rejection) -> Accepted {
    warn!(%reason, "packet rejected");
    Accepted::Rejected(reason)
}

fn start_session(packet: &Packet<'_>) -> Result<State, Rejection> {
    match packet {
        Packet::Sequential(p) => {
            if p.total_chunks == 0 {
                return Err(Rejection::ZeroChunks);
            }
            info!(total_chunks = p.total_chunks, "sequential session started");
            Ok(State::Sequential(SequentialState::new(p.total_chunks)))
        }
        Packet::Fountain(p) => {
            let params = FountainParams::new(p.total_file_size, p.payload.len())?;
            info!(
                file_size = p.total_file_size,
                payload_size = p.payload.len(),
                source_symbols = params.source_symbols(),
                "fountain session started"
            );
            Ok(State::Fountain(FountainState {
                total_file_size: p.total_file_size,
                collected_ids: HashSet::new(),
                decoder: FountainDecoder::new(params),
            }))
        }
    }
}

type Step = (Accepted, Option<Vec<u8>>);

fn accept_sequential(state: &mut SequentialState, p: &SequentialPacket<'_>) -> Step {
    if p.total_chunks != state.total_chunks {
        let reason = Rejection::TotalChunksMismatch {
            expected: state.total_chunks,
            got: p.total_chunks,
        };
        return (rejected(reason), None);
    }
    if p.index >= state.total_chunks {
        let reason = Rejection::IndexOutOfRange {
            index: p.index,
            total_chunks: state.total_chunks,
        };
        return (rejected(reason), None);
    }
    if state.slots.contains_key(&p.index) {
        debug!(index = p.index, "duplicate chunk");
        return (Accepted::Duplicate, None);
    }
    state.slots.insert(p.index, p.payload.to_vec());
    state.remaining -= 1;
    debug!(index = p.index, remaining = state.remaining, "chunk stored");
    if state.remaining == 0 {
        (Accepted::Completed, Some(state.assemble()))
    } else {
        (Accepted::Stored, None)
    }
}

fn accept_fountain(state: &mut FountainState, p: &FountainPacket<'_>) -> Step {
    if p.total_file_size != state.total_file_size {
        let reason = Rejection::FileSizeMismatch {
            expected: state.total_file_size,
            got: p.total_file_size,
        };
        return (rejected(reason), None);
    }
    let fresh = state.collected_ids.insert(p.symbol_id);
    debug!(symbol_id = p.symbol_id, fresh, "fountain symbol");
    // duplicates are fed too; the decoder ignores symbols it already holds
    match state.decoder.decode(p.payload) {
        Some(output) => (Accepted::Completed, Some(output)),
        None if fresh => (Accepted::Stored, None),
        None => (Accepted::Duplicate, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fountain::FountainEncoder;
    use packet::{FountainPacket, SequentialPacket};

    fn seq(index: u32, total_chunks: u32, payload: &[u8]) -> Packet<'_> {
        Packet::Sequential(SequentialPacket {
            index,
            total_chunks,
            payload,
        })
    }

    #[test]
    fn duplicate_index_counts_once() {
        let mut r = Reassembler::new();
        assert_eq!(r.accept(&seq(7, 10, b"seven")), Accepted::Stored);
        assert_eq!(r.accept(&seq(7, 10, b"seven")), Accepted::Duplicate);
        assert_eq!(
            r.progress(),
            Progress {
                received: 1,
                expected: Some(10)
            }
        );
    }

    #[test]
    fn completes_only_when_every_index_arrives() {
        let mut r = Reassembler::new();
        assert_eq!(r.accept(&seq(2, 3, b"c")), Accepted::Stored);
        assert_eq!(r.accept(&seq(0, 3, b"a")), Accepted::Stored);
        assert!(!r.is_complete());
        assert!(r.output().is_none());
        assert_eq!(r.accept(&seq(1, 3, b"b")), Accepted::Completed);
        assert_eq!(r.output(), Some(&b"abc"[..]));
        assert_eq!(r.accept(&seq(1, 3, b"b")), Accepted::AlreadyComplete);
        assert_eq!(r.progress().received, 3);
        assert_eq!(r.into_output(), Some(b"abc".to_vec()));
    }

    #[test]
    fn single_empty_chunk_is_an_empty_file() {
        let mut r = Reassembler::new();
        assert_eq!(r.accept(&seq(0, 1, &[])), Accepted::Completed);
        assert_eq!(r.output(), Some(&[][..]));
    }

    #[test]
    fn rejects_inconsistent_sequential_packets() {
        let mut r = Reassembler::new();
        assert!(matches!(
            r.accept(&seq(0, 0, b"x")),
            Accepted::Rejected(Rejection::ZeroChunks)
        ));
        assert_eq!(r.mode(), None);

        r.accept(&seq(0, 4, b"x"));
        assert_eq!(
            r.accept(&seq(4, 4, b"x")),
            Accepted::Rejected(Rejection::IndexOutOfRange {
                index: 4,
                total_chunks: 4
            })
        );
        assert_eq!(
            r.accept(&seq(1, 5, b"x")),
            Accepted::Rejected(Rejection::TotalChunksMismatch {
                expected: 4,
                got: 5
            })
        );
        let fountain = Packet::Fountain(FountainPacket {
            symbol_id: 0,
            total_file_size: 10,
            payload: &[0; 64],
        });
        assert_eq!(
            r.accept(&fountain),
            Accepted::Rejected(Rejection::ModeMismatch {
                expected: Mode::Sequential,
                got: Mode::Fountain
            })
        );
        assert_eq!(r.progress().received, 1);
    }

    #[test]
    fn fountain_session_completes_from_any_symbols() {
        let data: Vec<u8> = (0..3_000u32).map(|i| (i % 253) as u8).collect();
        let encoder = FountainEncoder::new(&data, 200).expect("encoder");
        let mut r = Reassembler::new();

        let mut completed = false;
        for id in (0u32..400).filter(|id| id % 3 != 0) {
            let payload = encoder.encode(id);
            let packet = Packet::Fountain(FountainPacket {
                symbol_id: id,
                total_file_size: data.len() as u32,
                payload: &payload,
            });
            match r.accept(&packet) {
                Accepted::Completed => {
                    completed = true;
                    break;
                }
                Accepted::Stored => {}
                other => panic!("unexpected {other:?} for symbol {id}"),
            }
        }
        assert!(completed);
        assert_eq!(r.mode(), Some(Mode::Fountain));
        assert_eq!(r.output(), Some(&data[..]));
    }

    #[test]
    fn fountain_rejects_size_mismatch_and_repeats_are_duplicates() {
        let data = vec![9u8; 1_000];
        let encoder = FountainEncoder::new(&data, 128).expect("encoder");
        let payload = encoder.encode(0);
        let packet = |size| {
            Packet::Fountain(FountainPacket {
                symbol_id: 0,
                total_file_size: size,
                payload: &payload,
            })
        };
        let mut r = Reassembler::new();
        assert_eq!(r.accept(&packet(1_000)), Accepted::Stored);
        assert_eq!(r.accept(&packet(1_000)), Accepted::Duplicate);
        assert_eq!(
            r.accept(&packet(999)),
            Accepted::Rejected(Rejection::FileSizeMismatch {
                expected: 1_000,
                got: 999
            })
        );
    }

    #[test]
    fn fountain_rejects_empty_file_size() {
        let mut r = Reassembler::new();
        let packet = Packet::Fountain(FountainPacket {
            symbol_id: 0,
            total_file_size: 0,
            payload: &[0; 64],
        });
        assert!(matches!(
            r.accept(&packet),
            Accepted::Rejected(Rejection::Fountain(_))
        ));
        assert_eq!(r.mode(), None);
    }
}
