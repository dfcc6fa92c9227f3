//! Property checks for the depacketizer against arbitrary captured bytes.

use packet::{make_sequential, wrap_l2, Mode, Packet, PacketError};
use proptest::collection;
use proptest::prelude::*;

proptest! {
    /// Garbage never panics; it is either a packet or a typed error.
    #[test]
    fn arbitrary_bytes_never_panic(bytes in collection::vec(any::<u8>(), 0..64)) {
        match Packet::decode(&bytes) {
            Ok(packet) => {
                prop_assert!(bytes[0] <= 1);
                prop_assert_eq!(packet.payload().len(), bytes.len() - 9);
            }
            Err(PacketError::UnknownMode(flag)) => prop_assert!(flag > 1),
            Err(PacketError::Truncated { got, .. }) => prop_assert!(got < 8),
        }
    }

    /// Header fields survive framing regardless of payload contents.
    #[test]
    fn sequential_fields_survive_framing(
        index in any::<u32>(),
        total in any::<u32>(),
        payload in collection::vec(any::<u8>(), 0..128),
    ) {
        let l2 = wrap_l2(Mode::Sequential, &make_sequential(index, total, &payload));
        match Packet::decode(&l2) {
            Ok(Packet::Sequential(p)) => {
                prop_assert_eq!(p.index, index);
                prop_assert_eq!(p.total_chunks, total);
                prop_assert_eq!(p.payload, &payload[..]);
            }
            other => prop_assert!(false, "unexpected decode result {:?}", other),
        }
    }
}
