//! End-to-end scenarios across the photon crates.

#[cfg(all(test, not(target_arch = "wasm32")))]
mod camera;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod optical_e2e;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod frame_sanity;

#[cfg(test)]
mod tests {
    use fountain::{FountainEncoder, FountainParams};
    use packet::{make_fountain, wrap_l2, Mode, Packet};
    use reassembly::{Accepted, Reassembler};

    #[test]
    fn fountain_packets_complete_reassembly_without_pipeline() {
        let data: Vec<u8> = (0..5_000u32).map(|i| (i * 31 % 251) as u8).collect();
        let encoder = FountainEncoder::new(&data, 200).expect("encoder");
        let needed = encoder.params().source_symbols();

        let mut r = Reassembler::new();
        let mut completed_at = None;
        // skip the first quarter of source symbols entirely
        for id in (needed / 4)..(needed * 3) {
            let l2 = wrap_l2(
                Mode::Fountain,
                &make_fountain(id, data.len() as u32, &encoder.encode(id)),
            );
            let packet = Packet::decode(&l2).expect("packet");
            if r.accept(&packet) == Accepted::Completed {
                completed_at = Some(id);
                break;
            }
        }
        assert!(completed_at.is_some(), "decoder never completed");
        assert_eq!(r.into_output(), Some(data));
    }

    #[test]
    fn fountain_params_agree_between_ends() {
        let encoder = FountainEncoder::new(&[7u8; 10_000], 300).expect("encoder");
        let params = FountainParams::new(10_000, 300).expect("params");
        assert_eq!(encoder.params().symbol_size(), params.symbol_size());
        assert_eq!(encoder.params().source_symbols(), params.source_symbols());
    }
}
