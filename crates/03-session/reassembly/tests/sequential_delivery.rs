use packet::{chunk_count, make_sequential, wrap_l2, Mode, Packet};
use proptest::prelude::*;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, RngCore, SeedableRng};
use reassembly::{Accepted, Reassembler};

fn envelopes(data: &[u8], chunk: usize) -> Vec<Vec<u8>> {
    let total = chunk_count(data.len(), chunk) as u32;
    if data.is_empty() {
        return vec![wrap_l2(Mode::Sequential, &make_sequential(0, 1, &[]))];
    }
    data.chunks(chunk)
        .enumerate()
        .map(|(i, c)| wrap_l2(Mode::Sequential, &make_sequential(i as u32, total, c)))
        .collect()
}

fn feed(r: &mut Reassembler, l2: &[u8]) -> Accepted {
    r.accept(&Packet::decode(l2).expect("valid envelope"))
}

fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    SmallRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

#[test]
fn reverse_order_delivery_of_two_hundred_chunks() {
    let data = random_bytes(100_000, 21);
    let packets = envelopes(&data, 500);
    assert_eq!(packets.len(), 200);

    let mut r = Reassembler::new();
    for (n, l2) in packets.iter().rev().enumerate() {
        let accepted = feed(&mut r, l2);
        if n + 1 < packets.len() {
            assert_eq!(accepted, Accepted::Stored);
        } else {
            assert_eq!(accepted, Accepted::Completed);
        }
    }
    assert_eq!(r.into_output(), Some(data));
}

#[test]
fn lossy_pass_then_shuffled_redelivery() {
    let data = random_bytes(37_123, 22);
    let packets = envelopes(&data, 400);
    let mut rng = SmallRng::seed_from_u64(23);
    let mut r = Reassembler::new();

    for l2 in &packets {
        if rng.gen_bool(0.3) {
            continue;
        }
        feed(&mut r, l2);
    }
    assert!(!r.is_complete(), "loss should leave gaps");
    let before = r.progress().received;
    assert!(before < packets.len());

    let mut second = packets.clone();
    second.shuffle(&mut rng);
    let mut completions = 0;
    for l2 in &second {
        if feed(&mut r, l2).is_completed() {
            completions += 1;
        }
    }
    assert_eq!(completions, 1);
    assert_eq!(r.output(), Some(&data[..]));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn any_order_with_duplicates_rebuilds_file(
        data in proptest::collection::vec(any::<u8>(), 0..2_000),
        chunk in 1usize..300,
        seed in any::<u64>(),
    ) {
        let packets = envelopes(&data, chunk);
        let mut order: Vec<usize> = (0..packets.len()).chain(0..packets.len() / 2).collect();
        order.shuffle(&mut SmallRng::seed_from_u64(seed));

        let mut r = Reassembler::new();
        for i in order {
            feed(&mut r, &packets[i]);
        }
        prop_assert!(r.is_complete());
        prop_assert_eq!(r.progress().received, packets.len());
        prop_assert_eq!(r.into_output(), Some(data));
    }
}
