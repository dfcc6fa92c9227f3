use std::collections::HashMap;

use frame::{approx_eq, Frame};
use smallvec::SmallVec;
use tracing::trace;

/// Per-channel distance under which neighbouring pixels belong to one run.
const RUN_TOLERANCE: u8 = 10;

/// Run lengths that vote on the box size.
const VOTERS: usize = 3;

/// Guesses the cell size of a grid frame from horizontal run lengths.
///
/// Scans rows `0, h/3, 2h/3, ...`, merges neighbouring pixels within
/// [`RUN_TOLERANCE`] into runs and takes the GCD of the three most frequent
/// run lengths. Exact on lossless frames whose rows contain varied cells;
/// best-effort on recaptured images. Equally frequent lengths rank shortest
/// first rather than in the order they were seen, so the vote does not
/// depend on where the scan starts.
pub fn detect_box_size(frame: &Frame) -> Option<u32> {
    if frame.is_empty() {
        return None;
    }
    let step = (frame.height() / 3).max(1) as usize;

    let mut tally: HashMap<u32, u32> = HashMap::new();
    for y in (0..frame.height()).step_by(step) {
        let mut row = frame.row(y);
        let Some(mut prev) = row.next() else {
            continue;
        };
        let mut run = 1u32;
        for px in row {
            if approx_eq(px, prev, RUN_TOLERANCE) {
                run += 1;
            } else {
                *tally.entry(run).or_default() += 1;
                run = 1;
            }
            prev = px;
        }
        *tally.entry(run).or_default() += 1;
    }

    let mut ranked: Vec<(u32, u32)> = tally.into_iter().collect();
    ranked.sort_unstable_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let top: SmallVec<[u32; VOTERS]> = ranked.iter().take(VOTERS).map(|&(len, _)| len).collect();

    let size = if top.len() < VOTERS {
        top.first().copied()?
    } else {
        top.iter().copied().fold(0, gcd)
    };
    trace!(?top, size, "box size detected");
    Some(size)
}

fn gcd(a: u32, b: u32) -> u32 {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
