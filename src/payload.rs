//! Synthetic response payloads.

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// `n` pseudo-random bytes; identical output for identical `seed`.
pub fn random_bytes(n: usize, seed: Option<u64>) -> Bytes {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut buf = vec![0u8; n];
    rng.fill_bytes(&mut buf);
    Bytes::from(buf)
}

/// Bytes `start..=end` of the repeating `a..z` alphabet payload.
pub fn alphabet_span(start: usize, end: usize) -> Bytes {
    (start..=end)
        .map(|i| b'a' + (i % 26) as u8)
        .collect::<Vec<u8>>()
        .into()
}

/// `n` filler bytes for drip responses.
pub fn filler(n: usize) -> Bytes {
    Bytes::from(vec![b'*'; n])
}
