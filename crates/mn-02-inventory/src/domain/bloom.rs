//! Compact probabilistic summary of the entries a requester already holds.
//!
//! No false negatives: every inserted entry is reported as present. A false
//! positive only means the responder withholds an entry the requester lacks,
//! which a later round with a fresh tweak picks up.

use std::io::Cursor;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};

/// Upper bound on accepted filter size, 1 MiB of bits.
pub const MAX_BLOOM_BITS: usize = 8 * 1024 * 1024;
const MAX_HASH_FUNCTIONS: usize = 32;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BloomSummary {
    #[serde(with = "bitvec_serde")]
    bits: BitVec<u8, Lsb0>,
    k: usize,
    m: usize,
    n: usize,
    tweak: u32,
}

mod bitvec_serde {
    use bitvec::prelude::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bits: &BitVec<u8, Lsb0>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let bytes: Vec<u8> = bits.as_raw_slice().to_vec();
        (bytes, bits.len()).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BitVec<u8, Lsb0>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let (bytes, len): (Vec<u8>, usize) = Deserialize::deserialize(deserializer)?;
        let mut bits = BitVec::<u8, Lsb0>::from_vec(bytes);
        bits.truncate(len);
        Ok(bits)
    }
}

impl BloomSummary {
    /// Sized for `expected` elements at false positive rate `fpr`:
    /// m = -n·ln(fpr)/ln(2)², k = (m/n)·ln(2).
    pub fn with_capacity(expected: usize, fpr: f64, tweak: u32) -> Self {
        use std::f64::consts::LN_2;
        let n = expected.max(1) as f64;
        let fpr = if fpr.is_finite() { fpr.clamp(1e-9, 0.5) } else { 0.01 };
        let m = ((-n * fpr.ln() / (LN_2 * LN_2)).ceil() as usize).clamp(8, MAX_BLOOM_BITS);
        let k = (((m as f64 / n) * LN_2).round() as usize).clamp(1, MAX_HASH_FUNCTIONS);
        Self {
            bits: bitvec![u8, Lsb0; 0; m],
            k,
            m,
            n: 0,
            tweak,
        }
    }

    pub fn insert(&mut self, element: &[u8]) {
        for pos in positions(element, self.k, self.m, self.tweak) {
            self.bits.set(pos, true);
        }
        self.n += 1;
    }

    pub fn contains(&self, element: &[u8]) -> bool {
        positions(element, self.k, self.m, self.tweak)
            .into_iter()
            .all(|pos| self.bits[pos])
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Parameters of a filter received from a peer are consistent and bounded.
    pub fn is_valid(&self) -> bool {
        self.m > 0
            && self.m <= MAX_BLOOM_BITS
            && self.bits.len() == self.m
            && (1..=MAX_HASH_FUNCTIONS).contains(&self.k)
    }
}

fn murmur_hash(element: &[u8], seed: u32, tweak: u32) -> u64 {
    let mut cursor = Cursor::new(element);
    murmur3::murmur3_x64_128(&mut cursor, seed.wrapping_add(tweak)).unwrap_or(0) as u64
}

/// Double hashing: h(i) = h1 + i·h2.
fn positions(element: &[u8], k: usize, m: usize, tweak: u32) -> Vec<usize> {
    let h1 = murmur_hash(element, 0, tweak);
    let h2 = murmur_hash(element, 1, tweak);
    (0..k)
        .map(|i| (h1.wrapping_add((i as u64).wrapping_mul(h2)) % m as u64) as usize)
        .collect()
}
