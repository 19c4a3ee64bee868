//! Hash kernels.
//!
//! Every kernel maps a flow key to a [`HashPair`] under two constraints:
//! the two halves must land in different buckets (`h0 & mask != h1 & mask`)
//! and the fingerprint `h0 ^ h1` must not collide with the all-ones lane
//! sentinel. A kernel that trips either constraint byte-swaps, re-mixes and
//! feeds the result back until both hold.

use crate::fcache::bucket::INVALID_HVAL;
use crate::fcache::key::{FlowKey, HashPair};

/// Hash kernel signature. Client-supplied kernels must uphold the same two
/// constraints; the engine does not re-validate.
pub type HashFn = fn(&FlowKey, u32) -> HashPair;

/// `with_hash` path: trust the hash cached inside the key.
pub(crate) fn read_hash(key: &FlowKey, _mask: u32) -> HashPair {
    key.hash
}

#[inline]
fn constrained(h0: u32, h1: u32, mask: u32) -> bool {
    (h0 & mask) != (h1 & mask) && (h0 ^ h1) != INVALID_HVAL
}

fn murmur3_32(blocks: &[u32], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;
    const M: u32 = 5;
    const N: u32 = 0xe654_6b64;

    let mut hash = seed;
    for &block in blocks {
        let mut k = block.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        hash ^= k;
        hash = hash.rotate_left(13).wrapping_mul(M).wrapping_add(N);
    }

    hash ^= (blocks.len() * 4) as u32;
    hash ^= hash >> 16;
    hash = hash.wrapping_mul(0x85eb_ca6b);
    hash ^= hash >> 13;
    hash = hash.wrapping_mul(0xc2b2_ae35);
    hash ^= hash >> 16;
    hash
}

/// Generic kernel: chained 32-bit murmur block mixing.
pub fn murmur(key: &FlowKey, mask: u32) -> HashPair {
    let blocks = key.blocks32();
    let mut h0: u32 = 0;
    let mut h1: u32 = 0xdead_beef;

    let mut i = 0;
    while i < blocks.len() {
        h0 = murmur3_32(&blocks[i..i + 2], h0);
        h1 = murmur3_32(&[h0], h1);
        i += 2;
    }

    while !constrained(h0, h1, mask) {
        let h = !murmur3_32(&[h0, h1], h1.swap_bytes());
        h1 = h ^ h0;
    }
    HashPair::new(h0, h1)
}

/// Fast kernel: chained 64-bit CRC32C. Falls back to [`murmur`] on hosts
/// without SSE4.2 so the function stays total.
#[cfg(target_arch = "x86_64")]
pub fn crc(key: &FlowKey, mask: u32) -> HashPair {
    if is_x86_feature_detected!("sse4.2") {
        unsafe { crc_impl(key, mask) }
    } else {
        murmur(key, mask)
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse4.2")]
unsafe fn crc_impl(key: &FlowKey, mask: u32) -> HashPair {
    use core::arch::x86_64::{_mm_crc32_u32, _mm_crc32_u64};

    let mut h0: u32 = 0;
    let mut h1: u32 = 0xdead_beef;
    for &block in key.blocks64().iter() {
        h0 = _mm_crc32_u64(h0 as u64, block) as u32;
        h1 = _mm_crc32_u32(h1, h0);
    }

    while !constrained(h0, h1, mask) {
        let pair = HashPair::new(h0, h1);
        let h = !(_mm_crc32_u64(h1.swap_bytes() as u64, pair.raw()) as u32);
        h1 = h ^ h0;
    }
    HashPair::new(h0, h1)
}

/// Convenience client kernel built on `fxhash`, constrained the same way.
pub fn fx(key: &FlowKey, mask: u32) -> HashPair {
    let h = fxhash::hash64(&key.data[..]);
    let h0 = h as u32;
    let mut h1 = (h >> 32) as u32;
    while !constrained(h0, h1, mask) {
        let h = !murmur3_32(&[h0, h1], h1.swap_bytes());
        h1 = h ^ h0;
    }
    HashPair::new(h0, h1)
}

/// Default kernel for a new cache: CRC32 when the host can, murmur
/// otherwise.
pub(crate) fn detect() -> HashFn {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse4.2") {
            return crc;
        }
    }
    murmur
}
