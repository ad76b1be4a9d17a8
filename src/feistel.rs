//! Keyed Feistel permutations.
//!
//! Two variants: a fixed 64-bit block used to hide the structure of
//! generated ids, and a byte-stream mode for arbitrary payloads. Both are
//! bijections for a fixed key and round count. Neither is a cipher in the
//! cryptographic sense; they stop casual enumeration, not analysis.

use rayon::prelude::*;

/// 2^32 / golden ratio.
const GOLDEN_RATIO: u32 = 0x9e37_79b9;
const ROTATION: u32 = 7;

/// Half length (bytes) from which the byte-mode combine step runs on the
/// rayon pool instead of inline.
pub const PARALLEL_THRESHOLD: usize = 16 * 1024;

#[inline]
fn mix(half: u32, round_key: u32) -> u32 {
    half.wrapping_add(round_key)
        .rotate_left(ROTATION)
        .wrapping_mul(GOLDEN_RATIO)
}

/// Permutes a 64-bit value.
///
/// Round `i` uses the key `key + i`, so the decoder must be given the same
/// key and round count.
pub fn obfuscate(id: u64, key: u32, rounds: u8) -> u64 {
    let mut left = (id >> 32) as u32;
    let mut right = id as u32;

    for i in 0..rounds as u32 {
        let mixed = mix(right, key.wrapping_add(i));
        (left, right) = (right, left ^ mixed);
    }

    ((left as u64) << 32) | right as u64
}

/// Inverse of [`obfuscate`].
pub fn deobfuscate(code: u64, key: u32, rounds: u8) -> u64 {
    let mut left = (code >> 32) as u32;
    let mut right = code as u32;

    for i in (0..rounds as u32).rev() {
        let mixed = mix(left, key.wrapping_add(i));
        (left, right) = (right ^ mixed, left);
    }

    ((left as u64) << 32) | right as u64
}

// out[j] = right[j] + key[j % len] + round (mod 256). An empty key
// contributes nothing.
fn round_function(right: &[u8], key: &[u8], round: u8) -> Vec<u8> {
    right
        .iter()
        .enumerate()
        .map(|(j, &r)| {
            let k = if key.is_empty() { 0 } else { key[j % key.len()] };
            r.wrapping_add(k).wrapping_add(round)
        })
        .collect()
}

// XORs `mixed` into `left`. The parallel branch returns only after every
// chunk is done, so the caller's swap always sees the full round.
fn combine(left: &mut [u8], mixed: &[u8]) {
    if left.len() >= PARALLEL_THRESHOLD {
        left.par_iter_mut()
            .zip(mixed.par_iter())
            .for_each(|(l, m)| *l ^= m);
    } else {
        left.iter_mut().zip(mixed).for_each(|(l, m)| *l ^= m);
    }
}

fn split_padded(data: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut buf = data.to_vec();
    if buf.len() % 2 != 0 {
        buf.push(0);
    }
    let right = buf.split_off(buf.len() / 2);
    (buf, right)
}

/// Permutes a byte string.
///
/// Odd-length input gets one zero byte appended first, so the output is
/// always of even length. When the input already ended in a zero byte the
/// padding can't be told apart from data on the way back.
pub fn obfuscate_bytes(data: &[u8], key: &[u8], rounds: u8) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let (mut left, mut right) = split_padded(data);

    for i in 0..rounds {
        let mixed = round_function(&right, key, i);
        combine(&mut left, &mixed);
        std::mem::swap(&mut left, &mut right);
    }

    left.extend_from_slice(&right);
    left
}

/// Inverse of [`obfuscate_bytes`].
pub fn deobfuscate_bytes(data: &[u8], key: &[u8], rounds: u8) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }
    let (mut left, mut right) = split_padded(data);

    for i in (0..rounds).rev() {
        std::mem::swap(&mut left, &mut right);
        let mixed = round_function(&right, key, i);
        combine(&mut left, &mixed);
    }

    left.extend_from_slice(&right);
    left
}
