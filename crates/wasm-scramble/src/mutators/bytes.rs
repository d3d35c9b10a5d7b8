//! Byte-buffer operators.
//!
//! Each operator perturbs a byte run in place and returns the signed length
//! delta. Operators that need a minimum amount of material are no-ops below
//! their floor and return a zero delta.

use rand::rngs::SmallRng;
use rand::{Rng, RngCore};

/// Boundary-interesting 8-bit values.
const INTERESTING_8: &[i64] = &[-128, -1, 0, 1, 16, 32, 64, 100, 127];

/// Boundary-interesting 16-bit values, used together with the 8-bit set.
const INTERESTING_16: &[i64] = &[
    -32768, -129, 128, 255, 256, 512, 1000, 1024, 4096, 32767,
];

/// Boundary-interesting 32-bit values, used together with both smaller sets.
const INTERESTING_32: &[i64] = &[
    -2147483648,
    -100663046,
    -32769,
    32768,
    65535,
    65536,
    100663045,
    2147483647,
];

/// One byte-buffer operator.
pub type ByteOp = fn(&mut Vec<u8>, &mut SmallRng) -> isize;

/// The full byte-buffer operator catalog.
pub const BYTE_OPS: &[ByteOp] = &[
    flip_bit,
    set_interesting_byte,
    set_interesting_word,
    set_interesting_dword,
    sub_byte,
    add_byte,
    sub_word,
    add_word,
    sub_dword,
    add_dword,
    xor_byte,
    insert_random_run,
    delete_run,
    clone_run,
    overwrite_with_random,
    overwrite_from_self,
];

fn pick_interesting(rng: &mut SmallRng, sets: &[&[i64]]) -> i64 {
    let total: usize = sets.iter().map(|s| s.len()).sum();
    let mut index = rng.random_range(0..total);
    for set in sets {
        if index < set.len() {
            return set[index];
        }
        index -= set.len();
    }
    unreachable!()
}

/// A small perturbation magnitude, 1..=35.
fn small_delta(rng: &mut SmallRng) -> u32 {
    1 + rng.random_range(0..35)
}

/// Flip one random bit.
pub fn flip_bit(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let bit = rng.random_range(0..buf.len() * 8);
    buf[bit >> 3] ^= 128 >> (bit & 7);
    0
}

/// Overwrite one byte with a boundary-interesting value.
pub fn set_interesting_byte(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let index = rng.random_range(0..buf.len());
    buf[index] = pick_interesting(rng, &[INTERESTING_8]) as u8;
    0
}

/// Overwrite two bytes with a boundary-interesting value, either byte order.
pub fn set_interesting_word(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 2 {
        return 0;
    }
    let value = pick_interesting(rng, &[INTERESTING_8, INTERESTING_16]) as u16;
    let index = rng.random_range(0..buf.len() - 1);
    let bytes = if rng.random_bool(0.5) {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    };
    buf[index..index + 2].copy_from_slice(&bytes);
    0
}

/// Overwrite four bytes with a boundary-interesting value, either byte order.
pub fn set_interesting_dword(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 4 {
        return 0;
    }
    let value = pick_interesting(rng, &[INTERESTING_8, INTERESTING_16, INTERESTING_32]) as u32;
    let index = rng.random_range(0..buf.len() - 3);
    let bytes = if rng.random_bool(0.5) {
        value.to_le_bytes()
    } else {
        value.to_be_bytes()
    };
    buf[index..index + 4].copy_from_slice(&bytes);
    0
}

/// Subtract 1..=35 from one byte, wrapping.
pub fn sub_byte(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let index = rng.random_range(0..buf.len());
    buf[index] = buf[index].wrapping_sub(small_delta(rng) as u8);
    0
}

/// Add 1..=35 to one byte, wrapping.
pub fn add_byte(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let index = rng.random_range(0..buf.len());
    buf[index] = buf[index].wrapping_add(small_delta(rng) as u8);
    0
}

fn adjust_word(buf: &mut [u8], rng: &mut SmallRng, negate: bool) {
    if buf.len() < 2 {
        return;
    }
    let index = rng.random_range(0..buf.len() - 1);
    let window: [u8; 2] = [buf[index], buf[index + 1]];
    let mut value = if rng.random_bool(0.5) {
        u16::from_le_bytes(window)
    } else {
        u16::from_be_bytes(window)
    };
    let amount = small_delta(rng) as u16;
    value = if negate {
        value.wrapping_sub(amount)
    } else {
        value.wrapping_add(amount)
    };
    buf[index..index + 2].copy_from_slice(&value.to_le_bytes());
}

/// Subtract 1..=35 from a two-byte window, wrapping mod 2^16.
pub fn sub_word(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    adjust_word(buf, rng, true);
    0
}

/// Add 1..=35 to a two-byte window, wrapping mod 2^16.
pub fn add_word(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    adjust_word(buf, rng, false);
    0
}

fn adjust_dword(buf: &mut [u8], rng: &mut SmallRng, negate: bool) {
    if buf.len() < 4 {
        return;
    }
    let index = rng.random_range(0..buf.len() - 3);
    let window: [u8; 4] = buf[index..index + 4].try_into().unwrap();
    let mut value = if rng.random_bool(0.5) {
        u32::from_le_bytes(window)
    } else {
        u32::from_be_bytes(window)
    };
    let amount = small_delta(rng);
    value = if negate {
        value.wrapping_sub(amount)
    } else {
        value.wrapping_add(amount)
    };
    buf[index..index + 4].copy_from_slice(&value.to_le_bytes());
}

/// Subtract 1..=35 from a four-byte window, wrapping mod 2^32.
pub fn sub_dword(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    adjust_dword(buf, rng, true);
    0
}

/// Add 1..=35 to a four-byte window, wrapping mod 2^32.
pub fn add_dword(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    adjust_dword(buf, rng, false);
    0
}

/// XOR one byte with a random non-zero mask.
pub fn xor_byte(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.is_empty() {
        return 0;
    }
    let index = rng.random_range(0..buf.len());
    buf[index] ^= 1 + rng.random_range(0..255u8);
    0
}

/// Insert a run of fresh random bytes, about 40% of the current length, at
/// a random offset.
pub fn insert_random_run(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 4 {
        return 0;
    }
    let index = rng.random_range(0..buf.len() - 1);
    let mut run = vec![0u8; buf.len() * 2 / 5];
    rng.fill_bytes(&mut run);
    let delta = run.len() as isize;
    buf.splice(index..index, run);
    delta
}

/// Delete a run of up to 25% of the current length at a random offset.
pub fn delete_run(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 10 {
        return 0;
    }
    let index = rng.random_range(0..buf.len() - 1);
    let max_run = buf.len() / 4;
    let run = rng.random_range(0..=max_run).min(buf.len() - index);
    buf.drain(index..index + run);
    -(run as isize)
}

/// Clone the run from a random offset to the three-quarter mark and
/// reinsert it in place.
pub fn clone_run(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 4 {
        return 0;
    }
    let index = rng.random_range(0..buf.len() - 1);
    let end = buf.len() * 3 / 4;
    if index >= end {
        return 0;
    }
    let run: Vec<u8> = buf[index..end].to_vec();
    let delta = run.len() as isize;
    buf.splice(index..index, run);
    delta
}

/// Overwrite a window of half the current length with fresh random bytes.
pub fn overwrite_with_random(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 10 {
        return 0;
    }
    let run = buf.len() / 2;
    let start = rng.random_range(0..=buf.len() - run);
    rng.fill_bytes(&mut buf[start..start + run]);
    0
}

/// Overwrite a window of about 40% of the current length with a run copied
/// from elsewhere in the same buffer.
pub fn overwrite_from_self(buf: &mut Vec<u8>, rng: &mut SmallRng) -> isize {
    if buf.len() < 10 {
        return 0;
    }
    let run = buf.len() * 2 / 5;
    let src = rng.random_range(0..=buf.len() - run);
    let dst = rng.random_range(0..=buf.len() - run);
    buf.copy_within(src..src + run, dst);
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rng() -> SmallRng {
        SmallRng::seed_from_u64(42)
    }

    #[test]
    fn flip_bit_changes_exactly_one_bit() {
        let mut rng = rng();
        for _ in 0..50 {
            let original = vec![0xa5, 0x00, 0xff, 0x17];
            let mut buf = original.clone();
            let delta = flip_bit(&mut buf, &mut rng);
            assert_eq!(delta, 0);
            assert_eq!(buf.len(), original.len());
            let differing_bits: u32 = buf
                .iter()
                .zip(&original)
                .map(|(a, b)| (a ^ b).count_ones())
                .sum();
            assert_eq!(differing_bits, 1);
        }
    }

    #[test]
    fn length_floors_make_small_buffers_no_ops() {
        let mut rng = rng();
        let mut tiny = vec![1, 2, 3];
        assert_eq!(insert_random_run(&mut tiny, &mut rng), 0);
        assert_eq!(tiny, [1, 2, 3]);

        let mut small = vec![0; 9];
        assert_eq!(delete_run(&mut small, &mut rng), 0);
        assert_eq!(overwrite_with_random(&mut small, &mut rng), 0);
        assert_eq!(overwrite_from_self(&mut small, &mut rng), 0);
        assert_eq!(small, vec![0; 9]);
    }

    #[test]
    fn deltas_match_length_changes() {
        let mut rng = rng();
        for op in BYTE_OPS {
            for _ in 0..20 {
                let mut buf: Vec<u8> = (0u8..40).collect();
                let before = buf.len() as isize;
                let delta = op(&mut buf, &mut rng);
                assert_eq!(buf.len() as isize - before, delta);
            }
        }
    }

    #[test]
    fn insert_grows_by_two_fifths() {
        let mut rng = rng();
        let mut buf = vec![0u8; 20];
        let delta = insert_random_run(&mut buf, &mut rng);
        assert_eq!(delta, 8);
        assert_eq!(buf.len(), 28);
    }

    #[test]
    fn delete_never_removes_more_than_a_quarter() {
        let mut rng = rng();
        for _ in 0..100 {
            let mut buf = vec![0u8; 40];
            let delta = delete_run(&mut buf, &mut rng);
            assert!(delta >= -10, "removed {} bytes", -delta);
        }
    }
}
