//! MurmurHash3 (x86, 32-bit) and landmark hash packing

use crate::config::HASH_SEED;

const C1: u32 = 0xcc9e_2d51;
const C2: u32 = 0x1b87_3593;

/// MurmurHash3 x86_32 of `data`
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    let mut h = seed;
    let mut blocks = data.chunks_exact(4);

    for block in &mut blocks {
        let k = u32::from_le_bytes([block[0], block[1], block[2], block[3]]);
        h ^= mix_k(k);
        h = h.rotate_left(13).wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    let tail = blocks.remainder();
    if !tail.is_empty() {
        let mut k = 0u32;
        for (i, &byte) in tail.iter().enumerate() {
            k ^= (byte as u32) << (8 * i);
        }
        h ^= mix_k(k);
    }

    h ^= data.len() as u32;
    fmix32(h)
}

#[inline]
fn mix_k(k: u32) -> u32 {
    k.wrapping_mul(C1).rotate_left(15).wrapping_mul(C2)
}

#[inline]
fn fmix32(mut h: u32) -> u32 {
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;
    h
}

/// Hash of a landmark key. Words are encoded little-endian; the optional
/// magnitude-ratio bucket is appended as a fourth word.
pub fn landmark_hash(min_bin: u32, max_bin: u32, quantized_dt: u32, ratio_bucket: Option<u32>) -> u32 {
    let mut key = [0u8; 16];
    key[0..4].copy_from_slice(&min_bin.to_le_bytes());
    key[4..8].copy_from_slice(&max_bin.to_le_bytes());
    key[8..12].copy_from_slice(&quantized_dt.to_le_bytes());

    match ratio_bucket {
        Some(bucket) => {
            key[12..16].copy_from_slice(&bucket.to_le_bytes());
            murmur3_32(&key, HASH_SEED)
        }
        None => murmur3_32(&key[..12], HASH_SEED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514E_28B7);
        assert_eq!(murmur3_32(b"test", 0), 0xba6b_d213);
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", 0),
            0x2e4f_f723
        );
    }

    #[test]
    fn test_landmark_hash_depends_on_every_field() {
        let base = landmark_hash(10, 20, 3, None);
        assert_eq!(base, landmark_hash(10, 20, 3, None));
        assert_ne!(base, landmark_hash(11, 20, 3, None));
        assert_ne!(base, landmark_hash(10, 21, 3, None));
        assert_ne!(base, landmark_hash(10, 20, 4, None));
        assert_ne!(base, landmark_hash(10, 20, 3, Some(0)));
    }
}
