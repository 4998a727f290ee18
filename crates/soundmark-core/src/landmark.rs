//! Landmark generation
//!
//! Each anchor peak is paired with the nearest later peaks inside the
//! target time window. A pair is hashed from its two bins (lower first) and
//! its quantized time delta, so the same constellation yields the same hash
//! wherever it occurs.

use crate::config::SoundmarkConfig;
use crate::hashing::landmark_hash;
use crate::peaks::Peak;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Highest magnitude-ratio bucket mixed into hashes
const MAX_RATIO_BUCKET: f32 = 15.0;

/// A hashed anchor/target peak pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    pub hash: u32,
    /// Absolute position of the anchor peak
    pub time_offset_ms: u32,
    pub anchor_freq: u16,
    pub target_freq: u16,
    pub delta_time_ms: f32,
    /// Sum of both peak magnitudes
    pub strength: f32,
}

/// Landmark generator
pub struct LandmarkGenerator {
    fanout: usize,
    min_time_delta_ms: f64,
    max_time_delta_ms: f64,
    time_quantum_ms: f64,
    magnitude_ratio: bool,
    dedup_bucket_ms: u32,
}

impl LandmarkGenerator {
    pub fn new(config: &SoundmarkConfig) -> Self {
        Self {
            fanout: config.fanout,
            min_time_delta_ms: config.min_time_delta_ms as f64,
            max_time_delta_ms: config.max_time_delta_ms as f64,
            time_quantum_ms: config.time_quantum_ms.max(1) as f64,
            magnitude_ratio: config.hash_magnitude_ratio,
            dedup_bucket_ms: config.dedup_bucket_ms.max(1),
        }
    }

    /// Pair, hash and deduplicate `peaks`. The input order does not matter.
    pub fn generate(&self, peaks: &[Peak]) -> Vec<Landmark> {
        let mut sorted = peaks.to_vec();
        sorted.sort_by(|a, b| {
            a.time_offset_ms
                .total_cmp(&b.time_offset_ms)
                .then_with(|| a.frequency_bin.cmp(&b.frequency_bin))
                .then_with(|| a.magnitude.total_cmp(&b.magnitude))
        });

        let pairs: Vec<Landmark> = sorted
            .par_iter()
            .flat_map_iter(|anchor| {
                let start = sorted.partition_point(|p| {
                    p.time_offset_ms - anchor.time_offset_ms < self.min_time_delta_ms
                });
                let end = sorted.partition_point(|p| {
                    p.time_offset_ms - anchor.time_offset_ms <= self.max_time_delta_ms
                });
                let window = if start < end { &sorted[start..end] } else { &[][..] };

                window
                    .iter()
                    .take(self.fanout)
                    .map(move |target| self.pair(anchor, target))
            })
            .collect();

        let landmarks = self.dedup(pairs);
        log::debug!(
            "Generated {} landmarks from {} peaks",
            landmarks.len(),
            peaks.len()
        );
        landmarks
    }

    /// Collapse landmarks sharing `(hash, time bucket)` to the strongest one,
    /// ordered by `(time_offset_ms, hash)`
    pub fn dedup(&self, landmarks: Vec<Landmark>) -> Vec<Landmark> {
        let mut best: HashMap<(u32, u32), Landmark> = HashMap::with_capacity(landmarks.len());

        for landmark in landmarks {
            let key = (landmark.hash, landmark.time_offset_ms / self.dedup_bucket_ms);
            best.entry(key)
                .and_modify(|kept| {
                    if stronger(&landmark, kept) {
                        *kept = landmark;
                    }
                })
                .or_insert(landmark);
        }

        let mut out: Vec<Landmark> = best.into_values().collect();
        out.sort_by_key(|l| (l.time_offset_ms, l.hash));
        out
    }

    fn pair(&self, anchor: &Peak, target: &Peak) -> Landmark {
        let dt = target.time_offset_ms - anchor.time_offset_ms;
        let quantized_dt = (dt / self.time_quantum_ms).round() as u32;

        let (lo, hi) = if anchor.frequency_bin <= target.frequency_bin {
            (anchor.frequency_bin, target.frequency_bin)
        } else {
            (target.frequency_bin, anchor.frequency_bin)
        };

        let ratio_bucket = self
            .magnitude_ratio
            .then(|| ratio_bucket(anchor.magnitude, target.magnitude));

        Landmark {
            hash: landmark_hash(lo as u32, hi as u32, quantized_dt, ratio_bucket),
            time_offset_ms: anchor.time_offset_ms.round() as u32,
            anchor_freq: anchor.frequency_bin,
            target_freq: target.frequency_bin,
            delta_time_ms: dt as f32,
            strength: anchor.magnitude + target.magnitude,
        }
    }
}

/// Order-independent coarse bucket of the louder/quieter magnitude ratio
fn ratio_bucket(a: f32, b: f32) -> u32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let ratio = hi / lo.max(f32::MIN_POSITIVE);
    (ratio.log2() * 2.0).round().clamp(0.0, MAX_RATIO_BUCKET) as u32
}

/// Higher strength wins; ties go to the earlier, lower-frequency pair
fn stronger(candidate: &Landmark, kept: &Landmark) -> bool {
    match candidate.strength.total_cmp(&kept.strength) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => {
            (candidate.time_offset_ms, candidate.anchor_freq, candidate.target_freq)
                < (kept.time_offset_ms, kept.anchor_freq, kept.target_freq)
        }
    }
}
