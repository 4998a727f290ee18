//! Offset alignment and scoring
//!
//! For every catalog track sharing hashes with the query, the differences
//! `song_offset - query_offset` of the matching pairs are histogrammed. A true
//! match piles up in one bucket; chance collisions spread out. Each query
//! landmark counts once per bucket and pairs with at most one posting, so
//! hashes repeated across sustained tones cannot inflate the alignment.

use crate::config::SoundmarkConfig;
use crate::error::Result;
use crate::landmark::Landmark;
use crate::store::{FingerprintStore, Posting, TrackId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

#[cfg(test)]
mod tests;

/// A scored catalog track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub track_id: TrackId,
    /// One-to-one pairs agreeing with the best offset
    pub aligned_count: usize,
    /// Raw hits: query landmarks or track postings sharing a hash, whichever is fewer
    pub total_hash_matches: usize,
    pub confidence: f64,
    /// Position of the query start within the track
    pub best_offset_ms: i64,
    /// Query span covered by aligned pairs
    pub query_start_ms: u32,
    pub query_end_ms: u32,
}

/// Ranked candidates plus lookup diagnostics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchReport {
    pub candidates: Vec<MatchCandidate>,
    /// Postings returned by the catalog lookup
    pub catalog_hits: usize,
}

/// One query/track hash pair
#[derive(Debug, Clone, Copy)]
struct Pair {
    /// Index into the query landmarks
    query_index: usize,
    /// Index into the looked-up postings
    posting_index: usize,
    query_ms: u32,
    delta_ms: i64,
}

/// track -> hash -> (posting index, song offset), in store order
type TrackHits = BTreeMap<TrackId, HashMap<u32, Vec<(usize, u32)>>>;

/// Matcher
pub struct Matcher {
    config: SoundmarkConfig,
}

impl Matcher {
    pub fn new(config: &SoundmarkConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Look up all distinct query hashes in one batch and rank the tracks
    pub fn query(&self, query: &[Landmark], store: &dyn FingerprintStore) -> Result<MatchReport> {
        if query.is_empty() {
            return Ok(MatchReport::default());
        }

        let hashes = distinct_hashes(query);
        let postings = store.lookup_by_hashes(&hashes)?;
        log::debug!(
            "Lookup of {} distinct hashes returned {} postings",
            hashes.len(),
            postings.len()
        );

        Ok(MatchReport {
            candidates: self.rank(query, &postings),
            catalog_hits: postings.len(),
        })
    }

    /// Minimum raw hits a track needs before it is aligned
    pub fn raw_floor(&self, query_len: usize) -> usize {
        self.config
            .min_raw_hits
            .max((self.config.min_raw_hit_ratio * query_len as f64).ceil() as usize)
    }

    /// Tracks whose raw hit count reaches the floor, without aligning them
    pub fn floor_survivors(&self, query: &[Landmark], postings: &[Posting]) -> BTreeSet<TrackId> {
        let floor = self.raw_floor(query.len());
        group_by_track(postings)
            .iter()
            .filter(|(_, offsets)| raw_hits(query, offsets) >= floor)
            .map(|(&track_id, _)| track_id)
            .collect()
    }

    /// Score and rank tracks from already retrieved postings
    pub fn rank(&self, query: &[Landmark], postings: &[Posting]) -> Vec<MatchCandidate> {
        if query.is_empty() || postings.is_empty() {
            return Vec::new();
        }

        let per_track = group_by_track(postings);

        let (first_ms, last_ms) = query
            .iter()
            .fold((u32::MAX, 0), |(lo, hi), l| {
                (lo.min(l.time_offset_ms), hi.max(l.time_offset_ms))
            });
        let query_span = last_ms.saturating_sub(first_ms);
        let raw_floor = self.raw_floor(query.len());

        let mut candidates: Vec<MatchCandidate> = per_track
            .iter()
            .filter_map(|(&track_id, offsets)| {
                let raw = raw_hits(query, offsets);
                if raw < raw_floor {
                    log::trace!(
                        "Track {}: {} raw hits below floor {}",
                        track_id,
                        raw,
                        raw_floor
                    );
                    return None;
                }
                let pairs = collect_pairs(query, offsets, self.config.offset_tolerance_ms);
                self.score(track_id, &pairs, raw, query.len(), query_span)
            })
            .filter(|c| {
                c.aligned_count >= self.config.min_aligned_count
                    && c.confidence >= self.config.min_confidence
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.confidence
                .total_cmp(&a.confidence)
                .then_with(|| b.aligned_count.cmp(&a.aligned_count))
                .then_with(|| a.track_id.cmp(&b.track_id))
        });

        if let Some(leader) = candidates.first().cloned() {
            let min_conf = leader.confidence * self.config.relative_confidence_cutoff;
            let min_aligned = leader.aligned_count as f64 * self.config.relative_aligned_cutoff;
            candidates.retain(|c| c.confidence >= min_conf && c.aligned_count as f64 >= min_aligned);
        }
        candidates.truncate(self.config.max_results);
        candidates
    }

    fn score(
        &self,
        track_id: TrackId,
        pairs: &[Pair],
        raw_hits: usize,
        query_len: usize,
        query_span: u32,
    ) -> Option<MatchCandidate> {
        let bucket_ms = self.config.offset_bucket_ms;
        let tolerance = self.config.offset_tolerance_ms;
        let centre = best_bucket(pairs, bucket_ms)? * bucket_ms;

        // Each query landmark and each posting pairs at most once
        let mut within: Vec<&Pair> = pairs
            .iter()
            .filter(|p| (p.delta_ms - centre).abs() <= tolerance)
            .collect();
        within.sort_by_key(|p| ((p.delta_ms - centre).abs(), p.query_index, p.posting_index));

        let mut used_query = HashSet::new();
        let mut used_postings = HashSet::new();
        let aligned: Vec<&Pair> = within
            .into_iter()
            .filter(|p| {
                if used_query.contains(&p.query_index) || used_postings.contains(&p.posting_index) {
                    return false;
                }
                used_query.insert(p.query_index);
                used_postings.insert(p.posting_index);
                true
            })
            .collect();
        if aligned.is_empty() {
            return None;
        }

        let mut deltas: Vec<i64> = aligned.iter().map(|p| p.delta_ms).collect();
        deltas.sort_unstable();
        let mid = deltas.len() / 2;
        let best_offset_ms = if deltas.len() % 2 == 1 {
            deltas[mid]
        } else {
            (deltas[mid - 1] + deltas[mid]).div_euclid(2)
        };
        if best_offset_ms < -tolerance {
            return None;
        }

        let query_start_ms = aligned.iter().map(|p| p.query_ms).min().unwrap_or(0);
        let query_end_ms = aligned.iter().map(|p| p.query_ms).max().unwrap_or(0);
        let spread = if query_span == 0 {
            1.0
        } else {
            (query_end_ms - query_start_ms) as f64 / query_span as f64
        };

        let confidence = self.confidence(aligned.len(), query_len, spread);
        log::trace!(
            "Track {}: {} raw, {} aligned at {} ms, confidence {:.3}",
            track_id,
            raw_hits,
            aligned.len(),
            best_offset_ms,
            confidence
        );

        Some(MatchCandidate {
            track_id,
            aligned_count: aligned.len(),
            total_hash_matches: raw_hits,
            confidence,
            best_offset_ms,
            query_start_ms,
            query_end_ms,
        })
    }

    /// Aligned ratio weighted by spread, plus a bonus for large absolute counts
    pub fn confidence(&self, aligned: usize, query_len: usize, spread: f64) -> f64 {
        if query_len == 0 {
            return 0.0;
        }
        let c = &self.config;
        let ratio = (aligned as f64 / query_len as f64).min(1.0);
        let spread = spread.clamp(0.0, 1.0);
        let threshold = c.count_bonus_threshold.max(1) as f64;
        let bonus = ((aligned as f64 - threshold) / threshold).clamp(0.0, 1.0);

        let confidence = ratio * ((1.0 - c.spread_weight) + c.spread_weight * spread)
            + c.count_bonus_weight * bonus;
        confidence.clamp(0.0, 1.0)
    }
}

/// Distinct hashes in first-seen order
pub fn distinct_hashes(landmarks: &[Landmark]) -> Vec<u32> {
    let mut seen = BTreeSet::new();
    landmarks
        .iter()
        .filter(|l| seen.insert(l.hash))
        .map(|l| l.hash)
        .collect()
}

fn group_by_track(postings: &[Posting]) -> TrackHits {
    let mut per_track: TrackHits = BTreeMap::new();
    for (index, posting) in postings.iter().enumerate() {
        per_track
            .entry(posting.track_id)
            .or_default()
            .entry(posting.hash)
            .or_default()
            .push((index, posting.time_offset_ms));
    }
    per_track
}

/// Upper bound on one-to-one pairs: the smaller of the query landmarks and
/// the track postings that share a hash
fn raw_hits(query: &[Landmark], offsets: &HashMap<u32, Vec<(usize, u32)>>) -> usize {
    let mut hashes = HashSet::new();
    let mut query_hits = 0;
    let mut posting_hits = 0;
    for landmark in query {
        if let Some(songs) = offsets.get(&landmark.hash) {
            query_hits += 1;
            if hashes.insert(landmark.hash) {
                posting_hits += songs.len();
            }
        }
    }
    query_hits.min(posting_hits)
}

/// Pairs in query order, postings in store order within each hash. Pairs
/// that would place the query before the track start are dropped.
fn collect_pairs(
    query: &[Landmark],
    offsets: &HashMap<u32, Vec<(usize, u32)>>,
    tolerance_ms: i64,
) -> Vec<Pair> {
    query
        .iter()
        .enumerate()
        .filter_map(|(query_index, q)| offsets.get(&q.hash).map(|songs| (query_index, q, songs)))
        .flat_map(|(query_index, q, songs)| {
            songs.iter().map(move |&(posting_index, song_ms)| Pair {
                query_index,
                posting_index,
                query_ms: q.time_offset_ms,
                delta_ms: song_ms as i64 - q.time_offset_ms as i64,
            })
        })
        .filter(|p| p.delta_ms >= -tolerance_ms)
        .collect()
}

/// Bucket holding the most distinct query landmarks; ties go to the bucket
/// seen first
fn best_bucket(pairs: &[Pair], bucket_ms: i64) -> Option<i64> {
    let mut counts: HashMap<i64, (usize, usize)> = HashMap::new();
    let mut counted: HashSet<(i64, usize)> = HashSet::new();
    for (seen, pair) in pairs.iter().enumerate() {
        let bucket = (pair.delta_ms as f64 / bucket_ms as f64).round() as i64;
        let entry = counts.entry(bucket).or_insert((0, seen));
        if counted.insert((bucket, pair.query_index)) {
            entry.0 += 1;
        }
    }

    counts
        .into_iter()
        .max_by(|(_, (count_a, seen_a)), (_, (count_b, seen_b))| {
            count_a.cmp(count_b).then_with(|| seen_b.cmp(seen_a))
        })
        .map(|(bucket, _)| bucket)
}
