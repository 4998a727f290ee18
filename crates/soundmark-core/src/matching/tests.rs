//! Tests for offset alignment and ranking

use super::*;
use crate::store::{MemoryStore, NewTrack};
use approx::assert_relative_eq;

fn landmark(hash: u32, time_offset_ms: u32) -> Landmark {
    Landmark {
        hash,
        time_offset_ms,
        anchor_freq: 10,
        target_freq: 20,
        delta_time_ms: 46.4,
        strength: 0.5,
    }
}

/// `n` query landmarks, one every 100 ms, with distinct hashes
fn query(n: u32) -> Vec<Landmark> {
    (0..n).map(|i| landmark(1000 + i, i * 100)).collect()
}

fn postings_at(track_id: TrackId, query: &[Landmark], offset_ms: u32) -> Vec<Posting> {
    query
        .iter()
        .map(|l| Posting {
            track_id,
            time_offset_ms: l.time_offset_ms + offset_ms,
            hash: l.hash,
        })
        .collect()
}

#[test]
fn test_exact_alignment() {
    let config = SoundmarkConfig::default();
    let q = query(40);
    let postings = postings_at(7, &q, 4000);

    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results.len(), 1);

    let top = &results[0];
    assert_eq!(top.track_id, 7);
    assert_eq!(top.aligned_count, 40);
    assert_eq!(top.total_hash_matches, 40);
    assert_eq!(top.best_offset_ms, 4000);
    assert_eq!((top.query_start_ms, top.query_end_ms), (0, 3900));
    assert_relative_eq!(top.confidence, 1.0, epsilon = 1e-9);
}

#[test]
fn test_scattered_collisions_do_not_align() {
    let config = SoundmarkConfig::default();
    let q = query(40);
    // Every hash matches, but at wildly different offsets
    let postings: Vec<Posting> = q
        .iter()
        .enumerate()
        .map(|(i, l)| Posting {
            track_id: 3,
            time_offset_ms: l.time_offset_ms + (i as u32 * 7919) % 60_000 + 1000 * i as u32,
            hash: l.hash,
        })
        .collect();

    assert!(Matcher::new(&config).rank(&q, &postings).is_empty());
}

#[test]
fn test_raw_hit_floor() {
    let config = SoundmarkConfig::default();
    let q = query(40);

    // Nine perfectly aligned hits stay below the ten-hit floor
    let postings = postings_at(1, &q[..9], 500);
    assert!(Matcher::new(&config).rank(&q, &postings).is_empty());

    // The floor also scales with query size: 1% of 2000 landmarks is 20
    let big = query(2000);
    let postings = postings_at(1, &big[..15], 500);
    let relaxed = SoundmarkConfig {
        min_confidence: 0.0,
        ..Default::default()
    };
    assert!(Matcher::new(&relaxed).rank(&big, &postings).is_empty());
}

#[test]
fn test_repeated_hash_pairs_one_to_one() {
    let config = SoundmarkConfig::default();
    // A sustained tone: one hash every 100 ms in both query and track
    let q: Vec<Landmark> = (0..10).map(|i| landmark(7, i * 100)).collect();
    let postings: Vec<Posting> = (0..10)
        .map(|i| Posting {
            track_id: 1,
            time_offset_ms: 5000 + i * 100,
            hash: 7,
        })
        .collect();

    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results.len(), 1);
    // 100 pairs, 44 of them within tolerance, but only 10 query landmarks
    assert_eq!(results[0].aligned_count, 10);
    assert_eq!(results[0].total_hash_matches, 10);
    assert_eq!(results[0].best_offset_ms, 5000);
}

#[test]
fn test_few_postings_of_a_repeated_hash_stay_below_floor() {
    let config = SoundmarkConfig::default();
    let q: Vec<Landmark> = (0..30).map(|i| landmark(7, i * 100)).collect();
    // 60 pairs from just 2 postings
    let postings: Vec<Posting> = [4000, 4100]
        .iter()
        .map(|&time_offset_ms| Posting {
            track_id: 1,
            time_offset_ms,
            hash: 7,
        })
        .collect();

    let matcher = Matcher::new(&config);
    assert!(matcher.floor_survivors(&q, &postings).is_empty());
    assert!(matcher.rank(&q, &postings).is_empty());
}

#[test]
fn test_query_cannot_start_before_track() {
    let config = SoundmarkConfig::default();
    let q: Vec<Landmark> = query(30)
        .into_iter()
        .map(|l| landmark(l.hash, l.time_offset_ms + 3000))
        .collect();

    // Postings 3 s earlier than the query landmarks
    let postings = postings_at(1, &query(30), 0);
    assert!(Matcher::new(&config).rank(&q, &postings).is_empty());

    // Within tolerance of the track start is still a match
    let postings: Vec<Posting> = q
        .iter()
        .map(|l| Posting {
            track_id: 1,
            time_offset_ms: l.time_offset_ms - 150,
            hash: l.hash,
        })
        .collect();
    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results[0].best_offset_ms, -150);
}

#[test]
fn test_floor_survivors() {
    let config = SoundmarkConfig::default();
    let q = query(40);
    let mut postings = postings_at(1, &q, 1000);
    postings.extend(postings_at(2, &q[..9], 3000));
    postings.extend(postings_at(3, &q[..10], 5000));

    let survivors = Matcher::new(&config).floor_survivors(&q, &postings);
    assert_eq!(survivors.into_iter().collect::<Vec<_>>(), vec![1, 3]);
}

#[test]
fn test_best_offset_is_median_of_aligned_pairs() {
    let config = SoundmarkConfig::default();
    let q = query(20);
    let jitter = [0i64, 30, -20, 10, 50, -40, 0, 20, -10, 60];
    let postings: Vec<Posting> = q
        .iter()
        .enumerate()
        .map(|(i, l)| Posting {
            track_id: 1,
            time_offset_ms: (l.time_offset_ms as i64 + 2000 + jitter[i % jitter.len()]) as u32,
            hash: l.hash,
        })
        .collect();

    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results[0].aligned_count, 20);
    // Even count: mean of the two middle deltas, 2000 and 2010
    assert_eq!(results[0].best_offset_ms, 2005);
}

#[test]
fn test_equal_buckets_resolve_to_first_seen() {
    let config = SoundmarkConfig {
        offset_tolerance_ms: 0,
        min_aligned_count: 1,
        min_confidence: 0.0,
        relative_confidence_cutoff: 0.0,
        relative_aligned_cutoff: 0.0,
        ..Default::default()
    };
    let q = query(20);
    // First ten query landmarks align at 3000, the last ten at 8000
    let mut postings = postings_at(1, &q[..10], 3000);
    postings.extend(postings_at(1, &q[10..], 8000));

    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results[0].best_offset_ms, 3000);
    assert_eq!(results[0].aligned_count, 10);

    // Swapping which half comes first in query order flips the winner
    let mut postings = postings_at(1, &q[..10], 8000);
    postings.extend(postings_at(1, &q[10..], 3000));
    let results = Matcher::new(&config).rank(&q, &postings);
    assert_eq!(results[0].best_offset_ms, 8000);
}

#[test]
fn test_ranking_and_relative_pruning() {
    let q = query(40);
    let mut postings = postings_at(1, &q, 1000);
    // Track 2 aligns on the first half of the query only
    postings.extend(postings_at(2, &q[..20], 9000));

    let strict = SoundmarkConfig::default();
    let results = Matcher::new(&strict).rank(&q, &postings);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].track_id, 1);

    let lenient = SoundmarkConfig {
        relative_confidence_cutoff: 0.0,
        relative_aligned_cutoff: 0.0,
        ..Default::default()
    };
    let results = Matcher::new(&lenient).rank(&q, &postings);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].track_id, 1);
    assert_eq!(results[1].track_id, 2);
    assert!(results[0].confidence > results[1].confidence);
}

#[test]
fn test_identical_scores_order_by_track_id() {
    let config = SoundmarkConfig::default();
    let q = query(30);
    let mut postings = postings_at(9, &q, 500);
    postings.extend(postings_at(4, &q, 700));

    let results = Matcher::new(&config).rank(&q, &postings);
    let ids: Vec<TrackId> = results.iter().map(|c| c.track_id).collect();
    assert_eq!(ids, vec![4, 9]);
}

#[test]
fn test_max_results_caps_output() {
    let config = SoundmarkConfig {
        max_results: 2,
        ..Default::default()
    };
    let q = query(30);
    let postings: Vec<Posting> = (1..=5)
        .flat_map(|id| postings_at(id, &q, 100 * id as u32))
        .collect();

    assert_eq!(Matcher::new(&config).rank(&q, &postings).len(), 2);
}

#[test]
fn test_confidence_formula() {
    let config = SoundmarkConfig::default();
    let matcher = Matcher::new(&config);

    // ratio 0.3, half spread: 0.3 * (0.5 + 0.25)
    assert_relative_eq!(matcher.confidence(30, 100, 0.5), 0.225, epsilon = 1e-9);
    // Count bonus kicks in above 150 aligned pairs
    assert_relative_eq!(matcher.confidence(225, 1000, 1.0), 0.225 + 0.05, epsilon = 1e-9);
    // Clipped to 1
    assert_relative_eq!(matcher.confidence(400, 300, 1.0), 1.0);
    assert_eq!(matcher.confidence(5, 0, 1.0), 0.0);
}

#[test]
fn test_empty_inputs() {
    let config = SoundmarkConfig::default();
    let matcher = Matcher::new(&config);
    assert!(matcher.rank(&[], &postings_at(1, &query(20), 0)).is_empty());
    assert!(matcher.rank(&query(20), &[]).is_empty());

    let store = MemoryStore::new();
    let report = matcher.query(&query(20), &store).unwrap();
    assert!(report.candidates.is_empty());
    assert_eq!(report.catalog_hits, 0);
}

#[test]
fn test_query_against_store() {
    let config = SoundmarkConfig::default();
    let store = MemoryStore::new();
    let track: Vec<Landmark> = query(60)
        .into_iter()
        .map(|l| landmark(l.hash, l.time_offset_ms + 2500))
        .collect();
    let id = store
        .insert_track(
            &NewTrack {
                title: "Sweep".to_string(),
                artist: "Generator".to_string(),
                album: None,
                duration_seconds: 8.5,
                pipeline_tag: config.pipeline_tag(),
            },
            &track,
        )
        .unwrap();

    // Query a 3 s excerpt with a duplicate hash
    let mut q: Vec<Landmark> = query(60)[10..40].to_vec();
    q.push(q[0]);
    let report = Matcher::new(&config).query(&q, &store).unwrap();

    assert_eq!(report.catalog_hits, 30);
    assert_eq!(report.candidates[0].track_id, id);
    assert_eq!(report.candidates[0].best_offset_ms, 2500);
    assert_eq!(distinct_hashes(&q).len(), 30);
}
