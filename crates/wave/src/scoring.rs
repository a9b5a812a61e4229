//! Scorer / Ranker
//!
//! Candidate merging, generator isolation, hybrid point scoring and the multi-factor
//! similarity score used by smart recommendations.

use crate::config::{HybridConfig, SmartConfig};
use crate::error::StoreError;
use crate::shuffle::{shuffled, Shuffler};
use crate::store::StoreResult;
use crate::types::{AudioFeatures, Candidate, RankedTrack, SourceTag, Track, TrackId, UserId};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::warn;

/// Runs candidate generators in isolation
///
/// A failing generator contributes an empty pool and a warning. The caller only gets
/// the error back when every attempted generator failed, since then there is no track
/// data left to rank.
#[derive(Debug, Default)]
pub struct IsolatedPools {
    attempted: usize,
    failures: usize,
    last_error: Option<StoreError>,
}

impl IsolatedPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb<T>(
        &mut self,
        source: SourceTag,
        user_id: UserId,
        result: StoreResult<Vec<T>>,
    ) -> Vec<T> {
        self.attempted += 1;
        match result {
            Ok(items) => items,
            Err(e) => {
                warn!(
                    user_id = %user_id,
                    pool = source.as_str(),
                    error = %e,
                    "Candidate pool unavailable, continuing without it"
                );
                self.failures += 1;
                self.last_error = Some(e);
                Vec::new()
            }
        }
    }

    pub fn failures(&self) -> usize {
        self.failures
    }

    /// `Err` when generators ran and all of them failed
    pub fn finish(self) -> StoreResult<()> {
        match self.last_error {
            Some(e) if self.failures == self.attempted => Err(e),
            _ => Ok(()),
        }
    }
}

/// Tag tracks with a source and a query-order score `1 - i/len`
pub fn in_query_order(tracks: Vec<Track>, source: SourceTag) -> Vec<Candidate> {
    let len = tracks.len().max(1) as f32;
    tracks
        .into_iter()
        .enumerate()
        .map(|(i, track)| Candidate::new(track, source, 1.0 - i as f32 / len))
        .collect()
}

/// Merge duplicates keeping the maximum raw score and every contributing source
///
/// First-seen order is preserved.
pub fn merge_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut index: HashMap<TrackId, usize> = HashMap::new();
    let mut merged: Vec<Candidate> = Vec::with_capacity(candidates.len());

    for candidate in candidates {
        match index.get(&candidate.track_id()) {
            Some(&at) => {
                let existing = &mut merged[at];
                existing.raw_score = existing.raw_score.max(candidate.raw_score);
                existing.sources.extend(candidate.sources);
            }
            None => {
                index.insert(candidate.track_id(), merged.len());
                merged.push(candidate);
            }
        }
    }

    merged
}

/// Sort by raw score descending; equal scores end up in shuffled order
pub fn sort_with_shuffled_ties(candidates: Vec<Candidate>, shuffler: &dyn Shuffler) -> Vec<Candidate> {
    let mut candidates = shuffled(shuffler, candidates);
    candidates.sort_by(|a, b| {
        b.raw_score
            .partial_cmp(&a.raw_score)
            .unwrap_or(Ordering::Equal)
    });
    candidates
}

/// Points for distinct pool membership
pub fn source_points(sources: &BTreeSet<SourceTag>, config: &HybridConfig) -> f32 {
    sources
        .iter()
        .map(|source| match source {
            SourceTag::UserCf => config.user_cf_points,
            SourceTag::ItemCf => config.item_cf_points,
            SourceTag::ContentBased => config.content_points,
            _ => 0.0,
        })
        .sum()
}

/// `points + ln(popularity + 1)`
pub fn hybrid_score(candidate: &Candidate, config: &HybridConfig) -> f32 {
    source_points(&candidate.sources, config) + popularity_bonus(&candidate.track)
}

fn popularity_bonus(track: &Track) -> f32 {
    (track.popularity() as f32 + 1.0).ln()
}

/// Rank merged hybrid candidates, normalising into [0, 1] by the largest attainable score
pub fn rank_hybrid(candidates: Vec<Candidate>, config: &HybridConfig) -> Vec<RankedTrack> {
    let max_bonus = candidates
        .iter()
        .map(|c| popularity_bonus(&c.track))
        .fold(0.0f32, f32::max);
    let ceiling = config.max_points() + max_bonus;

    let mut scored: Vec<(f32, Candidate)> = candidates
        .into_iter()
        .map(|c| (hybrid_score(&c, config), c))
        .collect();
    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

    scored
        .into_iter()
        .map(|(score, candidate)| {
            let blended = if ceiling > 0.0 { score / ceiling } else { 0.0 };
            RankedTrack::new(candidate, blended)
        })
        .collect()
}

/// What a listener's likes say about their taste
#[derive(Debug, Clone, Default)]
pub struct TasteProfile {
    /// Lowercased genres by like frequency
    pub genres: Vec<String>,
    /// Lowercased moods by like frequency
    pub moods: Vec<String>,
    /// Mean features over liked tracks that have them
    pub features: Option<AudioFeatures>,
    pub liked: HashSet<TrackId>,
}

impl TasteProfile {
    pub fn from_liked(tracks: &[Track]) -> Self {
        Self {
            genres: by_frequency(tracks.iter().filter_map(|t| t.genre.as_deref())),
            moods: by_frequency(tracks.iter().filter_map(|t| t.mood.as_deref())),
            features: AudioFeatures::mean(tracks.iter().filter_map(|t| t.audio_features.as_ref())),
            liked: tracks.iter().map(|t| t.id).collect(),
        }
    }

    /// Tracks without a mood pass; otherwise the mood must be preferred
    pub fn accepts_mood(&self, track: &Track) -> bool {
        match track.mood.as_deref() {
            None => true,
            Some(_) if self.moods.is_empty() => true,
            Some(mood) => {
                let mood = mood.trim().to_lowercase();
                self.moods.iter().any(|m| *m == mood)
            }
        }
    }
}

fn by_frequency<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for (position, value) in values.enumerate() {
        let key = value.trim().to_lowercase();
        if key.is_empty() {
            continue;
        }
        counts.entry(key).or_insert((0, position)).0 += 1;
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    // Most frequent first; first-seen (most recent like) breaks ties
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then_with(|| a.1 .1.cmp(&b.1 .1)));
    ranked.into_iter().map(|(k, _)| k).collect()
}

/// Rank-position affinity: `1 - idx/len` for a preferred value, 0 otherwise
fn positional_affinity(preferred: &[String], value: Option<&str>) -> f32 {
    let Some(value) = value else {
        return 0.0;
    };
    let value = value.trim().to_lowercase();
    match preferred.iter().position(|p| *p == value) {
        Some(idx) => 1.0 - idx as f32 / preferred.len() as f32,
        None => 0.0,
    }
}

/// Multi-factor similarity score in [0, 1]
pub fn smart_score(track: &Track, taste: &TasteProfile, config: &SmartConfig, now: DateTime<Utc>) -> f32 {
    let mut score = config.genre_weight * positional_affinity(&taste.genres, track.genre.as_deref());
    score += config.mood_weight * positional_affinity(&taste.moods, track.mood.as_deref());

    if let (Some(preferred), Some(features)) = (taste.features.as_ref(), track.audio_features.as_ref()) {
        score += config.audio_weight * preferred.similarity(features);
    }

    score += config.popularity_weight * (track.likes_count.clamp(0, 100) as f32 / 100.0);

    let age_days = (now - track.created_at).num_days().max(0) as f32;
    score += config.recency_weight * (1.0 - age_days / 365.0).max(0.0);

    score.min(1.0)
}
