//! Collaborative Filtering Pools
//!
//! User-CF sums `similarity × interaction weight` over the listener's nearest
//! neighbours. Item-CF unions co-occurrence results seeded from the listener's most
//! recent tracks. Scores are normalised to [0, 1] by the strongest candidate.

use crate::config::{CollaborativeConfig, SimilarityConfig};
use crate::profile::UserProfile;
use crate::similarity::{FindCoOccurringTracks, FindSimilarUsers, Neighbor};
use crate::store::{StoreResult, Stores};
use crate::types::{Candidate, SourceTag, Track, TrackId};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Score tracks neighbours interacted with that the target has not
///
/// Returned strongest first, ties broken by id.
pub fn score_user_cf(neighbors: &[Neighbor], exclude: &HashSet<TrackId>) -> Vec<(TrackId, f32)> {
    let mut scores: HashMap<TrackId, f32> = HashMap::new();

    for neighbor in neighbors {
        for (track_id, weight) in &neighbor.track_weights {
            if exclude.contains(track_id) {
                continue;
            }
            *scores.entry(*track_id).or_insert(0.0) += neighbor.similarity * weight;
        }
    }

    let mut ranked: Vec<(TrackId, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    ranked
}

/// Union of per-seed co-occurrence lists, keeping each track's best count
///
/// Seed order is preserved: tracks from earlier seeds come first on equal counts.
pub fn union_item_cf(
    per_seed: Vec<Vec<(TrackId, usize)>>,
    exclude: &HashSet<TrackId>,
    per_seed_limit: usize,
) -> Vec<(TrackId, usize)> {
    let mut order: Vec<TrackId> = Vec::new();
    let mut best: HashMap<TrackId, usize> = HashMap::new();

    for results in per_seed {
        let kept = results
            .into_iter()
            .filter(|(id, _)| !exclude.contains(id))
            .take(per_seed_limit);
        for (track_id, count) in kept {
            match best.get_mut(&track_id) {
                Some(existing) => *existing = (*existing).max(count),
                None => {
                    order.push(track_id);
                    best.insert(track_id, count);
                }
            }
        }
    }

    let mut merged: Vec<(TrackId, usize)> = order
        .into_iter()
        .map(|id| (id, best.get(&id).copied().unwrap_or(0)))
        .collect();
    merged.sort_by(|a, b| b.1.cmp(&a.1));
    merged
}

/// Resolve scored ids to candidates, normalising by the top score
async fn to_candidates(
    stores: &Stores,
    scored: Vec<(TrackId, f32)>,
    source: SourceTag,
) -> StoreResult<Vec<Candidate>> {
    let Some(top) = scored.first().map(|(_, s)| *s) else {
        return Ok(Vec::new());
    };

    let ids: Vec<TrackId> = scored.iter().map(|(id, _)| *id).collect();
    let mut tracks: HashMap<TrackId, Track> = stores
        .catalog
        .get_tracks(&ids)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    Ok(scored
        .into_iter()
        .filter_map(|(id, score)| {
            let raw = if top > 0.0 { score / top } else { 0.0 };
            tracks.remove(&id).map(|track| Candidate::new(track, source, raw))
        })
        .collect())
}

/// Tracks liked by listeners with overlapping history
pub struct UserCfCandidates;

impl UserCfCandidates {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        count: usize,
        similarity: &SimilarityConfig,
        collaborative: &CollaborativeConfig,
    ) -> StoreResult<Vec<Candidate>> {
        if count == 0 || profile.interacted.len() < collaborative.min_history {
            return Ok(Vec::new());
        }

        let neighbors = FindSimilarUsers::execute(profile, stores, similarity, collaborative).await?;
        let exclude = profile.personal_exclusions(&HashSet::new());

        let mut scored = score_user_cf(&neighbors, &exclude);
        scored.truncate(count);

        let candidates = to_candidates(stores, scored, SourceTag::UserCf).await?;
        debug!(
            user_id = %profile.user_id,
            pool = "userCF",
            neighbors = neighbors.len(),
            count = candidates.len(),
            "Pool filled"
        );
        Ok(candidates)
    }
}

/// Tracks that co-occur with the listener's most recent tracks
pub struct ItemCfCandidates;

impl ItemCfCandidates {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        similarity: &SimilarityConfig,
        collaborative: &CollaborativeConfig,
    ) -> StoreResult<Vec<Candidate>> {
        let seeds: Vec<TrackId> = profile
            .recent_track_ids
            .iter()
            .take(collaborative.item_seed_count)
            .copied()
            .collect();
        if seeds.is_empty() {
            return Ok(Vec::new());
        }

        let mut per_seed = Vec::with_capacity(seeds.len());
        for seed in &seeds {
            per_seed.push(FindCoOccurringTracks::execute(*seed, stores, similarity).await?);
        }

        let exclude = profile.personal_exclusions(&HashSet::new());
        let merged = union_item_cf(per_seed, &exclude, collaborative.per_seed_limit);
        let scored = merged
            .into_iter()
            .map(|(id, count)| (id, count as f32))
            .collect();

        let candidates = to_candidates(stores, scored, SourceTag::ItemCf).await?;
        debug!(
            user_id = %profile.user_id,
            pool = "itemCF",
            seeds = seeds.len(),
            count = candidates.len(),
            "Pool filled"
        );
        Ok(candidates)
    }
}
