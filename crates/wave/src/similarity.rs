//! Similarity Engine
//!
//! User-user cosine similarity over binary interacted-track vectors and item-item
//! co-occurrence counts. Both tolerate empty inputs by returning empty results.

use crate::config::{CollaborativeConfig, SimilarityConfig};
use crate::profile::{interaction_weights, UserProfile};
use crate::store::{StoreResult, Stores};
use crate::types::{TrackId, UserId};
use chrono::{Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Cosine similarity of two binary vectors given as sets: `|A∩B| / sqrt(|A|·|B|)`
///
/// Returns the similarity and the raw overlap count. Empty sets have similarity 0.
pub fn cosine_similarity(a: &HashSet<TrackId>, b: &HashSet<TrackId>) -> (f32, usize) {
    if a.is_empty() || b.is_empty() {
        return (0.0, 0);
    }

    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let overlap = small.iter().filter(|id| large.contains(id)).count();
    let denominator = ((a.len() * b.len()) as f32).sqrt();

    (overlap as f32 / denominator, overlap)
}

/// A similar user and what they interacted with
#[derive(Debug, Clone)]
pub struct Neighbor {
    pub user_id: UserId,
    pub similarity: f32,
    pub overlap: usize,
    /// Interaction weight per track of this neighbour
    pub track_weights: HashMap<TrackId, f32>,
}

/// Keep neighbours above the noise floor, strongest first, overlap breaking ties
pub fn rank_neighbors(
    target: &HashSet<TrackId>,
    candidates: Vec<(UserId, HashMap<TrackId, f32>)>,
    config: &SimilarityConfig,
) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = candidates
        .into_iter()
        .filter_map(|(user_id, track_weights)| {
            let tracks: HashSet<TrackId> = track_weights.keys().copied().collect();
            let (similarity, overlap) = cosine_similarity(target, &tracks);
            (similarity > config.min_similarity).then_some(Neighbor {
                user_id,
                similarity,
                overlap,
                track_weights,
            })
        })
        .collect();

    neighbors.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.overlap.cmp(&a.overlap))
            .then_with(|| a.user_id.cmp(&b.user_id))
    });
    neighbors.truncate(config.max_neighbors);
    neighbors
}

/// Count how often other tracks appear alongside the seed in listener histories
///
/// Tracks below `min_co_occurrence` are dropped; the rest are ordered by count
/// descending, then id for a stable order.
pub fn co_occurrence(
    seed: TrackId,
    listener_histories: &[HashSet<TrackId>],
    config: &SimilarityConfig,
) -> Vec<(TrackId, usize)> {
    if listener_histories.len() < config.min_listeners {
        return Vec::new();
    }

    let mut counts: HashMap<TrackId, usize> = HashMap::new();
    for history in listener_histories {
        for track_id in history.iter().filter(|id| **id != seed) {
            *counts.entry(*track_id).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(TrackId, usize)> = counts
        .into_iter()
        .filter(|(_, count)| *count >= config.min_co_occurrence)
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked
}

/// Loads neighbour candidates and ranks them against the target profile
pub struct FindSimilarUsers;

impl FindSimilarUsers {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        similarity: &SimilarityConfig,
        collaborative: &CollaborativeConfig,
    ) -> StoreResult<Vec<Neighbor>> {
        if profile.interacted.is_empty() {
            return Ok(Vec::new());
        }

        let since = Utc::now() - Duration::days(similarity.active_window_days);
        let active = stores
            .interactions
            .get_users_with_interaction_count_above(similarity.min_user_interactions, since)
            .await?;

        let mut candidates = Vec::with_capacity(active.len());
        for user_id in active.into_iter().filter(|u| *u != profile.user_id) {
            let mut history = stores.interactions.get_interactions(user_id, None).await?;
            history.truncate(similarity.neighbor_history_limit);
            candidates.push((user_id, interaction_weights(&history, collaborative)));
        }

        let neighbors = rank_neighbors(&profile.interacted, candidates, similarity);
        debug!(
            user_id = %profile.user_id,
            neighbors = neighbors.len(),
            "Ranked similar users"
        );
        Ok(neighbors)
    }
}

/// Loads the seed's listeners and counts co-occurring tracks
pub struct FindCoOccurringTracks;

impl FindCoOccurringTracks {
    pub async fn execute(
        seed: TrackId,
        stores: &Stores,
        config: &SimilarityConfig,
    ) -> StoreResult<Vec<(TrackId, usize)>> {
        let listeners = stores.interactions.get_track_listeners(seed).await?;
        if listeners.len() < config.min_listeners {
            return Ok(Vec::new());
        }

        let mut histories: Vec<HashSet<TrackId>> = Vec::with_capacity(listeners.len());
        for user_id in listeners {
            let history = stores.interactions.get_interactions(user_id, None).await?;
            histories.push(history.into_iter().map(|i| i.track_id).collect());
        }

        Ok(co_occurrence(seed, &histories, config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn ids(n: usize) -> Vec<TrackId> {
        (0..n).map(|_| Uuid::new_v4()).collect()
    }

    fn weights(tracks: &[TrackId]) -> HashMap<TrackId, f32> {
        tracks.iter().map(|id| (*id, 1.0)).collect()
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let pool = ids(6);
        let a: HashSet<TrackId> = pool[..4].iter().copied().collect();
        let b: HashSet<TrackId> = pool[2..].iter().copied().collect();
        let (ab, overlap) = cosine_similarity(&a, &b);
        let (ba, _) = cosine_similarity(&b, &a);
        assert_eq!(ab, ba);
        assert_eq!(overlap, 2);
        assert!((ab - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_of_empty_set_is_zero() {
        let a: HashSet<TrackId> = ids(3).into_iter().collect();
        assert_eq!(cosine_similarity(&a, &HashSet::new()), (0.0, 0));
    }

    #[test]
    fn test_rank_neighbors_filters_and_orders() {
        let pool = ids(20);
        let target: HashSet<TrackId> = pool[..10].iter().copied().collect();

        let close = (Uuid::new_v4(), weights(&pool[..8]));
        let distant = (Uuid::new_v4(), weights(&pool[9..20]));
        let stranger = (Uuid::new_v4(), weights(&ids(5)));

        let ranked = rank_neighbors(
            &target,
            vec![distant.clone(), stranger, close.clone()],
            &SimilarityConfig::default(),
        );
        let order: Vec<UserId> = ranked.iter().map(|n| n.user_id).collect();
        // distant: 1 / sqrt(10 * 11) ≈ 0.095, below the floor
        assert_eq!(order, vec![close.0]);
    }

    #[test]
    fn test_rank_neighbors_caps_count() {
        let pool = ids(5);
        let target: HashSet<TrackId> = pool.iter().copied().collect();
        let candidates = (0..15).map(|_| (Uuid::new_v4(), weights(&pool))).collect();

        let ranked = rank_neighbors(&target, candidates, &SimilarityConfig::default());
        assert_eq!(ranked.len(), 10);
    }

    #[test]
    fn test_co_occurrence_requires_two_hits() {
        let seed = Uuid::new_v4();
        let shared = Uuid::new_v4();
        let once = Uuid::new_v4();
        let histories: Vec<HashSet<TrackId>> = vec![
            [seed, shared, once].into_iter().collect(),
            [seed, shared].into_iter().collect(),
        ];

        let result = co_occurrence(seed, &histories, &SimilarityConfig::default());
        assert_eq!(result, vec![(shared, 2)]);
    }

    #[test]
    fn test_co_occurrence_single_listener_is_empty() {
        let seed = Uuid::new_v4();
        let histories: Vec<HashSet<TrackId>> = vec![[seed, Uuid::new_v4()].into_iter().collect()];
        assert!(co_occurrence(seed, &histories, &SimilarityConfig::default()).is_empty());
    }
}
