//! Wave Session Manager
//!
//! Stateless-cursor pagination over the personalised stream. The caller carries the
//! accumulated exclusion set; every page is composed from the familiar, similar,
//! discovery and trending pools, or from trending alone when the listener's history
//! is too thin.

use crate::cold_start::FetchTrendingTracks;
use crate::config::RecommendationConfig;
use crate::content_based::{DiscoveryTracks, FamiliarTracks, SimilarTracks};
use crate::diversity::ApplyArtistRunLimit;
use crate::error::{RecommendationError, Result};
use crate::profile::{BuildUserProfile, UserProfile};
use crate::scoring::{merge_candidates, sort_with_shuffled_ties, IsolatedPools};
use crate::shuffle::Shuffler;
use crate::store::Stores;
use crate::types::{Candidate, RankedTrack, SourceTag, TrackId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::info;
use uuid::Uuid;

/// Session state derived per request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaveState {
    /// First page: no exclusion set supplied
    Cold,
    /// Subsequent pages
    Warm,
    /// Thin history: trending only
    InsufficientData,
}

/// Per-pool page composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolCounts {
    pub familiar: usize,
    pub similar: usize,
    pub discovery: usize,
    pub trending: usize,
}

impl PoolCounts {
    /// Floor each share; trending takes the remainder so the total is exactly `size`
    pub fn for_page(size: usize, config: &crate::config::WaveConfig) -> Self {
        let familiar = (size as f32 * config.familiar_share).floor() as usize;
        let similar = (size as f32 * config.similar_share).floor() as usize;
        let discovery = (size as f32 * config.discovery_share).floor() as usize;
        let trending = size.saturating_sub(familiar + similar + discovery);
        Self {
            familiar,
            similar,
            discovery,
            trending,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WaveRequest {
    pub user_id: UserId,
    /// Requested page size; clamped to `[1, max_page_size]`
    pub size: Option<usize>,
    pub exclude: HashSet<TrackId>,
}

impl WaveRequest {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            size: None,
            exclude: HashSet::new(),
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn excluding(mut self, ids: impl IntoIterator<Item = TrackId>) -> Self {
        self.exclude.extend(ids);
        self
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveMetadata {
    pub familiar: usize,
    pub similar: usize,
    pub discovery: usize,
    pub trending: usize,
    pub fallback: bool,
    pub state: WaveState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WavePage {
    pub tracks: Vec<RankedTrack>,
    /// Supplied exclusion set plus this page's ids
    pub exclude_ids: Vec<TrackId>,
    pub metadata: WaveMetadata,
}

/// Parse a comma-separated exclusion list; blanks are ignored
pub fn parse_exclusions(raw: &str) -> Result<HashSet<TrackId>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Uuid::parse_str(s).map_err(|_| {
                RecommendationError::InvalidRequest(format!("invalid track id in exclude: {}", s))
            })
        })
        .collect()
}

/// Compose the next page of a listener's wave
pub struct NextWavePage;

impl NextWavePage {
    pub async fn execute(
        request: WaveRequest,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<WavePage> {
        let start = Instant::now();
        let wave = &config.wave;
        let size = request
            .size
            .unwrap_or(wave.default_page_size)
            .clamp(1, wave.max_page_size);

        let profile =
            BuildUserProfile::execute(request.user_id, stores, &config.profile, &config.collaborative)
                .await?;

        let state = if !profile.has_sufficient_data {
            WaveState::InsufficientData
        } else if request.exclude.is_empty() {
            WaveState::Cold
        } else {
            WaveState::Warm
        };

        let mut pools = IsolatedPools::new();
        let candidates = if state == WaveState::InsufficientData {
            let exclude: HashSet<TrackId> =
                request.exclude.union(&profile.disliked).copied().collect();
            pools.absorb(
                SourceTag::Trending,
                request.user_id,
                FetchTrendingTracks::candidates(stores, &exclude, size, SourceTag::Trending).await,
            )
        } else {
            Self::personalised(&profile, &request.exclude, size, stores, config, shuffler, &mut pools)
                .await
        };
        pools.finish()?;

        let ordered = sort_with_shuffled_ties(merge_candidates(candidates), shuffler);
        let ordered =
            ApplyArtistRunLimit::execute(ordered, |c: &Candidate| c.track.artist_key(), wave.max_artist_run);

        let tracks: Vec<RankedTrack> = ordered
            .into_iter()
            .take(size)
            .map(|c| {
                let score = c.raw_score;
                RankedTrack::new(c, score)
            })
            .collect();

        let count_of = |tag: SourceTag| tracks.iter().filter(|t| t.sources.contains(&tag)).count();
        let metadata = WaveMetadata {
            familiar: count_of(SourceTag::Familiar),
            similar: count_of(SourceTag::Similar),
            discovery: count_of(SourceTag::Discovery),
            trending: count_of(SourceTag::Trending),
            fallback: state == WaveState::InsufficientData,
            state,
        };

        let mut exclude_ids: Vec<TrackId> = request
            .exclude
            .iter()
            .copied()
            .chain(tracks.iter().map(|t| t.track_id))
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        exclude_ids.sort();

        info!(
            user_id = %request.user_id,
            size = size,
            returned = tracks.len(),
            familiar = metadata.familiar,
            similar = metadata.similar,
            discovery = metadata.discovery,
            trending = metadata.trending,
            fallback = metadata.fallback,
            state = ?state,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served wave page"
        );

        Ok(WavePage {
            tracks,
            exclude_ids,
            metadata,
        })
    }

    /// Run the four pools in order, each excluding what earlier pools chose
    async fn personalised(
        profile: &UserProfile,
        supplied: &HashSet<TrackId>,
        size: usize,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
        pools: &mut IsolatedPools,
    ) -> Vec<Candidate> {
        let wave = &config.wave;
        let counts = PoolCounts::for_page(size, wave);
        let user_id = profile.user_id;
        let mut exclude = profile.personal_exclusions(supplied);
        let mut chosen: Vec<Candidate> = Vec::with_capacity(size);

        let familiar = pools.absorb(
            SourceTag::Familiar,
            user_id,
            FamiliarTracks::execute(profile, stores, &exclude, counts.familiar, wave, shuffler).await,
        );
        exclude.extend(familiar.iter().map(Candidate::track_id));
        chosen.extend(familiar);

        let similar = pools.absorb(
            SourceTag::Similar,
            user_id,
            SimilarTracks::execute(profile, stores, &exclude, counts.similar, wave).await,
        );
        exclude.extend(similar.iter().map(Candidate::track_id));
        chosen.extend(similar);

        let discovery = pools.absorb(
            SourceTag::Discovery,
            user_id,
            DiscoveryTracks::execute(profile, stores, &exclude, counts.discovery, wave, shuffler)
                .await,
        );
        chosen.extend(discovery);

        // Trending covers its own share plus any shortfall of the other pools.
        let trending_count = size.saturating_sub(chosen.len());
        let trending_exclude: HashSet<TrackId> = supplied
            .iter()
            .chain(profile.disliked.iter())
            .copied()
            .chain(chosen.iter().map(Candidate::track_id))
            .collect();
        let trending = pools.absorb(
            SourceTag::Trending,
            user_id,
            FetchTrendingTracks::candidates(stores, &trending_exclude, trending_count, SourceTag::Trending)
                .await,
        );
        chosen.extend(trending);

        chosen
    }
}

/// Forward a wave dislike to the preference store
pub struct RecordDislike;

impl RecordDislike {
    pub async fn execute(user_id: UserId, track_id: TrackId, stores: &Stores) -> Result<()> {
        stores.preferences.record_dislike(user_id, track_id).await?;
        info!(user_id = %user_id, track_id = %track_id, "Recorded wave dislike");
        Ok(())
    }
}

/// Playback signal reported by the wave player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackEvent {
    Skip,
    Complete,
}

/// Accept playback feedback; it is logged and not otherwise processed
pub struct RecordFeedback;

impl RecordFeedback {
    pub fn execute(user_id: UserId, track_id: TrackId, event: FeedbackEvent) {
        info!(user_id = %user_id, track_id = %track_id, event = ?event, "Wave feedback");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WaveConfig;

    #[test]
    fn test_pool_counts_sum_to_size() {
        let config = WaveConfig::default();
        for size in 1..=100 {
            let counts = PoolCounts::for_page(size, &config);
            assert_eq!(
                counts.familiar + counts.similar + counts.discovery + counts.trending,
                size
            );
        }

        let twenty = PoolCounts::for_page(20, &config);
        assert_eq!(
            twenty,
            PoolCounts {
                familiar: 6,
                similar: 8,
                discovery: 4,
                trending: 2
            }
        );
    }

    #[test]
    fn test_parse_exclusions() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let parsed = parse_exclusions(&format!("{}, {},,", a, b)).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains(&a));

        assert!(parse_exclusions("").unwrap().is_empty());
        assert!(matches!(
            parse_exclusions("not-a-uuid"),
            Err(RecommendationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_state_serialization() {
        assert_eq!(
            serde_json::to_string(&WaveState::InsufficientData).unwrap(),
            "\"insufficient_data\""
        );
    }
}
