//! Hybrid and Smart Recommendations
//!
//! The hybrid surface blends user-CF, item-CF and content-based pools with point
//! scoring. Smart recommendations rank same-genre candidates by a multi-factor
//! similarity to the listener's likes. Similar-to-track, mood picks and listening stats
//! live here as well since they share the same catalog reads.

use crate::cold_start::FetchTrendingTracks;
use crate::collaborative::{ItemCfCandidates, UserCfCandidates};
use crate::config::RecommendationConfig;
use crate::content_based::ContentBasedTracks;
use crate::diversity::{ApplyArtistRunLimit, ApplyCategoryCaps};
use crate::error::{RecommendationError, Result};
use crate::profile::BuildUserProfile;
use crate::scoring::{merge_candidates, rank_hybrid, smart_score, IsolatedPools, TasteProfile};
use crate::shuffle::{shuffled, Shuffler};
use crate::store::{Stores, TrackOrder, TrackQuery};
use crate::types::{Candidate, InteractionKind, RankedTrack, SourceTag, Track, TrackId, UserId};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{info, warn};

/// Listens considered by the stats surface
const STATS_LISTEN_LIMIT: usize = 100;
const STATS_TOP_GENRES: usize = 5;
const STATS_WINDOW_DAYS: i64 = 30;

/// Same-genre base score for similar-to-track
const SIMILAR_BASE: f32 = 0.5;
const SIMILAR_FEATURE_WEIGHT: f32 = 0.5;
const SIMILAR_ARTIST_BONUS: f32 = 0.2;

/// Pre-merge pool sizes of a hybrid response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HybridBreakdown {
    #[serde(rename = "userCF")]
    pub user_cf: usize,
    #[serde(rename = "itemCF")]
    pub item_cf: usize,
    #[serde(rename = "contentBased")]
    pub content_based: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HybridRecommendations {
    pub tracks: Vec<RankedTrack>,
    pub breakdown: HybridBreakdown,
    /// `hybrid`, or `fallback-popular` when every pool came back empty
    pub method: String,
}

/// Blend collaborative and content pools
pub struct GenerateHybridRecommendations;

impl GenerateHybridRecommendations {
    pub async fn execute(
        user_id: UserId,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<HybridRecommendations> {
        let start = Instant::now();
        let hybrid = &config.hybrid;
        let limit = limit
            .unwrap_or(hybrid.default_limit)
            .clamp(1, config.wave.max_page_size);

        let profile =
            BuildUserProfile::execute(user_id, stores, &config.profile, &config.collaborative).await?;

        let user_cf_count = (limit as f32 * hybrid.user_cf_share).floor() as usize;
        let content_count = (limit as f32 * hybrid.content_share).floor() as usize;

        let mut pools = IsolatedPools::new();
        let user_cf = pools.absorb(
            SourceTag::UserCf,
            user_id,
            UserCfCandidates::execute(
                &profile,
                stores,
                user_cf_count,
                &config.similarity,
                &config.collaborative,
            )
            .await,
        );
        let item_cf = pools.absorb(
            SourceTag::ItemCf,
            user_id,
            ItemCfCandidates::execute(&profile, stores, &config.similarity, &config.collaborative)
                .await,
        );
        let content = pools.absorb(
            SourceTag::ContentBased,
            user_id,
            ContentBasedTracks::execute(&profile, stores, content_count, hybrid).await,
        );

        let breakdown = HybridBreakdown {
            user_cf: user_cf.len(),
            item_cf: item_cf.len(),
            content_based: content.len(),
        };

        let (tracks, method) = if user_cf.is_empty() && item_cf.is_empty() && content.is_empty() {
            let exclude = profile.personal_exclusions(&HashSet::new());
            let popular = FetchTrendingTracks::candidates(stores, &exclude, limit, SourceTag::Fallback)
                .await?;
            (rank_hybrid(popular, hybrid), "fallback-popular")
        } else {
            pools.finish()?;
            let merged = merge_candidates(user_cf.into_iter().chain(item_cf).chain(content).collect());
            (rank_hybrid(merged, hybrid), "hybrid")
        };

        let mut tracks = ApplyArtistRunLimit::execute(
            tracks,
            RankedTrack::artist_key,
            config.wave.max_artist_run,
        );
        tracks.truncate(limit);

        info!(
            user_id = %user_id,
            limit = limit,
            returned = tracks.len(),
            user_cf = breakdown.user_cf,
            item_cf = breakdown.item_cf,
            content_based = breakdown.content_based,
            method = method,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served hybrid recommendations"
        );

        Ok(HybridRecommendations {
            tracks,
            breakdown,
            method: method.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartRecommendations {
    pub tracks: Vec<RankedTrack>,
    /// Popularity results served instead of personalised ones
    pub fallback: bool,
}

/// Multi-factor recommendations seeded from the listener's likes
pub struct GenerateSmartRecommendations;

impl GenerateSmartRecommendations {
    pub async fn execute(
        user_id: UserId,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<SmartRecommendations> {
        let start = Instant::now();
        let smart = &config.smart;
        let limit = limit
            .unwrap_or(smart.default_limit)
            .clamp(1, config.wave.max_page_size);

        let history = stores.interactions.get_interactions(user_id, None).await?;
        let liked_ids: Vec<TrackId> = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Like)
            .map(|i| i.track_id)
            .take(smart.like_limit)
            .collect();
        let listened: HashSet<TrackId> = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Listen)
            .map(|i| i.track_id)
            .collect();

        let liked = stores.catalog.get_tracks(&liked_ids).await?;
        let taste = TasteProfile::from_liked(&liked);

        let disliked = match stores.preferences.get_disliked(user_id).await {
            Ok(disliked) => disliked,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Dislikes unavailable, continuing without them");
                HashSet::new()
            }
        };
        let unwanted: HashSet<TrackId> = listened.union(&disliked).copied().collect();

        let ranked = if taste.genres.is_empty() {
            Vec::new()
        } else {
            Self::rank(&taste, &unwanted, limit, stores, config, shuffler).await?
        };

        let result = if ranked.is_empty() {
            let exclude: HashSet<TrackId> = taste.liked.union(&disliked).copied().collect();
            let popular = FetchTrendingTracks::candidates(stores, &exclude, limit, SourceTag::Fallback)
                .await?;
            SmartRecommendations {
                tracks: popular
                    .into_iter()
                    .map(|c| {
                        let score = c.raw_score;
                        RankedTrack::new(c, score)
                    })
                    .collect(),
                fallback: true,
            }
        } else {
            SmartRecommendations {
                tracks: ranked,
                fallback: false,
            }
        };

        info!(
            user_id = %user_id,
            limit = limit,
            returned = result.tracks.len(),
            fallback = result.fallback,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served smart recommendations"
        );

        Ok(result)
    }

    /// `unwanted` holds listened and disliked tracks
    async fn rank(
        taste: &TasteProfile,
        unwanted: &HashSet<TrackId>,
        limit: usize,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<Vec<RankedTrack>> {
        let smart = &config.smart;
        let query = TrackQuery::new()
            .genre_in(taste.genres.iter().cloned())
            .exclude_ids(&taste.liked);
        let fetched = stores
            .catalog
            .find_tracks(&query, limit * smart.candidate_multiplier, TrackOrder::PopularityDesc)
            .await?;

        let now = Utc::now();
        let mut scored: Vec<(f32, Candidate)> = shuffled(shuffler, fetched)
            .into_iter()
            .filter(|t| taste.accepts_mood(t))
            .filter(|t| !unwanted.contains(&t.id))
            .filter_map(|t| {
                let score = smart_score(&t, taste, smart, now);
                (score >= smart.min_score)
                    .then(|| (score, Candidate::new(t, SourceTag::ContentBased, score)))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        let ranked: Vec<RankedTrack> = scored
            .into_iter()
            .map(|(score, candidate)| RankedTrack::new(candidate, score))
            .collect();

        Ok(ApplyCategoryCaps::execute(
            ranked,
            |r: &RankedTrack| r.track.genre.as_deref().map(|g| g.trim().to_lowercase()),
            RankedTrack::artist_key,
            smart.genre_cap,
            smart.artist_cap,
            limit,
        ))
    }
}

/// Tracks resembling one seed track
pub struct FindSimilarToTrack;

impl FindSimilarToTrack {
    pub async fn execute(
        track_id: TrackId,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<Vec<RankedTrack>> {
        let limit = limit
            .unwrap_or(config.smart.similar_default_limit)
            .clamp(1, config.wave.max_page_size);

        let seed = stores
            .catalog
            .get_track(track_id)
            .await?
            .ok_or(RecommendationError::TrackNotFound(track_id))?;

        let base = TrackQuery::new().exclude_ids([&seed.id]);
        let query = match seed.genre.as_deref() {
            Some(genre) => base.genre_in([genre]),
            None => base.artist_in([seed.artist.as_str()]),
        };
        let fetched = stores
            .catalog
            .find_tracks(&query, limit * config.smart.candidate_multiplier, TrackOrder::PopularityDesc)
            .await?;

        let seed_artist = seed.artist_key();
        let mut scored: Vec<(f32, Candidate)> = fetched
            .into_iter()
            .map(|t| {
                let mut score = if seed.genre.is_some() { SIMILAR_BASE } else { 0.0 };
                if let (Some(a), Some(b)) = (seed.audio_features.as_ref(), t.audio_features.as_ref()) {
                    score += SIMILAR_FEATURE_WEIGHT * a.similarity(b);
                }
                if t.artist_key() == seed_artist {
                    score += SIMILAR_ARTIST_BONUS;
                }
                let score = score.min(1.0);
                (score, Candidate::new(t, SourceTag::ContentBased, score))
            })
            .collect();
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, candidate)| RankedTrack::new(candidate, score))
            .collect())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MoodRecommendations {
    pub mood: String,
    pub tracks: Vec<Track>,
    pub total: usize,
}

/// Random tracks tagged with one mood
pub struct GetRecommendationsByMood;

impl GetRecommendationsByMood {
    pub async fn execute(
        mood: &str,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<MoodRecommendations> {
        let mood = mood.trim();
        if mood.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                "mood must not be empty".to_string(),
            ));
        }
        let limit = limit
            .unwrap_or(config.smart.mood_default_limit)
            .clamp(1, config.wave.max_page_size);

        let pool = stores
            .catalog
            .find_tracks(
                &TrackQuery::new().mood(mood),
                limit * config.smart.candidate_multiplier,
                TrackOrder::PopularityDesc,
            )
            .await?;
        let mut tracks = shuffled(shuffler, pool);
        tracks.truncate(limit);

        info!(mood = mood, limit = limit, returned = tracks.len(), "Served mood recommendations");

        Ok(MoodRecommendations {
            mood: mood.to_string(),
            total: tracks.len(),
            tracks,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenreCount {
    pub genre: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationStats {
    /// Listens considered (most recent, capped)
    pub total_listens: usize,
    pub total_likes: usize,
    pub top_genres: Vec<GenreCount>,
    /// Listens per day over the last 30 days
    pub average_daily_listens: f32,
}

/// Summary of a listener's recent activity
pub struct GetRecommendationStats;

impl GetRecommendationStats {
    pub async fn execute(user_id: UserId, stores: &Stores) -> Result<RecommendationStats> {
        let history = stores.interactions.get_interactions(user_id, None).await?;

        let listens: Vec<_> = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Listen)
            .take(STATS_LISTEN_LIMIT)
            .collect();
        let total_likes = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Like)
            .count();

        let mut ids: Vec<TrackId> = listens.iter().map(|i| i.track_id).collect();
        ids.sort();
        ids.dedup();
        let genres: HashMap<TrackId, String> = stores
            .catalog
            .get_tracks(&ids)
            .await?
            .into_iter()
            .filter_map(|t| t.genre.map(|g| (t.id, g)))
            .collect();

        let mut counts: HashMap<String, usize> = HashMap::new();
        for listen in &listens {
            if let Some(genre) = genres.get(&listen.track_id) {
                *counts.entry(genre.clone()).or_insert(0) += 1;
            }
        }
        let mut top_genres: Vec<GenreCount> = counts
            .into_iter()
            .map(|(genre, count)| GenreCount { genre, count })
            .collect();
        top_genres.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.genre.cmp(&b.genre)));
        top_genres.truncate(STATS_TOP_GENRES);

        let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
        let recent = listens.iter().filter(|i| i.timestamp >= since).count();

        Ok(RecommendationStats {
            total_listens: listens.len(),
            total_likes,
            top_genres,
            average_daily_listens: recent as f32 / STATS_WINDOW_DAYS as f32,
        })
    }
}
