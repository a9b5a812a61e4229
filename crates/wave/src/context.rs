//! Context Mixes
//!
//! Time-of-day and activity playlists built from tempo, energy and genre presets, with
//! an optional boost for tracks close to the listener's recent taste.

use crate::config::RecommendationConfig;
use crate::error::{RecommendationError, Result};
use crate::profile::BuildUserProfile;
use crate::shuffle::{shuffled, Shuffler};
use crate::store::{Stores, TrackOrder, TrackQuery};
use crate::types::{Track, TrackId, UserId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Preset served when no preset covers the requested hour
pub const DEFAULT_MIX: &str = "focus_flow";

const PERSONAL_TOP_GENRES: usize = 3;
const PERSONAL_TOP_ARTISTS: usize = 5;

/// Static description of a context mix
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixPreset {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    /// `[start, end)` in hours; `start > end` wraps past midnight
    pub hours: Option<(u32, u32)>,
    pub bpm: (f32, f32),
    pub min_energy: Option<f32>,
    pub max_energy: Option<f32>,
    pub instrumental: bool,
    /// Substrings matched against the track genre
    pub genres: &'static [&'static str],
}

pub static MIX_PRESETS: [MixPreset; 5] = [
    MixPreset {
        kind: "morning_energy",
        name: "Morning Energy",
        description: "Upbeat tracks for an energetic morning",
        hours: Some((5, 10)),
        bpm: (120.0, 180.0),
        min_energy: Some(0.6),
        max_energy: None,
        instrumental: false,
        genres: &["pop", "electronic", "dance", "rock"],
    },
    MixPreset {
        kind: "focus_flow",
        name: "Focus Flow",
        description: "Instrumental music for concentration",
        hours: Some((9, 17)),
        bpm: (80.0, 120.0),
        min_energy: None,
        max_energy: Some(0.5),
        instrumental: true,
        genres: &["ambient", "classical", "instrumental", "jazz", "lo-fi"],
    },
    MixPreset {
        kind: "evening_chill",
        name: "Evening Chill",
        description: "Calm tracks to wind down the evening",
        hours: Some((18, 22)),
        bpm: (60.0, 100.0),
        min_energy: None,
        max_energy: Some(0.6),
        instrumental: false,
        genres: &["indie", "r&b", "soul", "jazz", "acoustic"],
    },
    MixPreset {
        kind: "workout_power",
        name: "Workout Power",
        description: "High-intensity tracks for training",
        hours: None,
        bpm: (140.0, 180.0),
        min_energy: Some(0.7),
        max_energy: None,
        instrumental: false,
        genres: &["electronic", "hip-hop", "rock", "dance", "metal"],
    },
    MixPreset {
        kind: "sleep_sounds",
        name: "Sleep Sounds",
        description: "Soothing music for sleep",
        hours: Some((22, 5)),
        bpm: (40.0, 80.0),
        min_energy: None,
        max_energy: Some(0.3),
        instrumental: true,
        genres: &["ambient", "classical", "meditation", "nature sounds"],
    },
];

impl MixPreset {
    pub fn find(kind: &str) -> Option<&'static MixPreset> {
        MIX_PRESETS.iter().find(|p| p.kind.eq_ignore_ascii_case(kind.trim()))
    }

    /// Whether `hour` falls inside the preset's time range
    pub fn covers_hour(&self, hour: u32) -> bool {
        match self.hours {
            None => false,
            Some((start, end)) if start > end => hour >= start || hour < end,
            Some((start, end)) => hour >= start && hour < end,
        }
    }

    /// First preset covering `hour`, else the default preset
    pub fn for_hour(hour: u32) -> &'static MixPreset {
        MIX_PRESETS
            .iter()
            .find(|p| p.covers_hour(hour))
            .or_else(|| Self::find(DEFAULT_MIX))
            .unwrap_or(&MIX_PRESETS[1])
    }

    fn query(&self) -> TrackQuery {
        TrackQuery::new()
            .genre_like(self.genres.iter().copied())
            .tempo_range(self.bpm.0, self.bpm.1)
            .energy_between(self.min_energy, self.max_energy)
            .instrumental_only(self.instrumental)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextMix {
    pub mix: MixPreset,
    pub tracks: Vec<Track>,
    pub total: usize,
    pub personalized: bool,
}

/// Build one preset mix
pub struct GenerateContextMix;

impl GenerateContextMix {
    pub async fn execute(
        kind: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<ContextMix> {
        let preset = MixPreset::find(kind)
            .ok_or_else(|| RecommendationError::UnknownMix(kind.to_string()))?;
        Self::build(preset, user_id, limit, stores, config, shuffler).await
    }

    pub async fn build(
        preset: &'static MixPreset,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<ContextMix> {
        let start = Instant::now();
        let mixes = &config.mixes;
        let limit = limit
            .unwrap_or(mixes.default_limit)
            .clamp(1, config.wave.max_page_size);
        let fetch = limit * mixes.fetch_multiplier;

        let query = preset.query();
        let mut tracks = stores
            .catalog
            .find_tracks(&query, fetch, TrackOrder::PopularityDesc)
            .await?;

        if tracks.len() < limit / 2 {
            debug!(mix = preset.kind, found = tracks.len(), "Relaxing audio filters");
            tracks = stores
                .catalog
                .find_tracks(&query.without_audio_filters(), fetch, TrackOrder::PopularityDesc)
                .await?;
        }

        let personal = match user_id {
            Some(user_id) => PersonalPool::execute(user_id, stores, config).await,
            None => HashSet::new(),
        };

        let score = |t: &Track| {
            let boost = if personal.contains(&t.id) { mixes.personal_boost } else { 0.0 };
            boost + (t.popularity() as f32 + 1.0).ln()
        };
        tracks.sort_by(|a, b| score(b).partial_cmp(&score(a)).unwrap_or(Ordering::Equal));

        let keep = (tracks.len() as f32 * mixes.keep_top_fraction).floor() as usize;
        let rest = tracks.split_off(keep.min(tracks.len()));
        tracks.extend(shuffled(shuffler, rest));
        tracks.truncate(limit);

        info!(
            mix = preset.kind,
            user_id = ?user_id,
            limit = limit,
            returned = tracks.len(),
            boosted = personal.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served context mix"
        );

        Ok(ContextMix {
            mix: *preset,
            total: tracks.len(),
            tracks,
            personalized: user_id.is_some(),
        })
    }
}

/// Pick the preset for the hour and build it
pub struct GenerateAutoMix;

impl GenerateAutoMix {
    pub async fn execute(
        hour: u32,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<ContextMix> {
        if hour > 23 {
            return Err(RecommendationError::InvalidRequest(format!(
                "hour must lie in [0, 23], got {}",
                hour
            )));
        }
        let preset = MixPreset::for_hour(hour);
        debug!(hour = hour, mix = preset.kind, "Auto-selected mix");
        GenerateContextMix::build(preset, user_id, limit, stores, config, shuffler).await
    }
}

/// Unheard tracks matching the listener's recent genres or artists
struct PersonalPool;

impl PersonalPool {
    /// Empty on any failure; the mix is still served unboosted
    async fn execute(
        user_id: UserId,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> HashSet<TrackId> {
        let profile = match BuildUserProfile::execute_within(
            user_id,
            stores,
            &config.profile,
            &config.collaborative,
            config.mixes.personal_window_days,
        )
        .await
        {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Mix personalisation unavailable");
                return HashSet::new();
            }
        };

        if profile.top_genres.is_empty() && profile.top_artists.is_empty() {
            return HashSet::new();
        }

        let query = TrackQuery::new()
            .genre_in(profile.top_genres.iter().take(PERSONAL_TOP_GENRES).cloned())
            .artist_in(profile.top_artists.iter().take(PERSONAL_TOP_ARTISTS).cloned())
            .any_of()
            .exclude_ids(&profile.interacted);

        match stores
            .catalog
            .find_tracks(&query, config.mixes.personal_pool_size, TrackOrder::PopularityDesc)
            .await
        {
            Ok(tracks) => tracks.into_iter().map(|t| t.id).collect(),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Mix personalisation unavailable");
                HashSet::new()
            }
        }
    }
}
