//! Wave Recommendation Core
//!
//! Personalised track recommendations for the music platform: the endless "Wave"
//! stream, hybrid collaborative/content recommendations, smart recommendations, context
//! mixes, radio and personal playlists. The core reads interactions and tracks through store contracts and
//! never writes listening data.

pub mod cold_start;
pub mod collaborative;
pub mod config;
pub mod content_based;
pub mod context;
pub mod diversity;
pub mod error;
pub mod handlers;
pub mod playlists;
pub mod profile;
pub mod radio;
pub mod recommendation;
pub mod scoring;
pub mod shuffle;
pub mod similarity;
pub mod store;
pub mod types;
pub mod wave;

// Re-export key types
pub use config::RecommendationConfig;
pub use context::{ContextMix, MixPreset, MIX_PRESETS};
pub use error::{RecommendationError, Result, StoreError};
pub use profile::{BuildUserProfile, UserProfile};
pub use playlists::{PersonalPlaylist, PlaylistKind};
pub use radio::{MixCharacteristics, RadioStation, RadioTrack};
pub use recommendation::{
    HybridBreakdown, HybridRecommendations, MoodRecommendations, RecommendationStats,
    SmartRecommendations,
};
pub use shuffle::{IdentityShuffler, SeededShuffler, Shuffler, ThreadRngShuffler};
pub use store::{InMemoryStore, InteractionStore, PreferenceStore, Stores, TrackCatalog};
pub use types::*;
pub use wave::{FeedbackEvent, WaveMetadata, WavePage, WaveRequest, WaveState};

use std::sync::Arc;

/// Recommendation engine instance
///
/// Holds the stores, tuning and randomness source. Every surface is a stateless call;
/// the engine can be shared across HTTP workers behind an `Arc`.
pub struct RecommendationEngine {
    stores: Stores,
    config: RecommendationConfig,
    shuffler: Arc<dyn Shuffler>,
}

impl RecommendationEngine {
    pub fn new(stores: Stores) -> Self {
        Self {
            stores,
            config: RecommendationConfig::default(),
            shuffler: Arc::new(ThreadRngShuffler),
        }
    }

    pub fn with_config(mut self, config: RecommendationConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the randomness source (seeded or identity for reproducible output)
    pub fn with_shuffler(mut self, shuffler: Arc<dyn Shuffler>) -> Self {
        self.shuffler = shuffler;
        self
    }

    pub fn config(&self) -> &RecommendationConfig {
        &self.config
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub async fn next_wave_page(&self, request: WaveRequest) -> Result<WavePage> {
        wave::NextWavePage::execute(request, &self.stores, &self.config, self.shuffler.as_ref()).await
    }

    pub async fn record_dislike(&self, user_id: UserId, track_id: TrackId) -> Result<()> {
        wave::RecordDislike::execute(user_id, track_id, &self.stores).await
    }

    pub fn record_feedback(&self, user_id: UserId, track_id: TrackId, event: FeedbackEvent) {
        wave::RecordFeedback::execute(user_id, track_id, event)
    }

    pub async fn hybrid(&self, user_id: UserId, limit: Option<usize>) -> Result<HybridRecommendations> {
        recommendation::GenerateHybridRecommendations::execute(user_id, limit, &self.stores, &self.config)
            .await
    }

    pub async fn smart(&self, user_id: UserId, limit: Option<usize>) -> Result<SmartRecommendations> {
        recommendation::GenerateSmartRecommendations::execute(
            user_id,
            limit,
            &self.stores,
            &self.config,
            self.shuffler.as_ref(),
        )
        .await
    }

    pub async fn similar_to_track(
        &self,
        track_id: TrackId,
        limit: Option<usize>,
    ) -> Result<Vec<RankedTrack>> {
        recommendation::FindSimilarToTrack::execute(track_id, limit, &self.stores, &self.config).await
    }

    pub async fn tracks_by_mood(&self, mood: &str, limit: Option<usize>) -> Result<MoodRecommendations> {
        recommendation::GetRecommendationsByMood::execute(
            mood,
            limit,
            &self.stores,
            &self.config,
            self.shuffler.as_ref(),
        )
        .await
    }

    pub async fn stats(&self, user_id: UserId) -> Result<RecommendationStats> {
        recommendation::GetRecommendationStats::execute(user_id, &self.stores).await
    }

    pub fn mixes(&self) -> &'static [MixPreset] {
        &MIX_PRESETS
    }

    pub async fn mix(
        &self,
        kind: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<ContextMix> {
        context::GenerateContextMix::execute(
            kind,
            user_id,
            limit,
            &self.stores,
            &self.config,
            self.shuffler.as_ref(),
        )
        .await
    }

    pub async fn auto_mix(
        &self,
        hour: u32,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<ContextMix> {
        context::GenerateAutoMix::execute(
            hour,
            user_id,
            limit,
            &self.stores,
            &self.config,
            self.shuffler.as_ref(),
        )
        .await
    }

    pub async fn track_radio(
        &self,
        track_id: TrackId,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<RadioStation> {
        radio::GenerateTrackRadio::execute(track_id, user_id, limit, &self.stores, &self.config).await
    }

    pub async fn genre_radio(
        &self,
        genre: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<RadioStation> {
        radio::GenerateGenreRadio::execute(genre, user_id, limit, &self.stores, &self.config).await
    }

    pub async fn artist_radio(
        &self,
        artist: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<RadioStation> {
        radio::GenerateArtistRadio::execute(artist, user_id, limit, &self.stores, &self.config).await
    }

    pub async fn mix_radio(
        &self,
        seed_ids: &[TrackId],
        user_id: Option<UserId>,
        limit: Option<usize>,
    ) -> Result<RadioStation> {
        radio::GenerateMixRadio::execute(seed_ids, user_id, limit, &self.stores, &self.config).await
    }

    /// One personal playlist; only charts may be generated without a listener
    pub async fn playlist(
        &self,
        kind: PlaylistKind,
        user_id: Option<UserId>,
        size: Option<usize>,
    ) -> Result<PersonalPlaylist> {
        playlists::GeneratePlaylist::execute(
            kind,
            user_id,
            size,
            &self.stores,
            &self.config,
            self.shuffler.as_ref(),
        )
        .await
    }

    pub async fn playlists(&self, user_id: UserId) -> Result<Vec<PersonalPlaylist>> {
        playlists::GeneratePlaylist::all(user_id, &self.stores, &self.config, self.shuffler.as_ref())
            .await
    }
}

#[cfg(test)]
mod tests;
