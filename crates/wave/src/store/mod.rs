//! Read contracts the recommendation core consumes
//!
//! The core never owns persistence. It reads interactions and tracks through these
//! traits and forwards dislikes to a preference store.

pub mod memory;
pub mod postgres;
pub mod redis_store;

pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use redis_store::RedisPreferenceStore;

use crate::error::StoreError;
use crate::types::{Interaction, Track, TrackId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// The three collaborators every recommendation surface reads from
#[derive(Clone)]
pub struct Stores {
    pub interactions: Arc<dyn InteractionStore>,
    pub catalog: Arc<dyn TrackCatalog>,
    pub preferences: Arc<dyn PreferenceStore>,
}

impl Stores {
    pub fn new(
        interactions: Arc<dyn InteractionStore>,
        catalog: Arc<dyn TrackCatalog>,
        preferences: Arc<dyn PreferenceStore>,
    ) -> Self {
        Self {
            interactions,
            catalog,
            preferences,
        }
    }

    /// One store serving all three contracts
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: InteractionStore + TrackCatalog + PreferenceStore + 'static,
    {
        Self {
            interactions: store.clone(),
            catalog: store.clone(),
            preferences: store,
        }
    }
}

/// Listen history and likes
#[async_trait]
pub trait InteractionStore: Send + Sync {
    /// Interactions of `user_id`, newest first. `since = None` is unbounded.
    async fn get_interactions(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Interaction>>;

    /// Users with at least `threshold` interactions since `since`
    async fn get_users_with_interaction_count_above(
        &self,
        threshold: usize,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>>;

    /// Distinct users that interacted with `track_id`
    async fn get_track_listeners(&self, track_id: TrackId) -> StoreResult<Vec<UserId>>;
}

/// Track metadata
#[async_trait]
pub trait TrackCatalog: Send + Sync {
    async fn get_track(&self, track_id: TrackId) -> StoreResult<Option<Track>>;

    /// Batch lookup; unknown ids are skipped
    async fn get_tracks(&self, track_ids: &[TrackId]) -> StoreResult<Vec<Track>> {
        let mut tracks = Vec::with_capacity(track_ids.len());
        for id in track_ids {
            if let Some(track) = self.get_track(*id).await? {
                tracks.push(track);
            }
        }
        Ok(tracks)
    }

    async fn find_tracks(
        &self,
        query: &TrackQuery,
        limit: usize,
        order: TrackOrder,
    ) -> StoreResult<Vec<Track>>;
}

/// External preference collaborator receiving wave dislikes
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn record_dislike(&self, user_id: UserId, track_id: TrackId) -> StoreResult<()>;

    async fn get_disliked(&self, user_id: UserId) -> StoreResult<HashSet<TrackId>>;
}

/// Result ordering for `find_tracks`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOrder {
    /// Play count descending, newest first on ties
    PopularityDesc,
    Newest,
    /// Likes descending, then play count
    LikesDesc,
}

/// Predicate over catalog tracks
///
/// Unset fields do not constrain. `genre_in` and `artist_in` are joined with AND unless
/// `any_of` is set. String comparisons ignore case.
#[derive(Debug, Clone, Default)]
pub struct TrackQuery {
    pub genre_in: Option<Vec<String>>,
    /// Substring genre match, any keyword
    pub genre_like: Option<Vec<String>>,
    pub artist_in: Option<Vec<String>>,
    pub artist_not_in: Vec<String>,
    /// Substring artist match
    pub artist_like: Option<String>,
    pub mood: Option<String>,
    pub id_not_in: HashSet<TrackId>,
    /// Inclusive year bounds
    pub year_range: Option<(i32, i32)>,
    pub min_play_count: Option<i64>,
    /// Exclusive upper bound
    pub max_play_count: Option<i64>,
    /// Added to the catalog at or after this instant
    pub added_since: Option<DateTime<Utc>>,
    pub tempo_range: Option<(f32, f32)>,
    pub min_energy: Option<f32>,
    pub max_energy: Option<f32>,
    pub instrumental_only: bool,
    pub any_of: bool,
}

impl TrackQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn genre_in(mut self, genres: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.genre_in = Some(genres.into_iter().map(Into::into).collect());
        self
    }

    pub fn genre_like(mut self, keywords: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.genre_like = Some(keywords.into_iter().map(Into::into).collect());
        self
    }

    pub fn artist_in(mut self, artists: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.artist_in = Some(artists.into_iter().map(Into::into).collect());
        self
    }

    pub fn artist_not_in(mut self, artists: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.artist_not_in = artists.into_iter().map(Into::into).collect();
        self
    }

    pub fn artist_like(mut self, fragment: impl Into<String>) -> Self {
        self.artist_like = Some(fragment.into());
        self
    }

    pub fn mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn exclude_ids<'a>(mut self, ids: impl IntoIterator<Item = &'a TrackId>) -> Self {
        self.id_not_in.extend(ids);
        self
    }

    pub fn year_range(mut self, from: i32, to: i32) -> Self {
        self.year_range = Some((from.min(to), from.max(to)));
        self
    }

    pub fn min_play_count(mut self, plays: i64) -> Self {
        self.min_play_count = Some(plays);
        self
    }

    pub fn max_play_count(mut self, plays: i64) -> Self {
        self.max_play_count = Some(plays);
        self
    }

    pub fn added_since(mut self, since: DateTime<Utc>) -> Self {
        self.added_since = Some(since);
        self
    }

    pub fn tempo_range(mut self, from: f32, to: f32) -> Self {
        self.tempo_range = Some((from, to));
        self
    }

    pub fn energy_between(mut self, min: Option<f32>, max: Option<f32>) -> Self {
        self.min_energy = min;
        self.max_energy = max;
        self
    }

    pub fn instrumental_only(mut self, instrumental: bool) -> Self {
        self.instrumental_only = instrumental;
        self
    }

    /// Join `genre_in` and `artist_in` with OR
    pub fn any_of(mut self) -> Self {
        self.any_of = true;
        self
    }

    /// Drop the audio filters (tempo and energy)
    pub fn without_audio_filters(mut self) -> Self {
        self.tempo_range = None;
        self.min_energy = None;
        self.max_energy = None;
        self
    }

    /// Evaluate the predicate against a single track
    pub fn matches(&self, track: &Track) -> bool {
        if self.id_not_in.contains(&track.id) {
            return false;
        }

        let genre_match = self.genre_in.as_ref().map(|genres| {
            track
                .genre
                .as_deref()
                .is_some_and(|genre| contains_ignore_case(genres, genre))
        });
        let artist_match = self
            .artist_in
            .as_ref()
            .map(|artists| contains_ignore_case(artists, &track.artist));

        let taste_match = match (genre_match, artist_match) {
            (Some(g), Some(a)) if self.any_of => g || a,
            (Some(g), Some(a)) => g && a,
            (Some(g), None) => g,
            (None, Some(a)) => a,
            (None, None) => true,
        };
        if !taste_match {
            return false;
        }

        if let Some(keywords) = &self.genre_like {
            let genre = track.genre.as_deref().unwrap_or_default().to_lowercase();
            if !keywords.iter().any(|k| genre.contains(&k.to_lowercase())) {
                return false;
            }
        }

        if contains_ignore_case(&self.artist_not_in, &track.artist) {
            return false;
        }

        if let Some(fragment) = &self.artist_like {
            let fragment = fragment.trim().to_lowercase();
            if !track.artist.to_lowercase().contains(&fragment) {
                return false;
            }
        }

        if let Some(mood) = &self.mood {
            let wanted = mood.trim().to_lowercase();
            if !track
                .mood
                .as_deref()
                .is_some_and(|m| m.trim().to_lowercase() == wanted)
            {
                return false;
            }
        }

        if let Some((from, to)) = self.year_range {
            if !track.year.is_some_and(|y| y >= from && y <= to) {
                return false;
            }
        }

        if let Some(min) = self.min_play_count {
            if track.play_count < min {
                return false;
            }
        }

        if self.max_play_count.is_some_and(|max| track.play_count >= max) {
            return false;
        }

        if self.added_since.is_some_and(|since| track.created_at < since) {
            return false;
        }

        if self.instrumental_only && !track.is_instrumental {
            return false;
        }

        let needs_features =
            self.tempo_range.is_some() || self.min_energy.is_some() || self.max_energy.is_some();
        if needs_features {
            let Some(features) = track.audio_features else {
                return false;
            };
            if let Some((from, to)) = self.tempo_range {
                if features.tempo < from || features.tempo > to {
                    return false;
                }
            }
            if self.min_energy.is_some_and(|min| features.energy < min) {
                return false;
            }
            if self.max_energy.is_some_and(|max| features.energy > max) {
                return false;
            }
        }

        true
    }
}

fn contains_ignore_case(values: &[String], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    values.iter().any(|v| v.trim().to_lowercase() == needle)
}
