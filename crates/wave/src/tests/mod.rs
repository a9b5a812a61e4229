//! Shared fixtures and scenario tests for the recommendation core


use crate::shuffle::IdentityShuffler;
use crate::store::{InMemoryStore, Stores};
use crate::types::{InteractionKind, Track, UserId};
use crate::{RecommendationConfig, RecommendationEngine};
use chrono::{Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Minimal catalog track
pub fn track(artist: &str, genre: &str, play_count: i64) -> Track {
    Track {
        id: Uuid::new_v4(),
        title: format!("{} track", artist),
        artist: artist.to_string(),
        genre: Some(genre.to_string()),
        year: Some(2010),
        play_count,
        likes_count: 0,
        created_at: Utc::now(),
        mood: None,
        is_instrumental: false,
        audio_features: None,
    }
}

/// `count` tracks of one artist with descending popularity
pub fn tracks_by(artist: &str, genre: &str, count: usize) -> Vec<Track> {
    (0..count)
        .map(|i| track(artist, genre, 1000 - i as i64))
        .collect()
}

pub fn store_with(tracks: impl IntoIterator<Item = Track>) -> Arc<InMemoryStore> {
    let store = Arc::new(InMemoryStore::new());
    store.insert_tracks(tracks);
    store
}

/// Record one interaction per track, one minute apart, first track newest
pub fn record_all(store: &InMemoryStore, user: UserId, tracks: &[Track], kind: InteractionKind) {
    let now = Utc::now();
    for (i, t) in tracks.iter().enumerate() {
        store.record(user, t.id, kind, now - Duration::minutes(i as i64 + 1));
    }
}

/// Engine over one in-memory store with deterministic ordering
pub fn engine(store: Arc<InMemoryStore>) -> RecommendationEngine {
    RecommendationEngine::new(Stores::shared(store))
        .with_config(RecommendationConfig::default())
        .with_shuffler(Arc::new(IdentityShuffler))
}
