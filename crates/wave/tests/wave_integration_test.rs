//! Wave sessions through the public engine API

use chrono::{Duration, Utc};
use music_platform_wave::{
    IdentityShuffler, InMemoryStore, InteractionKind, RecommendationEngine, SeededShuffler,
    SourceTag, Stores, Track, TrackId, WaveRequest, WaveState,
};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

fn track(artist: &str, genre: &str, year: i32, play_count: i64) -> Track {
    Track {
        id: Uuid::new_v4(),
        title: format!("{} - {}", artist, play_count),
        artist: artist.to_string(),
        genre: Some(genre.to_string()),
        year: Some(year),
        play_count,
        likes_count: 0,
        created_at: Utc::now(),
        mood: None,
        is_instrumental: false,
        audio_features: None,
    }
}

/// A listener with 8 listens across two artists and a mixed catalog around them
fn seeded_catalog() -> (Arc<InMemoryStore>, Uuid, Vec<Track>) {
    let store = Arc::new(InMemoryStore::new());
    let mut heard = Vec::new();

    for (artist, genre, year) in [
        ("Radiohead", "Alternative", 1997),
        ("Portishead", "Trip-Hop", 1994),
    ] {
        for i in 0..12 {
            let t = track(artist, genre, year, 500 - i);
            if i < 4 {
                heard.push(t.clone());
            }
            store.insert_track(t);
        }
    }
    for (artist, genre, year) in [
        ("Massive Attack", "Trip-Hop", 1998),
        ("Blur", "Alternative", 1995),
        ("Tricky", "Trip-Hop", 1995),
        ("Daft Punk", "Electronic", 2001),
        ("Adele", "Pop", 2015),
    ] {
        for i in 0..8 {
            store.insert_track(track(artist, genre, year, 300 - i * 7));
        }
    }

    let user = Uuid::new_v4();
    let now = Utc::now();
    for (i, t) in heard.iter().enumerate() {
        store.record(user, t.id, InteractionKind::Listen, now - Duration::hours(i as i64 + 1));
    }
    (store, user, heard)
}

#[tokio::test]
async fn test_session_walks_catalog_without_repeats() {
    let (store, user, heard) = seeded_catalog();
    let engine = RecommendationEngine::new(Stores::shared(store))
        .with_shuffler(Arc::new(IdentityShuffler));

    let heard_ids: HashSet<TrackId> = heard.iter().map(|t| t.id).collect();
    let mut served: HashSet<TrackId> = HashSet::new();
    let mut exclude: Vec<TrackId> = Vec::new();

    for page_number in 0..3 {
        let page = engine
            .next_wave_page(WaveRequest::new(user).with_size(10).excluding(exclude.clone()))
            .await
            .unwrap();

        let expected = if page_number == 0 { WaveState::Cold } else { WaveState::Warm };
        assert_eq!(page.metadata.state, expected);
        assert_eq!(page.tracks.len(), 10);

        for t in &page.tracks {
            assert!(served.insert(t.track_id), "track served twice");
            let personal = t.sources.iter().any(|s| *s != SourceTag::Trending);
            if personal {
                assert!(!heard_ids.contains(&t.track_id));
            }
        }
        exclude = page.exclude_ids;
    }

    assert_eq!(served.len(), 30);
}

#[tokio::test]
async fn test_seeded_shuffler_reproduces_pages() {
    let (store, user, _) = seeded_catalog();

    let first = RecommendationEngine::new(Stores::shared(store.clone()))
        .with_shuffler(Arc::new(SeededShuffler::new(42)))
        .next_wave_page(WaveRequest::new(user))
        .await
        .unwrap();
    let second = RecommendationEngine::new(Stores::shared(store))
        .with_shuffler(Arc::new(SeededShuffler::new(42)))
        .next_wave_page(WaveRequest::new(user))
        .await
        .unwrap();

    let ids = |page: &music_platform_wave::WavePage| -> Vec<TrackId> {
        page.tracks.iter().map(|t| t.track_id).collect()
    };
    assert_eq!(ids(&first), ids(&second));
}

#[tokio::test]
async fn test_discovery_stays_near_preferred_eras() {
    let (store, user, _) = seeded_catalog();
    let engine = RecommendationEngine::new(Stores::shared(store))
        .with_shuffler(Arc::new(IdentityShuffler));

    let page = engine
        .next_wave_page(WaveRequest::new(user).with_size(20))
        .await
        .unwrap();

    // Preferred decade is the 1990s, so discovery spans 1990..=2000
    for t in page
        .tracks
        .iter()
        .filter(|t| t.sources.contains(&SourceTag::Discovery))
    {
        let year = t.track.year.unwrap_or_default();
        assert!((1990..=2000).contains(&year), "discovery year {}", year);
        assert!(!["Radiohead", "Portishead"].contains(&t.track.artist.as_str()));
    }
    assert!(page.metadata.discovery > 0);
}

#[tokio::test]
async fn test_dislike_removes_track_from_later_pages() {
    let (store, user, _) = seeded_catalog();
    let engine = RecommendationEngine::new(Stores::shared(store))
        .with_shuffler(Arc::new(IdentityShuffler));

    let first = engine
        .next_wave_page(WaveRequest::new(user).with_size(10))
        .await
        .unwrap();
    let disliked = first.tracks[0].track_id;
    engine.record_dislike(user, disliked).await.unwrap();

    let again = engine
        .next_wave_page(WaveRequest::new(user).with_size(10))
        .await
        .unwrap();
    assert!(again.tracks.iter().all(|t| t.track_id != disliked));
}
