//! PostgreSQL store against a live database
//!
//! Run with `DATABASE_URL=postgres://... cargo test -- --ignored`

use chrono::{Duration, Utc};
use music_platform_wave::store::{
    InteractionStore, PgStore, PreferenceStore, TrackCatalog, TrackOrder, TrackQuery,
};
use music_platform_wave::InteractionKind;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS tracks (
        id UUID PRIMARY KEY,
        title TEXT NOT NULL,
        artist TEXT NOT NULL,
        genre TEXT,
        year INTEGER,
        play_count BIGINT DEFAULT 0,
        likes_count BIGINT DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        mood TEXT,
        is_instrumental BOOLEAN DEFAULT FALSE,
        tempo REAL,
        energy REAL,
        valence REAL,
        danceability REAL,
        acousticness REAL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS listening_history (
        user_id UUID NOT NULL,
        track_id UUID NOT NULL,
        listened_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS track_likes (
        user_id UUID NOT NULL,
        track_id UUID NOT NULL,
        liked_at TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS user_preferences (
        user_id UUID NOT NULL,
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        PRIMARY KEY (user_id, key)
    )
    "#,
];

async fn connect() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect");
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await.unwrap();
    }
    pool
}

async fn insert_track(pool: &PgPool, artist: &str, genre: &str, play_count: i64) -> Uuid {
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO tracks (id, title, artist, genre, year, play_count, tempo, energy, valence, danceability, acousticness) \
         VALUES ($1, $2, $3, $4, 1999, $5, 120, 0.8, 0.5, 0.6, 0.1)",
    )
    .bind(id)
    .bind(format!("{} {}", artist, play_count))
    .bind(artist)
    .bind(genre)
    .bind(play_count)
    .execute(pool)
    .await
    .unwrap();
    id
}

#[tokio::test]
#[ignore]
async fn test_interactions_merge_listens_and_likes() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let track = insert_track(&pool, "Muse", "Rock", 10).await;
    let user = Uuid::new_v4();
    let now = Utc::now();

    sqlx::query("INSERT INTO listening_history (user_id, track_id, listened_at) VALUES ($1, $2, $3)")
        .bind(user)
        .bind(track)
        .bind(now - Duration::days(2))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("INSERT INTO track_likes (user_id, track_id, liked_at) VALUES ($1, $2, $3)")
        .bind(user)
        .bind(track)
        .bind(now - Duration::days(1))
        .execute(&pool)
        .await
        .unwrap();

    let all = store.get_interactions(user, None).await.unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].kind, InteractionKind::Like);
    assert_eq!(all[1].kind, InteractionKind::Listen);

    let recent = store
        .get_interactions(user, Some(now - Duration::hours(36)))
        .await
        .unwrap();
    assert_eq!(recent.len(), 1);

    let listeners = store.get_track_listeners(track).await.unwrap();
    assert_eq!(listeners, vec![user]);
}

#[tokio::test]
#[ignore]
async fn test_find_tracks_filters_case_insensitively() {
    let pool = connect().await;
    let store = PgStore::new(pool.clone());
    let marker = format!("Genre-{}", Uuid::new_v4());
    let loud = insert_track(&pool, "Band A", &marker, 500).await;
    let quiet = insert_track(&pool, "Band B", &marker, 5).await;

    let query = TrackQuery::new().genre_in([marker.to_uppercase()]);
    let found = store
        .find_tracks(&query, 10, TrackOrder::PopularityDesc)
        .await
        .unwrap();
    let ids: Vec<Uuid> = found.iter().map(|t| t.id).collect();
    assert_eq!(ids, vec![loud, quiet]);
    assert!(found[0].audio_features.is_some());

    let query = TrackQuery::new()
        .genre_in([marker.clone()])
        .artist_not_in(["band a".to_string()]);
    let found = store
        .find_tracks(&query, 10, TrackOrder::PopularityDesc)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].id, quiet);
}

#[tokio::test]
#[ignore]
async fn test_dislikes_are_idempotent() {
    let pool = connect().await;
    let store = PgStore::new(pool);
    let user = Uuid::new_v4();
    let track = Uuid::new_v4();

    store.record_dislike(user, track).await.unwrap();
    store.record_dislike(user, track).await.unwrap();

    let disliked = store.get_disliked(user).await.unwrap();
    assert_eq!(disliked.len(), 1);
    assert!(disliked.contains(&track));
}
