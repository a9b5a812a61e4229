//! PostgreSQL-backed stores
//!
//! Reads `tracks`, `listening_history` and `track_likes`; wave dislikes are written to
//! `user_preferences` under `wave_dislike_<track_id>` keys.

use super::{
    InteractionStore, PreferenceStore, StoreResult, TrackCatalog, TrackOrder, TrackQuery,
};
use crate::error::StoreError;
use crate::types::{AudioFeatures, Interaction, InteractionKind, Track, TrackId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use music_platform_core::store_span;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use std::collections::HashSet;
use tracing::{warn, Instrument};
use uuid::Uuid;

const DISLIKE_KEY_PREFIX: &str = "wave_dislike_";

const TRACK_COLUMNS: &str = "id, title, artist, genre, year, play_count, likes_count, created_at, \
     mood, is_instrumental, tempo, energy, valence, danceability, acousticness";

/// All interactions as one relation: `(user_id, track_id, kind, ts)`
const INTERACTIONS_UNION: &str = r#"
    SELECT user_id, track_id, 'listen' AS kind, listened_at AS ts FROM listening_history
    UNION ALL
    SELECT user_id, track_id, 'like' AS kind, liked_at AS ts FROM track_likes
"#;

/// Store over the platform PostgreSQL schema
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn track_from_row(row: &PgRow) -> StoreResult<Track> {
    let tempo: Option<f32> = row.try_get("tempo")?;
    let energy: Option<f32> = row.try_get("energy")?;
    let valence: Option<f32> = row.try_get("valence")?;
    let danceability: Option<f32> = row.try_get("danceability")?;
    let acousticness: Option<f32> = row.try_get("acousticness")?;

    // Partial feature rows are treated as missing.
    let audio_features = match (tempo, energy, valence, danceability, acousticness) {
        (Some(tempo), Some(energy), Some(valence), Some(danceability), Some(acousticness)) => {
            Some(AudioFeatures {
                tempo,
                energy,
                valence,
                danceability,
                acousticness,
            })
        }
        _ => None,
    };

    Ok(Track {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        artist: row.try_get("artist")?,
        genre: row.try_get("genre")?,
        year: row.try_get("year")?,
        play_count: row.try_get::<Option<i64>, _>("play_count")?.unwrap_or(0),
        likes_count: row.try_get::<Option<i64>, _>("likes_count")?.unwrap_or(0),
        created_at: row.try_get("created_at")?,
        mood: row.try_get("mood")?,
        is_instrumental: row
            .try_get::<Option<bool>, _>("is_instrumental")?
            .unwrap_or(false),
        audio_features,
    })
}

fn interaction_from_row(row: &PgRow) -> StoreResult<Interaction> {
    let kind: String = row.try_get("kind")?;
    let kind = match kind.as_str() {
        "listen" => InteractionKind::Listen,
        "like" => InteractionKind::Like,
        other => {
            return Err(StoreError::Corrupt(format!(
                "unknown interaction kind '{}'",
                other
            )))
        }
    };

    Ok(Interaction {
        user_id: row.try_get("user_id")?,
        track_id: row.try_get("track_id")?,
        kind,
        timestamp: row.try_get("ts")?,
    })
}

fn lowercased(values: &[String]) -> Vec<String> {
    values.iter().map(|v| v.trim().to_lowercase()).collect()
}

/// `%fragment%` with LIKE wildcards in the fragment matched literally (`ESCAPE '\'`)
fn contains_pattern(fragment: &str) -> String {
    let mut pattern = String::with_capacity(fragment.len() + 2);
    pattern.push('%');
    for c in fragment.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Append the WHERE clause for `query` (the builder already holds `... WHERE TRUE`)
fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &TrackQuery) {
    let genre_clause = query.genre_in.as_ref().map(|g| lowercased(g));
    let artist_clause = query.artist_in.as_ref().map(|a| lowercased(a));

    match (genre_clause, artist_clause) {
        (Some(genres), Some(artists)) => {
            let joiner = if query.any_of { " OR " } else { " AND " };
            builder.push(" AND (LOWER(TRIM(genre)) = ANY(");
            builder.push_bind(genres);
            builder.push(")");
            builder.push(joiner);
            builder.push("LOWER(TRIM(artist)) = ANY(");
            builder.push_bind(artists);
            builder.push("))");
        }
        (Some(genres), None) => {
            builder.push(" AND LOWER(TRIM(genre)) = ANY(");
            builder.push_bind(genres);
            builder.push(")");
        }
        (None, Some(artists)) => {
            builder.push(" AND LOWER(TRIM(artist)) = ANY(");
            builder.push_bind(artists);
            builder.push(")");
        }
        (None, None) => {}
    }

    if let Some(keywords) = &query.genre_like {
        if keywords.is_empty() {
            builder.push(" AND FALSE");
        } else {
            builder.push(" AND (");
            let mut separated = builder.separated(" OR ");
            for keyword in keywords {
                separated.push("genre ILIKE ");
                separated.push_bind_unseparated(contains_pattern(keyword));
                separated.push_unseparated(" ESCAPE '\\'");
            }
            builder.push(")");
        }
    }

    if let Some(fragment) = &query.artist_like {
        builder.push(" AND artist ILIKE ");
        builder.push_bind(contains_pattern(fragment));
        builder.push(" ESCAPE '\\'");
    }

    if let Some(mood) = &query.mood {
        builder.push(" AND LOWER(TRIM(mood)) = ");
        builder.push_bind(mood.trim().to_lowercase());
    }

    if !query.artist_not_in.is_empty() {
        builder.push(" AND NOT (LOWER(TRIM(artist)) = ANY(");
        builder.push_bind(lowercased(&query.artist_not_in));
        builder.push("))");
    }

    if !query.id_not_in.is_empty() {
        let ids: Vec<Uuid> = query.id_not_in.iter().copied().collect();
        builder.push(" AND NOT (id = ANY(");
        builder.push_bind(ids);
        builder.push("))");
    }

    if let Some((from, to)) = query.year_range {
        builder.push(" AND year BETWEEN ");
        builder.push_bind(from);
        builder.push(" AND ");
        builder.push_bind(to);
    }

    if let Some(min) = query.min_play_count {
        builder.push(" AND play_count >= ");
        builder.push_bind(min);
    }

    if let Some(max) = query.max_play_count {
        builder.push(" AND play_count < ");
        builder.push_bind(max);
    }

    if let Some(since) = query.added_since {
        builder.push(" AND created_at >= ");
        builder.push_bind(since);
    }

    if query.instrumental_only {
        builder.push(" AND is_instrumental = TRUE");
    }

    if let Some((from, to)) = query.tempo_range {
        builder.push(" AND tempo BETWEEN ");
        builder.push_bind(from);
        builder.push(" AND ");
        builder.push_bind(to);
    }

    if let Some(min) = query.min_energy {
        builder.push(" AND energy >= ");
        builder.push_bind(min);
    }

    if let Some(max) = query.max_energy {
        builder.push(" AND energy <= ");
        builder.push_bind(max);
    }
}

#[async_trait]
impl InteractionStore for PgStore {
    async fn get_interactions(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Interaction>> {
        let sql = format!(
            "SELECT user_id, track_id, kind, ts FROM ({}) AS interactions \
             WHERE user_id = $1 AND ($2::timestamptz IS NULL OR ts >= $2) \
             ORDER BY ts DESC",
            INTERACTIONS_UNION
        );

        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(since)
            .fetch_all(&self.pool)
            .instrument(store_span("get_interactions", "listening_history"))
            .await?;

        rows.iter().map(interaction_from_row).collect()
    }

    async fn get_users_with_interaction_count_above(
        &self,
        threshold: usize,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>> {
        let sql = format!(
            "SELECT user_id FROM ({}) AS interactions \
             WHERE ts >= $1 \
             GROUP BY user_id HAVING COUNT(*) >= $2 \
             ORDER BY user_id",
            INTERACTIONS_UNION
        );

        let rows = sqlx::query(&sql)
            .bind(since)
            .bind(threshold as i64)
            .fetch_all(&self.pool)
            .instrument(store_span("get_active_users", "listening_history"))
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("user_id").map_err(StoreError::from))
            .collect()
    }

    async fn get_track_listeners(&self, track_id: TrackId) -> StoreResult<Vec<UserId>> {
        let sql = format!(
            "SELECT DISTINCT user_id FROM ({}) AS interactions \
             WHERE track_id = $1 ORDER BY user_id",
            INTERACTIONS_UNION
        );

        let rows = sqlx::query(&sql)
            .bind(track_id)
            .fetch_all(&self.pool)
            .instrument(store_span("get_track_listeners", "listening_history"))
            .await?;

        rows.iter()
            .map(|row| row.try_get::<Uuid, _>("user_id").map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl TrackCatalog for PgStore {
    async fn get_track(&self, track_id: TrackId) -> StoreResult<Option<Track>> {
        let sql = format!("SELECT {} FROM tracks WHERE id = $1", TRACK_COLUMNS);

        let row = sqlx::query(&sql)
            .bind(track_id)
            .fetch_optional(&self.pool)
            .instrument(store_span("get_track", "tracks"))
            .await?;

        row.as_ref().map(track_from_row).transpose()
    }

    async fn get_tracks(&self, track_ids: &[TrackId]) -> StoreResult<Vec<Track>> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!("SELECT {} FROM tracks WHERE id = ANY($1)", TRACK_COLUMNS);

        let rows = sqlx::query(&sql)
            .bind(track_ids.to_vec())
            .fetch_all(&self.pool)
            .instrument(store_span("get_tracks", "tracks"))
            .await?;

        rows.iter().map(track_from_row).collect()
    }

    async fn find_tracks(
        &self,
        query: &TrackQuery,
        limit: usize,
        order: TrackOrder,
    ) -> StoreResult<Vec<Track>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM tracks WHERE TRUE", TRACK_COLUMNS));
        push_filters(&mut builder, query);

        builder.push(match order {
            TrackOrder::PopularityDesc => " ORDER BY play_count DESC, created_at DESC, id",
            TrackOrder::Newest => " ORDER BY created_at DESC, id",
            TrackOrder::LikesDesc => " ORDER BY likes_count DESC, play_count DESC, id",
        });
        builder.push(" LIMIT ");
        builder.push_bind(limit as i64);

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .instrument(store_span("find_tracks", "tracks"))
            .await?;

        rows.iter().map(track_from_row).collect()
    }
}

#[async_trait]
impl PreferenceStore for PgStore {
    async fn record_dislike(&self, user_id: UserId, track_id: TrackId) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, key, value, created_at)
            VALUES ($1, $2, 'true', NOW())
            ON CONFLICT (user_id, key) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(format!("{}{}", DISLIKE_KEY_PREFIX, track_id))
        .execute(&self.pool)
        .instrument(store_span("record_dislike", "user_preferences"))
        .await?;

        Ok(())
    }

    async fn get_disliked(&self, user_id: UserId) -> StoreResult<HashSet<TrackId>> {
        let rows = sqlx::query(
            r#"
            SELECT key FROM user_preferences
            WHERE user_id = $1 AND key LIKE 'wave\_dislike\_%'
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .instrument(store_span("get_disliked", "user_preferences"))
        .await?;

        let mut disliked = HashSet::with_capacity(rows.len());
        for row in rows {
            let key: String = row.try_get("key")?;
            match key
                .strip_prefix(DISLIKE_KEY_PREFIX)
                .and_then(|raw| Uuid::parse_str(raw).ok())
            {
                Some(track_id) => {
                    disliked.insert(track_id);
                }
                None => warn!(user_id = %user_id, key = %key, "Skipping malformed dislike key"),
            }
        }

        Ok(disliked)
    }
}
