//! Radio
//!
//! Endless-queue style stations seeded by a track, a set of tracks, a genre or an
//! artist.

use crate::config::{RadioConfig, RecommendationConfig};
use crate::error::{RecommendationError, Result};
use crate::store::{Stores, TrackOrder, TrackQuery};
use crate::types::{InteractionKind, Track, TrackId, UserId};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::info;

/// Candidates fetched per genre / artist / era / popularity criterion
const GENRE_FETCH: usize = 100;
const ARTIST_FETCH: usize = 50;
const YEAR_FETCH: usize = 100;
const POPULAR_FETCH: usize = 50;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioTrack {
    #[serde(flatten)]
    pub track: Track,
    pub similarity_score: f32,
}

/// What a multi-seed station was built around
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MixCharacteristics {
    /// Distinct seed genres, first seen first
    pub genres: Vec<String>,
    /// Rounded mean of the seed years
    pub average_year: Option<i32>,
}

impl MixCharacteristics {
    fn of(seeds: &[Track]) -> Self {
        let mut seen = HashSet::new();
        let genres = seeds
            .iter()
            .filter_map(|t| t.genre.as_deref())
            .map(str::trim)
            .filter(|g| !g.is_empty() && seen.insert(g.to_lowercase()))
            .map(str::to_string)
            .collect();

        let years: Vec<i32> = seeds.iter().filter_map(|t| t.year).collect();
        let average_year = (!years.is_empty()).then(|| {
            let sum: f64 = years.iter().map(|&y| f64::from(y)).sum();
            (sum / years.len() as f64).round() as i32
        });

        Self {
            genres,
            average_year,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RadioStation {
    /// Seed tracks; empty for genre and artist stations
    pub seeds: Vec<Track>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub characteristics: Option<MixCharacteristics>,
    pub tracks: Vec<RadioTrack>,
    pub total: usize,
    /// No track matched any criterion; popular tracks were served instead
    pub fallback: bool,
}

impl RadioStation {
    fn unseeded(tracks: Vec<RadioTrack>) -> Self {
        Self {
            seeds: Vec::new(),
            characteristics: None,
            total: tracks.len(),
            tracks,
            fallback: false,
        }
    }
}

fn unscored(tracks: Vec<Track>) -> Vec<RadioTrack> {
    tracks
        .into_iter()
        .map(|track| RadioTrack {
            track,
            similarity_score: 0.0,
        })
        .collect()
}

/// Popular tracks outside the seeds, for stations where no criterion matched
async fn popular_fallback(
    stores: &Stores,
    seeds: &HashSet<TrackId>,
    limit: usize,
) -> Result<Vec<RadioTrack>> {
    let query = TrackQuery::new().exclude_ids(seeds);
    let found = stores
        .catalog
        .find_tracks(&query, limit, TrackOrder::PopularityDesc)
        .await?;
    Ok(unscored(found))
}

/// Tracks the listener has already heard
async fn listened(stores: &Stores, user_id: Option<UserId>) -> Result<HashSet<TrackId>> {
    let Some(user_id) = user_id else {
        return Ok(HashSet::new());
    };
    Ok(stores
        .interactions
        .get_interactions(user_id, None)
        .await?
        .into_iter()
        .filter(|i| i.kind == InteractionKind::Listen)
        .map(|i| i.track_id)
        .collect())
}

/// Additive criterion points for one candidate pool
#[derive(Default)]
struct RadioScores {
    scores: HashMap<TrackId, f32>,
    tracks: HashMap<TrackId, Track>,
}

impl RadioScores {
    fn add(&mut self, tracks: Vec<Track>, points: impl Fn(&Track) -> f32) {
        for track in tracks {
            *self.scores.entry(track.id).or_insert(0.0) += points(&track);
            self.tracks.entry(track.id).or_insert(track);
        }
    }

    /// Highest score first; play count then id break ties
    fn ranked(mut self, limit: usize) -> Vec<RadioTrack> {
        let mut ranked: Vec<RadioTrack> = self
            .scores
            .into_iter()
            .filter_map(|(id, score)| {
                self.tracks.remove(&id).map(|track| RadioTrack {
                    track,
                    similarity_score: score,
                })
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.similarity_score
                .partial_cmp(&a.similarity_score)
                .unwrap_or(Ordering::Equal)
                .then_with(|| b.track.play_count.cmp(&a.track.play_count))
                .then_with(|| a.track.id.cmp(&b.track.id))
        });
        ranked.truncate(limit);
        ranked
    }
}

/// Year proximity points, `points · (1 − |Δ|/window)`
fn year_points(seed_year: i32, year: Option<i32>, config: &RadioConfig) -> f32 {
    let Some(year) = year else {
        return 0.0;
    };
    let window = config.year_window.max(1) as f32;
    let diff = (year - seed_year).abs() as f32;
    (config.year_points * (1.0 - diff / window)).max(0.0)
}

/// Station of tracks resembling a seed track
pub struct GenerateTrackRadio;

impl GenerateTrackRadio {
    pub async fn execute(
        track_id: TrackId,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<RadioStation> {
        let start = Instant::now();
        let radio = &config.radio;
        let limit = limit
            .unwrap_or(radio.default_limit)
            .clamp(1, config.wave.max_page_size);

        let seed = stores
            .catalog
            .get_track(track_id)
            .await?
            .ok_or(RecommendationError::TrackNotFound(track_id))?;

        let mut exclude = listened(stores, user_id).await?;
        exclude.insert(seed.id);
        let base = TrackQuery::new().exclude_ids(&exclude);
        let catalog = &stores.catalog;
        let mut scores = RadioScores::default();

        if let Some(genre) = seed.genre.as_deref() {
            let query = base.clone().genre_like([genre]);
            let found = catalog
                .find_tracks(&query, GENRE_FETCH, TrackOrder::PopularityDesc)
                .await?;
            scores.add(found, |_| radio.genre_points);
        }

        let query = base.clone().artist_in([seed.artist.as_str()]);
        let found = catalog
            .find_tracks(&query, ARTIST_FETCH, TrackOrder::PopularityDesc)
            .await?;
        scores.add(found, |_| radio.artist_points);

        if let Some(year) = seed.year {
            let query = base
                .clone()
                .year_range(year - radio.year_window, year + radio.year_window);
            let found = catalog
                .find_tracks(&query, YEAR_FETCH, TrackOrder::PopularityDesc)
                .await?;
            scores.add(found, |t| year_points(year, t.year, radio));
        }

        let query = base.min_play_count(radio.popular_min_plays);
        let found = catalog
            .find_tracks(&query, POPULAR_FETCH, TrackOrder::PopularityDesc)
            .await?;
        scores.add(found, |t| {
            (t.play_count as f32 / 10.0).min(radio.popular_max_points)
        });

        let mut tracks = scores.ranked(limit);
        let fallback = tracks.is_empty();
        if fallback {
            let seeds: HashSet<TrackId> = [seed.id].into_iter().collect();
            tracks = popular_fallback(stores, &seeds, limit).await?;
        }

        info!(
            track_id = %track_id,
            user_id = ?user_id,
            limit = limit,
            returned = tracks.len(),
            fallback = fallback,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served track radio"
        );

        Ok(RadioStation {
            seeds: vec![seed],
            characteristics: None,
            total: tracks.len(),
            tracks,
            fallback,
        })
    }
}

/// Station around several seed tracks
///
/// Candidates share a seed genre (substring match) and lie within `mix_year_window`
/// years of the seeds' average year. Tracks by a seed artist rank first, then by
/// popularity.
pub struct GenerateMixRadio;

impl GenerateMixRadio {
    pub async fn execute(
        seed_ids: &[TrackId],
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<RadioStation> {
        let start = Instant::now();
        let radio = &config.radio;
        if seed_ids.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                "mix radio needs at least one seed track".to_string(),
            ));
        }
        if seed_ids.len() > radio.max_mix_seeds {
            return Err(RecommendationError::InvalidRequest(format!(
                "mix radio takes at most {} seed tracks",
                radio.max_mix_seeds
            )));
        }
        let limit = limit
            .unwrap_or(radio.default_limit)
            .clamp(1, config.wave.max_page_size);

        let seeds = stores.catalog.get_tracks(seed_ids).await?;
        if seeds.is_empty() {
            return Err(RecommendationError::TrackNotFound(seed_ids[0]));
        }
        let characteristics = MixCharacteristics::of(&seeds);
        let seed_artists: Vec<String> = seeds.iter().map(Track::artist_key).collect();
        let seed_set: HashSet<TrackId> = seed_ids.iter().copied().collect();

        let mut exclude = listened(stores, user_id).await?;
        exclude.extend(seed_set.iter().copied());
        let mut query = TrackQuery::new().exclude_ids(&exclude);
        if !characteristics.genres.is_empty() {
            query = query.genre_like(characteristics.genres.iter().cloned());
        }
        if let Some(year) = characteristics.average_year {
            query = query.year_range(year - radio.mix_year_window, year + radio.mix_year_window);
        }
        let found = stores
            .catalog
            .find_tracks(&query, limit * 2, TrackOrder::PopularityDesc)
            .await?;

        let genre_points = if characteristics.genres.is_empty() {
            0.0
        } else {
            radio.genre_points
        };
        let mut scores = RadioScores::default();
        scores.add(found, |t| {
            let artist = t.artist_key();
            let known = seed_artists.iter().any(|a| artist.contains(a.as_str()));
            genre_points + if known { radio.artist_points } else { 0.0 }
        });

        let mut tracks = scores.ranked(limit);
        let fallback = tracks.is_empty();
        if fallback {
            tracks = popular_fallback(stores, &seed_set, limit).await?;
        }

        info!(
            seeds = seeds.len(),
            user_id = ?user_id,
            genres = characteristics.genres.len(),
            average_year = ?characteristics.average_year,
            returned = tracks.len(),
            fallback = fallback,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Served mix radio"
        );

        Ok(RadioStation {
            seeds,
            characteristics: Some(characteristics),
            total: tracks.len(),
            tracks,
            fallback,
        })
    }
}

/// Popular unheard tracks of a genre
pub struct GenerateGenreRadio;

impl GenerateGenreRadio {
    pub async fn execute(
        genre: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<RadioStation> {
        let genre = genre.trim();
        if genre.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                "genre must not be empty".to_string(),
            ));
        }
        let limit = limit
            .unwrap_or(config.radio.default_limit)
            .clamp(1, config.wave.max_page_size);

        let exclude = listened(stores, user_id).await?;
        let query = TrackQuery::new().genre_like([genre]).exclude_ids(&exclude);
        let found = stores
            .catalog
            .find_tracks(&query, limit, TrackOrder::PopularityDesc)
            .await?;

        info!(genre = genre, user_id = ?user_id, returned = found.len(), "Served genre radio");
        Ok(RadioStation::unseeded(unscored(found)))
    }
}

/// Popular unheard tracks whose artist contains the given name
pub struct GenerateArtistRadio;

impl GenerateArtistRadio {
    pub async fn execute(
        artist: &str,
        user_id: Option<UserId>,
        limit: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<RadioStation> {
        let artist = artist.trim();
        if artist.is_empty() {
            return Err(RecommendationError::InvalidRequest(
                "artist must not be empty".to_string(),
            ));
        }
        let limit = limit
            .unwrap_or(config.radio.default_limit)
            .clamp(1, config.wave.max_page_size);

        let exclude = listened(stores, user_id).await?;
        let query = TrackQuery::new().artist_like(artist).exclude_ids(&exclude);
        let found = stores
            .catalog
            .find_tracks(&query, limit, TrackOrder::PopularityDesc)
            .await?;

        info!(artist = artist, user_id = ?user_id, returned = found.len(), "Served artist radio");
        Ok(RadioStation::unseeded(unscored(found)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{record_all, store_with, track};
    use uuid::Uuid;

    #[test]
    fn test_year_points_decay() {
        let config = RadioConfig::default();
        assert_eq!(year_points(2000, Some(2000), &config), 20.0);
        assert!((year_points(2000, Some(2003), &config) - 8.0).abs() < 1e-4);
        assert_eq!(year_points(2000, Some(2005), &config), 0.0);
        assert_eq!(year_points(2000, None, &config), 0.0);
    }

    #[tokio::test]
    async fn test_track_radio_scores_criteria() {
        let seed = track("Muse", "Rock", 10);
        let same_artist_and_genre = track("Muse", "Rock", 0);
        let same_genre = track("Blur", "Rock", 0);
        let mut unrelated = track("Miles", "Jazz", 0);
        unrelated.year = Some(1959);
        let store = store_with([
            seed.clone(),
            same_artist_and_genre.clone(),
            same_genre.clone(),
            unrelated.clone(),
        ]);
        let stores = Stores::shared(store);

        let station = GenerateTrackRadio::execute(
            seed.id,
            None,
            None,
            &stores,
            &RecommendationConfig::default(),
        )
        .await
        .unwrap();

        let ids: Vec<TrackId> = station.tracks.iter().map(|t| t.track.id).collect();
        assert_eq!(ids, vec![same_artist_and_genre.id, same_genre.id]);
        // genre 40 + artist 30 + same year 20
        assert_eq!(station.tracks[0].similarity_score, 90.0);
        assert_eq!(station.tracks[1].similarity_score, 60.0);
        assert!(!station.fallback);
    }

    #[tokio::test]
    async fn test_track_radio_skips_listened_and_falls_back() {
        let mut seed = track("Solo", "Polka", 1);
        seed.year = None;
        let mut heard = track("Solo", "Polka", 1);
        heard.year = None;
        let mut other = track("Other", "Jazz", 2);
        other.year = None;
        let store = store_with([seed.clone(), heard.clone(), other.clone()]);
        let user = Uuid::new_v4();
        record_all(&store, user, &[heard.clone()], InteractionKind::Listen);
        let stores = Stores::shared(store);

        let station = GenerateTrackRadio::execute(
            seed.id,
            Some(user),
            Some(5),
            &stores,
            &RecommendationConfig::default(),
        )
        .await
        .unwrap();

        assert!(station.fallback);
        assert!(station.tracks.iter().all(|t| t.track.id != seed.id));
        assert_eq!(station.tracks.len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_seed_is_not_found() {
        let stores = Stores::shared(store_with([]));
        let result = GenerateTrackRadio::execute(
            Uuid::new_v4(),
            None,
            None,
            &stores,
            &RecommendationConfig::default(),
        )
        .await;
        assert!(matches!(result, Err(RecommendationError::TrackNotFound(_))));
    }

    fn dated(artist: &str, genre: &str, year: i32, plays: i64) -> Track {
        let mut t = track(artist, genre, plays);
        t.year = Some(year);
        t
    }

    #[tokio::test]
    async fn test_mix_radio_blends_seed_genres_around_average_year() {
        let rock_seed = dated("Muse", "Rock", 2000, 10);
        let trip_hop_seed = dated("Massive Attack", "Trip-Hop", 1990, 10);
        let known_artist = dated("Muse", "Alt Rock", 1998, 1);
        let peer = dated("Blur", "Rock", 1996, 500);
        let cousin = dated("Portishead", "Trip-Hop", 1994, 300);
        let too_late = dated("Radiohead", "Rock", 2010, 9_000);
        let off_genre = dated("Miles", "Jazz", 1995, 800);
        let store = store_with([
            rock_seed.clone(),
            trip_hop_seed.clone(),
            known_artist.clone(),
            peer.clone(),
            cousin.clone(),
            too_late,
            off_genre,
        ]);
        let stores = Stores::shared(store);

        let station = GenerateMixRadio::execute(
            &[rock_seed.id, trip_hop_seed.id],
            None,
            None,
            &stores,
            &RecommendationConfig::default(),
        )
        .await
        .unwrap();

        let characteristics = station.characteristics.clone().unwrap();
        assert_eq!(characteristics.genres, vec!["Rock", "Trip-Hop"]);
        assert_eq!(characteristics.average_year, Some(1995));
        assert_eq!(station.seeds.len(), 2);

        let ids: Vec<TrackId> = station.tracks.iter().map(|t| t.track.id).collect();
        assert_eq!(ids, vec![known_artist.id, peer.id, cousin.id]);
        assert_eq!(station.tracks[0].similarity_score, 70.0);
        assert!(!station.fallback);
    }

    #[tokio::test]
    async fn test_mix_radio_rejects_bad_seed_lists() {
        let stores = Stores::shared(store_with([track("A", "Rock", 1)]));
        let config = RecommendationConfig::default();

        let empty = GenerateMixRadio::execute(&[], None, None, &stores, &config).await;
        assert!(matches!(empty, Err(RecommendationError::InvalidRequest(_))));

        let unknown = GenerateMixRadio::execute(&[Uuid::new_v4()], None, None, &stores, &config).await;
        assert!(matches!(unknown, Err(RecommendationError::TrackNotFound(_))));

        let many: Vec<TrackId> = (0..=config.radio.max_mix_seeds).map(|_| Uuid::new_v4()).collect();
        let too_many = GenerateMixRadio::execute(&many, None, None, &stores, &config).await;
        assert!(matches!(too_many, Err(RecommendationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_artist_radio_matches_name_fragment() {
        let heard = track("The Chemical Brothers", "Electronic", 900);
        let hit = track("The Chemical Brothers", "Electronic", 500);
        let deep_cut = track("Chemical Brothers", "Big Beat", 20);
        let other = track("Daft Punk", "Electronic", 1_000);
        let store = store_with([heard.clone(), hit.clone(), deep_cut.clone(), other]);
        let user = Uuid::new_v4();
        record_all(&store, user, &[heard], InteractionKind::Listen);
        let stores = Stores::shared(store);

        let station = GenerateArtistRadio::execute(
            "chemical",
            Some(user),
            None,
            &stores,
            &RecommendationConfig::default(),
        )
        .await
        .unwrap();

        let ids: Vec<TrackId> = station.tracks.iter().map(|t| t.track.id).collect();
        assert_eq!(ids, vec![hit.id, deep_cut.id]);
        assert!(station.seeds.is_empty());

        let blank = GenerateArtistRadio::execute(" ", None, None, &stores, &RecommendationConfig::default()).await;
        assert!(matches!(blank, Err(RecommendationError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_genre_radio_matches_substring() {
        let store = store_with([
            track("A", "Hip-Hop", 5),
            track("B", "hip hop", 9),
            track("C", "Rock", 50),
        ]);
        let stores = Stores::shared(store);

        let station = GenerateGenreRadio::execute(
            "hop",
            None,
            None,
            &stores,
            &RecommendationConfig::default(),
        )
        .await
        .unwrap();

        let artists: Vec<&str> = station.tracks.iter().map(|t| t.track.artist.as_str()).collect();
        assert_eq!(artists, vec!["B", "A"]);
    }
}
