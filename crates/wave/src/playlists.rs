//! Personal Playlists
//!
//! Daily, premiere, stash and charts playlists built from the same catalog queries as
//! the wave. Each playlist is a list of sections filled in order; later sections never
//! repeat a track picked by an earlier one. Persisting a playlist is the caller's job.

use crate::config::{PlaylistConfig, RecommendationConfig};
use crate::error::{RecommendationError, Result};
use crate::profile::{BuildUserProfile, UserProfile};
use crate::shuffle::{shuffled, IdentityShuffler, Shuffler};
use crate::store::{Stores, TrackOrder, TrackQuery};
use crate::types::{InteractionKind, Track, TrackId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Instant;
use tracing::info;

const DAILY_GENRE_SHARE: f32 = 0.7;
const DAILY_ARTIST_SHARE: f32 = 0.2;
const PREMIERE_TASTE_SHARE: f32 = 0.8;
const STASH_GEM_SHARE: f32 = 0.6;
const STASH_ARTIST_SHARE: f32 = 0.4;
const CHARTS_PLAYS_SHARE: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaylistKind {
    Daily,
    Premiere,
    Stash,
    Charts,
}

impl PlaylistKind {
    pub const ALL: [PlaylistKind; 4] = [
        PlaylistKind::Daily,
        PlaylistKind::Premiere,
        PlaylistKind::Stash,
        PlaylistKind::Charts,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PlaylistKind::Daily => "daily",
            PlaylistKind::Premiere => "premiere",
            PlaylistKind::Stash => "stash",
            PlaylistKind::Charts => "charts",
        }
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(raw.trim()))
            .ok_or_else(|| RecommendationError::InvalidRequest(format!("unknown playlist type: {}", raw)))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PlaylistKind::Daily => "Playlist of the Day",
            PlaylistKind::Premiere => "Premieres",
            PlaylistKind::Stash => "Stash",
            PlaylistKind::Charts => "Charts",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PlaylistKind::Daily => "A personal selection based on your taste",
            PlaylistKind::Premiere => "Fresh releases that match your taste",
            PlaylistKind::Stash => "Hidden gems picked for you",
            PlaylistKind::Charts => "The most popular tracks right now",
        }
    }

    pub fn algorithm(&self) -> &'static str {
        match self {
            PlaylistKind::Daily => "preference-based",
            PlaylistKind::Premiere => "new-releases",
            PlaylistKind::Stash => "hidden-gems",
            PlaylistKind::Charts => "charts",
        }
    }

    fn default_size(&self, config: &PlaylistConfig) -> usize {
        match self {
            PlaylistKind::Daily => config.daily_size,
            PlaylistKind::Premiere => config.premiere_size,
            PlaylistKind::Stash => config.stash_size,
            PlaylistKind::Charts => config.charts_size,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonalPlaylist {
    #[serde(rename = "type")]
    pub kind: PlaylistKind,
    pub name: &'static str,
    pub description: &'static str,
    pub algorithm: &'static str,
    pub tracks: Vec<Track>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
    /// When a stored copy should be regenerated
    pub expires_at: DateTime<Utc>,
}

impl PersonalPlaylist {
    fn assemble(kind: PlaylistKind, tracks: Vec<Track>, config: &PlaylistConfig) -> Self {
        let generated_at = Utc::now();
        Self {
            kind,
            name: kind.name(),
            description: kind.description(),
            algorithm: kind.algorithm(),
            total: tracks.len(),
            tracks,
            generated_at,
            expires_at: generated_at + Duration::hours(config.expiry_hours),
        }
    }

    pub fn track_ids(&self) -> Vec<TrackId> {
        self.tracks.iter().map(|t| t.id).collect()
    }
}

fn share(size: usize, fraction: f32) -> usize {
    (size as f32 * fraction).floor() as usize
}

fn resolve_size(kind: PlaylistKind, size: Option<usize>, config: &RecommendationConfig) -> usize {
    size.unwrap_or_else(|| kind.default_size(&config.playlists))
        .clamp(1, config.wave.max_page_size)
}

fn taste_query(profile: &UserProfile) -> Option<TrackQuery> {
    if profile.top_genres.is_empty() && profile.top_artists.is_empty() {
        return None;
    }
    Some(
        TrackQuery::new()
            .genre_in(profile.top_genres.iter().cloned())
            .artist_in(profile.top_artists.iter().cloned())
            .any_of(),
    )
}

async fn listened_since(
    stores: &Stores,
    user_id: UserId,
    since: Option<DateTime<Utc>>,
) -> Result<HashSet<TrackId>> {
    Ok(stores
        .interactions
        .get_interactions(user_id, since)
        .await?
        .into_iter()
        .filter(|i| i.kind == InteractionKind::Listen)
        .map(|i| i.track_id)
        .collect())
}

/// Ordered playlist sections
struct Sections<'a> {
    stores: &'a Stores,
    shuffler: &'a dyn Shuffler,
    fetch_multiplier: usize,
    exclude: HashSet<TrackId>,
    tracks: Vec<Track>,
}

impl<'a> Sections<'a> {
    fn new(
        stores: &'a Stores,
        shuffler: &'a dyn Shuffler,
        config: &PlaylistConfig,
        exclude: HashSet<TrackId>,
    ) -> Self {
        Self {
            stores,
            shuffler,
            fetch_multiplier: config.fetch_multiplier.max(1),
            exclude,
            tracks: Vec::new(),
        }
    }

    /// Up to `count` matches drawn at random from a popularity-ordered pool
    async fn add_shuffled(&mut self, query: TrackQuery, count: usize) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let query = query.exclude_ids(&self.exclude);
        let pool = self
            .stores
            .catalog
            .find_tracks(&query, count * self.fetch_multiplier, TrackOrder::PopularityDesc)
            .await?;
        let picked = shuffled(self.shuffler, pool);
        self.push(picked, count);
        Ok(())
    }

    /// Up to `count` matches in `order`
    async fn add_ordered(&mut self, query: TrackQuery, count: usize, order: TrackOrder) -> Result<()> {
        if count == 0 {
            return Ok(());
        }
        let query = query.exclude_ids(&self.exclude);
        let found = self.stores.catalog.find_tracks(&query, count, order).await?;
        self.push(found, count);
        Ok(())
    }

    fn push(&mut self, tracks: Vec<Track>, count: usize) {
        for track in tracks.into_iter().take(count) {
            if self.exclude.insert(track.id) {
                self.tracks.push(track);
            }
        }
    }

    fn remaining(&self, size: usize) -> usize {
        size.saturating_sub(self.tracks.len())
    }

    fn into_tracks(self) -> Vec<Track> {
        self.tracks
    }
}

fn log_served(
    kind: PlaylistKind,
    user_id: Option<UserId>,
    size: usize,
    playlist: &PersonalPlaylist,
    start: Instant,
) {
    info!(
        playlist = kind.as_str(),
        user_id = ?user_id,
        size = size,
        returned = playlist.total,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Generated personal playlist"
    );
}

/// 70% favourite genres, 20% favourite artists, the rest anything unheard
///
/// Listens from the last `daily_skip_days` days and dislikes are skipped. The random
/// section also takes up slots the taste sections could not fill.
pub struct GenerateDailyPlaylist;

impl GenerateDailyPlaylist {
    pub async fn execute(
        user_id: UserId,
        size: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<PersonalPlaylist> {
        let start = Instant::now();
        let kind = PlaylistKind::Daily;
        let size = resolve_size(kind, size, config);
        let settings = &config.playlists;

        let profile =
            BuildUserProfile::execute(user_id, stores, &config.profile, &config.collaborative).await?;
        let since = Utc::now() - Duration::days(settings.daily_skip_days);
        let mut exclude = listened_since(stores, user_id, Some(since)).await?;
        exclude.extend(profile.disliked.iter().copied());

        let mut sections = Sections::new(stores, shuffler, settings, exclude);
        if !profile.top_genres.is_empty() {
            let query = TrackQuery::new().genre_in(profile.top_genres.iter().cloned());
            sections.add_shuffled(query, share(size, DAILY_GENRE_SHARE)).await?;
        }
        if !profile.top_artists.is_empty() {
            let query = TrackQuery::new().artist_in(profile.top_artists.iter().cloned());
            sections.add_shuffled(query, share(size, DAILY_ARTIST_SHARE)).await?;
        }
        let rest = sections.remaining(size);
        sections.add_shuffled(TrackQuery::new(), rest).await?;

        let playlist = PersonalPlaylist::assemble(kind, sections.into_tracks(), settings);
        log_served(kind, Some(user_id), size, &playlist, start);
        Ok(playlist)
    }
}

/// Newest releases, 80% matching the listener's genres or artists
pub struct GeneratePremierePlaylist;

impl GeneratePremierePlaylist {
    pub async fn execute(
        user_id: UserId,
        size: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<PersonalPlaylist> {
        let start = Instant::now();
        let kind = PlaylistKind::Premiere;
        let size = resolve_size(kind, size, config);
        let settings = &config.playlists;

        let profile =
            BuildUserProfile::execute(user_id, stores, &config.profile, &config.collaborative).await?;
        let since = Utc::now() - Duration::days(settings.new_release_days);

        let mut sections =
            Sections::new(stores, &IdentityShuffler, settings, profile.disliked.clone());
        if let Some(taste) = taste_query(&profile) {
            let query = taste.added_since(since);
            sections
                .add_ordered(query, share(size, PREMIERE_TASTE_SHARE), TrackOrder::Newest)
                .await?;
        }
        let rest = sections.remaining(size);
        sections
            .add_ordered(TrackQuery::new().added_since(since), rest, TrackOrder::Newest)
            .await?;

        let playlist = PersonalPlaylist::assemble(kind, sections.into_tracks(), settings);
        log_served(kind, Some(user_id), size, &playlist, start);
        Ok(playlist)
    }
}

/// Rarely played tracks of favourite genres, then favourite artists, all unheard
pub struct GenerateStashPlaylist;

impl GenerateStashPlaylist {
    pub async fn execute(
        user_id: UserId,
        size: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<PersonalPlaylist> {
        let start = Instant::now();
        let kind = PlaylistKind::Stash;
        let size = resolve_size(kind, size, config);
        let settings = &config.playlists;

        let profile =
            BuildUserProfile::execute(user_id, stores, &config.profile, &config.collaborative).await?;
        let mut exclude = listened_since(stores, user_id, None).await?;
        exclude.extend(profile.disliked.iter().copied());

        let mut sections = Sections::new(stores, shuffler, settings, exclude);
        if !profile.top_genres.is_empty() {
            let query = TrackQuery::new()
                .genre_in(profile.top_genres.iter().cloned())
                .max_play_count(settings.hidden_gem_max_plays);
            sections.add_shuffled(query, share(size, STASH_GEM_SHARE)).await?;
        }
        if !profile.top_artists.is_empty() {
            let query = TrackQuery::new().artist_in(profile.top_artists.iter().cloned());
            sections.add_shuffled(query, share(size, STASH_ARTIST_SHARE)).await?;
        }

        let playlist = PersonalPlaylist::assemble(kind, sections.into_tracks(), settings);
        log_served(kind, Some(user_id), size, &playlist, start);
        Ok(playlist)
    }
}

/// 70% most played, the rest most liked; the same for every listener
pub struct GenerateChartsPlaylist;

impl GenerateChartsPlaylist {
    pub async fn execute(
        size: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
    ) -> Result<PersonalPlaylist> {
        let start = Instant::now();
        let kind = PlaylistKind::Charts;
        let size = resolve_size(kind, size, config);
        let settings = &config.playlists;

        let mut sections = Sections::new(stores, &IdentityShuffler, settings, HashSet::new());
        sections
            .add_ordered(TrackQuery::new(), share(size, CHARTS_PLAYS_SHARE), TrackOrder::PopularityDesc)
            .await?;
        let rest = sections.remaining(size);
        sections
            .add_ordered(TrackQuery::new(), rest, TrackOrder::LikesDesc)
            .await?;

        let playlist = PersonalPlaylist::assemble(kind, sections.into_tracks(), settings);
        log_served(kind, None, size, &playlist, start);
        Ok(playlist)
    }
}

/// Dispatch by playlist kind; every kind except charts needs a listener
pub struct GeneratePlaylist;

impl GeneratePlaylist {
    pub async fn execute(
        kind: PlaylistKind,
        user_id: Option<UserId>,
        size: Option<usize>,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<PersonalPlaylist> {
        match (kind, user_id) {
            (PlaylistKind::Charts, _) => GenerateChartsPlaylist::execute(size, stores, config).await,
            (_, None) => Err(RecommendationError::InvalidRequest(format!(
                "{} playlist needs a listener",
                kind.as_str()
            ))),
            (PlaylistKind::Daily, Some(user_id)) => {
                GenerateDailyPlaylist::execute(user_id, size, stores, config, shuffler).await
            }
            (PlaylistKind::Premiere, Some(user_id)) => {
                GeneratePremierePlaylist::execute(user_id, size, stores, config).await
            }
            (PlaylistKind::Stash, Some(user_id)) => {
                GenerateStashPlaylist::execute(user_id, size, stores, config, shuffler).await
            }
        }
    }

    /// All four playlists at their default sizes, generated concurrently
    pub async fn all(
        user_id: UserId,
        stores: &Stores,
        config: &RecommendationConfig,
        shuffler: &dyn Shuffler,
    ) -> Result<Vec<PersonalPlaylist>> {
        let (daily, premiere, stash, charts) = tokio::try_join!(
            GenerateDailyPlaylist::execute(user_id, None, stores, config, shuffler),
            GeneratePremierePlaylist::execute(user_id, None, stores, config),
            GenerateStashPlaylist::execute(user_id, None, stores, config, shuffler),
            GenerateChartsPlaylist::execute(None, stores, config),
        )?;
        Ok(vec![daily, premiere, stash, charts])
    }
}
