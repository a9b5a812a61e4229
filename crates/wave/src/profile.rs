//! User Preference Profile
//!
//! Aggregates a listener's recent listens and likes into ordered genre, artist and era
//! preferences plus the track sets every downstream stage excludes.

use crate::config::{CollaborativeConfig, ProfileConfig};
use crate::error::Result;
use crate::store::Stores;
use crate::types::{Interaction, InteractionKind, Track, TrackId, UserId};
use chrono::{DateTime, Duration, Utc};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tracing::{debug, warn};

/// Derived, per-request preference summary of one user
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub user_id: UserId,
    /// Lowercased genres, strongest first
    pub top_genres: Vec<String>,
    /// Lowercased artist keys, strongest first
    pub top_artists: Vec<String>,
    /// Decade buckets, strongest first
    pub top_eras: Vec<i32>,
    /// Every track the user listened to or liked
    pub interacted: HashSet<TrackId>,
    /// Interaction weight per track for collaborative filtering
    pub interaction_weights: HashMap<TrackId, f32>,
    /// Distinct interacted tracks, newest first
    pub recent_track_ids: Vec<TrackId>,
    pub disliked: HashSet<TrackId>,
    pub listen_count: usize,
    pub like_count: usize,
    pub has_sufficient_data: bool,
}

impl UserProfile {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::default()
        }
    }

    /// Ids a personalised pool must never return
    pub fn personal_exclusions(&self, supplied: &HashSet<TrackId>) -> HashSet<TrackId> {
        supplied
            .iter()
            .chain(self.interacted.iter())
            .chain(self.disliked.iter())
            .copied()
            .collect()
    }

    /// (min era, max era) over the top eras
    pub fn era_span(&self) -> Option<(i32, i32)> {
        let min = self.top_eras.iter().min()?;
        let max = self.top_eras.iter().max()?;
        Some((*min, *max))
    }
}

/// Weighted tally with most-recent-interaction tie-breaking
#[derive(Debug, Default)]
struct Tally<K> {
    entries: HashMap<K, (f32, DateTime<Utc>)>,
}

impl<K: std::hash::Hash + Eq + Ord + Clone> Tally<K> {
    fn add(&mut self, key: K, weight: f32, at: DateTime<Utc>) {
        let entry = self.entries.entry(key).or_insert((0.0, at));
        entry.0 += weight;
        if at > entry.1 {
            entry.1 = at;
        }
    }

    fn top(self, n: usize) -> Vec<K> {
        let mut ranked: Vec<(K, (f32, DateTime<Utc>))> = self.entries.into_iter().collect();
        ranked.sort_by(|(ka, (wa, ta)), (kb, (wb, tb))| {
            wb.partial_cmp(wa)
                .unwrap_or(Ordering::Equal)
                .then_with(|| tb.cmp(ta))
                .then_with(|| ka.cmp(kb))
        });
        ranked.into_iter().take(n).map(|(k, _)| k).collect()
    }
}

/// Per-track collaborative weight: a listen counts once, a like adds on top
pub fn interaction_weights(
    history: &[Interaction],
    config: &CollaborativeConfig,
) -> HashMap<TrackId, f32> {
    let mut listened: HashSet<TrackId> = HashSet::new();
    let mut liked: HashSet<TrackId> = HashSet::new();
    let mut weights: HashMap<TrackId, f32> = HashMap::new();

    for interaction in history {
        let (first, weight) = match interaction.kind {
            InteractionKind::Listen => (listened.insert(interaction.track_id), config.listen_weight),
            InteractionKind::Like => (liked.insert(interaction.track_id), config.like_weight),
        };
        if first {
            *weights.entry(interaction.track_id).or_insert(0.0) += weight;
        }
    }

    weights
}

/// Builds a `UserProfile` from the interaction store
pub struct BuildUserProfile;

impl BuildUserProfile {
    /// Profile over the configured listen lookback window
    pub async fn execute(
        user_id: UserId,
        stores: &Stores,
        profile: &ProfileConfig,
        collaborative: &CollaborativeConfig,
    ) -> Result<UserProfile> {
        Self::execute_within(
            user_id,
            stores,
            profile,
            collaborative,
            profile.listen_lookback_days,
        )
        .await
    }

    /// Profile over an explicit listen lookback window in days
    ///
    /// Interaction or catalog failures surface as `UpstreamStoreFailure`; without them
    /// nothing can be personalised. A failing preference store only loses dislikes.
    pub async fn execute_within(
        user_id: UserId,
        stores: &Stores,
        profile: &ProfileConfig,
        collaborative: &CollaborativeConfig,
        lookback_days: i64,
    ) -> Result<UserProfile> {
        let start = Instant::now();
        let since = Utc::now() - Duration::days(lookback_days);

        let history = stores.interactions.get_interactions(user_id, None).await?;

        let listens: Vec<&Interaction> = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Listen && i.timestamp >= since)
            .take(profile.listen_limit)
            .collect();
        let likes: Vec<&Interaction> = history
            .iter()
            .filter(|i| i.kind == InteractionKind::Like)
            .take(profile.like_limit)
            .collect();

        let mut ids: Vec<TrackId> = listens.iter().chain(likes.iter()).map(|i| i.track_id).collect();
        ids.sort();
        ids.dedup();
        let tracks = stores.catalog.get_tracks(&ids).await?;

        let disliked = match stores.preferences.get_disliked(user_id).await {
            Ok(disliked) => disliked,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "Dislikes unavailable, continuing without them");
                HashSet::new()
            }
        };

        let mut result = Self::aggregate(
            user_id,
            &history,
            &listens,
            &likes,
            &tracks,
            profile,
            collaborative,
        );
        result.disliked = disliked;

        debug!(
            user_id = %user_id,
            listens = result.listen_count,
            likes = result.like_count,
            genres = result.top_genres.len(),
            artists = result.top_artists.len(),
            sufficient = result.has_sufficient_data,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Built user profile"
        );

        Ok(result)
    }

    /// Pure aggregation over already-loaded interactions and tracks
    ///
    /// `history` is the full interaction list (newest first) and drives the exclusion
    /// and collaborative sets; `listens` and `likes` are the windowed subsets feeding
    /// the preference tables.
    pub fn aggregate(
        user_id: UserId,
        history: &[Interaction],
        listens: &[&Interaction],
        likes: &[&Interaction],
        tracks: &[Track],
        profile: &ProfileConfig,
        collaborative: &CollaborativeConfig,
    ) -> UserProfile {
        let by_id: HashMap<TrackId, &Track> = tracks.iter().map(|t| (t.id, t)).collect();

        let mut genres: Tally<String> = Tally::default();
        let mut artists: Tally<String> = Tally::default();
        let mut eras: Tally<i32> = Tally::default();

        let weighted = listens
            .iter()
            .map(|i| (*i, profile.listen_weight))
            .chain(likes.iter().map(|i| (*i, profile.like_weight)));

        for (interaction, weight) in weighted {
            let Some(track) = by_id.get(&interaction.track_id) else {
                continue;
            };
            if let Some(genre) = track.genre.as_deref().map(str::trim).filter(|g| !g.is_empty()) {
                genres.add(genre.to_lowercase(), weight, interaction.timestamp);
            }
            artists.add(track.artist_key(), weight, interaction.timestamp);
            if let Some(era) = track.era() {
                eras.add(era, weight, interaction.timestamp);
            }
        }

        let mut recent_track_ids = Vec::new();
        let mut interacted = HashSet::new();
        for interaction in history {
            if interacted.insert(interaction.track_id) {
                recent_track_ids.push(interaction.track_id);
            }
        }

        let listen_count = listens.len();
        let like_count = likes.len();
        let has_sufficient_data =
            !(listen_count < profile.min_listens && like_count < profile.min_likes);

        UserProfile {
            user_id,
            top_genres: genres.top(profile.top_genres),
            top_artists: artists.top(profile.top_artists),
            top_eras: eras.top(profile.top_eras),
            interacted,
            interaction_weights: interaction_weights(history, collaborative),
            recent_track_ids,
            disliked: HashSet::new(),
            listen_count,
            like_count,
            has_sufficient_data,
        }
    }
}
