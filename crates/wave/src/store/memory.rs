//! In-process store backing tests, demos and local development

use super::{
    InteractionStore, PreferenceStore, StoreResult, TrackCatalog, TrackOrder, TrackQuery,
};
use crate::error::StoreError;
use crate::types::{Interaction, InteractionKind, Track, TrackId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Dashmap-backed implementation of every store contract
///
/// Failure switches let tests simulate an unreachable catalog or interaction store.
#[derive(Default)]
pub struct InMemoryStore {
    tracks: DashMap<TrackId, Track>,
    interactions: DashMap<UserId, Vec<Interaction>>,
    dislikes: DashMap<UserId, HashSet<TrackId>>,
    catalog_down: AtomicBool,
    search_down: AtomicBool,
    interactions_down: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_track(&self, track: Track) {
        self.tracks.insert(track.id, track);
    }

    pub fn insert_tracks(&self, tracks: impl IntoIterator<Item = Track>) {
        for track in tracks {
            self.insert_track(track);
        }
    }

    pub fn record(&self, user_id: UserId, track_id: TrackId, kind: InteractionKind, at: DateTime<Utc>) {
        self.interactions.entry(user_id).or_default().push(Interaction {
            user_id,
            track_id,
            kind,
            timestamp: at,
        });
    }

    pub fn track_count(&self) -> usize {
        self.tracks.len()
    }

    /// Every catalog call fails while set
    pub fn set_catalog_unavailable(&self, down: bool) {
        self.catalog_down.store(down, Ordering::SeqCst);
    }

    /// Only `find_tracks` fails while set; point lookups keep working
    pub fn set_search_unavailable(&self, down: bool) {
        self.search_down.store(down, Ordering::SeqCst);
    }

    pub fn set_interactions_unavailable(&self, down: bool) {
        self.interactions_down.store(down, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> StoreResult<()> {
        if flag.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable(format!("{} store is unreachable", what)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl InteractionStore for InMemoryStore {
    async fn get_interactions(
        &self,
        user_id: UserId,
        since: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Interaction>> {
        Self::check(&self.interactions_down, "interaction")?;

        let mut interactions: Vec<Interaction> = self
            .interactions
            .get(&user_id)
            .map(|list| {
                list.iter()
                    .filter(|i| since.map_or(true, |s| i.timestamp >= s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        interactions.sort_by_key(|i| Reverse(i.timestamp));
        Ok(interactions)
    }

    async fn get_users_with_interaction_count_above(
        &self,
        threshold: usize,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<UserId>> {
        Self::check(&self.interactions_down, "interaction")?;

        let mut users: Vec<UserId> = self
            .interactions
            .iter()
            .filter(|entry| {
                entry.value().iter().filter(|i| i.timestamp >= since).count() >= threshold
            })
            .map(|entry| *entry.key())
            .collect();

        users.sort();
        Ok(users)
    }

    async fn get_track_listeners(&self, track_id: TrackId) -> StoreResult<Vec<UserId>> {
        Self::check(&self.interactions_down, "interaction")?;

        let mut users: Vec<UserId> = self
            .interactions
            .iter()
            .filter(|entry| entry.value().iter().any(|i| i.track_id == track_id))
            .map(|entry| *entry.key())
            .collect();

        users.sort();
        Ok(users)
    }
}

#[async_trait]
impl TrackCatalog for InMemoryStore {
    async fn get_track(&self, track_id: TrackId) -> StoreResult<Option<Track>> {
        Self::check(&self.catalog_down, "catalog")?;
        Ok(self.tracks.get(&track_id).map(|t| t.value().clone()))
    }

    async fn find_tracks(
        &self,
        query: &TrackQuery,
        limit: usize,
        order: TrackOrder,
    ) -> StoreResult<Vec<Track>> {
        Self::check(&self.catalog_down, "catalog")?;
        Self::check(&self.search_down, "catalog search")?;

        let mut matched: Vec<Track> = self
            .tracks
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();

        match order {
            TrackOrder::PopularityDesc => matched.sort_by(|a, b| {
                b.play_count
                    .cmp(&a.play_count)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| a.id.cmp(&b.id))
            }),
            TrackOrder::Newest => matched.sort_by(|a, b| {
                b.created_at
                    .cmp(&a.created_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            TrackOrder::LikesDesc => matched.sort_by(|a, b| {
                b.likes_count
                    .cmp(&a.likes_count)
                    .then_with(|| b.play_count.cmp(&a.play_count))
                    .then_with(|| a.id.cmp(&b.id))
            }),
        }

        matched.truncate(limit);
        Ok(matched)
    }
}

#[async_trait]
impl PreferenceStore for InMemoryStore {
    async fn record_dislike(&self, user_id: UserId, track_id: TrackId) -> StoreResult<()> {
        self.dislikes.entry(user_id).or_default().insert(track_id);
        Ok(())
    }

    async fn get_disliked(&self, user_id: UserId) -> StoreResult<HashSet<TrackId>> {
        Ok(self
            .dislikes
            .get(&user_id)
            .map(|set| set.value().clone())
            .unwrap_or_default())
    }
}
