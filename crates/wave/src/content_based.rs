//! Profile-driven candidate pools
//!
//! Familiar, similar and discovery feed the wave; the content-based pool feeds the
//! hybrid blend. All of them read the catalog through `TrackQuery` predicates built
//! from the listener's top genres, artists and eras.

use crate::config::{HybridConfig, WaveConfig};
use crate::profile::UserProfile;
use crate::scoring::in_query_order;
use crate::shuffle::{shuffled, Shuffler};
use crate::store::{StoreResult, Stores, TrackOrder, TrackQuery};
use crate::types::{Candidate, SourceTag, TrackId};
use std::collections::HashSet;
use tracing::debug;

/// Width of the discovery era window past the newest preferred decade
const DISCOVERY_ERA_SPAN: i32 = 10;

/// Tracks by artists the listener already plays
pub struct FamiliarTracks;

impl FamiliarTracks {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        exclude: &HashSet<TrackId>,
        count: usize,
        config: &WaveConfig,
        shuffler: &dyn Shuffler,
    ) -> StoreResult<Vec<Candidate>> {
        if count == 0 || profile.top_artists.is_empty() {
            return Ok(Vec::new());
        }

        let query = TrackQuery::new()
            .artist_in(profile.top_artists.iter().cloned())
            .exclude_ids(exclude);
        let fetched = stores
            .catalog
            .find_tracks(&query, count * config.familiar_overfetch, TrackOrder::PopularityDesc)
            .await?;

        let mut picked = shuffled(shuffler, fetched);
        picked.truncate(count);

        debug!(user_id = %profile.user_id, pool = "familiar", count = picked.len(), "Pool filled");
        Ok(in_query_order(picked, SourceTag::Familiar))
    }
}

/// Known genres by artists the listener does not already play
pub struct SimilarTracks;

impl SimilarTracks {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        exclude: &HashSet<TrackId>,
        count: usize,
        config: &WaveConfig,
    ) -> StoreResult<Vec<Candidate>> {
        if count == 0 || profile.top_genres.is_empty() {
            return Ok(Vec::new());
        }

        let query = TrackQuery::new()
            .genre_in(profile.top_genres.iter().cloned())
            .artist_not_in(profile.top_artists.iter().cloned())
            .exclude_ids(exclude);
        let mut fetched = stores
            .catalog
            .find_tracks(&query, count * config.similar_overfetch, TrackOrder::PopularityDesc)
            .await?;
        fetched.truncate(count);

        debug!(user_id = %profile.user_id, pool = "similar", count = fetched.len(), "Pool filled");
        Ok(in_query_order(fetched, SourceTag::Similar))
    }
}

/// New artists, restricted to the listener's era window when one is known
pub struct DiscoveryTracks;

impl DiscoveryTracks {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        exclude: &HashSet<TrackId>,
        count: usize,
        config: &WaveConfig,
        shuffler: &dyn Shuffler,
    ) -> StoreResult<Vec<Candidate>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let mut query = TrackQuery::new()
            .artist_not_in(profile.top_artists.iter().cloned())
            .exclude_ids(exclude);
        if let Some((min_era, max_era)) = profile.era_span() {
            query = query.year_range(min_era, max_era + DISCOVERY_ERA_SPAN);
        }

        let fetched = stores
            .catalog
            .find_tracks(&query, count * config.discovery_overfetch, TrackOrder::PopularityDesc)
            .await?;

        let mut picked = shuffled(shuffler, fetched);
        picked.truncate(count);

        debug!(user_id = %profile.user_id, pool = "discovery", count = picked.len(), "Pool filled");
        Ok(in_query_order(picked, SourceTag::Discovery))
    }
}

/// Top genres OR top artists, popularity order, for the hybrid blend
pub struct ContentBasedTracks;

impl ContentBasedTracks {
    pub async fn execute(
        profile: &UserProfile,
        stores: &Stores,
        count: usize,
        config: &HybridConfig,
    ) -> StoreResult<Vec<Candidate>> {
        if count == 0 || (profile.top_genres.is_empty() && profile.top_artists.is_empty()) {
            return Ok(Vec::new());
        }

        let exclude = profile.personal_exclusions(&HashSet::new());
        let query = TrackQuery::new()
            .genre_in(profile.top_genres.iter().take(config.content_top_genres).cloned())
            .artist_in(profile.top_artists.iter().take(config.content_top_artists).cloned())
            .any_of()
            .exclude_ids(&exclude);
        let fetched = stores
            .catalog
            .find_tracks(&query, count, TrackOrder::PopularityDesc)
            .await?;

        debug!(user_id = %profile.user_id, pool = "contentBased", count = fetched.len(), "Pool filled");
        Ok(in_query_order(fetched, SourceTag::ContentBased))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shuffle::IdentityShuffler;
    use crate::tests::{store_with, track};

    fn profile(genres: &[&str], artists: &[&str]) -> UserProfile {
        UserProfile {
            top_genres: genres.iter().map(|g| g.to_string()).collect(),
            top_artists: artists.iter().map(|a| a.to_string()).collect(),
            has_sufficient_data: true,
            ..UserProfile::default()
        }
    }

    #[tokio::test]
    async fn test_familiar_uses_known_artists() {
        let store = store_with([
            track("Muse", "Rock", 10),
            track("Muse", "Rock", 9),
            track("Blur", "Rock", 50),
        ]);
        let stores = Stores::shared(store);

        let result = FamiliarTracks::execute(
            &profile(&["rock"], &["muse"]),
            &stores,
            &HashSet::new(),
            5,
            &WaveConfig::default(),
            &IdentityShuffler,
        )
        .await
        .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| c.track.artist == "Muse"));
    }

    #[tokio::test]
    async fn test_similar_excludes_known_artists() {
        let store = store_with([
            track("Muse", "Rock", 10),
            track("Blur", "Rock", 5),
            track("Miles", "Jazz", 50),
        ]);
        let stores = Stores::shared(store);

        let result = SimilarTracks::execute(
            &profile(&["rock"], &["muse"]),
            &stores,
            &HashSet::new(),
            5,
            &WaveConfig::default(),
        )
        .await
        .unwrap();

        let artists: Vec<&str> = result.iter().map(|c| c.track.artist.as_str()).collect();
        assert_eq!(artists, vec!["Blur"]);
    }

    #[tokio::test]
    async fn test_discovery_respects_era_window() {
        let mut old = track("Old", "Rock", 10);
        old.year = Some(1975);
        let mut adjacent = track("Adjacent", "Rock", 10);
        adjacent.year = Some(1999);
        let mut far = track("Far", "Rock", 10);
        far.year = Some(2012);
        let store = store_with([old, adjacent, far]);
        let stores = Stores::shared(store);

        let mut p = profile(&["rock"], &["muse"]);
        p.top_eras = vec![1990];

        let result = DiscoveryTracks::execute(
            &p,
            &stores,
            &HashSet::new(),
            5,
            &WaveConfig::default(),
            &IdentityShuffler,
        )
        .await
        .unwrap();

        let artists: Vec<&str> = result.iter().map(|c| c.track.artist.as_str()).collect();
        assert_eq!(artists, vec!["Adjacent"]);
    }

    #[tokio::test]
    async fn test_discovery_without_eras_is_unrestricted() {
        let store = store_with([track("A", "Rock", 10), track("B", "Jazz", 5)]);
        let stores = Stores::shared(store);

        let result = DiscoveryTracks::execute(
            &profile(&[], &[]),
            &stores,
            &HashSet::new(),
            5,
            &WaveConfig::default(),
            &IdentityShuffler,
        )
        .await
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[tokio::test]
    async fn test_content_based_joins_with_or() {
        let liked = track("Muse", "Rock", 10);
        let store = store_with([
            liked.clone(),
            track("Muse", "Pop", 8),
            track("Blur", "Rock", 5),
            track("Miles", "Jazz", 50),
        ]);
        let stores = Stores::shared(store);

        let mut p = profile(&["rock"], &["muse"]);
        p.interacted.insert(liked.id);

        let result = ContentBasedTracks::execute(&p, &stores, 10, &HybridConfig::default())
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|c| c.track_id() != liked.id));
        assert!(result.iter().all(|c| c.track.artist != "Miles"));
    }
}
