//! Trending Pool
//!
//! Global popularity, independent of any profile. Serves both as a regular wave pool
//! and as the universal fallback for listeners without enough history.

use crate::scoring::in_query_order;
use crate::store::{StoreResult, Stores, TrackOrder, TrackQuery};
use crate::types::{Candidate, SourceTag, Track, TrackId};
use std::collections::HashSet;

/// Most played tracks outside the exclusion set
pub struct FetchTrendingTracks;

impl FetchTrendingTracks {
    pub async fn execute(
        stores: &Stores,
        exclude: &HashSet<TrackId>,
        count: usize,
    ) -> StoreResult<Vec<Track>> {
        if count == 0 {
            return Ok(Vec::new());
        }

        stores
            .catalog
            .find_tracks(
                &TrackQuery::new().exclude_ids(exclude),
                count,
                TrackOrder::PopularityDesc,
            )
            .await
    }

    /// Trending tracks as candidates tagged with `source`
    pub async fn candidates(
        stores: &Stores,
        exclude: &HashSet<TrackId>,
        count: usize,
        source: SourceTag,
    ) -> StoreResult<Vec<Candidate>> {
        let tracks = Self::execute(stores, exclude, count).await?;
        Ok(in_query_order(tracks, source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{store_with, track};

    #[tokio::test]
    async fn test_trending_orders_by_plays_and_excludes() {
        let top = track("A", "Pop", 900);
        let mid = track("B", "Pop", 500);
        let low = track("C", "Pop", 100);
        let store = store_with([top.clone(), mid.clone(), low.clone()]);
        let stores = Stores::shared(store);

        let exclude: HashSet<TrackId> = [top.id].into_iter().collect();
        let result = FetchTrendingTracks::candidates(&stores, &exclude, 5, SourceTag::Trending)
            .await
            .unwrap();

        let ids: Vec<TrackId> = result.iter().map(|c| c.track_id()).collect();
        assert_eq!(ids, vec![mid.id, low.id]);
        assert_eq!(result[0].raw_score, 1.0);
        assert!(result[0].sources.contains(&SourceTag::Trending));
    }

    #[tokio::test]
    async fn test_zero_count_skips_the_store() {
        let store = store_with([track("A", "Pop", 1)]);
        store.set_catalog_unavailable(true);
        let stores = Stores::shared(store);

        let result = FetchTrendingTracks::execute(&stores, &HashSet::new(), 0).await;
        assert!(result.unwrap().is_empty());
    }
}
