//! Diversifier / Sequencer
//!
//! Reorders ranked lists so listeners do not hear long runs of one artist. Nothing is
//! ever dropped: tracks that cannot be placed without breaking a constraint are
//! appended in rank order once no better choice is left.

use std::collections::HashMap;

/// Limit consecutive tracks by the same artist
///
/// At each position take the highest-ranked remaining item that keeps the current run
/// within `max_run` and leaves the rest placeable. When the input cannot be arranged at
/// all, the highest-ranked item that fits the run (else the first remaining) is taken.
pub struct ApplyArtistRunLimit;

impl ApplyArtistRunLimit {
    pub fn execute<T>(items: Vec<T>, artist_key: impl Fn(&T) -> String, max_run: usize) -> Vec<T> {
        let max_run = max_run.max(1);
        let mut pending: Vec<(String, T)> = items
            .into_iter()
            .map(|item| (artist_key(&item), item))
            .collect();
        let mut remaining: HashMap<String, usize> = HashMap::new();
        for (artist, _) in &pending {
            *remaining.entry(artist.clone()).or_insert(0) += 1;
        }

        let mut output: Vec<T> = Vec::with_capacity(pending.len());
        let mut run_artist: Option<String> = None;
        let mut run_length = 0usize;

        while !pending.is_empty() {
            let run_after = |artist: &str| {
                if run_artist.as_deref() == Some(artist) {
                    run_length + 1
                } else {
                    1
                }
            };
            let fits = |artist: &str| run_after(artist) <= max_run;

            let index = pending
                .iter()
                .position(|(artist, _)| {
                    fits(artist.as_str())
                        && remainder_placeable(&remaining, artist, run_after(artist.as_str()), max_run)
                })
                .or_else(|| pending.iter().position(|(artist, _)| fits(artist.as_str())))
                .unwrap_or(0);
            let (artist, item) = pending.remove(index);

            if let Some(count) = remaining.get_mut(&artist) {
                *count -= 1;
            }
            if run_artist.as_deref() == Some(artist.as_str()) {
                run_length += 1;
            } else {
                run_artist = Some(artist);
                run_length = 1;
            }
            output.push(item);
        }

        output
    }
}

/// Whether the items left after placing one of `placed` can still be ordered
///
/// `count` items of one artist among `total` fit iff `count <= max_run * (others + 1)`.
/// The artist just placed has already used `run` of its first slot.
fn remainder_placeable(
    remaining: &HashMap<String, usize>,
    placed: &str,
    run: usize,
    max_run: usize,
) -> bool {
    let total: usize = remaining.values().sum::<usize>().saturating_sub(1);
    remaining.iter().all(|(artist, &count)| {
        let count = if artist == placed { count.saturating_sub(1) } else { count };
        if count == 0 {
            return true;
        }
        let others = total.saturating_sub(count);
        let room = if artist == placed {
            max_run.saturating_sub(run) + max_run * others
        } else {
            max_run * (others + 1)
        };
        count <= room
    })
}

/// Cap how many tracks share a genre or an artist
///
/// First pass accepts items in rank order while both caps hold. Rejected items then
/// fill the remaining slots in rank order. The result holds at most `limit` items.
pub struct ApplyCategoryCaps;

impl ApplyCategoryCaps {
    pub fn execute<T>(
        items: Vec<T>,
        genre_key: impl Fn(&T) -> Option<String>,
        artist_key: impl Fn(&T) -> String,
        genre_cap: usize,
        artist_cap: usize,
        limit: usize,
    ) -> Vec<T> {
        let mut genre_counts: HashMap<String, usize> = HashMap::new();
        let mut artist_counts: HashMap<String, usize> = HashMap::new();
        let mut accepted = Vec::with_capacity(limit.min(items.len()));
        let mut deferred = Vec::new();

        for item in items {
            if accepted.len() >= limit {
                deferred.push(item);
                continue;
            }

            let genre = genre_key(&item);
            let artist = artist_key(&item);
            let genre_ok = genre
                .as_ref()
                .map_or(true, |g| genre_counts.get(g).copied().unwrap_or(0) < genre_cap);
            let artist_ok = artist_counts.get(&artist).copied().unwrap_or(0) < artist_cap;

            if genre_ok && artist_ok {
                if let Some(g) = genre {
                    *genre_counts.entry(g).or_insert(0) += 1;
                }
                *artist_counts.entry(artist).or_insert(0) += 1;
                accepted.push(item);
            } else {
                deferred.push(item);
            }
        }

        let room = limit.saturating_sub(accepted.len());
        accepted.extend(deferred.into_iter().take(room));
        accepted
    }
}
