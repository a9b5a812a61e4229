//! Domain types shared by every recommendation stage

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type UserId = Uuid;
pub type TrackId = Uuid;

/// Kind of a recorded interaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Listen,
    Like,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            InteractionKind::Listen => "listen",
            InteractionKind::Like => "like",
        }
    }
}

/// A listen or like event linking a user and a track
///
/// Weights are derived by the consumer, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    pub user_id: UserId,
    pub track_id: TrackId,
    pub kind: InteractionKind,
    pub timestamp: DateTime<Utc>,
}

/// Numeric audio descriptors used by feature similarity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub tempo: f32,
    pub energy: f32,
    pub valence: f32,
    pub danceability: f32,
    pub acousticness: f32,
}

impl AudioFeatures {
    fn components(&self) -> [f32; 5] {
        [
            self.tempo,
            self.energy,
            self.valence,
            self.danceability,
            self.acousticness,
        ]
    }

    /// Euclidean similarity in the 5-dimensional feature space: `1 / (1 + distance)`
    pub fn similarity(&self, other: &AudioFeatures) -> f32 {
        let squared: f32 = self
            .components()
            .iter()
            .zip(other.components().iter())
            .map(|(a, b)| (a - b) * (a - b))
            .sum();

        1.0 / (1.0 + squared.sqrt())
    }

    /// Component-wise mean, `None` for an empty input
    pub fn mean<'a>(features: impl IntoIterator<Item = &'a AudioFeatures>) -> Option<AudioFeatures> {
        let mut sum = [0.0f32; 5];
        let mut count = 0usize;

        for f in features {
            for (acc, value) in sum.iter_mut().zip(f.components()) {
                *acc += value;
            }
            count += 1;
        }

        if count == 0 {
            return None;
        }

        let n = count as f32;
        Some(AudioFeatures {
            tempo: sum[0] / n,
            energy: sum[1] / n,
            valence: sum[2] / n,
            danceability: sum[3] / n,
            acousticness: sum[4] / n,
        })
    }
}

/// Catalog track as seen by the recommendation core
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Track {
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub genre: Option<String>,
    pub year: Option<i32>,
    /// Global play count, the popularity signal
    pub play_count: i64,
    pub likes_count: i64,
    pub created_at: DateTime<Utc>,
    pub mood: Option<String>,
    pub is_instrumental: bool,
    pub audio_features: Option<AudioFeatures>,
}

impl Track {
    /// Case-insensitive artist key
    pub fn artist_key(&self) -> String {
        self.artist.trim().to_lowercase()
    }

    /// Decade bucket of the release year (1987 -> 1980)
    pub fn era(&self) -> Option<i32> {
        self.year.map(|y| y.div_euclid(10) * 10)
    }

    pub fn popularity(&self) -> i64 {
        self.play_count.max(0)
    }
}

/// Candidate pool a track was proposed by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SourceTag {
    Familiar,
    Similar,
    Discovery,
    Trending,
    #[serde(rename = "userCF")]
    UserCf,
    #[serde(rename = "itemCF")]
    ItemCf,
    ContentBased,
    Fallback,
}

impl SourceTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceTag::Familiar => "familiar",
            SourceTag::Similar => "similar",
            SourceTag::Discovery => "discovery",
            SourceTag::Trending => "trending",
            SourceTag::UserCf => "userCF",
            SourceTag::ItemCf => "itemCF",
            SourceTag::ContentBased => "contentBased",
            SourceTag::Fallback => "fallback",
        }
    }
}

/// Track proposed by one or more pools
#[derive(Debug, Clone)]
pub struct Candidate {
    pub track: Track,
    pub sources: BTreeSet<SourceTag>,
    pub raw_score: f32,
}

impl Candidate {
    pub fn new(track: Track, source: SourceTag, raw_score: f32) -> Self {
        let mut sources = BTreeSet::new();
        sources.insert(source);
        Self {
            track,
            sources,
            raw_score,
        }
    }

    pub fn track_id(&self) -> TrackId {
        self.track.id
    }
}

/// Confidence bucket derived from the blended score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn from_score(score: f32) -> Self {
        if score >= 0.8 {
            Confidence::High
        } else if score >= 0.6 {
            Confidence::Medium
        } else {
            Confidence::Low
        }
    }
}

/// Final, ordered recommendation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedTrack {
    pub track_id: TrackId,
    pub track: Track,
    pub blended_score: f32,
    pub confidence: Confidence,
    pub sources: Vec<SourceTag>,
}

impl RankedTrack {
    pub fn new(candidate: Candidate, blended_score: f32) -> Self {
        let blended_score = blended_score.clamp(0.0, 1.0);
        Self {
            track_id: candidate.track.id,
            track: candidate.track,
            blended_score,
            confidence: Confidence::from_score(blended_score),
            sources: candidate.sources.into_iter().collect(),
        }
    }

    pub fn artist_key(&self) -> String {
        self.track.artist_key()
    }
}
