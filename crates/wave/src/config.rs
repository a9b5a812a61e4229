//! Algorithm tuning for the recommendation core
//!
//! Every weight and threshold the pipeline uses lives here with its default. Values can
//! be overridden from `config/wave.{toml,yaml,json}` or `WAVE__<SECTION>__<FIELD>`
//! environment variables (e.g. `WAVE__WAVE__MAX_PAGE_SIZE=50`).

use serde::Deserialize;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecommendationConfig {
    pub profile: ProfileConfig,
    pub similarity: SimilarityConfig,
    pub collaborative: CollaborativeConfig,
    pub wave: WaveConfig,
    pub hybrid: HybridConfig,
    pub smart: SmartConfig,
    pub mixes: MixConfig,
    pub radio: RadioConfig,
    pub playlists: PlaylistConfig,
}

/// Profile builder settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    /// Listen lookback window in days (default: 90)
    pub listen_lookback_days: i64,
    /// Most recent listens considered (default: 500)
    pub listen_limit: usize,
    /// Most recent likes considered, likes have no time window (default: 100)
    pub like_limit: usize,
    /// Weight of a like in genre/artist/era tables (default: 3.0)
    pub like_weight: f32,
    /// Weight of a listen in genre/artist/era tables (default: 1.0)
    pub listen_weight: f32,
    /// Profile is insufficient below this many listens... (default: 5)
    pub min_listens: usize,
    /// ...and this many likes (default: 3)
    pub min_likes: usize,
    pub top_genres: usize,
    pub top_artists: usize,
    pub top_eras: usize,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            listen_lookback_days: 90,
            listen_limit: 500,
            like_limit: 100,
            like_weight: 3.0,
            listen_weight: 1.0,
            min_listens: 5,
            min_likes: 3,
            top_genres: 10,
            top_artists: 20,
            top_eras: 3,
        }
    }
}

/// Similarity engine settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// Window in which neighbour candidates must be active (default: 30 days)
    pub active_window_days: i64,
    /// Minimum interactions for a neighbour candidate (default: 5)
    pub min_user_interactions: usize,
    /// Similarities at or below this are noise (default: 0.1)
    pub min_similarity: f32,
    /// Neighbours retained (default: 10)
    pub max_neighbors: usize,
    /// Interactions loaded per neighbour (default: 100)
    pub neighbor_history_limit: usize,
    /// Minimum co-occurrence count for item-item results (default: 2)
    pub min_co_occurrence: usize,
    /// Seed tracks with fewer listeners have no co-occurrence signal (default: 2)
    pub min_listeners: usize,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            active_window_days: 30,
            min_user_interactions: 5,
            min_similarity: 0.1,
            max_neighbors: 10,
            neighbor_history_limit: 100,
            min_co_occurrence: 2,
            min_listeners: 2,
        }
    }
}

/// Collaborative filtering settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CollaborativeConfig {
    /// Interaction weight of a listen (default: 1.0)
    pub listen_weight: f32,
    /// Added on top of the listen weight for a liked track (default: 2.0)
    pub like_weight: f32,
    /// User-CF needs at least this many interacted tracks (default: 3)
    pub min_history: usize,
    /// Most recent tracks used as item-CF seeds (default: 5)
    pub item_seed_count: usize,
    /// Item-CF results kept per seed (default: 5)
    pub per_seed_limit: usize,
}

impl Default for CollaborativeConfig {
    fn default() -> Self {
        Self {
            listen_weight: 1.0,
            like_weight: 2.0,
            min_history: 3,
            item_seed_count: 5,
            per_seed_limit: 5,
        }
    }
}

/// Wave page composition
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WaveConfig {
    pub familiar_share: f32,
    pub similar_share: f32,
    pub discovery_share: f32,
    pub familiar_overfetch: usize,
    pub similar_overfetch: usize,
    pub discovery_overfetch: usize,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Longest allowed run of one artist (default: 2)
    pub max_artist_run: usize,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            familiar_share: 0.3,
            similar_share: 0.4,
            discovery_share: 0.2,
            familiar_overfetch: 2,
            similar_overfetch: 2,
            discovery_overfetch: 3,
            default_page_size: 20,
            max_page_size: 100,
            max_artist_run: 2,
        }
    }
}

/// Hybrid surface settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HybridConfig {
    pub user_cf_share: f32,
    pub content_share: f32,
    pub user_cf_points: f32,
    pub item_cf_points: f32,
    pub content_points: f32,
    pub content_top_genres: usize,
    pub content_top_artists: usize,
    pub default_limit: usize,
}

impl Default for HybridConfig {
    fn default() -> Self {
        Self {
            user_cf_share: 0.4,
            content_share: 0.3,
            user_cf_points: 40.0,
            item_cf_points: 30.0,
            content_points: 30.0,
            content_top_genres: 3,
            content_top_artists: 5,
            default_limit: 20,
        }
    }
}

impl HybridConfig {
    pub fn max_points(&self) -> f32 {
        self.user_cf_points + self.item_cf_points + self.content_points
    }
}

/// Multi-factor smart recommendation scoring
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmartConfig {
    pub genre_weight: f32,
    pub mood_weight: f32,
    pub audio_weight: f32,
    pub popularity_weight: f32,
    pub recency_weight: f32,
    /// Candidates scoring below this are dropped (default: 0.4)
    pub min_score: f32,
    pub like_limit: usize,
    pub candidate_multiplier: usize,
    pub genre_cap: usize,
    pub artist_cap: usize,
    pub default_limit: usize,
    pub similar_default_limit: usize,
    pub mood_default_limit: usize,
}

impl Default for SmartConfig {
    fn default() -> Self {
        Self {
            genre_weight: 0.25,
            mood_weight: 0.20,
            audio_weight: 0.25,
            popularity_weight: 0.10,
            recency_weight: 0.05,
            min_score: 0.4,
            like_limit: 50,
            candidate_multiplier: 3,
            genre_cap: 3,
            artist_cap: 2,
            default_limit: 20,
            similar_default_limit: 10,
            mood_default_limit: 20,
        }
    }
}

/// Context mix settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MixConfig {
    pub fetch_multiplier: usize,
    /// Score bonus for tracks matching the listener's recent taste (default: 10)
    pub personal_boost: f32,
    pub personal_window_days: i64,
    pub personal_pool_size: usize,
    /// Leading share of the mix kept in rank order (default: 0.2)
    pub keep_top_fraction: f32,
    pub default_limit: usize,
}

impl Default for MixConfig {
    fn default() -> Self {
        Self {
            fetch_multiplier: 2,
            personal_boost: 10.0,
            personal_window_days: 30,
            personal_pool_size: 20,
            keep_top_fraction: 0.2,
            default_limit: 50,
        }
    }
}

/// Radio settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RadioConfig {
    pub genre_points: f32,
    pub artist_points: f32,
    pub year_points: f32,
    pub year_window: i32,
    pub popular_min_plays: i64,
    pub popular_max_points: f32,
    /// Years either side of the seeds' average year for mix radio (default: 10)
    pub mix_year_window: i32,
    pub max_mix_seeds: usize,
    pub default_limit: usize,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            genre_points: 40.0,
            artist_points: 30.0,
            year_points: 20.0,
            year_window: 5,
            popular_min_plays: 5,
            popular_max_points: 10.0,
            mix_year_window: 10,
            max_mix_seeds: 25,
            default_limit: 50,
        }
    }
}

/// Personal playlist settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaylistConfig {
    pub daily_size: usize,
    pub premiere_size: usize,
    pub stash_size: usize,
    pub charts_size: usize,
    /// Listens this recent are kept out of the daily playlist (default: 7 days)
    pub daily_skip_days: i64,
    /// Tracks added within this window count as new releases (default: 30 days)
    pub new_release_days: i64,
    /// Hidden gems have fewer plays than this (default: 50)
    pub hidden_gem_max_plays: i64,
    /// Pool size per share, as a multiple of the share, before shuffling (default: 3)
    pub fetch_multiplier: usize,
    pub expiry_hours: i64,
}

impl Default for PlaylistConfig {
    fn default() -> Self {
        Self {
            daily_size: 30,
            premiere_size: 20,
            stash_size: 25,
            charts_size: 50,
            daily_skip_days: 7,
            new_release_days: 30,
            hidden_gem_max_plays: 50,
            fetch_multiplier: 3,
            expiry_hours: 24,
        }
    }
}

impl RecommendationConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("config/wave").required(false))
            .add_source(config::Environment::with_prefix("WAVE").separator("__"))
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        let wave = &self.wave;
        let shares = [wave.familiar_share, wave.similar_share, wave.discovery_share];
        anyhow::ensure!(
            shares.iter().all(|s| (0.0..=1.0).contains(s)),
            "wave pool shares must lie in [0, 1]"
        );
        anyhow::ensure!(
            shares.iter().sum::<f32>() <= 1.0 + f32::EPSILON,
            "wave pool shares must not exceed 1.0 in total"
        );
        anyhow::ensure!(
            wave.default_page_size >= 1 && wave.default_page_size <= wave.max_page_size,
            "default_page_size must lie in [1, max_page_size]"
        );
        anyhow::ensure!(wave.max_artist_run >= 1, "max_artist_run must be at least 1");

        let hybrid = &self.hybrid;
        anyhow::ensure!(
            hybrid.user_cf_share + hybrid.content_share <= 1.0 + f32::EPSILON,
            "hybrid shares must not exceed 1.0 in total"
        );
        anyhow::ensure!(hybrid.max_points() > 0.0, "hybrid points must be positive");

        anyhow::ensure!(
            (0.0..=1.0).contains(&self.similarity.min_similarity),
            "min_similarity must lie in [0, 1]"
        );
        anyhow::ensure!(
            self.similarity.min_co_occurrence >= 1,
            "min_co_occurrence must be at least 1"
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.mixes.keep_top_fraction),
            "keep_top_fraction must lie in [0, 1]"
        );
        anyhow::ensure!(
            self.playlists.fetch_multiplier >= 1,
            "playlist fetch_multiplier must be at least 1"
        );

        Ok(())
    }
}
