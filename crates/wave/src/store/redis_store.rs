//! Redis-backed preference store
//!
//! Dislikes live in one set per user: `{prefix}:wave:dislikes:{user_id}`.

use super::{PreferenceStore, StoreResult};
use crate::types::{TrackId, UserId};
use async_trait::async_trait;
use music_platform_core::RedisConfig;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct RedisPreferenceStore {
    manager: ConnectionManager,
    key_prefix: String,
}

impl RedisPreferenceStore {
    /// Connect and verify the server answers PING
    pub async fn connect(config: &RedisConfig) -> StoreResult<Self> {
        let client = Client::open(config.url.as_str())?;
        let mut manager = ConnectionManager::new(client).await?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut manager)
            .await?;

        info!(key_prefix = %config.key_prefix, "Redis preference store connected");

        Ok(Self {
            manager,
            key_prefix: config.key_prefix.clone(),
        })
    }

    fn dislikes_key(&self, user_id: UserId) -> String {
        dislikes_key(&self.key_prefix, user_id)
    }
}

fn dislikes_key(prefix: &str, user_id: UserId) -> String {
    format!("{}:wave:dislikes:{}", prefix, user_id)
}

#[async_trait]
impl PreferenceStore for RedisPreferenceStore {
    async fn record_dislike(&self, user_id: UserId, track_id: TrackId) -> StoreResult<()> {
        let mut conn = self.manager.clone();
        conn.sadd::<_, _, ()>(self.dislikes_key(user_id), track_id.to_string())
            .await?;
        Ok(())
    }

    async fn get_disliked(&self, user_id: UserId) -> StoreResult<HashSet<TrackId>> {
        let mut conn = self.manager.clone();
        let members: Vec<String> = conn.smembers(self.dislikes_key(user_id)).await?;

        Ok(members
            .into_iter()
            .filter_map(|raw| match Uuid::parse_str(&raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    warn!(user_id = %user_id, member = %raw, "Skipping malformed dislike member");
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dislikes_key_layout() {
        let user = Uuid::nil();
        assert_eq!(
            dislikes_key("music", user),
            "music:wave:dislikes:00000000-0000-0000-0000-000000000000"
        );
    }

    #[tokio::test]
    #[ignore] // requires a running Redis instance
    async fn test_dislike_round_trip() {
        let config = RedisConfig {
            url: std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into()),
            key_prefix: format!("test-{}", Uuid::new_v4()),
            ..RedisConfig::default()
        };
        let store = RedisPreferenceStore::connect(&config).await.unwrap();
        let user = Uuid::new_v4();
        let track = Uuid::new_v4();

        store.record_dislike(user, track).await.unwrap();
        store.record_dislike(user, track).await.unwrap();

        let disliked = store.get_disliked(user).await.unwrap();
        assert_eq!(disliked.len(), 1);
        assert!(disliked.contains(&track));
    }
}
