use chrono::{DateTime, Duration, Utc};
use redis::AsyncCommands;
use redis::Client;
use std::fmt::Display;

use crate::db::{collect_recent_ids, ShownEvent, ShownHistoryStore, MAX_HISTORY_EVENTS};
use crate::error::AppError;
use crate::error::AppResult;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HistoryKey {
    /// List of serialized feed events, newest first
    Events(String),
    /// RFC 3339 time of the latest recorded feed
    LastActivity(String),
}

impl Display for HistoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HistoryKey::Events(user_id) => write!(f, "shown:{}", user_id),
            HistoryKey::LastActivity(user_id) => write!(f, "shown_last:{}", user_id),
        }
    }
}

/// Creates a Redis client for shown history
pub fn create_redis_client(redis_url: &str) -> anyhow::Result<Client> {
    let client = Client::open(redis_url)?;
    Ok(client)
}

/// Shown history kept in Redis lists, one per user
#[derive(Clone)]
pub struct RedisShownHistory {
    redis_client: Client,
}

impl RedisShownHistory {
    pub fn new(redis_client: Client) -> Self {
        Self { redis_client }
    }
}

fn decode_event(raw: &str) -> Option<ShownEvent> {
    match serde_json::from_str(raw) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::warn!(error = %e, "Skipping malformed shown-history entry");
            None
        }
    }
}

#[async_trait::async_trait]
impl ShownHistoryStore for RedisShownHistory {
    async fn recent_ids(
        &self,
        user_id: &str,
        max_age: Duration,
        max_count: usize,
    ) -> AppResult<Vec<String>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Vec<String> = conn
            .lrange(HistoryKey::Events(user_id.to_string()).to_string(), 0, -1)
            .await?;

        let events: Vec<ShownEvent> = raw.iter().filter_map(|r| decode_event(r)).collect();
        Ok(collect_recent_ids(&events, Utc::now() - max_age, max_count))
    }

    async fn record(&self, user_id: &str, ids: &[String], at: DateTime<Utc>) -> AppResult<()> {
        let event = ShownEvent {
            ids: ids.to_vec(),
            at,
        };
        let json = serde_json::to_string(&event)
            .map_err(|e| AppError::Internal(format!("History serialization error: {}", e)))?;

        let events_key = HistoryKey::Events(user_id.to_string()).to_string();
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = redis::pipe()
            .atomic()
            .lpush(&events_key, json)
            .ignore()
            .ltrim(&events_key, 0, MAX_HISTORY_EVENTS as isize - 1)
            .ignore()
            .set(HistoryKey::LastActivity(user_id.to_string()).to_string(), at.to_rfc3339())
            .ignore()
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> AppResult<()> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let _: () = conn
            .del(vec![
                HistoryKey::Events(user_id.to_string()).to_string(),
                HistoryKey::LastActivity(user_id.to_string()).to_string(),
            ])
            .await?;
        Ok(())
    }

    async fn last_activity(&self, user_id: &str) -> AppResult<Option<DateTime<Utc>>> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn
            .get(HistoryKey::LastActivity(user_id.to_string()).to_string())
            .await?;

        Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => Some(dt.with_timezone(&Utc)),
            Err(e) => {
                tracing::warn!(user_id = %user_id, error = %e, "Unparseable last-activity value");
                None
            }
        }))
    }
}
