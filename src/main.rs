use std::sync::Arc;

use anyhow::Context;
use serde::de::DeserializeOwned;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use emotion_feed::api::{create_router, AppState};
use emotion_feed::config::Config;
use emotion_feed::db::{create_redis_client, InMemoryStore, RedisShownHistory, ShownHistoryStore};
use emotion_feed::models::{Ad, ContentItem};
use emotion_feed::services::FeedEngine;

async fn load_seed<T: DeserializeOwned>(path: Option<&str>) -> anyhow::Result<Vec<T>> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse seed file {}", path))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,emotion_feed=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let catalog: Vec<ContentItem> = load_seed(config.catalog_path.as_deref()).await?;
    let ads: Vec<Ad> = load_seed(config.ads_path.as_deref()).await?;
    tracing::info!(
        content_items = catalog.len(),
        ads = ads.len(),
        "Loaded seed data"
    );

    let store = InMemoryStore::with_data(catalog, ads);

    let history: Arc<dyn ShownHistoryStore> = match config.redis_url.as_deref() {
        Some(url) => {
            let client = create_redis_client(url)?;
            tracing::info!("Shown history backed by Redis");
            Arc::new(RedisShownHistory::new(client))
        }
        None => {
            tracing::info!("REDIS_URL not set, shown history kept in memory");
            Arc::new(store.clone())
        }
    };

    let engine = FeedEngine::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(store),
        history,
        config.engine_settings()?,
    );
    let app = create_router(AppState::new(engine));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
