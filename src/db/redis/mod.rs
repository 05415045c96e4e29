pub mod history;

pub use history::create_redis_client;
pub use history::HistoryKey;
pub use history::RedisShownHistory;
