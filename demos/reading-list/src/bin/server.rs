//! Runs the reading list on `$HOST:$PORT`.
//!
//! Tokens come from `READING_LIST_TOKENS` as `token=user,token=user`.

use reading_list::{InMemoryDb, ReadingList, StaticUsers};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), perch::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let tokens = std::env::var("READING_LIST_TOKENS").unwrap_or_default();
    let users = StaticUsers::parse(&tokens)?;
    if users.is_empty() {
        tracing::warn!("READING_LIST_TOKENS is empty; every request will be rejected");
    }

    perch::run(ReadingList::new(InMemoryDb::new(), users)).await
}
