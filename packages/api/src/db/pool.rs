//! Database connection pool using the OnceCell pattern.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Get or initialize the database connection pool.
///
/// Only the first caller's `url` is used; later calls return the cached pool.
pub async fn get_pool(url: &str) -> Result<&'static PgPool, sqlx::Error> {
    POOL.get_or_try_init(|| async {
        tracing::info!("connecting to database");
        PgPoolOptions::new().max_connections(5).connect(url).await
    })
    .await
}
