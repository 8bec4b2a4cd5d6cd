use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

/// Initialize the server database connection pool and run migrations.
///
/// The acquire timeout bounds how long a request waits for a free
/// connection; hitting it surfaces as a resource-exhaustion error rather
/// than queueing indefinitely.
pub async fn init_db(database_url: &str) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}
