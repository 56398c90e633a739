use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;

use crate::config::Config;
use crate::error::InitResult;

pub async fn create_pool(config: &Config) -> InitResult<PgPool> {
    let url = config.database_url();
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(config.db.pool_max.max(1))
        .acquire_timeout(Duration::from_secs(config.db.acquire_timeout_secs))
        .connect(&url)
        .await?;
    Ok(pool)
}
