use platform_init::config::Config;
use platform_init::schema::platform::platform_schema_named;
use platform_init::store::{MemoryStore, PgStore};
use platform_init::{db, initialize, render_plan, InitError, InitResult};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let config = Config::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .json()
        .init();

    if let Err(e) = run(&config).await {
        tracing::error!("Database initialization failed: {e}");
        std::process::exit(1);
    }
}

async fn run(config: &Config) -> InitResult<()> {
    if config.db.database.trim().is_empty() {
        return Err(InitError::Config("DB_NAME must not be empty".to_string()));
    }
    let schema = platform_schema_named(&config.db.database);

    if config.dry_run {
        tracing::info!("Dry run, no connection will be opened");
        for statement in render_plan(&schema) {
            println!("{statement};");
        }
        let report = initialize(&MemoryStore::new(), &schema).await?;
        tracing::info!(
            database = %report.database,
            collections_created = report.collections_created.len(),
            collections_existing = report.collections_existing.len(),
            indexes_created = report.indexes_created,
            indexes_unchanged = report.indexes_unchanged,
            "Dry run completed"
        );
        return Ok(());
    }

    let pool = db::create_pool(config).await?;
    tracing::info!(database = %schema.name, "Connected to PostgreSQL");

    let store = PgStore::new(pool.clone());
    initialize(&store, &schema).await?;
    pool.close().await;
    Ok(())
}
