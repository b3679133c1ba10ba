//! Schema migration runner
//!
//! Run with: cargo run --bin migrate

use wallet_ledger::{db, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wallet_ledger=info,sqlx=warn".into()),
        )
        .init();

    let config = Config::from_env()?;

    tracing::info!("Connecting to database...");
    let pool = db::connect(&config).await?;

    db::run_migrations(&pool).await?;

    if !db::check_schema(&pool).await? {
        pool.close().await;
        return Err(anyhow::anyhow!("Schema incomplete after migration"));
    }

    tracing::info!("Migration completed successfully");
    pool.close().await;

    Ok(())
}
