use dotenvy::dotenv;
use skill_exchange::{
    config::{credits, database},
    errors::Result,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file, non-fatal since variables may be set externally
    dotenv().ok();

    // 3. Credit settings and price table
    let credit_config = credits::load_default_config()
        .inspect_err(|e| error!("Failed to load credit configuration: {}", e))?;
    info!(
        initial_credits = credit_config.initial_credits,
        manual_transfers = ?credit_config.manual_transfers,
        priced_combinations = credit_config.prices.len(),
        fallback_price = credit_config.prices.fallback(),
        "Credit configuration loaded"
    );

    // 4. Database of record
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db)
        .await
        .inspect(|_| info!("Database initialized successfully."))
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    Ok(())
}
