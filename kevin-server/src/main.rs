use std::net::SocketAddr;

use anyhow::Context;
use kevin_server::{build_router, config, db, storage::ContentBucket, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kevin_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load settings
    let settings = config::Settings::new().context("Failed to load settings")?;

    // Initialize database
    let db = db::Database::new(&settings.database.path).context("Failed to create database")?;
    db.initialize()
        .context("Failed to initialize database schema")?;

    if settings.database.seed_demo_data {
        db.seed_demo_data().context("Failed to seed demo data")?;
        tracing::info!("Demo data seeded successfully");
    }

    tracing::info!("Database initialized successfully");

    let bucket = ContentBucket::new(&settings.storage.upload_dir, &settings.server.public_base_url)
        .context("Failed to prepare upload directory")?;
    tracing::info!("Serving uploads from {}", bucket.root().display());

    let app = build_router(AppState::new(db, bucket));

    // Start server
    let addr: SocketAddr = settings
        .bind_address()
        .parse()
        .context("Failed to parse server address")?;
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
