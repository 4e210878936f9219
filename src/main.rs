use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod app;
mod common;
mod config;
mod docs;
mod infrastructure;
mod middleware;
mod modules;
mod pipeline;
mod routes;
mod state;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting server...");

    let config = config::settings::AppConfig::new().expect("Missing required configuration");
    let port = config.server_port;

    let db = infrastructure::db::pool::connect_to_db(&config.database_url)
        .await
        .expect("Failed to connect to PostgreSQL");

    let redis = infrastructure::redis::client::RedisService::new(&config.redis_url)
        .await
        .expect("Failed to connect to Redis");

    let storage = infrastructure::storage::s3::StorageService::new(
        &config.minio_url,
        &config.minio_bucket,
        &config.minio_access_key,
        &config.minio_secret_key,
        &config.public_base_url,
    )
    .await;

    let state = state::AppState::new(config, db, redis, storage);
    let app = app::create_app(state).await;

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await.unwrap();
    info!("Server running on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await.unwrap();
}
